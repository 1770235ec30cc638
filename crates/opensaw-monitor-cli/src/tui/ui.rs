//! TUI rendering.
//!
//! ┌──────────────────────────────────────────────────┐
//! │  OpenSAW monitor   Statistics │ Trace graph      │
//! ├────────────────────────┬─────────────────────────┤
//! │  Performance           │  Crashes                │
//! │  ■ IL TOOL   4.50s ▇▇▇ │  ▇     ▇          ▇     │
//! │  ■ SMT SOLVER 2.00s ▇  │  HUP  INT  ...   SEGV   │
//! ├────────────────────────┴─────────────────────────┤
//! │  Coverage   blocks ── branches ──                │
//! ├──────────────────────────────────────────────────┤
//! │  statistics: Stop   #12   last error …           │
//! │  tab: switch view   space: stop/resume   q: quit │
//! └──────────────────────────────────────────────────┘

use super::app::{App, Snapshot, StatisticsPanel, Tab};
use opensaw_monitor_core::{ControlLabel, PollerStatus, Rgb, group_color};
use ratatui::{
    prelude::*,
    widgets::{
        canvas::{Canvas, Circle, Line as CanvasLine, Points},
        *,
    },
};

const SHARE_WIDTH: usize = 16;

pub fn draw(f: &mut Frame, app: &App, snapshot: &Snapshot) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // title + tabs
            Constraint::Min(10),   // main
            Constraint::Length(1), // poller status
            Constraint::Length(1), // keys
        ])
        .split(f.area());

    draw_title(f, rows[0], app);
    match app.tab() {
        Tab::Statistics => draw_statistics(f, rows[1], &snapshot.statistics),
        Tab::TraceGraph => draw_graph(f, rows[1], snapshot),
    }
    draw_status(f, rows[2], app.tab(), snapshot.status(app.tab()));
    draw_keys(f, rows[3]);
}

fn color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.0, rgb.1, rgb.2)
}

fn draw_title(f: &mut Frame, area: Rect, app: &App) {
    let titles: Vec<Line> = Tab::ALL.iter().map(|t| Line::from(t.title())).collect();
    let tabs = Tabs::new(titles)
        .select(app.tab().index())
        .highlight_style(Style::default().bold().fg(Color::Yellow))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(Line::from(vec![
                    Span::styled(" OpenSAW monitor ", Style::default().bold().fg(Color::Cyan)),
                    Span::styled(
                        format!(" {} ", app.config().base_url),
                        Style::default().fg(Color::DarkGray),
                    ),
                ])),
        );
    f.render_widget(tabs, area);
}

// ---------------------------------------------------------------------------
// Statistics tab
// ---------------------------------------------------------------------------

fn draw_statistics(f: &mut Frame, area: Rect, panel: &StatisticsPanel) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(area);
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[0]);

    draw_performance(f, top[0], panel);
    draw_crashes(f, top[1], panel);
    draw_coverage(f, rows[1], panel);
}

/// The ring as a share bar per segment, with the legend figures beside it.
fn draw_performance(f: &mut Frame, area: Rect, panel: &StatisticsPanel) {
    let sum: f64 = panel.entries.iter().map(|e| e.total.max(0.0)).sum();

    let rows: Vec<Row> = panel
        .entries
        .iter()
        .map(|entry| {
            let share = if sum > 0.0 {
                entry.total.max(0.0) / sum
            } else {
                0.0
            };
            let filled = (share * SHARE_WIDTH as f64).round() as usize;
            let measurements = entry
                .measurements
                .map_or_else(|| "—".to_string(), |m| m.to_string());
            Row::new(vec![
                Cell::from("■").style(Style::default().fg(color(entry.color))),
                Cell::from(entry.label.clone()),
                Cell::from(entry.total_label()),
                Cell::from(entry.average_label()),
                Cell::from(measurements),
                Cell::from("▇".repeat(filled)).style(Style::default().fg(color(entry.color))),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(2),                  // swatch
            Constraint::Min(12),                    // name
            Constraint::Length(10),                 // total
            Constraint::Length(9),                  // average
            Constraint::Length(6),                  // measurements
            Constraint::Length(SHARE_WIDTH as u16), // share
        ],
    )
    .header(
        Row::new(vec!["", "Task", "Total", "Avg", "Runs", "Share"])
            .style(Style::default().fg(Color::DarkGray)),
    )
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" Performance  #{} ", panel.redraws)),
    );

    f.render_widget(table, area);
}

fn draw_crashes(f: &mut Frame, area: Rect, panel: &StatisticsPanel) {
    let buckets = panel.crashes.buckets();
    let n = buckets.len().max(1) as u16;
    let bar_width = (area.width.saturating_sub(2) / n).saturating_sub(1).clamp(1, 6);

    let bars: Vec<Bar> = buckets
        .iter()
        .map(|b| {
            Bar::default()
                .value(b.count as u64)
                .label(Line::from(b.name.trim_start_matches("SIG")))
                .style(Style::default().fg(color(b.color)))
        })
        .collect();

    let chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Crashes ({}) ", panel.crashes.total())),
        )
        .data(BarGroup::default().bars(&bars))
        .bar_width(bar_width)
        .bar_gap(1);

    f.render_widget(chart, area);
}

fn draw_coverage(f: &mut Frame, area: Rect, panel: &StatisticsPanel) {
    let blocks: Vec<(f64, f64)> = panel
        .coverage
        .iter()
        .enumerate()
        .map(|(i, p)| (i as f64, p.blocks as f64))
        .collect();
    let branches: Vec<(f64, f64)> = panel
        .coverage
        .iter()
        .enumerate()
        .map(|(i, p)| (i as f64, p.branches as f64))
        .collect();

    let y_max = panel
        .coverage
        .iter()
        .map(|p| p.blocks.max(p.branches))
        .max()
        .unwrap_or(0)
        .max(1) as f64
        * 1.1;
    let x_max = (panel.coverage_len.saturating_sub(1)).max(1) as f64;

    let first = panel.coverage.first().map_or("", |p| p.label.as_str());
    let last = panel.coverage.last().map_or("", |p| p.label.as_str());

    let datasets = vec![
        Dataset::default()
            .name("blocks")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Cyan))
            .data(&blocks),
        Dataset::default()
            .name("branches")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Magenta))
            .data(&branches),
    ];

    let mut title = vec![Span::raw(format!(" Coverage  {} points ", panel.coverage.len()))];
    if panel.complete {
        title.push(Span::styled(
            " ✓ Complete ",
            Style::default().bold().fg(Color::Green),
        ));
    }

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(Line::from(title)))
        .x_axis(
            Axis::default()
                .bounds([0.0, x_max])
                .labels(vec![Line::from(first.to_string()), Line::from(last.to_string())]),
        )
        .y_axis(Axis::default().bounds([0.0, y_max]).labels(vec![
            Line::from("0"),
            Line::from(format!("{}", y_max.round() as u64)),
        ]));

    f.render_widget(chart, area);
}

// ---------------------------------------------------------------------------
// Trace graph tab
// ---------------------------------------------------------------------------

fn draw_graph(f: &mut Frame, area: Rect, snapshot: &Snapshot) {
    let (x0, x1, y0, y1) = snapshot.bounds;
    let pad = ((x1 - x0).max(y1 - y0) * 0.05).max(10.0);
    let span = (x1 - x0).max(y1 - y0) + 2.0 * pad;
    let bodies = &snapshot.bodies;

    let mut groups: Vec<(Rgb, Vec<(f64, f64)>)> = Vec::new();
    for body in bodies.iter().filter(|b| !b.is_root()) {
        let rgb = group_color(body.group);
        match groups.iter_mut().find(|(c, _)| *c == rgb) {
            Some((_, coords)) => coords.push((body.x, body.y)),
            None => groups.push((rgb, vec![(body.x, body.y)])),
        }
    }

    let state = if snapshot.settled { "settled" } else { "settling" };
    let canvas = Canvas::default()
        .block(Block::default().borders(Borders::ALL).title(format!(
            " Trace graph  {} nodes  {} links  #{}  {state} ",
            bodies.len(),
            snapshot.links.len(),
            snapshot.graph_updates
        )))
        .marker(symbols::Marker::Braille)
        .x_bounds([x0 - pad, x1 + pad])
        .y_bounds([y0 - pad, y1 + pad])
        .paint(|ctx| {
            for link in &snapshot.links {
                let (s, t) = (&bodies[link.source], &bodies[link.target]);
                let shade = if link.stroke_width() >= 2.0 {
                    Color::Gray
                } else {
                    Color::DarkGray
                };
                ctx.draw(&CanvasLine {
                    x1: s.x,
                    y1: s.y,
                    x2: t.x,
                    y2: t.y,
                    color: shade,
                });
            }
            ctx.layer();
            for (rgb, coords) in &groups {
                ctx.draw(&Points {
                    coords,
                    color: color(*rgb),
                });
            }
            for root in bodies.iter().filter(|b| b.is_root()) {
                ctx.draw(&Circle {
                    x: root.x,
                    y: root.y,
                    radius: span / 80.0,
                    color: color(group_color(root.group)),
                });
            }
        });

    f.render_widget(canvas, area);
}

// ---------------------------------------------------------------------------
// Status & keys
// ---------------------------------------------------------------------------

fn draw_status(f: &mut Frame, area: Rect, tab: Tab, status: &PollerStatus) {
    let label = status.label();
    let style = match label {
        ControlLabel::Complete => Style::default().bold().fg(Color::Green),
        ControlLabel::Stop => Style::default().fg(Color::Yellow),
        ControlLabel::Resume => Style::default().fg(Color::Cyan),
    };
    let control = match label {
        ControlLabel::Complete => Span::styled(" ✓ Complete ", style),
        _ => Span::styled(format!(" [space] {} ", label.as_str()), style),
    };
    let busy = if status.in_flight { " ⟳" } else { "" };

    let mut spans = vec![
        Span::styled(format!(" {} ", tab.title()), Style::default().bold()),
        control,
        Span::styled(
            format!(" #{}{busy} ", status.cycles),
            Style::default().fg(Color::DarkGray),
        ),
    ];
    if status.halted
        && let Some(err) = &status.last_error
    {
        spans.push(Span::styled(
            format!(" halted: {err}"),
            Style::default().fg(Color::Red),
        ));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_keys(f: &mut Frame, area: Rect) {
    let bar = Paragraph::new(
        " tab: switch view   space: stop/resume   s: statistics   g: graph   q: quit",
    )
    .style(Style::default().bg(Color::DarkGray).fg(Color::White));
    f.render_widget(bar, area);
}
