//! TUI application state and event loop.
//!
//! Both pollers run as tasks on the tokio runtime. Each owns its merge model;
//! the views those models draw into are thin handles onto state shared with
//! the UI thread, which reads it once per frame through [`App::snapshot`].

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;

use opensaw_monitor_core::{
    CoveragePoint, CrashHistogram, GraphLayout, MonitorConfig, PerformanceEntry, PollerHandle,
    PollerStatus, ResolvedLink, StatisticsView, TraceNode,
};

use super::layout::{Body, ForceLayout};

/// Layout steps per frame while the graph is still moving.
const TICKS_PER_FRAME: usize = 3;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ---------------------------------------------------------------------------
// Tab
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Statistics,
    TraceGraph,
}

impl Tab {
    pub const ALL: [Tab; 2] = [Tab::Statistics, Tab::TraceGraph];

    pub fn next(self) -> Self {
        match self {
            Self::Statistics => Self::TraceGraph,
            Self::TraceGraph => Self::Statistics,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Statistics => "Statistics",
            Self::TraceGraph => "Trace graph",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::Statistics => 0,
            Self::TraceGraph => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared views
// ---------------------------------------------------------------------------

/// What the statistics tab draws.
#[derive(Debug, Clone, Default)]
pub struct StatisticsPanel {
    /// In ring-segment order.
    pub entries: Vec<PerformanceEntry>,
    pub crashes: CrashHistogram,
    pub coverage: Vec<CoveragePoint>,
    /// Extent of the coverage x axis.
    pub coverage_len: usize,
    pub complete: bool,
    pub redraws: u64,
}

/// [`StatisticsView`] that writes into a panel the UI thread can read.
#[derive(Clone, Default)]
pub struct SharedStatistics(Arc<Mutex<StatisticsPanel>>);

impl SharedStatistics {
    pub fn panel(&self) -> StatisticsPanel {
        lock(&self.0).clone()
    }
}

impl StatisticsView for SharedStatistics {
    fn add_performance_segment(&mut self, entry: &PerformanceEntry) {
        lock(&self.0).entries.push(entry.clone());
    }

    fn update_performance(&mut self, entry: &PerformanceEntry) {
        let mut panel = lock(&self.0);
        if let Some(slot) = panel.entries.get_mut(entry.segment) {
            *slot = entry.clone();
        }
    }

    fn set_crash_counts(&mut self, histogram: &CrashHistogram) {
        lock(&self.0).crashes = histogram.clone();
    }

    fn relayout_coverage(&mut self, len: usize) {
        lock(&self.0).coverage_len = len;
    }

    fn add_coverage_point(&mut self, point: &CoveragePoint) {
        let mut panel = lock(&self.0);
        panel.coverage.push(point.clone());
        panel.coverage_len = panel.coverage_len.max(panel.coverage.len());
    }

    fn redraw(&mut self) {
        lock(&self.0).redraws += 1;
    }

    fn mark_complete(&mut self) {
        lock(&self.0).complete = true;
    }
}

/// [`GraphLayout`] handle onto the simulation the UI thread ticks.
#[derive(Clone)]
pub struct SharedLayout(Arc<Mutex<ForceLayout>>);

impl SharedLayout {
    pub fn new(layout: ForceLayout) -> Self {
        Self(Arc::new(Mutex::new(layout)))
    }

    /// Step the simulation; returns whether it is still moving.
    pub fn tick(&self, steps: usize) -> bool {
        let mut layout = lock(&self.0);
        (0..steps).fold(false, |_, _| layout.tick())
    }
}

impl GraphLayout for SharedLayout {
    fn set_nodes(&mut self, nodes: &[TraceNode]) {
        lock(&self.0).set_nodes(nodes);
    }

    fn set_links(&mut self, links: &[ResolvedLink]) {
        lock(&self.0).set_links(links);
    }

    fn restart(&mut self) {
        lock(&self.0).restart();
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Everything one frame needs, captured once.
pub struct Snapshot {
    pub statistics: StatisticsPanel,
    pub bodies: Vec<Body>,
    pub links: Vec<ResolvedLink>,
    pub bounds: (f64, f64, f64, f64),
    pub settled: bool,
    /// Graph merges so far.
    pub graph_updates: u64,
    pub statistics_status: PollerStatus,
    pub graph_status: PollerStatus,
}

impl Snapshot {
    pub fn status(&self, tab: Tab) -> &PollerStatus {
        match tab {
            Tab::Statistics => &self.statistics_status,
            Tab::TraceGraph => &self.graph_status,
        }
    }
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    NextTab,
    /// Press the Stop/Resume control of one view.
    Toggle(Tab),
}

pub fn action_for(key: KeyCode, tab: Tab) -> Option<Action> {
    match key {
        KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
        KeyCode::Tab | KeyCode::BackTab => Some(Action::NextTab),
        KeyCode::Char(' ') | KeyCode::Enter => Some(Action::Toggle(tab)),
        KeyCode::Char('s') => Some(Action::Toggle(Tab::Statistics)),
        KeyCode::Char('g') => Some(Action::Toggle(Tab::TraceGraph)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct App {
    config: MonitorConfig,
    tab: Tab,
    running: bool,
    statistics: SharedStatistics,
    layout: SharedLayout,
    statistics_poller: PollerHandle,
    graph_poller: PollerHandle,
}

impl App {
    /// Spawn both pollers on `runtime` and return the dashboard driving them.
    pub fn start(
        config: MonitorConfig,
        client: reqwest::Client,
        runtime: &tokio::runtime::Handle,
    ) -> Self {
        let statistics = SharedStatistics::default();
        let layout = SharedLayout::new(ForceLayout::new(900.0, 900.0));

        let mut stats = config.statistics_poller(client.clone(), statistics.clone());
        let mut graph = config.tracegraph_poller(client, layout.clone());
        let statistics_poller = stats.handle();
        let graph_poller = graph.handle();
        runtime.spawn(async move { stats.run().await });
        runtime.spawn(async move { graph.run().await });

        Self {
            config,
            tab: Tab::default(),
            running: true,
            statistics,
            layout,
            statistics_poller,
            graph_poller,
        }
    }

    pub fn run(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        // Restore the terminal before a panic message is printed.
        let original_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show);
            original_hook(info);
        }));

        let result = self.run_loop(&mut terminal);

        let _ = std::panic::take_hook();
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            crossterm::cursor::Show
        )?;

        self.statistics_poller.shutdown();
        self.graph_poller.shutdown();

        result
    }

    fn run_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> io::Result<()> {
        while self.running {
            let snapshot = self.snapshot();
            terminal.draw(|f| super::ui::draw(f, self, &snapshot))?;

            if event::poll(Duration::from_millis(50))?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                self.handle_key(key.code);
            }

            if self.tab == Tab::TraceGraph {
                self.layout.tick(TICKS_PER_FRAME);
            }
        }

        Ok(())
    }

    fn handle_key(&mut self, key: KeyCode) {
        match action_for(key, self.tab) {
            Some(Action::Quit) => self.running = false,
            Some(Action::NextTab) => self.tab = self.tab.next(),
            Some(Action::Toggle(tab)) => {
                self.poller(tab).toggle();
            }
            None => {}
        }
    }

    fn poller(&self, tab: Tab) -> &PollerHandle {
        match tab {
            Tab::Statistics => &self.statistics_poller,
            Tab::TraceGraph => &self.graph_poller,
        }
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Snapshot {
        let (bodies, links, bounds, settled, graph_updates) = {
            let layout = lock(&self.layout.0);
            (
                layout.bodies().to_vec(),
                layout.links().to_vec(),
                layout.bounds(),
                layout.is_settled(),
                layout.restarts(),
            )
        };
        Snapshot {
            statistics: self.statistics.panel(),
            bodies,
            links,
            bounds,
            settled,
            graph_updates,
            statistics_status: self.statistics_poller.status(),
            graph_status: self.graph_poller.status(),
        }
    }
}
