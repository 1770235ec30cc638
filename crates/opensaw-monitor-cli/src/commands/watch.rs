//! Headless watcher: both pollers, log output instead of charts.

use std::time::Duration;

use log::{debug, error, info};
use opensaw_monitor_core::{
    CoveragePoint, CrashHistogram, GraphLayout, MonitorConfig, PerformanceEntry, PollerStatus,
    ResolvedLink, StatisticsView, TraceNode,
};

/// How long stopped pollers get to finish an in-flight fetch.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Logs what the statistics charts would show.
#[derive(Debug, Default)]
struct StatisticsLog {
    crashes: usize,
    latest: Option<CoveragePoint>,
}

impl StatisticsView for StatisticsLog {
    fn add_performance_segment(&mut self, entry: &PerformanceEntry) {
        info!("task {} ({})", entry.label, entry.color);
    }

    fn update_performance(&mut self, entry: &PerformanceEntry) {
        debug!(
            "{}: total {} average {}",
            entry.label,
            entry.total_label(),
            entry.average_label()
        );
    }

    fn set_crash_counts(&mut self, histogram: &CrashHistogram) {
        let total = histogram.total();
        if total != self.crashes {
            let by_signal: Vec<String> = histogram
                .buckets()
                .iter()
                .filter(|b| b.count > 0)
                .map(|b| format!("{}×{}", b.name, b.count))
                .collect();
            info!("crashes: {total} ({})", by_signal.join(", "));
            self.crashes = total;
        }
    }

    fn relayout_coverage(&mut self, _: usize) {}

    fn add_coverage_point(&mut self, point: &CoveragePoint) {
        self.latest = Some(point.clone());
    }

    fn redraw(&mut self) {
        if let Some(point) = self.latest.take() {
            info!(
                "coverage at {}: {} blocks, {} branches",
                point.label, point.blocks, point.branches
            );
        }
    }

    fn mark_complete(&mut self) {
        info!("job complete");
    }
}

/// Logs the trace graph whenever its link count changes.
#[derive(Debug, Default)]
struct GraphLog {
    nodes: usize,
    links: usize,
    reported_links: Option<usize>,
    changes: usize,
}

impl GraphLayout for GraphLog {
    fn set_nodes(&mut self, nodes: &[TraceNode]) {
        self.nodes = nodes.len();
    }

    fn set_links(&mut self, links: &[ResolvedLink]) {
        self.links = links.len();
    }

    fn restart(&mut self) {
        if self.reported_links == Some(self.links) {
            debug!("trace graph unchanged ({} links)", self.links);
            return;
        }
        self.reported_links = Some(self.links);
        self.changes += 1;
        info!("trace graph: {} nodes, {} links", self.nodes, self.links);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Complete,
    Halted,
    Interrupted,
}

/// Nobody can press Resume here, so a halted poller ends the watch.
fn decide(statistics: &PollerStatus, graph: &PollerStatus) -> Option<Outcome> {
    if statistics.complete {
        Some(Outcome::Complete)
    } else if statistics.halted || graph.halted {
        Some(Outcome::Halted)
    } else {
        None
    }
}

pub fn run(config: MonitorConfig) {
    let rt = super::runtime();
    let client = super::http_client();

    info!(
        "watching {} and {}",
        config.statistics_url(),
        config.tracegraph_url()
    );
    let outcome = rt.block_on(watch(config, client));
    rt.shutdown_timeout(DRAIN_TIMEOUT);

    if outcome == Outcome::Halted {
        std::process::exit(1);
    }
}

async fn watch(config: MonitorConfig, client: reqwest::Client) -> Outcome {
    let mut statistics = config.statistics_poller(client.clone(), StatisticsLog::default());
    let mut graph = config.tracegraph_poller(client, GraphLog::default());
    let statistics_handle = statistics.handle();
    let graph_handle = graph.handle();
    let statistics_task = tokio::spawn(async move { statistics.run().await });
    let graph_task = tokio::spawn(async move { graph.run().await });

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(Duration::from_millis(250));

    let outcome = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Outcome::Interrupted,
            _ = ticker.tick() => {
                let statistics = statistics_handle.status();
                if let Some(outcome) = decide(&statistics, &graph_handle.status()) {
                    break outcome;
                }
            }
        }
    };

    match outcome {
        Outcome::Complete => info!("statistics complete, stopping"),
        Outcome::Interrupted => info!("interrupted, stopping"),
        Outcome::Halted => error!("a poller halted; nothing left to watch"),
    }

    statistics_handle.shutdown();
    graph_handle.shutdown();
    for (name, task) in [("statistics", statistics_task), ("tracegraph", graph_task)] {
        match tokio::time::timeout(DRAIN_TIMEOUT, task).await {
            Ok(Ok(exit)) => debug!("{name} poller exited: {exit:?}"),
            Ok(Err(e)) => error!("{name} poller task failed: {e}"),
            Err(_) => debug!("{name} poller still fetching; dropping it"),
        }
    }
    outcome
}
