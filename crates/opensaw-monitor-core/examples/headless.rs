//! Poll a running job's statistics once per interval and print coverage.
//!
//! Run: `cargo run --example headless -- http://localhost:8080`

use opensaw_monitor_core::{
    CoveragePoint, CrashHistogram, MonitorConfig, PerformanceEntry, PollerExit, StatisticsView,
};

/// Prints each new coverage point and the crash total after every merge.
struct PrintView {
    crashes: usize,
}

impl StatisticsView for PrintView {
    fn add_performance_segment(&mut self, entry: &PerformanceEntry) {
        println!("new task {} ({})", entry.label, entry.color);
    }

    fn update_performance(&mut self, _: &PerformanceEntry) {}

    fn set_crash_counts(&mut self, histogram: &CrashHistogram) {
        self.crashes = histogram.total();
    }

    fn relayout_coverage(&mut self, _: usize) {}

    fn add_coverage_point(&mut self, point: &CoveragePoint) {
        println!(
            "{:>10}  blocks {:>6}  branches {:>6}",
            point.label, point.blocks, point.branches
        );
    }

    fn redraw(&mut self) {
        println!("crashes so far: {}", self.crashes);
    }

    fn mark_complete(&mut self) {
        println!("job complete");
    }
}

#[tokio::main]
async fn main() {
    let config = match std::env::args().nth(1) {
        Some(url) => MonitorConfig::with_base_url(url),
        None => MonitorConfig::default(),
    };
    println!("watching {}", config.statistics_url());

    let mut poller = config.statistics_poller(reqwest::Client::new(), PrintView { crashes: 0 });
    let handle = poller.handle();

    tokio::select! {
        exit = poller.run() => {
            if exit == PollerExit::Complete {
                println!("done after {} polls", handle.status().cycles);
            }
        }
        _ = async {
            loop {
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                if let Some(err) = handle.status().last_error.filter(|_| handle.status().halted) {
                    eprintln!("halted: {err}");
                    return;
                }
            }
        } => {}
    }
}
