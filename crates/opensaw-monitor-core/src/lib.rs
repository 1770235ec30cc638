//! # opensaw-monitor-core
//!
//! **Live view of a running OpenSAW job.**
//!
//! The job publishes two JSON documents over HTTP: aggregate statistics
//! (tool timings, crashes, coverage history) and the execution trace graph.
//! This crate polls both and folds each snapshot into long-lived visual
//! state without ever redrawing history from scratch.
//!
//! ## Quick Start
//!
//! ```no_run
//! use opensaw_monitor_core::{MonitorConfig, NullView};
//!
//! # async fn demo() {
//! let config = MonitorConfig::default();
//! let client = reqwest::Client::new();
//!
//! let mut stats = config.statistics_poller(client.clone(), NullView);
//! let control = stats.handle();
//! tokio::spawn(async move { stats.run().await });
//!
//! // Later, from a key handler:
//! control.toggle();
//! println!("{}", control.label().as_str());
//! # }
//! ```
//!
//! ## Architecture
//!
//! Poller → fetch → `MergeModel::apply` → rendering trait → wait → repeat
//!
//! Two merge models:
//! - [`StatisticsModel`]: performance registry (insert-once), crash histogram
//!   (recomputed), coverage series (append-only).
//! - [`TraceGraphModel`]: node registry (insert-once), link list (replaced).
//!
//! Each [`Poller`] runs one cycle at a time and halts on the first error;
//! its [`PollerHandle`] is the pause/resume control.

pub mod config;
pub mod error;
pub mod palette;
pub mod poller;
pub mod render;
pub mod snapshot;
pub mod source;
pub mod statistics;
pub mod tracegraph;

pub use config::{
    DEFAULT_BASE_URL, MonitorConfig, STATISTICS_INTERVAL, STATISTICS_PATH, StatisticsPoller,
    TRACEGRAPH_INTERVAL, TRACEGRAPH_PATH, TraceGraphPoller,
};
pub use error::{MonitorError, Result};
pub use palette::{PaletteAllocator, Rgb, group_color, signal_color};
pub use poller::{
    ControlLabel, CycleOutcome, MergeModel, Poller, PollerExit, PollerHandle, PollerStatus,
    Progress, SnapshotSource,
};
pub use render::{GraphLayout, NullView, StatisticsView};
pub use snapshot::{
    CoverageReport, CrashRecord, FoundTotals, PerformanceTable, StatisticsSnapshot,
    TaskPerformance, TraceGraphSnapshot, TraceLink, TraceNode, VisitedSeries,
};
pub use source::HttpSource;
pub use statistics::{
    CoveragePoint, CoverageSeries, CrashHistogram, PerformanceEntry, SIGNALS, StatisticsModel,
    display_name, format_seconds,
};
pub use tracegraph::{GraphDelta, ROOT_NODE_ID, ResolvedLink, TraceGraphModel};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
