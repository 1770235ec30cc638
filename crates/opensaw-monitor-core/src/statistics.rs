//! Statistics merge model.
//!
//! Folds `/api/statistics.json` snapshots into three aggregates that live for
//! the whole session:
//!
//! - a performance registry keyed by task name (insert-once, values replaced),
//! - a crash histogram keyed by signal (recomputed from scratch every time),
//! - a coverage series (append-only; its length is the merge cursor).
//!
//! Each aggregate has its own merge rule because the server publishes each
//! differently: performance figures are running totals, the crash list is
//! complete every time, and coverage history only ever grows.

use std::collections::HashMap;

use log::debug;

use crate::error::Result;
use crate::palette::{PaletteAllocator, Rgb, signal_color};
use crate::poller::{MergeModel, Progress};
use crate::render::StatisticsView;
use crate::snapshot::{CrashRecord, StatisticsSnapshot, TaskPerformance, VisitedSeries};

/// Signal names in signal-number order; bucket `i` holds signal `i + 1`.
pub const SIGNALS: [&str; 11] = [
    "SIGHUP", "SIGINT", "SIGQUIT", "SIGILL", "SIGTRAP", "SIGABRT", "SIGEMT", "SIGFPE", "SIGKILL",
    "SIGBUS", "SIGSEGV",
];

/// Label of the point every coverage series starts with.
pub const COVERAGE_SEED_LABEL: &str = "0s";

/// Turn a task key into its legend title: first `_` becomes a space, then
/// upper-case (`il_tool` → `IL TOOL`).
pub fn display_name(name: &str) -> String {
    name.replacen('_', " ", 1).to_uppercase()
}

/// Seconds with two decimals and a unit, as legends and axis labels show them.
pub fn format_seconds(secs: f64) -> String {
    format!("{secs:.2}s")
}

// ---------------------------------------------------------------------------
// PerformanceEntry
// ---------------------------------------------------------------------------

/// One task's slice of the performance ring plus its legend figures.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceEntry {
    pub name: String,
    /// Legend title, see [`display_name`].
    pub label: String,
    /// Ring segment index; equals first-seen order.
    pub segment: usize,
    pub color: Rgb,
    pub total: f64,
    pub average: f64,
    pub measurements: Option<u64>,
}

impl PerformanceEntry {
    fn assign(&mut self, perf: &TaskPerformance) {
        self.total = perf.total;
        self.average = perf.average;
        if perf.measurements.is_some() {
            self.measurements = perf.measurements;
        }
    }

    pub fn total_label(&self) -> String {
        format_seconds(self.total)
    }

    pub fn average_label(&self) -> String {
        format_seconds(self.average)
    }
}

// ---------------------------------------------------------------------------
// CrashHistogram
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SignalBucket {
    pub name: &'static str,
    pub color: Rgb,
    pub count: usize,
}

/// Crash counts per signal, in a fixed bucket order.
#[derive(Debug, Clone, PartialEq)]
pub struct CrashHistogram {
    buckets: Vec<SignalBucket>,
}

impl CrashHistogram {
    pub fn new(signals: &[&'static str]) -> Self {
        let n = signals.len();
        let buckets = signals
            .iter()
            .enumerate()
            .map(|(i, &name)| SignalBucket {
                name,
                color: signal_color(i, n),
                count: 0,
            })
            .collect();
        Self { buckets }
    }

    /// Replace every count with the number of crashes whose 1-based signal
    /// lands on that bucket. Signals with no bucket are not counted.
    pub fn recompute(&mut self, crashes: &[CrashRecord]) {
        for (i, bucket) in self.buckets.iter_mut().enumerate() {
            bucket.count = crashes
                .iter()
                .filter(|crash| crash.signal == i as i64 + 1)
                .count();
        }
    }

    pub fn buckets(&self) -> &[SignalBucket] {
        &self.buckets
    }

    pub fn count(&self, index: usize) -> Option<usize> {
        self.buckets.get(index).map(|b| b.count)
    }

    pub fn total(&self) -> usize {
        self.buckets.iter().map(|b| b.count).sum()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl Default for CrashHistogram {
    fn default() -> Self {
        Self::new(&SIGNALS)
    }
}

// ---------------------------------------------------------------------------
// CoverageSeries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoveragePoint {
    pub label: String,
    pub blocks: u64,
    pub branches: u64,
}

impl CoveragePoint {
    pub fn seed() -> Self {
        Self {
            label: COVERAGE_SEED_LABEL.to_string(),
            blocks: 0,
            branches: 0,
        }
    }
}

/// Append-only coverage history. Its length is how far into the server's
/// arrays we have already read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageSeries {
    points: Vec<CoveragePoint>,
}

impl CoverageSeries {
    /// A series holding only the zero point shown before the first poll.
    pub fn seeded() -> Self {
        Self {
            points: vec![CoveragePoint::seed()],
        }
    }

    /// Append the measurements past our cursor. Returns the number of points
    /// added; zero when the snapshot holds nothing new. Ragged arrays are a
    /// `Parse` error and leave the series untouched.
    pub fn append_from(&mut self, visited: &VisitedSeries) -> Result<usize> {
        visited.validate()?;
        let seen = self.points.len();
        let available = visited.len();
        if available <= seen {
            return Ok(0);
        }
        self.points.extend((seen..available).map(|i| CoveragePoint {
            label: format_seconds(visited.timestamps[i]),
            blocks: visited.blocks[i],
            branches: visited.branches[i],
        }));
        Ok(available - seen)
    }

    pub fn points(&self) -> &[CoveragePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&CoveragePoint> {
        self.points.last()
    }
}

// ---------------------------------------------------------------------------
// StatisticsModel
// ---------------------------------------------------------------------------

/// Long-lived statistics state for one view.
pub struct StatisticsModel<V> {
    view: V,
    palette: PaletteAllocator,
    registry: HashMap<String, usize>,
    entries: Vec<PerformanceEntry>,
    crashes: CrashHistogram,
    coverage: CoverageSeries,
    found: Option<(u64, u64)>,
    job_time: Option<f64>,
    complete: bool,
}

impl<V: StatisticsView> StatisticsModel<V> {
    pub fn new(view: V) -> Self {
        Self::with_palette(view, PaletteAllocator::default())
    }

    /// Build a model that draws task colors from `palette`. The coverage
    /// seed point is pushed to the view straight away.
    pub fn with_palette(mut view: V, palette: PaletteAllocator) -> Self {
        let coverage = CoverageSeries::seeded();
        let crashes = CrashHistogram::default();
        view.set_crash_counts(&crashes);
        for point in coverage.points() {
            view.add_coverage_point(point);
        }
        Self {
            view,
            palette,
            registry: HashMap::new(),
            entries: Vec::new(),
            crashes,
            coverage,
            found: None,
            job_time: None,
            complete: false,
        }
    }

    /// Fold one snapshot in. Nothing is touched if the snapshot is rejected.
    pub fn apply(&mut self, snapshot: &StatisticsSnapshot) -> Result<Progress> {
        snapshot.coverage.visited.validate()?;

        self.merge_performance(snapshot);
        self.crashes.recompute(&snapshot.crashes);
        self.view.set_crash_counts(&self.crashes);
        let appended = self.merge_coverage(&snapshot.coverage.visited)?;

        if let Some(found) = snapshot.coverage.found {
            self.found = Some((found.blocks, found.branches));
        }
        if snapshot.time.is_some() {
            self.job_time = snapshot.time;
        }

        self.view.redraw();
        debug!(
            "statistics merged: {} tasks, {} crashes, {} new coverage points",
            self.entries.len(),
            self.crashes.total(),
            appended
        );

        if snapshot.done {
            self.complete = true;
            self.view.mark_complete();
            return Ok(Progress::Complete);
        }
        Ok(Progress::Continue)
    }

    fn merge_performance(&mut self, snapshot: &StatisticsSnapshot) {
        for (name, perf) in snapshot.performance.iter() {
            let idx = match self.registry.get(name) {
                Some(&idx) => idx,
                None => {
                    let idx = self.entries.len();
                    let entry = PerformanceEntry {
                        name: name.to_string(),
                        label: display_name(name),
                        segment: idx,
                        color: self.palette.next(),
                        total: 0.0,
                        average: 0.0,
                        measurements: None,
                    };
                    self.view.add_performance_segment(&entry);
                    self.entries.push(entry);
                    self.registry.insert(name.to_string(), idx);
                    idx
                }
            };
            let entry = &mut self.entries[idx];
            entry.assign(perf);
            self.view.update_performance(entry);
        }
    }

    fn merge_coverage(&mut self, visited: &VisitedSeries) -> Result<usize> {
        let seen = self.coverage.len();
        if visited.len() <= seen {
            return Ok(0);
        }
        self.view.relayout_coverage(visited.len());
        let added = self.coverage.append_from(visited)?;
        for point in &self.coverage.points()[seen..] {
            self.view.add_coverage_point(point);
        }
        Ok(added)
    }

    pub fn entries(&self) -> &[PerformanceEntry] {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&PerformanceEntry> {
        self.registry.get(name).map(|&i| &self.entries[i])
    }

    pub fn crashes(&self) -> &CrashHistogram {
        &self.crashes
    }

    pub fn coverage(&self) -> &CoverageSeries {
        &self.coverage
    }

    /// Blocks and branches discovered so far, if the job reported them.
    pub fn found(&self) -> Option<(u64, u64)> {
        self.found
    }

    pub fn job_time(&self) -> Option<f64> {
        self.job_time
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }
}

impl<V: StatisticsView> MergeModel for StatisticsModel<V> {
    type Snapshot = StatisticsSnapshot;

    fn apply(&mut self, snapshot: StatisticsSnapshot) -> Result<Progress> {
        StatisticsModel::apply(self, &snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MonitorError;
    use serde_json::json;

    /// Records every call in order.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl StatisticsView for Recorder {
        fn add_performance_segment(&mut self, entry: &PerformanceEntry) {
            self.calls.push(format!("segment {} {}", entry.name, entry.color));
        }
        fn update_performance(&mut self, entry: &PerformanceEntry) {
            self.calls.push(format!("update {} {}", entry.name, entry.total));
        }
        fn set_crash_counts(&mut self, histogram: &CrashHistogram) {
            self.calls.push(format!("crashes {}", histogram.total()));
        }
        fn relayout_coverage(&mut self, len: usize) {
            self.calls.push(format!("relayout {len}"));
        }
        fn add_coverage_point(&mut self, point: &CoveragePoint) {
            self.calls.push(format!("point {}", point.label));
        }
        fn redraw(&mut self) {
            self.calls.push("redraw".into());
        }
        fn mark_complete(&mut self) {
            self.calls.push("complete".into());
        }
    }

    fn snapshot(value: serde_json::Value) -> StatisticsSnapshot {
        serde_json::from_value(value).unwrap()
    }

    /// For key-order sensitive input; `json!` sorts object keys.
    fn snapshot_str(text: &str) -> StatisticsSnapshot {
        serde_json::from_str(text).unwrap()
    }

    fn coverage_only(blocks: &[u64], branches: &[u64], timestamps: &[f64]) -> StatisticsSnapshot {
        snapshot(json!({
            "performance": {},
            "crashes": [],
            "coverage": {"visited": {
                "blocks": blocks, "branches": branches, "timestamps": timestamps
            }},
            "done": false
        }))
    }

    #[test]
    fn display_name_replaces_first_underscore() {
        assert_eq!(display_name("il_tool"), "IL TOOL");
        assert_eq!(display_name("solver"), "SOLVER");
        assert_eq!(display_name("a_b_c"), "A B_C");
    }

    #[test]
    fn histogram_counts_by_signal() {
        let mut hist = CrashHistogram::default();
        let crashes: Vec<CrashRecord> = serde_json::from_value(json!([
            {"signal": 6}, {"signal": 6}, {"signal": 9}
        ]))
        .unwrap();
        hist.recompute(&crashes);

        assert_eq!(hist.len(), 11);
        assert_eq!(hist.buckets()[5].name, "SIGABRT");
        assert_eq!(hist.count(5), Some(2));
        assert_eq!(hist.buckets()[8].name, "SIGKILL");
        assert_eq!(hist.count(8), Some(1));
        for i in (0..11).filter(|&i| i != 5 && i != 8) {
            assert_eq!(hist.count(i), Some(0), "bucket {i}");
        }
    }

    #[test]
    fn histogram_is_derived_not_accumulated() {
        let mut hist = CrashHistogram::default();
        let many: Vec<CrashRecord> =
            serde_json::from_value(json!([{"signal": 11}, {"signal": 11}])).unwrap();
        hist.recompute(&many);
        hist.recompute(&many);
        assert_eq!(hist.count(10), Some(2));

        hist.recompute(&[]);
        assert_eq!(hist.total(), 0);
    }

    #[test]
    fn histogram_ignores_unknown_signals() {
        let mut hist = CrashHistogram::default();
        let odd: Vec<CrashRecord> =
            serde_json::from_value(json!([{"signal": 0}, {"signal": 12}, {"signal": -3}]))
                .unwrap();
        hist.recompute(&odd);
        assert_eq!(hist.total(), 0);
    }

    #[test]
    fn coverage_example_against_empty_series() {
        let mut series = CoverageSeries::default();
        let visited = VisitedSeries {
            blocks: vec![0, 3, 7],
            branches: vec![0, 1, 2],
            timestamps: vec![0.0, 1.5, 3.2],
        };
        assert_eq!(series.append_from(&visited).unwrap(), 3);

        let got: Vec<(&str, u64, u64)> = series
            .points()
            .iter()
            .map(|p| (p.label.as_str(), p.blocks, p.branches))
            .collect();
        assert_eq!(got, [("0.00s", 0, 0), ("1.50s", 3, 1), ("3.20s", 7, 2)]);

        assert_eq!(series.append_from(&visited).unwrap(), 0);
        assert_eq!(series.len(), 3);
    }

    #[test]
    fn ragged_coverage_is_rejected_without_appending() {
        let mut series = CoverageSeries::seeded();
        let ragged = VisitedSeries {
            blocks: vec![0, 3, 7],
            branches: vec![0, 1],
            timestamps: vec![0.0, 1.5, 3.2],
        };
        let err = series.append_from(&ragged).unwrap_err();
        assert_eq!(err.kind(), "parse");
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn model_starts_with_seed_point() {
        let model = StatisticsModel::new(Recorder::default());
        assert_eq!(model.coverage().points(), [CoveragePoint::seed()]);
        assert_eq!(model.view().calls, ["crashes 0", "point 0s"]);
    }

    #[test]
    fn reapplying_same_snapshot_adds_no_points() {
        let mut model = StatisticsModel::new(Recorder::default());
        let snap = coverage_only(&[0, 3, 7], &[0, 1, 2], &[0.0, 1.5, 3.2]);

        model.apply(&snap).unwrap();
        assert_eq!(model.coverage().len(), 3);
        let labels: Vec<&str> = model.coverage().points().iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, ["0s", "1.50s", "3.20s"]);

        model.apply(&snap).unwrap();
        assert_eq!(model.coverage().len(), 3);
    }

    #[test]
    fn coverage_length_tracks_longest_snapshot() {
        let mut model = StatisticsModel::new(Recorder::default());
        let mut max_seen = 1;
        for n in [1usize, 2, 2, 5, 5, 9] {
            let blocks: Vec<u64> = (0..n as u64).collect();
            let ts: Vec<f64> = (0..n).map(|i| i as f64).collect();
            model.apply(&coverage_only(&blocks, &blocks, &ts)).unwrap();
            max_seen = max_seen.max(n);
            assert_eq!(model.coverage().len(), max_seen);
        }
    }

    #[test]
    fn relayout_precedes_new_points() {
        let mut model = StatisticsModel::new(Recorder::default());
        model
            .apply(&coverage_only(&[0, 4], &[0, 2], &[0.0, 2.0]))
            .unwrap();
        let calls = &model.view().calls[2..];
        assert_eq!(calls, ["crashes 0", "relayout 2", "point 2.00s", "redraw"]);
    }

    #[test]
    fn performance_entries_keep_first_seen_colors() {
        let mut model = StatisticsModel::new(Recorder::default());
        model
            .apply(&snapshot_str(
                r#"{
                    "performance": {
                        "pin": {"total": 1.0, "average": 1.0},
                        "solver": {"total": 2.0, "average": 0.5, "measurements": 4}
                    },
                    "crashes": [],
                    "coverage": {"visited": {"blocks": [0], "branches": [0], "timestamps": [0]}}
                }"#,
            ))
            .unwrap();
        model
            .apply(&snapshot_str(
                r#"{
                    "performance": {
                        "solver": {"total": 3.0, "average": 0.75},
                        "il_tool": {"total": 0.5, "average": 0.5},
                        "extra": {"total": 0.1, "average": 0.1}
                    },
                    "crashes": [],
                    "coverage": {"visited": {"blocks": [0], "branches": [0], "timestamps": [0]}}
                }"#,
            ))
            .unwrap();

        let names: Vec<&str> = model.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["pin", "solver", "il_tool", "extra"]);

        let pin = model.entry("pin").unwrap();
        assert_eq!(pin.color, Rgb::from_hex(0x88a3f6));
        assert_eq!(pin.total, 1.0, "omitted tasks keep their last figures");

        let solver = model.entry("solver").unwrap();
        assert_eq!(solver.segment, 1);
        assert_eq!(solver.color, Rgb::from_hex(0x1c4fee));
        assert_eq!(solver.total, 3.0);
        assert_eq!(solver.measurements, Some(4));
        assert_eq!(solver.total_label(), "3.00s");
        assert_eq!(solver.average_label(), "0.75s");

        assert_eq!(model.entry("il_tool").unwrap().label, "IL TOOL");
        assert_eq!(model.entry("extra").unwrap().color, Rgb::BLACK);

        let segments = model
            .view()
            .calls
            .iter()
            .filter(|c| c.starts_with("segment"))
            .count();
        assert_eq!(segments, 4);
    }

    #[test]
    fn segment_is_created_before_first_update() {
        let mut model = StatisticsModel::new(Recorder::default());
        model
            .apply(&snapshot(json!({
                "performance": {"pin": {"total": 1.5, "average": 1.5}},
                "crashes": [],
                "coverage": {"visited": {"blocks": [0], "branches": [0], "timestamps": [0]}}
            })))
            .unwrap();
        let calls = &model.view().calls;
        let seg = calls.iter().position(|c| c.starts_with("segment pin")).unwrap();
        let upd = calls.iter().position(|c| c == "update pin 1.5").unwrap();
        assert!(seg < upd);
    }

    #[test]
    fn done_snapshot_completes() {
        let mut model = StatisticsModel::new(Recorder::default());
        let progress = model
            .apply(&snapshot(json!({
                "performance": {},
                "crashes": [],
                "coverage": {"visited": {"blocks": [0, 1], "branches": [0, 0], "timestamps": [0, 1]}},
                "done": true
            })))
            .unwrap();
        assert_eq!(progress, Progress::Complete);
        assert!(model.is_complete());
        assert_eq!(model.coverage().len(), 2, "final snapshot is still merged");
        assert_eq!(model.view().calls.last().unwrap(), "complete");
    }

    #[test]
    fn inconsistent_coverage_is_rejected_untouched() {
        let mut model = StatisticsModel::new(Recorder::default());
        let bad = snapshot(json!({
            "performance": {"pin": {"total": 1.0, "average": 1.0}},
            "crashes": [{"signal": 11}],
            "coverage": {"visited": {"blocks": [0, 1, 2], "branches": [0], "timestamps": [0, 1, 2]}}
        }));
        let err = model.apply(&bad).unwrap_err();
        assert!(matches!(err, MonitorError::Parse(_)));
        assert!(model.entries().is_empty());
        assert_eq!(model.crashes().total(), 0);
        assert_eq!(model.coverage().len(), 1);
    }

    #[test]
    fn found_totals_and_time_are_kept() {
        let mut model = StatisticsModel::new(crate::render::NullView);
        model
            .apply(&snapshot(json!({
                "performance": {},
                "crashes": [],
                "coverage": {
                    "visited": {"blocks": [0], "branches": [0], "timestamps": [0]},
                    "found": {"blocks": 40, "branches": 12}
                },
                "time": 12.5
            })))
            .unwrap();
        assert_eq!(model.found(), Some((40, 12)));
        assert_eq!(model.job_time(), Some(12.5));
    }
}
