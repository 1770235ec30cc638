//! Rendering capabilities the merge models drive.
//!
//! The models decide *what* changed; implementations of these traits decide
//! how it looks. The dashboard draws them with ratatui, the headless watcher
//! logs them, and tests record the calls.

use crate::statistics::{CoveragePoint, CrashHistogram, PerformanceEntry};
use crate::snapshot::TraceNode;
use crate::tracegraph::ResolvedLink;

/// Charts for the statistics view: performance ring + legends, crash
/// histogram, coverage line chart.
pub trait StatisticsView {
    /// A task was seen for the first time. Create its ring segment, then its
    /// legend. Called exactly once per task name.
    fn add_performance_segment(&mut self, entry: &PerformanceEntry);

    /// New figures for a task that already has a segment.
    fn update_performance(&mut self, entry: &PerformanceEntry);

    /// Every bucket was recomputed from the latest crash list.
    fn set_crash_counts(&mut self, histogram: &CrashHistogram);

    /// The coverage x axis is about to grow to `len` points; existing points
    /// must be re-positioned on the new scale. No data changes.
    fn relayout_coverage(&mut self, len: usize);

    /// Append one point to both coverage series.
    fn add_coverage_point(&mut self, point: &CoveragePoint);

    fn redraw(&mut self);

    /// The job finished. Show the completion indicator.
    fn mark_complete(&mut self);
}

/// A force-directed layout engine. It owns per-node position and velocity;
/// the model owns identity.
pub trait GraphLayout {
    /// The full live node list. It only ever grows and existing indices keep
    /// referring to the same node, so an engine may key its state by index.
    fn set_nodes(&mut self, nodes: &[TraceNode]);

    /// The full edge list; replaces whatever was there before.
    fn set_links(&mut self, links: &[ResolvedLink]);

    /// Re-heat the simulation after a change.
    fn restart(&mut self);
}

impl<T: StatisticsView + ?Sized> StatisticsView for Box<T> {
    fn add_performance_segment(&mut self, entry: &PerformanceEntry) {
        (**self).add_performance_segment(entry)
    }
    fn update_performance(&mut self, entry: &PerformanceEntry) {
        (**self).update_performance(entry)
    }
    fn set_crash_counts(&mut self, histogram: &CrashHistogram) {
        (**self).set_crash_counts(histogram)
    }
    fn relayout_coverage(&mut self, len: usize) {
        (**self).relayout_coverage(len)
    }
    fn add_coverage_point(&mut self, point: &CoveragePoint) {
        (**self).add_coverage_point(point)
    }
    fn redraw(&mut self) {
        (**self).redraw()
    }
    fn mark_complete(&mut self) {
        (**self).mark_complete()
    }
}

impl<T: GraphLayout + ?Sized> GraphLayout for Box<T> {
    fn set_nodes(&mut self, nodes: &[TraceNode]) {
        (**self).set_nodes(nodes)
    }
    fn set_links(&mut self, links: &[ResolvedLink]) {
        (**self).set_links(links)
    }
    fn restart(&mut self) {
        (**self).restart()
    }
}

/// Discards everything. Useful when only the model state matters.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullView;

impl StatisticsView for NullView {
    fn add_performance_segment(&mut self, _: &PerformanceEntry) {}
    fn update_performance(&mut self, _: &PerformanceEntry) {}
    fn set_crash_counts(&mut self, _: &CrashHistogram) {}
    fn relayout_coverage(&mut self, _: usize) {}
    fn add_coverage_point(&mut self, _: &CoveragePoint) {}
    fn redraw(&mut self) {}
    fn mark_complete(&mut self) {}
}

impl GraphLayout for NullView {
    fn set_nodes(&mut self, _: &[TraceNode]) {}
    fn set_links(&mut self, _: &[ResolvedLink]) {}
    fn restart(&mut self) {}
}
