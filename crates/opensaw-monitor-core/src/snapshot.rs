//! Wire types for the two JSON endpoints.
//!
//! A snapshot is the *full* current state of one endpoint at the moment it was
//! served. Fields the merge models depend on are required, so a payload that
//! lacks them fails to deserialize and the cycle is rejected before anything
//! is applied. Everything else the job publishes is optional.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{MonitorError, Result};

// ---------------------------------------------------------------------------
// /api/statistics.json
// ---------------------------------------------------------------------------

/// Aggregate job statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub performance: PerformanceTable,
    pub crashes: Vec<CrashRecord>,
    pub coverage: CoverageReport,
    /// Set once the job has finished; no further snapshot will differ.
    #[serde(default)]
    pub done: bool,
    /// Seconds since the job started, as reported by the job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
}

/// Timing for one external tool the job drives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaskPerformance {
    pub total: f64,
    pub average: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurements: Option<u64>,
}

/// Task-name → timing map that keeps the order the server wrote it in.
///
/// Palette colors are handed out in first-seen order, so document order is
/// part of the data here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceTable(Vec<(String, TaskPerformance)>);

impl PerformanceTable {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TaskPerformance)> {
        self.0.iter().map(|(name, perf)| (name.as_str(), perf))
    }

    pub fn get(&self, name: &str) -> Option<&TaskPerformance> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, p)| p)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, TaskPerformance)> for PerformanceTable {
    fn from_iter<I: IntoIterator<Item = (String, TaskPerformance)>>(iter: I) -> Self {
        let mut table = Self::default();
        for (name, perf) in iter {
            table.insert(name, perf);
        }
        table
    }
}

impl PerformanceTable {
    // Later duplicates overwrite in place, the way a JSON object would.
    fn insert(&mut self, name: String, perf: TaskPerformance) {
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = perf,
            None => self.0.push((name, perf)),
        }
    }
}

impl Serialize for PerformanceTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, perf) in &self.0 {
            map.serialize_entry(name, perf)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PerformanceTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = PerformanceTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of task name to performance figures")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut table = PerformanceTable::default();
                while let Some((name, perf)) = access.next_entry::<String, TaskPerformance>()? {
                    table.insert(name, perf);
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

/// One crashing input found by the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashRecord {
    /// POSIX signal number the target died with (1-based).
    pub signal: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub visited: VisitedSeries,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub found: Option<FoundTotals>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<f64>,
}

/// Parallel arrays: index `i` is one coverage measurement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisitedSeries {
    pub blocks: Vec<u64>,
    pub branches: Vec<u64>,
    pub timestamps: Vec<f64>,
}

impl VisitedSeries {
    /// Number of measurements, as defined by the block array.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Every block measurement needs a branch count and a timestamp.
    pub fn validate(&self) -> Result<()> {
        let n = self.blocks.len();
        if self.branches.len() < n || self.timestamps.len() < n {
            return Err(MonitorError::Parse(format!(
                "coverage.visited arrays disagree: {} blocks, {} branches, {} timestamps",
                n,
                self.branches.len(),
                self.timestamps.len()
            )));
        }
        Ok(())
    }
}

/// Totals discovered so far (the coverage denominators).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundTotals {
    pub blocks: u64,
    pub branches: u64,
}

// ---------------------------------------------------------------------------
// /api/tracegraph.json
// ---------------------------------------------------------------------------

/// The execution trace graph as the job currently knows it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceGraphSnapshot {
    pub nodes: Vec<TraceNode>,
    pub links: Vec<TraceLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceNode {
    pub id: String,
    pub group: i64,
    /// Instruction count of the block, when the job reports it.
    #[serde(rename = "ins", default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceLink {
    pub source: String,
    pub target: String,
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn performance_keeps_document_order() {
        // Raw text: `json!` would hand the keys over sorted.
        let snap: StatisticsSnapshot = serde_json::from_str(
            r#"{
                "performance": {
                    "solver": {"total": 1.0, "average": 0.5},
                    "pin": {"total": 2.0, "average": 1.0, "measurements": 2},
                    "il_tool": {"total": 3.0, "average": 3.0}
                },
                "crashes": [],
                "coverage": {"visited": {"blocks": [], "branches": [], "timestamps": []}},
                "done": false
            }"#,
        )
        .unwrap();

        let names: Vec<&str> = snap.performance.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["solver", "pin", "il_tool"]);
        assert_eq!(snap.performance.get("pin").unwrap().measurements, Some(2));
    }

    #[test]
    fn missing_coverage_is_rejected() {
        let err = serde_json::from_value::<StatisticsSnapshot>(json!({
            "performance": {},
            "crashes": [],
            "done": false
        }))
        .unwrap_err();
        assert!(err.to_string().contains("coverage"));
    }

    #[test]
    fn missing_visited_is_rejected() {
        let res = serde_json::from_value::<StatisticsSnapshot>(json!({
            "performance": {},
            "crashes": [],
            "coverage": {"found": {"blocks": 1, "branches": 2}}
        }));
        assert!(res.is_err());
    }

    #[test]
    fn optional_fields_default() {
        let snap: StatisticsSnapshot = serde_json::from_value(json!({
            "performance": {},
            "crashes": [{"signal": 11}],
            "coverage": {"visited": {"blocks": [0], "branches": [0], "timestamps": [0]}}
        }))
        .unwrap();
        assert!(!snap.done);
        assert_eq!(snap.crashes[0].file, None);
        assert!(snap.crashes[0].trace.is_empty());
        assert_eq!(snap.coverage.found, None);
    }

    #[test]
    fn visited_validate_catches_short_arrays() {
        let series = VisitedSeries {
            blocks: vec![0, 1, 2],
            branches: vec![0, 1],
            timestamps: vec![0.0, 1.0, 2.0],
        };
        assert!(matches!(series.validate(), Err(MonitorError::Parse(_))));

        let ok = VisitedSeries {
            blocks: vec![0, 1],
            branches: vec![0, 1],
            timestamps: vec![0.0, 1.0],
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn trace_node_reads_instruction_count() {
        let snap: TraceGraphSnapshot = serde_json::from_value(json!({
            "nodes": [{"id": "100000000_0", "group": 0, "ins": 12}, {"id": "a", "group": 3}],
            "links": [{"source": "100000000_0", "target": "a", "value": 4}]
        }))
        .unwrap();
        assert_eq!(snap.nodes[0].instructions, Some(12));
        assert_eq!(snap.nodes[1].instructions, None);
        assert_eq!(snap.links[0].value, 4.0);
    }

    #[test]
    fn performance_table_serializes_as_object() {
        let table: PerformanceTable = [(
            "pin".to_string(),
            TaskPerformance {
                total: 1.5,
                average: 0.75,
                measurements: None,
            },
        )]
        .into_iter()
        .collect();
        let value = serde_json::to_value(&table).unwrap();
        assert_eq!(value, json!({"pin": {"total": 1.5, "average": 0.75}}));
    }
}
