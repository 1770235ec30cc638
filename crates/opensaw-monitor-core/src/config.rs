//! Where to poll and how often.

use std::time::Duration;

use crate::poller::Poller;
use crate::render::{GraphLayout, StatisticsView};
use crate::source::HttpSource;
use crate::statistics::StatisticsModel;
use crate::tracegraph::TraceGraphModel;

/// Base URL of a job running on this machine.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

pub const STATISTICS_PATH: &str = "/api/statistics.json";
pub const TRACEGRAPH_PATH: &str = "/api/tracegraph.json";

pub const STATISTICS_INTERVAL: Duration = Duration::from_millis(3000);
pub const TRACEGRAPH_INTERVAL: Duration = Duration::from_millis(2000);

pub type StatisticsPoller<V> = Poller<HttpSource, StatisticsModel<V>>;
pub type TraceGraphPoller<L> = Poller<HttpSource, TraceGraphModel<L>>;

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub base_url: String,
    pub statistics_interval: Duration,
    pub tracegraph_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            statistics_interval: STATISTICS_INTERVAL,
            tracegraph_interval: TRACEGRAPH_INTERVAL,
        }
    }
}

impl MonitorConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn statistics_url(&self) -> String {
        join_url(&self.base_url, STATISTICS_PATH)
    }

    pub fn tracegraph_url(&self) -> String {
        join_url(&self.base_url, TRACEGRAPH_PATH)
    }

    pub fn statistics_poller<V: StatisticsView>(
        &self,
        client: reqwest::Client,
        view: V,
    ) -> StatisticsPoller<V> {
        Poller::new(
            "statistics",
            HttpSource::new(client, self.statistics_url()),
            StatisticsModel::new(view),
            self.statistics_interval,
        )
    }

    pub fn tracegraph_poller<L: GraphLayout>(
        &self,
        client: reqwest::Client,
        layout: L,
    ) -> TraceGraphPoller<L> {
        Poller::new(
            "tracegraph",
            HttpSource::new(client, self.tracegraph_url()),
            TraceGraphModel::new(layout),
            self.tracegraph_interval,
        )
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}
