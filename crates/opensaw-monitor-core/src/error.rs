//! Error taxonomy shared by both pollers.
//!
//! Every variant halts the poller that produced it. The variants exist so logs
//! and the dashboard can say *where* a cycle broke, not to drive different
//! recovery paths.

/// Why a poll cycle failed.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The snapshot could not be fetched: connection refused, reset, or a
    /// non-success HTTP status.
    #[error("transport error fetching {url}: {reason}")]
    Transport { url: String, reason: String },

    /// The payload was not valid JSON, or a required field was missing or
    /// internally inconsistent.
    #[error("malformed snapshot: {0}")]
    Parse(String),

    /// The snapshot references something it never declared.
    #[error("inconsistent snapshot: {0}")]
    Consistency(String),
}

impl MonitorError {
    /// Short category name used in log lines and the dashboard status bar.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Parse(_) => "parse",
            Self::Consistency(_) => "consistency",
        }
    }

    pub(crate) fn transport(url: &str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();
        Self::transport(&url, err.without_url())
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
