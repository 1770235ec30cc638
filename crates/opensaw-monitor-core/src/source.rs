//! HTTP snapshot source.

use std::future::Future;

use crate::error::Result;
use crate::poller::SnapshotSource;

/// GETs one JSON endpoint. No timeout: a hung request stalls only the poller
/// that issued it, and that poller can still be paused.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl SnapshotSource for HttpSource {
    fn fetch(&mut self) -> impl Future<Output = Result<Vec<u8>>> + Send {
        let request = self.client.get(&self.url);
        async move {
            let response = request.send().await?.error_for_status()?;
            let body = response.bytes().await?;
            Ok(body.to_vec())
        }
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
