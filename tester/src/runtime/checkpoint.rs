//! Checkpoint Client
//!
//! Tasks that need to pause mid-run expose a tiny HTTP server: `GET /`
//! answers with the key of the checkpoint they have reached and
//! `GET /shutdown` lets them continue.

use crate::error::{HarnessError, HarnessResult};
use crate::poll::PollCondition;
use std::time::Duration;
use tracing::info;

/// HTTP client for a task's checkpoint server
#[derive(Clone)]
pub struct CheckpointClient {
    base_url: String,
    client: reqwest::Client,
    interval: Duration,
}

impl CheckpointClient {
    /// Create a new client for `addr` (`host:port` or full URL)
    pub fn new(addr: &str) -> HarnessResult<Self> {
        let base_url = if addr.starts_with("http") {
            addr.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", addr)
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            base_url,
            client,
            interval: Duration::from_millis(100),
        })
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current checkpoint key, if the server answers 200
    pub async fn current(&self) -> HarnessResult<Option<String>> {
        let response = self.client.get(format!("{}/", self.base_url)).send().await?;
        if !response.status().is_success() {
            return Ok(None);
        }
        Ok(Some(response.text().await?))
    }

    /// Wait until the checkpoint server reports `key`
    ///
    /// Connection errors mean the task has not started its server yet and
    /// are retried.
    pub async fn wait(&self, key: &str, timeout: Duration) -> HarnessResult<Duration> {
        let condition = PollCondition::new(
            format!("checkpoint '{key}' at {}", self.base_url),
            timeout,
            self.interval.min(timeout),
        )?;
        let elapsed = condition
            .wait(|| {
                let client = self.clone();
                let key = key.to_string();
                async move { client.current().await.map(|current| current.as_deref() == Some(key.as_str())) }
            })
            .await?;
        info!("📍 Reached checkpoint '{}' after {:?}", key, elapsed);
        Ok(elapsed)
    }

    /// Release the paused task
    ///
    /// The server may close the connection as it shuts down, so a
    /// connection-level error after the request went out is not a failure.
    pub async fn resume(&self) -> HarnessResult<()> {
        info!("▶️ Resuming task via {}/shutdown", self.base_url);
        match self.client.get(format!("{}/shutdown", self.base_url)).send().await {
            Ok(_) => Ok(()),
            Err(e) if e.is_connect() => Err(HarnessError::Http(e)),
            Err(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalization() {
        assert_eq!(CheckpointClient::new("127.0.0.1:5000").unwrap().base_url(), "http://127.0.0.1:5000");
        assert_eq!(CheckpointClient::new("http://localhost:5000/").unwrap().base_url(), "http://localhost:5000");
    }
}
