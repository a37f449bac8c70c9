//! Image reachability probe

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Probe could not produce an HTTP status
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("Probe transport error: {0}")]
    Transport(String),
}

/// Checks whether an image URL is served
#[async_trait]
pub trait ImageProbe: Send + Sync {
    /// `Ok(true)` for a success status, `Ok(false)` for any other status
    async fn is_reachable(&self, url: &str) -> Result<bool, ProbeError>;
}

/// HEAD request probe over reqwest
#[derive(Clone)]
pub struct HttpImageProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpImageProbe {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("resale-tm/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProbeError::Transport(e.to_string()))?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl ImageProbe for HttpImageProbe {
    async fn is_reachable(&self, url: &str) -> Result<bool, ProbeError> {
        match self.client.head(url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) if e.is_timeout() => Err(ProbeError::Timeout(self.timeout)),
            Err(e) => Err(ProbeError::Transport(e.to_string())),
        }
    }
}
