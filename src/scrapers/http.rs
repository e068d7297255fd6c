use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::ScrapeError;

/// Lazily created HTTP client owned by one source.
///
/// `close()` drops the client; the next request builds a fresh one.
pub struct HttpSession {
    client: Mutex<Option<Client>>,
    user_agent: String,
    timeout: Duration,
}

impl HttpSession {
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> Self {
        HttpSession {
            client: Mutex::new(None),
            user_agent: user_agent.into(),
            timeout,
        }
    }

    async fn client(&self) -> Result<Client, ScrapeError> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }
        let client = Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.timeout)
            .build()?;
        *guard = Some(client.clone());
        Ok(client)
    }

    pub async fn get_text(&self, url: &str) -> Result<String, ScrapeError> {
        debug!("GET {}", url);
        let resp = self.client().await?.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp.text().await?)
    }

    pub async fn get_json(&self, url: &str) -> Result<Value, ScrapeError> {
        let body = self.get_text(url).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// HEAD `url` with a short timeout. Any 2xx/3xx is reachable; every
    /// error collapses to `false`.
    pub async fn probe(&self, url: &str, timeout: Duration) -> bool {
        let client = match self.client().await {
            Ok(client) => client,
            Err(e) => {
                warn!("Could not build HTTP client to probe {}: {}", url, e);
                return false;
            }
        };
        match client.head(url).timeout(timeout).send().await {
            Ok(resp) => {
                let reachable = resp.status().as_u16() < 400;
                if !reachable {
                    warn!("{} answered availability probe with {}", url, resp.status());
                }
                reachable
            }
            Err(e) if e.is_timeout() => {
                warn!("Timeout checking availability for {}", url);
                false
            }
            Err(e) => {
                warn!("Availability check for {} failed: {}", url, e);
                false
            }
        }
    }

    #[cfg(test)]
    pub async fn is_open(&self) -> bool {
        self.client.lock().await.is_some()
    }

    pub async fn close(&self) {
        if self.client.lock().await.take().is_some() {
            debug!("HTTP session closed");
        }
    }
}
