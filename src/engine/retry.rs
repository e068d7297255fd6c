use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::ScrapingConfig;
use crate::models::ScrapeOutcome;
use crate::scrapers::{MatchCallback, MatchScraper};

/// Exponential backoff around `attempt_scrape`.
///
/// Makes `max_retries + 1` attempts, sleeping `base_delay * 2^i` after the
/// i-th failed one (0-based). Never sleeps after the last attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        RetryPolicy {
            max_retries,
            base_delay,
        }
    }

    pub fn from_config(config: &ScrapingConfig) -> Self {
        RetryPolicy::new(config.max_retries, config.base_delay())
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Run attempts until one succeeds. Failures of every attempt are folded
    /// into the returned outcome rather than surfaced as errors.
    pub async fn run(
        &self,
        scraper: &dyn MatchScraper,
        on_match_found: Option<&MatchCallback>,
    ) -> ScrapeOutcome {
        let name = scraper.name();
        let total = self.max_retries + 1;
        let mut errors = Vec::new();

        for attempt in 0..total {
            debug!("Attempt {}/{} to scrape {}", attempt + 1, total, name);

            let error = match scraper.attempt_scrape(on_match_found).await {
                Ok(outcome) if outcome.success => {
                    if attempt > 0 {
                        info!("{} succeeded on attempt {}/{}", name, attempt + 1, total);
                    }
                    return outcome.with_metadata("attempts", attempt + 1);
                }
                Ok(outcome) => outcome
                    .error
                    .unwrap_or_else(|| "unsuccessful outcome without error".to_string()),
                Err(e) => e.to_string(),
            };
            warn!(
                "Scraping {} failed on attempt {}/{}: {}",
                name,
                attempt + 1,
                total,
                error
            );
            errors.push(format!("attempt {}: {}", attempt + 1, error));

            if attempt + 1 < total {
                let delay = self.backoff(attempt);
                info!("Retrying {} in {:?}", name, delay);
                tokio::time::sleep(delay).await;
            }
        }

        let message = format!(
            "All {} attempts to scrape {} failed: {}",
            total,
            name,
            errors.join("; ")
        );
        error!("{}", message);
        ScrapeOutcome::failure(name, message).with_metadata("attempts", total)
    }
}
