pub mod flashscore;
pub mod http;
#[cfg(test)]
pub mod mock;
pub mod sofascore;

pub use flashscore::Flashscore;
pub use sofascore::Sofascore;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ScrapingConfig;
use crate::error::{EngineError, ScrapeError};
use crate::models::{Match, ScrapeOutcome};

/// Called once per discovered match, before the attempt returns.
pub type MatchCallback = dyn Fn(&Match) + Send + Sync;

/// Sources the registry knows how to build, in registration order.
pub const KNOWN_SOURCES: [&str; 2] = ["flashscore", "sofascore"];

/// Trait that every match source must implement.
#[async_trait]
pub trait MatchScraper: Send + Sync {
    /// Stable source name, also stamped on every match it produces.
    fn name(&self) -> &str;

    /// Cheap reachability probe. Never fails; errors mean `false`.
    async fn is_available(&self) -> bool;

    /// One scrape attempt. `Err` is a recoverable failure the retry policy
    /// will retry, the same as an unsuccessful outcome.
    async fn attempt_scrape(
        &self,
        on_match_found: Option<&MatchCallback>,
    ) -> Result<ScrapeOutcome, ScrapeError>;

    /// Release held connections. Safe to call more than once.
    async fn cleanup(&self);
}

/// Instantiate every enabled source. Disabled or absent sources are skipped.
pub fn build_registry(config: &ScrapingConfig) -> Result<Vec<Arc<dyn MatchScraper>>, EngineError> {
    for (name, enabled) in &config.sources_enabled {
        if *enabled && !KNOWN_SOURCES.contains(&name.as_str()) {
            warn!("Unknown source '{}' enabled in configuration, ignoring", name);
        }
    }

    let mut scrapers: Vec<Arc<dyn MatchScraper>> = Vec::new();
    for name in KNOWN_SOURCES {
        if !config.is_enabled(name) {
            continue;
        }
        let scraper: Arc<dyn MatchScraper> = match name {
            "flashscore" => Arc::new(Flashscore::new(config)?),
            _ => Arc::new(Sofascore::new(config)),
        };
        info!("Registered source '{}'", scraper.name());
        scrapers.push(scraper);
    }
    Ok(scrapers)
}

/// Group/category predicate: every keyword must occur in the title.
pub(crate) fn category_matches(title: &str, keywords: &[String]) -> bool {
    let title = title.to_lowercase();
    keywords
        .iter()
        .map(|kw| kw.trim().to_lowercase())
        .filter(|kw| !kw.is_empty())
        .all(|kw| title.contains(&kw))
}
