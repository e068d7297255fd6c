pub mod events;
pub mod filters;
pub mod monitor;
pub mod retry;

pub use events::{Event, EventBus, CHANNELS};
pub use filters::{ActiveOnly, MatchFilter, TieBreakOnly, TournamentContains};
pub use monitor::run_monitor;
pub use retry::RetryPolicy;

use futures_util::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::ScrapingConfig;
use crate::error::EngineError;
use crate::models::{Match, MatchKey, ScrapeOutcome};
use crate::scrapers::{build_registry, MatchCallback, MatchScraper};

/// Fans a cycle out to every registered source and folds the results.
///
/// Sources are probed one by one, then every available source is scraped
/// concurrently under the retry policy. Outcomes are consolidated in
/// registration order; within a cycle the first match seen for a
/// [`MatchKey`] wins.
pub struct ScrapingEngine {
    config: ScrapingConfig,
    scrapers: Vec<Arc<dyn MatchScraper>>,
    filters: Vec<Box<dyn MatchFilter>>,
    retry: RetryPolicy,
    events: EventBus,
    running: AtomicBool,
}

/// Clears the running flag when a cycle ends, however it ends.
struct CycleGuard<'a>(&'a AtomicBool);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ScrapingEngine {
    /// Build an engine from a nested settings mapping.
    pub fn new(settings: &Value) -> Result<Self, EngineError> {
        let config = ScrapingConfig::from_mapping(settings)?;
        let scrapers = build_registry(&config)?;
        Ok(ScrapingEngine::with_scrapers(config, scrapers))
    }

    pub fn with_scrapers(config: ScrapingConfig, scrapers: Vec<Arc<dyn MatchScraper>>) -> Self {
        ScrapingEngine {
            retry: RetryPolicy::from_config(&config),
            config,
            scrapers,
            filters: Vec::new(),
            events: EventBus::new(),
            running: AtomicBool::new(false),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn config(&self) -> &ScrapingConfig {
        &self.config
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.scrapers.iter().map(|s| s.name()).collect()
    }

    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// One fan-out/fan-in pass over every registered source.
    pub async fn run_cycle(&self) -> Result<Vec<Match>, EngineError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(EngineError::CycleInProgress);
        }
        let _guard = CycleGuard(&self.running);

        let started = Instant::now();
        self.events.emit(Event::ScrapingStarted);
        info!("Scraping cycle started ({} sources)", self.scrapers.len());

        let mut available = Vec::new();
        for scraper in &self.scrapers {
            if scraper.is_available().await {
                available.push(Arc::clone(scraper));
            } else {
                warn!("Source '{}' is unavailable, skipping", scraper.name());
                self.events.emit(Event::ScraperUnavailable {
                    source: scraper.name().to_string(),
                });
            }
        }

        let tasks = available
            .into_iter()
            .map(|scraper| self.scrape_source(scraper));
        let results = futures_util::future::join_all(tasks).await;

        let mut seen: HashSet<MatchKey> = HashSet::new();
        let mut consolidated = Vec::new();
        for (source, result) in results {
            match result {
                Err(panic) => {
                    let message = format!("{}: {}", source, panic_message(panic.as_ref()));
                    error!("Scraping task crashed: {}", message);
                    self.events.emit(Event::ScrapingError { message });
                }
                Ok(outcome) if !outcome.success => {
                    let message = outcome.error.unwrap_or_default();
                    error!("Source '{}' failed: {}", source, message);
                    self.events.emit(Event::ScraperError { source, message });
                }
                Ok(outcome) => {
                    let count = outcome.matches.len();
                    let duration = outcome.duration.unwrap_or_default();
                    info!("Source '{}' returned {} matches in {:?}", source, count, duration);
                    self.events.emit(Event::ScraperCompleted {
                        source: source.clone(),
                        count,
                        duration,
                    });
                    for game in outcome.matches {
                        if seen.insert(game.key()) {
                            consolidated.push(game);
                        } else {
                            debug!("Dropping duplicate {} from {}", game.title(), source);
                        }
                    }
                }
            }
        }

        let duration = started.elapsed();
        info!(
            "Scraping cycle finished: {} unique matches in {:?}",
            consolidated.len(),
            duration
        );
        self.events.emit(Event::ScrapingCompletedAll {
            total_count: consolidated.len(),
            duration,
        });
        Ok(consolidated)
    }

    /// Scrape one source under the retry policy, containing panics.
    async fn scrape_source(
        &self,
        scraper: Arc<dyn MatchScraper>,
    ) -> (String, Result<ScrapeOutcome, Box<dyn Any + Send>>) {
        let source = scraper.name().to_string();
        self.events.emit(Event::ScraperStarted {
            source: source.clone(),
        });

        let events = self.events.clone();
        let callback: Box<MatchCallback> = Box::new(move |game: &Match| {
            events.emit(Event::IndividualMatchFound {
                game: Box::new(game.clone()),
            });
        });

        let started = Instant::now();
        let result = AssertUnwindSafe(self.retry.run(scraper.as_ref(), Some(callback.as_ref())))
            .catch_unwind()
            .await
            .map(|mut outcome| {
                outcome.backfill_duration(started.elapsed());
                outcome
            });
        (source, result)
    }

    /// Run a cycle, then pass the result through every filter in order.
    ///
    /// A filter that fails or panics is skipped; the list it was given is
    /// handed to the next filter unchanged.
    pub async fn get_filtered_matches(&self) -> Result<Vec<Match>, EngineError> {
        let mut matches = self.run_cycle().await?;

        info!(
            "Applying {} filters to {} matches",
            self.filters.len(),
            matches.len()
        );
        self.events.emit(Event::FiltersApplying {
            count: matches.len(),
            filter_count: self.filters.len(),
        });

        for filter in &self.filters {
            let name = filter.name().to_string();
            match catch_unwind(AssertUnwindSafe(|| filter.apply(&matches))) {
                Ok(Ok(kept)) => {
                    matches = kept;
                    debug!("Filter '{}' left {} matches", name, matches.len());
                    self.events.emit(Event::FilterApplied {
                        name,
                        remaining_count: matches.len(),
                    });
                }
                Ok(Err(e)) => {
                    error!("Error applying filter '{}': {}", name, e);
                    self.events.emit(Event::FilterError {
                        name,
                        message: e.to_string(),
                    });
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!("Filter '{}' panicked: {}", name, message);
                    self.events.emit(Event::FilterError { name, message });
                }
            }
        }

        self.events.emit(Event::FiltersCompleted {
            count: matches.len(),
        });
        Ok(matches)
    }

    /// Register a filter. Returns `false` if one with the same name exists.
    pub fn add_filter<F: MatchFilter + 'static>(&mut self, filter: F) -> bool {
        let name = filter.name().to_string();
        if self.filters.iter().any(|f| f.name() == name) {
            warn!("Filter '{}' already registered", name);
            return false;
        }
        self.filters.push(Box::new(filter));
        info!("Added filter: {}", name);
        self.events.emit(Event::FilterAdded { name });
        true
    }

    pub fn remove_filter(&mut self, name: &str) -> bool {
        let before = self.filters.len();
        self.filters.retain(|f| f.name() != name);
        if self.filters.len() < before {
            info!("Removed filter: {}", name);
            self.events.emit(Event::FilterRemoved {
                name: name.to_string(),
            });
            true
        } else {
            warn!("Filter not found for removal: {}", name);
            false
        }
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
        info!("All filters cleared");
        self.events.emit(Event::FiltersCleared);
    }

    /// Release every source's resources; one failing source does not stop the rest.
    pub async fn cleanup(&self) {
        for scraper in &self.scrapers {
            let result = AssertUnwindSafe(scraper.cleanup()).catch_unwind().await;
            if let Err(panic) = result {
                error!(
                    "Cleanup of '{}' failed: {}",
                    scraper.name(),
                    panic_message(panic.as_ref())
                );
            }
        }
        info!("Engine cleanup finished");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FilterError;
    use crate::models::{MatchStatus, Player, TIE_BREAK_FLAG};
    use crate::scrapers::mock::{sample_match, ScriptedScraper, Step};
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;
    use std::time::Duration;

    fn config(settings: Value) -> ScrapingConfig {
        ScrapingConfig::from_mapping(&settings).unwrap()
    }

    fn engine(settings: Value, scrapers: Vec<Arc<dyn MatchScraper>>) -> ScrapingEngine {
        ScrapingEngine::with_scrapers(config(settings), scrapers)
    }

    /// Capture every emitted event, in emission order.
    fn record(bus: &EventBus) -> Arc<Mutex<Vec<Event>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        for channel in CHANNELS {
            let log = log.clone();
            bus.on(channel, move |event| {
                log.lock().unwrap().push(event.clone());
                Ok(())
            });
        }
        log
    }

    fn count(log: &Arc<Mutex<Vec<Event>>>, channel: &str) -> usize {
        log.lock()
            .unwrap()
            .iter()
            .filter(|e| e.channel() == channel)
            .count()
    }

    fn ids(matches: &[Match]) -> Vec<&str> {
        matches.iter().filter_map(|m| m.match_id.as_deref()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_elapsed_includes_backoff() {
        let scraper = Arc::new(ScriptedScraper::new(
            "flaky",
            vec![
                Step::Error("connection reset".into()),
                Step::Error("timeout".into()),
                Step::Matches(vec![
                    sample_match("flaky", "1", MatchStatus::Live),
                    sample_match("flaky", "2", MatchStatus::Live),
                ]),
            ],
        ));
        let engine = engine(
            json!({"max_retries": 3, "delay_between_requests_secs": 1.0}),
            vec![scraper.clone()],
        );
        let durations = Arc::new(Mutex::new(Vec::new()));
        let d = durations.clone();
        engine.events().on("scraper_completed", move |event| {
            if let Event::ScraperCompleted { duration, .. } = event {
                d.lock().unwrap().push(*duration);
            }
            Ok(())
        });

        let matches = engine.run_cycle().await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(scraper.attempts.load(Ordering::SeqCst), 3);

        let durations = durations.lock().unwrap();
        assert_eq!(durations.len(), 1);
        assert!(durations[0] >= Duration::from_secs(3), "{:?}", durations[0]);
        assert!(durations[0] < Duration::from_millis(3500), "{:?}", durations[0]);
    }

    #[tokio::test]
    async fn test_source_failures_are_isolated() {
        let engine = engine(
            json!({"max_retries": 0}),
            vec![
                Arc::new(ScriptedScraper::new("crashing", vec![Step::Panic("parser bug".into())])),
                Arc::new(ScriptedScraper::new("failing", vec![Step::Fail("blocked".into())])),
                Arc::new(ScriptedScraper::new(
                    "healthy",
                    vec![Step::Matches(vec![
                        sample_match("healthy", "1", MatchStatus::Live),
                        sample_match("healthy", "2", MatchStatus::Finished),
                    ])],
                )),
            ],
        );
        let log = record(engine.events());

        let matches = engine.run_cycle().await.unwrap();
        assert_eq!(ids(&matches), vec!["1", "2"]);
        assert!(matches.iter().all(|m| m.source == "healthy"));
        assert_eq!(count(&log, "scraping_error"), 1);
        assert_eq!(count(&log, "scraper_error"), 1);
        assert_eq!(count(&log, "scraper_completed"), 1);
        assert_eq!(count(&log, "scraper_started"), 3);

        let log = log.lock().unwrap();
        assert!(log.iter().any(|e| matches!(
            e,
            Event::ScrapingError { message } if message.contains("crashing") && message.contains("parser bug")
        )));
        assert!(log.iter().any(|e| matches!(
            e,
            Event::ScraperError { source, message } if source == "failing" && message.contains("blocked")
        )));
        assert!(matches!(log.first(), Some(Event::ScrapingStarted)));
        assert!(matches!(
            log.last(),
            Some(Event::ScrapingCompletedAll { total_count: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_keys_keep_first() {
        let first = sample_match("src", "1", MatchStatus::Live);
        let mut duplicate = sample_match("src", "1", MatchStatus::Finished);
        duplicate.home_player = Player::new("Someone Else").unwrap();
        let engine = engine(
            json!({}),
            vec![
                Arc::new(ScriptedScraper::new(
                    "src",
                    vec![Step::Matches(vec![
                        first,
                        duplicate,
                        sample_match("src", "2", MatchStatus::Live),
                    ])],
                )),
                Arc::new(ScriptedScraper::new(
                    "other",
                    vec![Step::Matches(vec![sample_match("other", "1", MatchStatus::Live)])],
                )),
            ],
        );

        let matches = engine.run_cycle().await.unwrap();
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].home_player.name, "Home 1");
        assert_eq!(matches[0].status, MatchStatus::Live);
        assert_eq!(matches[2].source, "other");
    }

    #[tokio::test]
    async fn test_unavailable_source_end_to_end() {
        let mut batch = vec![
            sample_match("sofascore", "1", MatchStatus::Live),
            sample_match("sofascore", "2", MatchStatus::Live),
        ];
        batch.extend((3..=5).map(|i| sample_match("sofascore", &i.to_string(), MatchStatus::Finished)));

        let down = Arc::new(ScriptedScraper::unavailable("flashscore"));
        let engine = engine(
            json!({}),
            vec![
                down.clone(),
                Arc::new(ScriptedScraper::new("sofascore", vec![Step::Matches(batch)])),
            ],
        );
        let log = record(engine.events());

        let matches = engine.get_filtered_matches().await.unwrap();
        assert_eq!(matches.len(), 5);
        assert_eq!(matches.iter().filter(|m| m.is_live()).count(), 2);
        assert_eq!(down.attempts.load(Ordering::SeqCst), 0);
        assert_eq!(count(&log, "scraper_unavailable"), 1);
        assert_eq!(count(&log, "scraper_error"), 0);

        let log = log.lock().unwrap();
        assert!(log.iter().any(|e| matches!(
            e,
            Event::FiltersApplying { count: 5, filter_count: 0 }
        )));
        assert!(matches!(log.last(), Some(Event::FiltersCompleted { count: 5 })));
    }

    #[tokio::test]
    async fn test_match_events_precede_completion() {
        let engine = engine(
            json!({}),
            vec![Arc::new(ScriptedScraper::new(
                "src",
                vec![Step::Matches(vec![
                    sample_match("src", "a", MatchStatus::Live),
                    sample_match("src", "b", MatchStatus::Live),
                ])],
            ))],
        );
        let log = record(engine.events());
        engine.run_cycle().await.unwrap();

        let channels: Vec<&str> = log.lock().unwrap().iter().map(Event::channel).collect();
        assert_eq!(
            channels,
            vec![
                "scraping_started",
                "scraper_started",
                "individual_match_found",
                "individual_match_found",
                "scraper_completed",
                "scraping_completed_all",
            ]
        );
        let found: Vec<String> = log
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                Event::IndividualMatchFound { game } => game.match_id.clone(),
                _ => None,
            })
            .collect();
        assert_eq!(found, vec!["a", "b"]);
    }

    struct Broken;

    impl MatchFilter for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn apply(&self, _: &[Match]) -> Result<Vec<Match>, FilterError> {
            Err(FilterError {
                filter: "broken".into(),
                reason: "bad predicate".into(),
            })
        }
    }

    struct Exploding;

    impl MatchFilter for Exploding {
        fn name(&self) -> &str {
            "exploding"
        }

        fn apply(&self, _: &[Match]) -> Result<Vec<Match>, FilterError> {
            panic!("filter bug")
        }
    }

    #[tokio::test]
    async fn test_broken_filters_degrade_to_noop() {
        let mut tie_break = sample_match("src", "1", MatchStatus::Live);
        tie_break.metadata.insert(TIE_BREAK_FLAG.into(), Value::Bool(true));
        let mut engine = engine(
            json!({}),
            vec![Arc::new(ScriptedScraper::new(
                "src",
                vec![Step::Matches(vec![
                    tie_break,
                    sample_match("src", "2", MatchStatus::Live),
                    sample_match("src", "3", MatchStatus::Finished),
                ])],
            ))],
        );
        assert!(engine.add_filter(ActiveOnly));
        assert!(engine.add_filter(Broken));
        assert!(engine.add_filter(Exploding));
        assert!(engine.add_filter(TieBreakOnly));
        let log = record(engine.events());

        let matches = engine.get_filtered_matches().await.unwrap();
        assert_eq!(ids(&matches), vec!["1"]);
        assert_eq!(count(&log, "filter_applied"), 2);
        assert_eq!(count(&log, "filter_error"), 2);

        let log = log.lock().unwrap();
        let applied: Vec<(String, usize)> = log
            .iter()
            .filter_map(|e| match e {
                Event::FilterApplied { name, remaining_count } => Some((name.clone(), *remaining_count)),
                _ => None,
            })
            .collect();
        assert_eq!(
            applied,
            vec![("active_only".to_string(), 2), ("tie_break_only".to_string(), 1)]
        );
        assert!(log.iter().any(|e| matches!(
            e,
            Event::FilterError { name, message } if name == "exploding" && message == "filter bug"
        )));
    }

    #[test]
    fn test_filter_registration() {
        let mut engine = engine(json!({}), vec![]);
        let log = record(engine.events());

        assert!(engine.add_filter(ActiveOnly));
        assert!(!engine.add_filter(ActiveOnly));
        assert!(engine.add_filter(TournamentContains::new("itf").unwrap()));
        assert_eq!(engine.filter_names(), vec!["active_only", "tournament_contains:itf"]);

        assert!(engine.remove_filter("active_only"));
        assert!(!engine.remove_filter("active_only"));
        engine.clear_filters();
        assert!(engine.filter_names().is_empty());

        let channels: Vec<&str> = log.lock().unwrap().iter().map(Event::channel).collect();
        assert_eq!(
            channels,
            vec!["filter_added", "filter_added", "filter_removed", "filters_cleared"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_cycle_is_rejected() {
        let engine = engine(
            json!({}),
            vec![Arc::new(ScriptedScraper::new(
                "slow",
                vec![
                    Step::Slow(Duration::from_secs(5), vec![]),
                    Step::Matches(vec![]),
                ],
            ))],
        );

        let (first, second) = tokio::join!(engine.run_cycle(), async {
            tokio::task::yield_now().await;
            engine.run_cycle().await
        });
        assert!(first.is_ok());
        assert!(matches!(second, Err(EngineError::CycleInProgress)));
        assert!(engine.run_cycle().await.is_ok());
    }

    #[tokio::test]
    async fn test_cleanup_reaches_every_source() {
        let broken = Arc::new(ScriptedScraper::new("broken", vec![]).panicking_cleanup());
        let fine = Arc::new(ScriptedScraper::new("fine", vec![]));
        let engine = engine(json!({}), vec![broken.clone(), fine.clone()]);

        engine.cleanup().await;
        engine.cleanup().await;
        assert_eq!(broken.cleanups.load(Ordering::SeqCst), 2);
        assert_eq!(fine.cleanups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_engine_from_settings() {
        let engine = ScrapingEngine::new(&json!({
            "scraping": {"sources_enabled": {"flashscore": false}}
        }))
        .unwrap();
        assert!(engine.source_names().is_empty());

        let log = record(engine.events());
        assert!(engine.get_filtered_matches().await.unwrap().is_empty());
        assert!(log.lock().unwrap().iter().any(|e| matches!(
            e,
            Event::ScrapingCompletedAll { total_count: 0, .. }
        )));

        let engine = ScrapingEngine::new(&json!({
            "sources_enabled": {"flashscore": true, "sofascore": true}
        }))
        .unwrap();
        assert_eq!(engine.source_names(), vec!["flashscore", "sofascore"]);

        assert!(ScrapingEngine::new(&json!({"max_retries": 99})).is_err());
    }
}
