use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{error, warn};

use crate::models::Match;

/// Everything the engine reports to its observers.
#[derive(Debug, Clone)]
pub enum Event {
    ScrapingStarted,
    ScraperStarted { source: String },
    ScraperUnavailable { source: String },
    IndividualMatchFound { game: Box<Match> },
    ScraperCompleted { source: String, count: usize, duration: Duration },
    ScraperError { source: String, message: String },
    ScrapingError { message: String },
    ScrapingCompletedAll { total_count: usize, duration: Duration },
    FiltersApplying { count: usize, filter_count: usize },
    FilterApplied { name: String, remaining_count: usize },
    FilterError { name: String, message: String },
    FiltersCompleted { count: usize },
    FilterAdded { name: String },
    FilterRemoved { name: String },
    FiltersCleared,
}

pub const CHANNELS: [&str; 15] = [
    "scraping_started",
    "scraper_started",
    "scraper_unavailable",
    "individual_match_found",
    "scraper_completed",
    "scraper_error",
    "scraping_error",
    "scraping_completed_all",
    "filters_applying",
    "filter_applied",
    "filter_error",
    "filters_completed",
    "filter_added",
    "filter_removed",
    "filters_cleared",
];

impl Event {
    /// Channel name listeners subscribe to.
    pub fn channel(&self) -> &'static str {
        match self {
            Event::ScrapingStarted => "scraping_started",
            Event::ScraperStarted { .. } => "scraper_started",
            Event::ScraperUnavailable { .. } => "scraper_unavailable",
            Event::IndividualMatchFound { .. } => "individual_match_found",
            Event::ScraperCompleted { .. } => "scraper_completed",
            Event::ScraperError { .. } => "scraper_error",
            Event::ScrapingError { .. } => "scraping_error",
            Event::ScrapingCompletedAll { .. } => "scraping_completed_all",
            Event::FiltersApplying { .. } => "filters_applying",
            Event::FilterApplied { .. } => "filter_applied",
            Event::FilterError { .. } => "filter_error",
            Event::FiltersCompleted { .. } => "filters_completed",
            Event::FilterAdded { .. } => "filter_added",
            Event::FilterRemoved { .. } => "filter_removed",
            Event::FiltersCleared => "filters_cleared",
        }
    }
}

type SyncListener = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;
type AsyncListener = Arc<dyn Fn(Event) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

#[derive(Clone)]
enum Listener {
    Sync(SyncListener),
    Async(AsyncListener),
}

/// Channel-keyed listener registry. Clones share the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Arc<RwLock<HashMap<String, Vec<Listener>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus::default()
    }

    /// Register a listener invoked inline on every emission to `channel`.
    pub fn on<F>(&self, channel: &str, listener: F)
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(channel, Listener::Sync(Arc::new(listener)));
    }

    /// Register a listener whose future is spawned and never awaited by the emitter.
    pub fn on_async<F, Fut>(&self, channel: &str, listener: F)
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register(
            channel,
            Listener::Async(Arc::new(move |event| listener(event).boxed())),
        );
    }

    fn register(&self, channel: &str, listener: Listener) {
        if !CHANNELS.contains(&channel) {
            warn!("Listener registered on unknown channel '{}'", channel);
        }
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(channel.to_string())
            .or_default()
            .push(listener);
    }

    #[cfg(test)]
    pub fn listener_count(&self, channel: &str) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel)
            .map_or(0, Vec::len)
    }

    /// Deliver `event` to every listener on its channel, in registration order.
    pub fn emit(&self, event: Event) {
        let channel = event.channel();
        // Snapshot so listeners may register others without deadlocking.
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel)
            .cloned()
            .unwrap_or_default();

        for listener in listeners {
            match listener {
                Listener::Sync(f) => match catch_unwind(AssertUnwindSafe(|| f(&event))) {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!("Listener on '{}' failed: {:#}", channel, e),
                    Err(_) => error!("Listener on '{}' panicked", channel),
                },
                Listener::Async(f) => {
                    let Ok(handle) = Handle::try_current() else {
                        warn!("No runtime to run async listener on '{}', skipping", channel);
                        continue;
                    };
                    let future = match catch_unwind(AssertUnwindSafe(|| f(event.clone()))) {
                        Ok(future) => future,
                        Err(_) => {
                            error!("Listener on '{}' panicked", channel);
                            continue;
                        }
                    };
                    handle.spawn(async move {
                        if let Err(e) = future.await {
                            error!("Async listener on '{}' failed: {:#}", channel, e);
                        }
                    });
                }
            }
        }
    }
}
