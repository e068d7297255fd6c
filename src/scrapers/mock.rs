use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{MatchCallback, MatchScraper};
use crate::error::ScrapeError;
use crate::models::{Match, MatchStatus, Player, ScrapeOutcome};

/// What the next `attempt_scrape` call does.
pub enum Step {
    Matches(Vec<Match>),
    /// Sleep, then succeed with the matches
    Slow(Duration, Vec<Match>),
    Fail(String),
    Error(String),
    Panic(String),
}

/// In-memory source that replays a script of attempts.
pub struct ScriptedScraper {
    name: String,
    available: bool,
    steps: Mutex<VecDeque<Step>>,
    pub attempts: AtomicUsize,
    pub cleanups: AtomicUsize,
    panic_on_cleanup: bool,
}

impl ScriptedScraper {
    pub fn new(name: &str, steps: Vec<Step>) -> Self {
        ScriptedScraper {
            name: name.to_string(),
            available: true,
            steps: Mutex::new(steps.into()),
            attempts: AtomicUsize::new(0),
            cleanups: AtomicUsize::new(0),
            panic_on_cleanup: false,
        }
    }

    pub fn unavailable(name: &str) -> Self {
        ScriptedScraper {
            available: false,
            ..ScriptedScraper::new(name, vec![])
        }
    }

    pub fn panicking_cleanup(mut self) -> Self {
        self.panic_on_cleanup = true;
        self
    }
}

/// A match from `source` with the given id and status.
pub fn sample_match(source: &str, id: &str, status: MatchStatus) -> Match {
    let mut game = Match::new(
        Player::new(&format!("Home {id}")).unwrap(),
        Player::new(&format!("Away {id}")).unwrap(),
        source,
    );
    game.match_id = Some(id.to_string());
    game.status = status;
    game.tournament = "ITF Men: M15 Monastir".into();
    game
}

#[async_trait]
impl MatchScraper for ScriptedScraper {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn attempt_scrape(
        &self,
        on_match_found: Option<&MatchCallback>,
    ) -> Result<ScrapeOutcome, ScrapeError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Matches(matches)) => {
                if let Some(callback) = on_match_found {
                    matches.iter().for_each(callback);
                }
                Ok(ScrapeOutcome::success(self.name.clone(), matches))
            }
            Some(Step::Slow(delay, matches)) => {
                tokio::time::sleep(delay).await;
                Ok(ScrapeOutcome::success(self.name.clone(), matches))
            }
            Some(Step::Fail(message)) => Ok(ScrapeOutcome::failure(self.name.clone(), message)),
            Some(Step::Error(message)) => Err(ScrapeError::Structure(message)),
            Some(Step::Panic(message)) => panic!("{}", message),
            None => Ok(ScrapeOutcome::failure(self.name.clone(), "script exhausted")),
        }
    }

    async fn cleanup(&self) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_cleanup {
            panic!("cleanup exploded");
        }
    }
}
