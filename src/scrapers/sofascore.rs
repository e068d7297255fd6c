use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::http::HttpSession;
use super::{category_matches, MatchCallback, MatchScraper};
use crate::classify::{Classifier, TieBreakDetector};
use crate::config::{ScrapingConfig, SofascoreConfig};
use crate::error::ScrapeError;
use crate::models::{Match, Player, Score, ScrapeOutcome};

pub const SOURCE_NAME: &str = "sofascore";

const MAX_PERIODS: usize = 5;
/// No regular set reaches this many games; a larger period is match tie-break points.
const MAX_SET_GAMES: u64 = 7;

const FINISHED_DETAILS: [&str; 3] = ["retired", "walkover", "awarded"];

/// Tennis events from the sofascore JSON API.
pub struct Sofascore {
    settings: SofascoreConfig,
    http: HttpSession,
    availability_timeout: Duration,
    request_delay: Duration,
    classifier: Classifier,
}

impl Sofascore {
    pub fn new(config: &ScrapingConfig) -> Self {
        Sofascore {
            settings: config.sofascore.clone(),
            http: HttpSession::new(config.user_agent.clone(), config.request_timeout()),
            availability_timeout: config.availability_timeout(),
            request_delay: config.base_delay(),
            classifier: Classifier::new(TieBreakDetector::new(&config.tie_break_keywords)),
        }
    }

    fn api(&self, path: &str) -> String {
        format!("{}/{}", self.settings.api_url.trim_end_matches('/'), path)
    }

    fn live_url(&self) -> String {
        self.api("sport/tennis/events/live")
    }

    fn scheduled_url(&self, day: DateTime<Utc>) -> String {
        self.api(&format!(
            "sport/tennis/scheduled-events/{}",
            day.format("%Y-%m-%d")
        ))
    }

    /// Convert one API event. `None` when it is outside the configured
    /// category or lacks a participant name.
    pub fn parse_event(&self, ev: &Value) -> Option<Match> {
        let category = ev["tournament"]["category"]["name"].as_str().unwrap_or_default();
        let tournament_name = ev["tournament"]["name"].as_str().unwrap_or_default();
        let tournament = match (category.is_empty(), tournament_name.is_empty()) {
            (false, false) => format!("{category}: {tournament_name}"),
            (true, _) => tournament_name.to_string(),
            (false, true) => category.to_string(),
        };
        if !category_matches(&tournament, &self.settings.category_keywords) {
            return None;
        }

        let home = parse_player(&ev["homeTeam"])?;
        let away = parse_player(&ev["awayTeam"])?;

        let status_text = status_text(&ev["status"]);
        let score_text = score_text(&ev["homeScore"], &ev["awayScore"]);

        let mut game = Match::new(home, away, SOURCE_NAME);
        game.tournament = tournament;
        game.round = ev["roundInfo"]["name"].as_str().unwrap_or_default().to_string();
        game.score = Score::parse(&score_text);
        game.score.current_game = current_game(&ev["homeScore"], &ev["awayScore"]);
        game.scheduled_at = ev["startTimestamp"]
            .as_i64()
            .and_then(|ts| DateTime::from_timestamp(ts, 0));
        if let Some(id) = ev["id"].as_u64() {
            game.match_id = Some(id.to_string());
            game.source_url = Some(format!(
                "{}/tennis/match/{}",
                self.settings.base_url.trim_end_matches('/'),
                id
            ));
        }
        game.metadata
            .insert("raw_status".into(), Value::String(status_text.clone()));

        let status = Some(status_text.as_str()).filter(|s| !s.is_empty());
        let score = Some(score_text.as_str()).filter(|s| !s.is_empty());
        let mut game = self.classifier.classify(game, status, score);
        if game.status.is_active() || game.status.is_completed() {
            game.started_at = game.scheduled_at;
        }
        Some(game)
    }

    /// Append unseen events from one response, honouring the candidate cap.
    fn collect(
        &self,
        raw: &Value,
        seen: &mut HashSet<String>,
        matches: &mut Vec<Match>,
        on_match_found: Option<&MatchCallback>,
    ) -> usize {
        let Some(events) = raw["events"].as_array() else {
            return 0;
        };

        let mut added = 0;
        for ev in events {
            if matches.len() >= self.settings.max_candidates {
                info!(
                    "Reached {} candidate limit ({}), stopping",
                    SOURCE_NAME, self.settings.max_candidates
                );
                break;
            }
            let Some(game) = self.parse_event(ev) else {
                continue;
            };
            if let Some(id) = &game.match_id {
                if !seen.insert(id.clone()) {
                    debug!("Duplicate {} event {}, skipping", SOURCE_NAME, id);
                    continue;
                }
            }
            if let Some(callback) = on_match_found {
                callback(&game);
            }
            matches.push(game);
            added += 1;
        }
        added
    }
}

fn parse_player(team: &Value) -> Option<Player> {
    let mut player = Player::from_raw_name(team["name"].as_str()?).ok()?;
    if let Some(country) = team["country"]["alpha3"].as_str() {
        player = player.with_country(country);
    }
    if let Some(ranking) = team["ranking"].as_u64().and_then(|r| u32::try_from(r).ok()) {
        player = player.with_ranking(ranking);
    }
    if let Some(id) = team["id"].as_u64() {
        player = player.with_id(id.to_string());
    }
    Some(player)
}

/// Text handed to the status classifier.
fn status_text(status: &Value) -> String {
    let kind = status["type"].as_str().unwrap_or_default();
    let description = status["description"].as_str().unwrap_or_default();
    match kind {
        "inprogress" if !description.is_empty() => description.to_string(),
        "finished" => {
            let lower = description.to_lowercase();
            if FINISHED_DETAILS.iter().any(|d| lower.contains(d)) {
                description.to_string()
            } else {
                "finished".to_string()
            }
        }
        _ => kind.to_string(),
    }
}

/// Sets as `h-a`, a match tie-break period as `[h-a]`.
fn score_text(home: &Value, away: &Value) -> String {
    let mut parts = Vec::new();
    for n in 1..=MAX_PERIODS {
        let key = format!("period{n}");
        let (Some(h), Some(a)) = (home[&key].as_u64(), away[&key].as_u64()) else {
            break;
        };
        if h.max(a) > MAX_SET_GAMES {
            parts.push(format!("[{h}-{a}]"));
        } else {
            parts.push(format!("{h}-{a}"));
        }
    }
    parts.join(" ")
}

fn current_game(home: &Value, away: &Value) -> Option<(String, String)> {
    let point = |v: &Value| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    Some((point(&home["point"])?, point(&away["point"])?))
}

#[async_trait]
impl MatchScraper for Sofascore {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn is_available(&self) -> bool {
        self.http
            .probe(&self.settings.base_url, self.availability_timeout)
            .await
    }

    async fn attempt_scrape(
        &self,
        on_match_found: Option<&MatchCallback>,
    ) -> Result<ScrapeOutcome, ScrapeError> {
        let started = tokio::time::Instant::now();
        let mut seen = HashSet::new();
        let mut matches = Vec::new();

        let live = self.http.get_json(&self.live_url()).await?;
        let live_count = self.collect(&live, &mut seen, &mut matches, on_match_found);

        let mut scheduled_count = 0;
        let mut scheduled_error = None;
        if self.settings.include_scheduled && matches.len() < self.settings.max_candidates {
            tokio::time::sleep(self.request_delay).await;
            match self.http.get_json(&self.scheduled_url(Utc::now())).await {
                Ok(raw) => {
                    scheduled_count = self.collect(&raw, &mut seen, &mut matches, on_match_found)
                }
                Err(e) => {
                    warn!("{} scheduled events unavailable: {}", SOURCE_NAME, e);
                    scheduled_error = Some(e.to_string());
                }
            }
        }

        info!(
            "{}: {} live and {} scheduled matches",
            SOURCE_NAME, live_count, scheduled_count
        );

        let mut outcome = ScrapeOutcome::success(SOURCE_NAME, matches)
            .with_duration(started.elapsed())
            .with_metadata("live_matches", live_count)
            .with_metadata("scheduled_matches", scheduled_count);
        if let Some(error) = scheduled_error {
            outcome = outcome.with_metadata("scheduled_error", error);
        }
        Ok(outcome)
    }

    async fn cleanup(&self) {
        self.http.close().await;
    }
}
