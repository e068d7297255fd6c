use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::http::HttpSession;
use super::{category_matches, MatchCallback, MatchScraper};
use crate::classify::{Classifier, TieBreakDetector};
use crate::config::{FlashscoreConfig, ScrapingConfig};
use crate::error::{EngineError, ScrapeError};
use crate::models::{Match, Player, Score, ScrapeOutcome, Side};

pub const SOURCE_NAME: &str = "flashscore";

const MAX_SETS: usize = 5;
const ROW_ID_PREFIX: &str = "g_2_";

fn css(selector: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(selector).map_err(|e| ScrapeError::Selector {
        selector: selector.to_string(),
        reason: format!("{e:?}"),
    })
}

struct RowSelectors {
    headers_and_rows: Selector,
    header: Selector,
    title_type: Selector,
    title_name: Selector,
    home: Selector,
    away: Selector,
    score_home: Selector,
    score_away: Selector,
    stage: Selector,
    time: Selector,
    bet_wrapper: Selector,
    serve_home: Selector,
    serve_away: Selector,
    /// `(home, away)` cell selectors per set, first set first
    parts: Vec<(Selector, Selector)>,
}

impl RowSelectors {
    fn compile() -> Result<Self, ScrapeError> {
        let parts = (1..=MAX_SETS)
            .map(|n| {
                Ok((
                    css(&format!(".event__part--home.event__part--{n}"))?,
                    css(&format!(".event__part--away.event__part--{n}"))?,
                ))
            })
            .collect::<Result<Vec<_>, ScrapeError>>()?;

        Ok(RowSelectors {
            headers_and_rows: css("div.event__header, div.event__match")?,
            header: css("div.event__header")?,
            title_type: css(".event__title--type")?,
            title_name: css(".event__title--name")?,
            home: css(".event__participant--home")?,
            away: css(".event__participant--away")?,
            score_home: css(".event__score--home")?,
            score_away: css(".event__score--away")?,
            stage: css(".event__stage")?,
            time: css(".event__time")?,
            bet_wrapper: css("div.liveBetWrapper[data-bookmaker-id]")?,
            serve_home: css(".icon--serveHome, .event__serve--home")?,
            serve_away: css(".icon--serveAway, .event__serve--away")?,
            parts,
        })
    }
}

/// Counters reported in the outcome metadata.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractionStats {
    pub groups_seen: usize,
    pub groups_matched: usize,
    pub rows_checked: usize,
    pub rows_skipped: usize,
    pub rows_without_marker: usize,
}

impl ExtractionStats {
    fn to_json(&self) -> Value {
        json!({
            "groups_seen": self.groups_seen,
            "groups_matched": self.groups_matched,
            "rows_checked": self.rows_checked,
            "rows_skipped": self.rows_skipped,
            "rows_without_marker": self.rows_without_marker,
        })
    }
}

#[derive(Debug)]
pub struct Extraction {
    pub matches: Vec<Match>,
    pub stats: ExtractionStats,
}

/// Tournament group currently open while walking the page.
struct Group {
    tournament: String,
    title: String,
    matches_category: bool,
}

/// Live tennis listing scraped from the flashscore HTML page.
pub struct Flashscore {
    settings: FlashscoreConfig,
    http: HttpSession,
    availability_timeout: Duration,
    classifier: Classifier,
    selectors: RowSelectors,
}

impl Flashscore {
    pub fn new(config: &ScrapingConfig) -> Result<Self, EngineError> {
        let selectors = RowSelectors::compile().map_err(|e| EngineError::SourceInit {
            source_name: SOURCE_NAME.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Flashscore {
            settings: config.flashscore.clone(),
            http: HttpSession::new(config.user_agent.clone(), config.request_timeout()),
            availability_timeout: config.availability_timeout(),
            classifier: Classifier::new(TieBreakDetector::new(&config.tie_break_keywords)),
            selectors,
        })
    }

    fn listing_url(&self) -> Result<Url, ScrapeError> {
        Ok(Url::parse(&self.settings.base_url)?.join(&self.settings.tennis_path)?)
    }

    fn match_url(&self, match_id: &str) -> String {
        format!(
            "{}/match/{}/",
            self.settings.base_url.trim_end_matches('/'),
            match_id
        )
    }

    /// Walk headers and rows in document order and materialise the matches
    /// that pass the category, marker and cap checks.
    pub fn extract(&self, html: &str, on_match_found: Option<&MatchCallback>) -> Extraction {
        let document = Html::parse_document(html);
        let marker = self.settings.bookmaker_digits();
        let mut stats = ExtractionStats::default();
        let mut matches = Vec::new();
        let mut group: Option<Group> = None;

        for element in document.select(&self.selectors.headers_and_rows) {
            if self.selectors.header.matches(&element) {
                let next = self.read_group(element);
                stats.groups_seen += 1;
                if next.matches_category {
                    stats.groups_matched += 1;
                    debug!("Reading group '{}'", next.title);
                }
                group = Some(next);
                continue;
            }

            let Some(current) = group.as_ref().filter(|g| g.matches_category) else {
                continue;
            };

            if stats.rows_checked >= self.settings.max_rows_to_check {
                info!(
                    "Checked {} rows on {}, stopping",
                    stats.rows_checked, SOURCE_NAME
                );
                break;
            }
            stats.rows_checked += 1;

            if let Some(digits) = marker.as_deref() {
                if !self.has_marker(element, digits) {
                    stats.rows_without_marker += 1;
                    continue;
                }
            }

            match self.read_row(element, current) {
                Ok(Some(game)) => {
                    if let Some(callback) = on_match_found {
                        callback(&game);
                    }
                    matches.push(game);
                }
                Ok(None) => stats.rows_skipped += 1,
                Err(e) => {
                    warn!("Skipping {} row: {}", SOURCE_NAME, e);
                    stats.rows_skipped += 1;
                }
            }

            if matches.len() >= self.settings.max_candidates {
                info!(
                    "Reached {} candidate limit ({}), stopping",
                    SOURCE_NAME, self.settings.max_candidates
                );
                break;
            }
        }

        Extraction { matches, stats }
    }

    fn read_group(&self, header: ElementRef<'_>) -> Group {
        let kind = first_text(header, &self.selectors.title_type);
        let name = first_text(header, &self.selectors.title_name);
        let title = match (&kind, &name) {
            (Some(kind), Some(name)) => format!("{kind}: {name}"),
            _ => collapsed_text(header),
        };
        let tournament = if kind.is_some() && name.is_some() {
            title.clone()
        } else {
            name.unwrap_or_else(|| title.clone())
        };
        Group {
            matches_category: category_matches(&title, &self.settings.category_keywords),
            tournament,
            title,
        }
    }

    fn has_marker(&self, row: ElementRef<'_>, digits: &str) -> bool {
        row.select(&self.selectors.bet_wrapper)
            .filter_map(|w| w.value().attr("data-bookmaker-id"))
            .any(|id| id.trim() == digits)
    }

    /// `Ok(None)` when a participant name is missing.
    fn read_row(&self, row: ElementRef<'_>, group: &Group) -> Result<Option<Match>, ScrapeError> {
        let (Some(home), Some(away)) = (
            first_text(row, &self.selectors.home),
            first_text(row, &self.selectors.away),
        ) else {
            debug!("Row without both participants, skipping");
            return Ok(None);
        };

        let home = Player::from_raw_name(&home).map_err(|e| ScrapeError::Structure(e.to_string()))?;
        let away = Player::from_raw_name(&away).map_err(|e| ScrapeError::Structure(e.to_string()))?;

        let status_text = first_text(row, &self.selectors.stage)
            .or_else(|| first_text(row, &self.selectors.time))
            .unwrap_or_default();
        let score_text = self.score_text(row);

        let mut game = Match::new(home, away, SOURCE_NAME);
        game.tournament = group.tournament.clone();
        game.score = Score::parse(&score_text);
        game.score.server = self.server(row);
        if let Some(id) = row
            .value()
            .id()
            .map(|id| id.trim_start_matches(ROW_ID_PREFIX))
            .filter(|id| !id.is_empty())
        {
            game.source_url = Some(self.match_url(id));
            game.match_id = Some(id.to_string());
        }
        game.metadata.insert("category".into(), Value::String(group.title.clone()));
        game.metadata.insert("raw_status".into(), Value::String(status_text.clone()));

        let status = Some(status_text.as_str()).filter(|s| !s.is_empty());
        let score = Some(score_text.as_str()).filter(|s| !s.is_empty());
        Ok(Some(self.classifier.classify(game, status, score)))
    }

    /// Per-set cells when present, otherwise the sets-won totals.
    fn score_text(&self, row: ElementRef<'_>) -> String {
        let mut sets = Vec::new();
        for (home_sel, away_sel) in &self.selectors.parts {
            let home = row.select(home_sel).next().and_then(leading_number);
            let away = row.select(away_sel).next().and_then(leading_number);
            match (home, away) {
                (Some(h), Some(a)) => sets.push(format!("{h}-{a}")),
                _ => break,
            }
        }
        if !sets.is_empty() {
            return sets.join(" ");
        }

        match (
            first_text(row, &self.selectors.score_home),
            first_text(row, &self.selectors.score_away),
        ) {
            (Some(h), Some(a)) if h != "-" && a != "-" => format!("{h}-{a}"),
            _ => String::new(),
        }
    }

    fn server(&self, row: ElementRef<'_>) -> Option<Side> {
        if row.select(&self.selectors.serve_home).next().is_some() {
            Some(Side::Home)
        } else if row.select(&self.selectors.serve_away).next().is_some() {
            Some(Side::Away)
        } else {
            None
        }
    }
}

/// Trimmed text of the first match, if non-empty.
fn first_text(parent: ElementRef<'_>, selector: &Selector) -> Option<String> {
    parent
        .select(selector)
        .next()
        .map(collapsed_text)
        .filter(|t| !t.is_empty())
}

fn collapsed_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

// Set cells carry tie-break points in a <sup>; only the first text node is games.
fn leading_number(cell: ElementRef<'_>) -> Option<u32> {
    cell.text()
        .map(str::trim)
        .find(|t| !t.is_empty())
        .and_then(|t| t.parse().ok())
}

#[async_trait]
impl MatchScraper for Flashscore {
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
        let url = self.listing_url()?;
        let started = tokio::time::Instant::now();
        let body = self.http.get_text(url.as_str()).await?;
        let Extraction { matches, stats } = self.extract(&body, on_match_found);

        let tie_breaks = matches.iter().filter(|m| m.is_tie_break()).count();
        info!(
            "{}: {} matches ({} tie-breaks) from {} rows in {} groups",
            SOURCE_NAME,
            matches.len(),
            tie_breaks,
            stats.rows_checked,
            stats.groups_matched
        );

        Ok(ScrapeOutcome::success(SOURCE_NAME, matches)
            .with_duration(started.elapsed())
            .with_metadata("stats", stats.to_json())
            .with_metadata("tie_break_count", tie_breaks))
    }

    async fn cleanup(&self) {
        self.http.close().await;
    }
}
