pub mod score;
pub mod status;

pub use score::{Score, Side};
pub use status::MatchStatus;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::hash::{Hash, Hasher};
use std::time::Duration;

use crate::error::ModelError;

/// Metadata key set by sources when a decisive tie-break is in progress.
pub const TIE_BREAK_FLAG: &str = "is_match_tie_break";
/// Metadata key naming the tie-break rule that fired.
pub const TIE_BREAK_METHOD: &str = "tie_break_detection_method";

const NAME_AFFIXES: [&str; 4] = ["Mr.", "Ms.", "Jr.", "Sr."];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub ranking: Option<u32>,
    /// Source-specific player identifier
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Player {
    pub fn new(name: &str) -> Result<Self, ModelError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ModelError::EmptyPlayerName);
        }
        Ok(Player {
            name: name.to_string(),
            country: None,
            ranking: None,
            id: None,
            metadata: Map::new(),
        })
    }

    /// Build a player from scraped text, stripping honorifics such as "Mr." or "Jr.".
    pub fn from_raw_name(raw: &str) -> Result<Self, ModelError> {
        let mut name = raw.trim();
        for affix in NAME_AFFIXES {
            if let Some(rest) = name.strip_prefix(affix) {
                name = rest.trim();
            }
            if let Some(rest) = name.strip_suffix(affix) {
                name = rest.trim();
            }
        }
        Player::new(name)
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_ranking(mut self, ranking: u32) -> Self {
        self.ranking = Some(ranking);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn display_name(&self) -> String {
        match &self.country {
            Some(country) => format!("{} ({})", self.name, country),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TournamentLevel {
    GrandSlam,
    Atp1000,
    Atp500,
    Atp250,
    Challenger,
    Itf15k,
    Itf25k,
    Itf40k,
    Itf60k,
    Itf80k,
    Itf100k,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    Hard,
    Clay,
    Grass,
    Carpet,
    #[default]
    Unknown,
}

/// Identity of a match within the system.
///
/// Records from different sources never share a key, even when they describe
/// the same real-world match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MatchKey {
    Id {
        source: String,
        match_id: String,
    },
    Fallback {
        source: String,
        home: String,
        away: String,
        tournament: String,
    },
}

/// One scraped match record. A fresh value is produced on every cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub home_player: Player,
    pub away_player: Player,
    #[serde(default)]
    pub score: Score,
    #[serde(default)]
    pub status: MatchStatus,
    #[serde(default)]
    pub tournament: String,
    #[serde(default)]
    pub tournament_level: TournamentLevel,
    #[serde(default)]
    pub surface: Surface,
    #[serde(default)]
    pub round: String,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub match_id: Option<String>,
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Match {
    pub fn new(home_player: Player, away_player: Player, source: impl Into<String>) -> Self {
        Match {
            home_player,
            away_player,
            score: Score::default(),
            status: MatchStatus::default(),
            tournament: String::new(),
            tournament_level: TournamentLevel::Unknown,
            surface: Surface::Unknown,
            round: String::new(),
            scheduled_at: None,
            started_at: None,
            source: source.into(),
            source_url: None,
            match_id: None,
            last_updated: Utc::now(),
            metadata: Map::new(),
        }
    }

    pub fn key(&self) -> MatchKey {
        match self.match_id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => MatchKey::Id {
                source: self.source.clone(),
                match_id: id.to_string(),
            },
            None => MatchKey::Fallback {
                source: self.source.clone(),
                home: self.home_player.name.clone(),
                away: self.away_player.name.clone(),
                tournament: self.tournament.clone(),
            },
        }
    }

    pub fn title(&self) -> String {
        format!("{} vs {}", self.home_player.name, self.away_player.name)
    }

    pub fn is_live(&self) -> bool {
        self.status == MatchStatus::Live
    }

    pub fn is_tie_break(&self) -> bool {
        self.metadata
            .get(TIE_BREAK_FLAG)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

impl PartialEq for Match {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Match {}

impl Hash for Match {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// Result of one scrape attempt against one source.
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    pub source: String,
    pub matches: Vec<Match>,
    pub success: bool,
    pub error: Option<String>,
    pub duration: Option<Duration>,
    pub finished_at: DateTime<Utc>,
    pub metadata: Map<String, Value>,
}

impl ScrapeOutcome {
    pub fn success(source: impl Into<String>, matches: Vec<Match>) -> Self {
        ScrapeOutcome {
            source: source.into(),
            matches,
            success: true,
            error: None,
            duration: None,
            finished_at: Utc::now(),
            metadata: Map::new(),
        }
    }

    pub fn failure(source: impl Into<String>, error: impl Into<String>) -> Self {
        ScrapeOutcome {
            source: source.into(),
            matches: Vec::new(),
            success: false,
            error: Some(error.into()),
            duration: None,
            finished_at: Utc::now(),
            metadata: Map::new(),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Record elapsed time only if the attempt itself did not.
    pub fn backfill_duration(&mut self, elapsed: Duration) {
        if self.duration.is_none() {
            self.duration = Some(elapsed);
        }
    }
}
