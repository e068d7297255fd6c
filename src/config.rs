use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::classify::tie_break::DEFAULT_TIE_BREAK_KEYWORDS;
use crate::error::EngineError;

const MAX_RETRIES_LIMIT: u32 = 10;
const MAX_DELAY_SECS: f64 = 300.0;

/// Live tennis scraper with tie-break monitoring
#[derive(Parser, Debug, Clone)]
#[command(name = "tennis-monitor", version, about)]
pub struct Config {
    /// Run a single scraping cycle and exit
    #[arg(long, env = "RUN_ONCE", default_value = "false")]
    pub once: bool,

    /// Seconds between monitoring cycles
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "120")]
    pub interval_secs: u64,

    /// Sources to enable (comma separated)
    #[arg(long, env = "SOURCES", value_delimiter = ',', default_value = "flashscore")]
    pub sources: Vec<String>,

    /// Retries per source after the first failed attempt
    #[arg(long, env = "MAX_RETRIES", default_value = "3")]
    pub max_retries: u32,

    /// Timeout for full page / API requests in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "30")]
    pub request_timeout_secs: u64,

    /// Base delay between requests and retry backoff in seconds
    #[arg(long, env = "DELAY_SECS", default_value = "2.0")]
    pub delay_secs: f64,

    /// Keywords a tournament group title must contain (repeatable)
    #[arg(long = "category", env = "CATEGORY_KEYWORDS", value_delimiter = ',')]
    pub category_keywords: Vec<String>,

    /// Bookmaker marker rows must carry on flashscore (id or "/549/" fragment)
    #[arg(long, env = "BOOKMAKER_ID")]
    pub bookmaker_id: Option<String>,

    /// Stop extracting after this many matches per source
    #[arg(long, env = "MAX_CANDIDATES")]
    pub max_candidates: Option<usize>,

    /// Keep only live / interrupted matches
    #[arg(long, env = "LIVE_ONLY", default_value = "false")]
    pub live_only: bool,

    /// Keep only matches in a decisive tie-break
    #[arg(long, env = "TIE_BREAKS_ONLY", default_value = "false")]
    pub tie_breaks_only: bool,

    /// Keep only tournaments whose name contains this text
    #[arg(long, env = "TOURNAMENT")]
    pub tournament: Option<String>,

    /// Print every snapshot as JSON lines on stdout
    #[arg(long, env = "JSON_OUTPUT", default_value = "false")]
    pub json: bool,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sources.iter().all(|s| s.trim().is_empty()) {
            anyhow::bail!("at least one source must be enabled");
        }
        if self.interval_secs == 0 {
            anyhow::bail!("interval_secs must be positive");
        }
        if self.max_retries > MAX_RETRIES_LIMIT {
            anyhow::bail!("max_retries must be at most {}", MAX_RETRIES_LIMIT);
        }
        if !(0.0..=MAX_DELAY_SECS).contains(&self.delay_secs) {
            anyhow::bail!("delay_secs must be between 0 and {}", MAX_DELAY_SECS);
        }
        Ok(())
    }

    /// The nested mapping handed to the engine.
    pub fn engine_settings(&self) -> Value {
        let sources_enabled: BTreeMap<String, bool> = self
            .sources
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .map(|s| (s, true))
            .collect();

        let mut source_overrides = serde_json::Map::new();
        if !self.category_keywords.is_empty() {
            source_overrides.insert("category_keywords".into(), json!(self.category_keywords));
        }
        if let Some(max) = self.max_candidates {
            source_overrides.insert("max_candidates".into(), json!(max));
        }

        let mut flashscore = source_overrides.clone();
        if let Some(id) = &self.bookmaker_id {
            flashscore.insert("bookmaker_id".into(), json!(id));
        }

        json!({
            "scraping": {
                "sources_enabled": sources_enabled,
                "max_retries": self.max_retries,
                "request_timeout_secs": self.request_timeout_secs,
                "delay_between_requests_secs": self.delay_secs,
                "flashscore": flashscore,
                "sofascore": source_overrides,
            }
        })
    }
}

/// Settings consumed by the scraping engine and its sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    pub sources_enabled: BTreeMap<String, bool>,
    pub request_timeout_secs: u64,
    pub availability_timeout_secs: u64,
    pub max_retries: u32,
    pub delay_between_requests_secs: f64,
    pub user_agent: String,
    pub tie_break_keywords: Vec<String>,
    pub flashscore: FlashscoreConfig,
    pub sofascore: SofascoreConfig,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        ScrapingConfig {
            sources_enabled: BTreeMap::from([("flashscore".to_string(), true)]),
            request_timeout_secs: 30,
            availability_timeout_secs: 5,
            max_retries: 3,
            delay_between_requests_secs: 2.0,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".into(),
            tie_break_keywords: DEFAULT_TIE_BREAK_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            flashscore: FlashscoreConfig::default(),
            sofascore: SofascoreConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlashscoreConfig {
    pub base_url: String,
    pub tennis_path: String,
    /// Every keyword must appear in a group title for its rows to be read
    pub category_keywords: Vec<String>,
    /// Rows must carry this bookmaker marker; empty disables the check
    pub bookmaker_id: String,
    pub max_candidates: usize,
    pub max_rows_to_check: usize,
}

impl Default for FlashscoreConfig {
    fn default() -> Self {
        FlashscoreConfig {
            base_url: "https://www.flashscoreusa.com".into(),
            tennis_path: "/tennis/".into(),
            category_keywords: vec!["itf".into()],
            bookmaker_id: "/549/".into(),
            max_candidates: 25,
            max_rows_to_check: 100,
        }
    }
}

impl FlashscoreConfig {
    /// Digits of the configured marker, accepting both "549" and "/549/".
    pub fn bookmaker_digits(&self) -> Option<String> {
        let digits: String = self.bookmaker_id.chars().filter(char::is_ascii_digit).collect();
        (!digits.is_empty()).then_some(digits)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SofascoreConfig {
    pub base_url: String,
    pub api_url: String,
    pub category_keywords: Vec<String>,
    /// Also read the day's scheduled events, not only live ones
    pub include_scheduled: bool,
    pub max_candidates: usize,
}

impl Default for SofascoreConfig {
    fn default() -> Self {
        SofascoreConfig {
            base_url: "https://www.sofascore.com".into(),
            api_url: "https://api.sofascore.com/api/v1".into(),
            category_keywords: vec!["itf".into()],
            include_scheduled: true,
            max_candidates: 200,
        }
    }
}

impl ScrapingConfig {
    /// Read the scraping section from a nested settings mapping.
    ///
    /// Accepts either the full settings document (with a `"scraping"` key) or
    /// the scraping section itself. Missing keys take their defaults.
    pub fn from_mapping(settings: &Value) -> Result<Self, EngineError> {
        let section = settings.get("scraping").unwrap_or(settings);
        let config = if section.is_null() {
            ScrapingConfig::default()
        } else {
            ScrapingConfig::deserialize(section)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.request_timeout_secs == 0 || self.availability_timeout_secs == 0 {
            return Err(EngineError::InvalidConfig("timeouts must be positive".into()));
        }
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(EngineError::InvalidConfig(format!(
                "max_retries must be at most {MAX_RETRIES_LIMIT}"
            )));
        }
        if !(0.0..=MAX_DELAY_SECS).contains(&self.delay_between_requests_secs) {
            return Err(EngineError::InvalidConfig(format!(
                "delay_between_requests_secs must be between 0 and {MAX_DELAY_SECS}"
            )));
        }
        for url in [
            &self.flashscore.base_url,
            &self.sofascore.base_url,
            &self.sofascore.api_url,
        ] {
            url::Url::parse(url)
                .map_err(|e| EngineError::InvalidConfig(format!("bad URL '{url}': {e}")))?;
        }
        Ok(())
    }

    pub fn is_enabled(&self, source: &str) -> bool {
        self.sources_enabled.get(source).copied().unwrap_or(false)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn availability_timeout(&self) -> Duration {
        Duration::from_secs(self.availability_timeout_secs)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay_between_requests_secs)
    }
}
