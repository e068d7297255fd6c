use thiserror::Error;

/// Failure of a single scrape attempt against one source.
///
/// These are always recoverable: the retry policy turns them into a failed
/// `ScrapeOutcome` instead of letting them cross the engine boundary.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid CSS selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },

    #[error("Unexpected page structure: {0}")]
    Structure(String),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to initialise source '{source_name}': {reason}")]
    SourceInit { source_name: String, reason: String },

    #[error("A scraping cycle is already running")]
    CycleInProgress,
}

#[derive(Error, Debug)]
#[error("filter '{filter}' failed: {reason}")]
pub struct FilterError {
    pub filter: String,
    pub reason: String,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ModelError {
    #[error("player name is empty")]
    EmptyPlayerName,
}
