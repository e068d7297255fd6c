pub mod status;
pub mod tie_break;
pub mod tournament;

pub use status::classify_status;
pub use tie_break::TieBreakDetector;

use serde_json::Value;
use tracing::warn;

use crate::models::{Match, TIE_BREAK_FLAG, TIE_BREAK_METHOD};

/// Applies status, tie-break and tournament heuristics to freshly extracted matches.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    tie_break: TieBreakDetector,
}

impl Classifier {
    pub fn new(tie_break: TieBreakDetector) -> Self {
        Classifier { tie_break }
    }

    /// Fill the derived fields of `game` from the raw text it was scraped from.
    pub fn classify(&self, mut game: Match, status_text: Option<&str>, score_text: Option<&str>) -> Match {
        game.status = classify_status(status_text, score_text);
        game.tournament_level = tournament::tournament_level(&game.tournament);
        game.surface = tournament::surface(&game.tournament);

        let signal = self.tie_break.detect(status_text, score_text);
        if signal.is_tie_break() {
            warn!("🚨 Tie-break: {} ({}) via {}", game.title(), game.tournament, signal);
        }
        game.metadata
            .insert(TIE_BREAK_FLAG.into(), Value::Bool(signal.is_tie_break()));
        game.metadata
            .insert(TIE_BREAK_METHOD.into(), Value::String(signal.method()));
        game
    }
}
