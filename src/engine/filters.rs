use crate::error::FilterError;
use crate::models::Match;

/// A named transform applied to the consolidated match list.
pub trait MatchFilter: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, matches: &[Match]) -> Result<Vec<Match>, FilterError>;
}

/// Keeps matches whose status is live or interrupted.
pub struct ActiveOnly;

impl MatchFilter for ActiveOnly {
    fn name(&self) -> &str {
        "active_only"
    }

    fn apply(&self, matches: &[Match]) -> Result<Vec<Match>, FilterError> {
        Ok(matches.iter().filter(|m| m.status.is_active()).cloned().collect())
    }
}

/// Keeps matches flagged as being in a decisive tie-break.
pub struct TieBreakOnly;

impl MatchFilter for TieBreakOnly {
    fn name(&self) -> &str {
        "tie_break_only"
    }

    fn apply(&self, matches: &[Match]) -> Result<Vec<Match>, FilterError> {
        Ok(matches.iter().filter(|m| m.is_tie_break()).cloned().collect())
    }
}

/// Case-insensitive substring match on the tournament name.
pub struct TournamentContains {
    name: String,
    needle: String,
}

impl TournamentContains {
    pub fn new(needle: &str) -> Result<Self, FilterError> {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return Err(FilterError {
                filter: "tournament_contains".into(),
                reason: "empty tournament text".into(),
            });
        }
        Ok(TournamentContains {
            name: format!("tournament_contains:{needle}"),
            needle,
        })
    }
}

impl MatchFilter for TournamentContains {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, matches: &[Match]) -> Result<Vec<Match>, FilterError> {
        Ok(matches
            .iter()
            .filter(|m| m.tournament.to_lowercase().contains(&self.needle))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MatchStatus, TIE_BREAK_FLAG};
    use crate::scrapers::mock::sample_match;
    use serde_json::Value;

    fn fixture() -> Vec<Match> {
        let mut tie_break = sample_match("src", "1", MatchStatus::Live);
        tie_break.metadata.insert(TIE_BREAK_FLAG.into(), Value::Bool(true));
        let mut challenger = sample_match("src", "2", MatchStatus::Interrupted);
        challenger.tournament = "Challenger Bergamo".into();
        vec![
            tie_break,
            challenger,
            sample_match("src", "3", MatchStatus::Finished),
            sample_match("src", "4", MatchStatus::Scheduled),
        ]
    }

    fn ids(matches: &[Match]) -> Vec<&str> {
        matches.iter().filter_map(|m| m.match_id.as_deref()).collect()
    }

    #[test]
    fn test_active_only() {
        assert_eq!(ids(&ActiveOnly.apply(&fixture()).unwrap()), vec!["1", "2"]);
    }

    #[test]
    fn test_tie_break_only() {
        assert_eq!(ids(&TieBreakOnly.apply(&fixture()).unwrap()), vec!["1"]);
    }

    #[test]
    fn test_tournament_contains() {
        let filter = TournamentContains::new(" CHALLENGER ").unwrap();
        assert_eq!(filter.name(), "tournament_contains:challenger");
        assert_eq!(ids(&filter.apply(&fixture()).unwrap()), vec!["2"]);
        assert!(TournamentContains::new("   ").is_err());
    }
}
