use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Home,
    Away,
}

/// Set-by-set score of a tennis match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    /// (home, away) games per set, in playing order
    pub sets: Vec<(u32, u32)>,
    /// Point labels of the game in progress, e.g. ("40", "AD")
    pub current_game: Option<(String, String)>,
    pub server: Option<Side>,
}

impl Score {
    /// Parse whitespace-separated `home-away` tokens.
    ///
    /// Anything that is not exactly two non-negative integers joined by a
    /// single hyphen is skipped, so `"6-4 invalid 6-3"` yields two sets.
    pub fn parse(raw: &str) -> Score {
        Score {
            sets: parse_set_pairs(raw),
            ..Score::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Sets won by (home, away), counting only sets that look finished.
    #[cfg(test)]
    pub fn sets_won(&self) -> (usize, usize) {
        self.sets
            .iter()
            .filter(|(h, a)| is_completed_set(*h, *a))
            .fold((0, 0), |(home, away), (h, a)| {
                if h > a {
                    (home + 1, away)
                } else {
                    (home, away + 1)
                }
            })
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sets.is_empty() {
            return f.write_str("Not started");
        }
        let rendered: Vec<String> = self.sets.iter().map(|(h, a)| format!("{h}-{a}")).collect();
        f.write_str(&rendered.join(" "))
    }
}

/// Tokenise a score string into set pairs, dropping malformed tokens.
pub fn parse_set_pairs(raw: &str) -> Vec<(u32, u32)> {
    raw.split_whitespace().filter_map(parse_pair).collect()
}

fn parse_pair(token: &str) -> Option<(u32, u32)> {
    let (home, away) = token.split_once('-')?;
    if home.is_empty() || away.is_empty() || away.contains('-') {
        return None;
    }
    if !home.bytes().all(|b| b.is_ascii_digit()) || !away.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((home.parse().ok()?, away.parse().ok()?))
}

/// Standard set-completion rule: six games with a two-game margin, or seven.
pub fn is_completed_set(home: u32, away: u32) -> bool {
    let (high, low) = if home >= away { (home, away) } else { (away, home) };
    (high >= 6 && high - low >= 2) || high == 7
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_sets() {
        assert_eq!(Score::parse("6-4 6-3").sets, vec![(6, 4), (6, 3)]);
    }

    #[test]
    fn test_parse_drops_invalid_token() {
        assert_eq!(Score::parse("6-4 invalid 6-3").sets, vec![(6, 4), (6, 3)]);
    }

    #[test]
    fn test_parse_rejects_malformed_pairs() {
        let score = Score::parse("6--4 -3 7- 6-4-2 a-b [10-8] 6-x 7-6");
        assert_eq!(score.sets, vec![(7, 6)]);
    }

    #[test]
    fn test_parse_empty_and_placeholder() {
        assert!(Score::parse("").is_empty());
        assert!(Score::parse("   ").is_empty());
        assert!(Score::parse("-").is_empty());
        assert!(Score::parse("invalid").is_empty());
    }

    #[test]
    fn test_display() {
        assert_eq!(Score::default().to_string(), "Not started");
        let score = Score {
            sets: vec![(6, 4), (3, 6), (6, 2)],
            ..Score::default()
        };
        assert_eq!(score.to_string(), "6-4 3-6 6-2");
    }

    #[test]
    fn test_render_then_parse_keeps_sets() {
        for raw in ["6-4 3-6 7-6", "0-0", "10-12 6-7", ""] {
            let score = Score::parse(raw);
            assert_eq!(Score::parse(&score.to_string()).sets, score.sets, "input {raw:?}");
        }
    }

    #[test]
    fn test_completed_set_rule() {
        assert!(is_completed_set(6, 4));
        assert!(is_completed_set(3, 6));
        assert!(is_completed_set(7, 5));
        assert!(is_completed_set(7, 6));
        assert!(is_completed_set(6, 0));
        assert!(!is_completed_set(6, 5));
        assert!(!is_completed_set(5, 3));
        assert!(!is_completed_set(6, 6));
        assert!(!is_completed_set(0, 0));
    }

    #[test]
    fn test_sets_won_ignores_running_set() {
        let score = Score::parse("6-4 3-6 2-1");
        assert_eq!(score.sets_won(), (1, 1));
    }
}
