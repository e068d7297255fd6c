//! Free-text match status classification.
//!
//! Upstream sources describe match state with loosely formatted text ("2nd
//! set", "Fin.", "14:30", "w/o", ...). The classifier walks an ordered rule
//! list and returns the verdict of the first rule that applies. Keyword sets
//! overlap, so the order of [`RULES`] is significant.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::score::{is_completed_set, parse_set_pairs};
use crate::models::MatchStatus;

pub const FINISHED_KEYWORDS: &[&str] = &[
    "fin.",
    "finished",
    "completed",
    "full time",
    "won",
    "lost",
];

pub const LIVE_KEYWORDS: &[&str] = &[
    "live",
    "in progress",
    "inprogress",
    "playing",
    "break",
    "deuce",
    "advantage",
    "set point",
    "match point",
    "serving",
    "1st set",
    "2nd set",
    "3rd set",
    "4th set",
    "5th set",
    "set 1",
    "set 2",
    "set 3",
    "set 4",
    "set 5",
];

pub const POSTPONED_KEYWORDS: &[&str] = &["postponed", "postp.", "delayed"];
pub const CANCELLED_KEYWORDS: &[&str] = &["cancelled", "canceled", "canc.", "abandoned"];
pub const WALKOVER_KEYWORDS: &[&str] = &["walkover", "w.o.", "w/o"];
pub const RETIRED_KEYWORDS: &[&str] = &["retired", "ret."];
pub const INTERRUPTED_KEYWORDS: &[&str] = &["interrupted", "suspended", "susp."];
pub const AWARDED_KEYWORDS: &[&str] = &["awarded"];

pub const SCHEDULED_KEYWORDS: &[&str] = &[
    "scheduled",
    "sched.",
    "not started",
    "notstarted",
    "upcoming",
    "tbd",
    "tba",
];

/// Separators that only mean "scheduled" when they are the whole text.
const SCHEDULED_SEPARATORS: &[&str] = &["-", "--", "–", "vs", "vs.", "v"];

const PLACEHOLDERS: &[&str] = &["n/a", "none", "null", "...", "pending", "unknown"];

const QUOTE_CHARS: &[char] = &['\'', '"', '`', '‘', '’', '“', '”'];

static CLOCK_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,2}(?::|h|\.)\d{2}(?:\s*[ap]m)?$").unwrap_or_else(|_| unreachable!())
});

/// Normalised classifier input.
pub struct StatusInput<'a> {
    /// Trimmed, lowercased status text with quote characters removed
    pub text: String,
    pub score: Option<&'a str>,
}

impl<'a> StatusInput<'a> {
    pub fn new(status_text: Option<&str>, score: Option<&'a str>) -> Self {
        let text = status_text
            .unwrap_or_default()
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !QUOTE_CHARS.contains(c))
            .collect::<String>()
            .trim()
            .to_string();
        StatusInput { text, score }
    }

    fn contains_any(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|kw| self.text.contains(kw))
    }

    /// Score text that carries information, i.e. not blank and not a placeholder.
    fn usable_score(&self) -> Option<&'a str> {
        self.score
            .map(str::trim)
            .filter(|s| !s.is_empty() && !is_placeholder_score(s))
    }
}

pub struct Rule {
    pub name: &'static str,
    pub applies: fn(&StatusInput) -> bool,
    pub verdict: fn(&StatusInput) -> MatchStatus,
}

/// Priority-ordered decision list. The first applicable rule wins.
pub static RULES: &[Rule] = &[
    Rule {
        name: "finished_keyword",
        applies: |i| i.contains_any(FINISHED_KEYWORDS),
        verdict: |_| MatchStatus::Finished,
    },
    Rule {
        name: "live_keyword",
        applies: |i| i.contains_any(LIVE_KEYWORDS),
        verdict: |_| MatchStatus::Live,
    },
    Rule {
        name: "clock_time",
        applies: |i| CLOCK_TIME.is_match(&i.text),
        verdict: |_| MatchStatus::Scheduled,
    },
    Rule {
        name: "postponed_keyword",
        applies: |i| i.contains_any(POSTPONED_KEYWORDS),
        verdict: |_| MatchStatus::Postponed,
    },
    Rule {
        name: "cancelled_keyword",
        applies: |i| i.contains_any(CANCELLED_KEYWORDS),
        verdict: |_| MatchStatus::Cancelled,
    },
    Rule {
        name: "walkover_keyword",
        applies: |i| i.contains_any(WALKOVER_KEYWORDS),
        verdict: |_| MatchStatus::Walkover,
    },
    Rule {
        name: "retired_keyword",
        applies: |i| i.contains_any(RETIRED_KEYWORDS),
        verdict: |_| MatchStatus::Retired,
    },
    Rule {
        name: "interrupted_keyword",
        applies: |i| i.contains_any(INTERRUPTED_KEYWORDS),
        verdict: |_| MatchStatus::Interrupted,
    },
    Rule {
        name: "awarded_keyword",
        applies: |i| i.contains_any(AWARDED_KEYWORDS),
        verdict: |_| MatchStatus::Awarded,
    },
    Rule {
        name: "scheduled_keyword",
        applies: |i| {
            i.contains_any(SCHEDULED_KEYWORDS) || SCHEDULED_SEPARATORS.contains(&i.text.as_str())
        },
        verdict: |_| MatchStatus::Scheduled,
    },
    Rule {
        name: "placeholder_text",
        applies: |i| i.text.chars().count() <= 2 || PLACEHOLDERS.contains(&i.text.as_str()),
        verdict: |_| MatchStatus::Scheduled,
    },
    Rule {
        name: "score_shape",
        applies: |i| i.usable_score().is_some(),
        verdict: |i| infer_from_score(i.usable_score().unwrap_or_default()),
    },
    Rule {
        name: "long_text",
        applies: |i| i.text.chars().count() > 10,
        verdict: |_| MatchStatus::Live,
    },
];

/// Map raw status text (and optionally the raw score) to exactly one status.
///
/// Never fails. Missing or empty status text falls back to `Live` when a
/// usable score is present and `Scheduled` otherwise. Placeholder scores
/// such as `-`, `vs` or `n/a` are not usable, so they leave the match `Scheduled`.
pub fn classify_status(status_text: Option<&str>, score: Option<&str>) -> MatchStatus {
    let input = StatusInput::new(status_text, score);
    if input.text.is_empty() {
        return if input.usable_score().is_some() {
            MatchStatus::Live
        } else {
            MatchStatus::Scheduled
        };
    }
    matching_rule(&input)
        .map(|rule| (rule.verdict)(&input))
        .unwrap_or(MatchStatus::Scheduled)
}

/// Name of the rule that decides the given input.
#[cfg(test)]
pub fn deciding_rule(status_text: Option<&str>, score: Option<&str>) -> Option<&'static str> {
    let input = StatusInput::new(status_text, score);
    matching_rule(&input).map(|rule| rule.name)
}

fn matching_rule(input: &StatusInput) -> Option<&'static Rule> {
    RULES.iter().find(|rule| (rule.applies)(input))
}

fn infer_from_score(score: &str) -> MatchStatus {
    let completed = parse_set_pairs(score)
        .into_iter()
        .filter(|(h, a)| is_completed_set(*h, *a))
        .count();
    match completed {
        0 | 1 => MatchStatus::Live,
        _ => MatchStatus::Finished,
    }
}

pub fn is_placeholder_score(score: &str) -> bool {
    let s = score.trim().to_lowercase();
    s.is_empty() || SCHEDULED_SEPARATORS.contains(&s.as_str()) || PLACEHOLDERS.contains(&s.as_str())
}
