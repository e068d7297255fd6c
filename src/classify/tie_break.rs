use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

pub const DEFAULT_TIE_BREAK_KEYWORDS: &[&str] = &[
    "match tie break",
    "match tie-break",
    "super tiebreak",
    "first to 10",
];

/// Smallest bracketed sub-score that counts as a decisive tie-break.
const BRACKET_THRESHOLD: u32 = 7;

static BRACKET_SCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)-(\d+)\]").unwrap_or_else(|_| unreachable!()));

/// Which tie-break rule fired, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TieBreakSignal {
    None,
    /// Status text contains a configured keyword
    StatusKeyword(String),
    /// Score contains a bracketed sub-score such as `[10-8]`
    ScoreBracket(u32, u32),
    /// Status text mentions "tie" and "break" separately
    LooseStatus,
}

impl TieBreakSignal {
    pub fn is_tie_break(&self) -> bool {
        !matches!(self, TieBreakSignal::None)
    }

    /// Stable tag describing the rule, e.g. `status_match_tie_break`.
    pub fn method(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TieBreakSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TieBreakSignal::None => f.write_str("none"),
            TieBreakSignal::StatusKeyword(kw) => write!(f, "status_{}", kw.replace(' ', "_")),
            TieBreakSignal::ScoreBracket(h, a) => write!(f, "score_bracket_{h}_{a}"),
            TieBreakSignal::LooseStatus => f.write_str("status_tie_break_loose"),
        }
    }
}

/// Flags a decisive tie-break from status text and score.
#[derive(Debug, Clone)]
pub struct TieBreakDetector {
    keywords: Vec<String>,
}

impl Default for TieBreakDetector {
    fn default() -> Self {
        TieBreakDetector::new(DEFAULT_TIE_BREAK_KEYWORDS.iter().copied())
    }
}

impl TieBreakDetector {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        TieBreakDetector {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn detect(&self, status_text: Option<&str>, score: Option<&str>) -> TieBreakSignal {
        let status = status_text.unwrap_or_default().to_lowercase();

        if let Some(kw) = self.keywords.iter().find(|kw| status.contains(kw.as_str())) {
            return TieBreakSignal::StatusKeyword(kw.clone());
        }

        if let Some((h, a)) = score.and_then(decisive_bracket) {
            return TieBreakSignal::ScoreBracket(h, a);
        }

        if status.contains("tie") && status.contains("break") {
            return TieBreakSignal::LooseStatus;
        }

        TieBreakSignal::None
    }
}

fn decisive_bracket(score: &str) -> Option<(u32, u32)> {
    BRACKET_SCORE.captures_iter(score).find_map(|caps| {
        let home: u32 = caps.get(1)?.as_str().parse().ok()?;
        let away: u32 = caps.get(2)?.as_str().parse().ok()?;
        (home >= BRACKET_THRESHOLD || away >= BRACKET_THRESHOLD).then_some((home, away))
    })
}
