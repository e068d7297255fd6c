use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a match as reported (or inferred) from upstream text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    #[default]
    Scheduled,
    Live,
    Finished,
    Postponed,
    Cancelled,
    Walkover,
    Interrupted,
    Retired,
    Awarded,
    Unknown,
}

impl MatchStatus {
    #[cfg(test)]
    pub const ALL: [MatchStatus; 10] = [
        MatchStatus::Scheduled,
        MatchStatus::Live,
        MatchStatus::Finished,
        MatchStatus::Postponed,
        MatchStatus::Cancelled,
        MatchStatus::Walkover,
        MatchStatus::Interrupted,
        MatchStatus::Retired,
        MatchStatus::Awarded,
        MatchStatus::Unknown,
    ];

    /// Play is underway or paused mid-match.
    pub fn is_active(self) -> bool {
        matches!(self, MatchStatus::Live | MatchStatus::Interrupted)
    }

    /// A result exists, however it was reached.
    pub fn is_completed(self) -> bool {
        matches!(
            self,
            MatchStatus::Finished | MatchStatus::Walkover | MatchStatus::Retired | MatchStatus::Awarded
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::Live => "live",
            MatchStatus::Finished => "finished",
            MatchStatus::Postponed => "postponed",
            MatchStatus::Cancelled => "cancelled",
            MatchStatus::Walkover => "walkover",
            MatchStatus::Interrupted => "interrupted",
            MatchStatus::Retired => "retired",
            MatchStatus::Awarded => "awarded",
            MatchStatus::Unknown => "unknown",
        }
    }

    /// Label used by the table and status-bar consumers.
    pub fn display_name(self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "Scheduled",
            MatchStatus::Live => "🔴 Live",
            MatchStatus::Finished => "Finished",
            MatchStatus::Postponed => "Postponed",
            MatchStatus::Cancelled => "Cancelled",
            MatchStatus::Walkover => "Walkover",
            MatchStatus::Interrupted => "Interrupted",
            MatchStatus::Retired => "Retired",
            MatchStatus::Awarded => "Awarded",
            MatchStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_and_completed_are_disjoint() {
        for status in MatchStatus::ALL {
            assert!(
                !(status.is_active() && status.is_completed()),
                "{status} is both active and completed"
            );
        }
    }

    #[test]
    fn test_status_predicates() {
        assert!(MatchStatus::Live.is_active());
        assert!(MatchStatus::Interrupted.is_active());
        assert!(MatchStatus::Finished.is_completed());
        assert!(MatchStatus::Walkover.is_completed());
        assert!(MatchStatus::Retired.is_completed());
        assert!(MatchStatus::Awarded.is_completed());
        assert!(!MatchStatus::Scheduled.is_active());
        assert!(!MatchStatus::Scheduled.is_completed());
        assert!(!MatchStatus::Postponed.is_completed());
    }

    #[test]
    fn test_display_names() {
        assert_eq!(MatchStatus::Live.display_name(), "🔴 Live");
        assert_eq!(MatchStatus::Finished.display_name(), "Finished");
        assert_eq!(MatchStatus::Scheduled.display_name(), "Scheduled");
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&MatchStatus::Walkover).unwrap();
        assert_eq!(json, "\"walkover\"");
        let back: MatchStatus = serde_json::from_str("\"interrupted\"").unwrap();
        assert_eq!(back, MatchStatus::Interrupted);
    }
}
