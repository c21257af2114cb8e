//! Lifecycle states for the three entity families.
//!
//! Stored as lowercase TEXT columns; rows carry the raw string and the
//! enums exist for transition logic at the seams.

use serde::{Deserialize, Serialize};

/// Resume / job-description lifecycle: queued → processing → ready | error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Queued,
    Processing,
    Ready,
    Error,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Queued => "queued",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Ready => "ready",
            DocumentStatus::Error => "error",
        }
    }

    /// Terminal success. Redelivered queue jobs must not demote it.
    pub fn is_ready(s: &str) -> bool {
        s == DocumentStatus::Ready.as_str()
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Match job lifecycle: queued → running → completed | failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Queued => "queued",
            MatchStatus::Running => "running",
            MatchStatus::Completed => "completed",
            MatchStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&DocumentStatus::Processing).unwrap(),
            "\"processing\""
        );
        assert_eq!(DocumentStatus::Error.to_string(), "error");
    }

    #[test]
    fn test_match_status_round_trip() {
        let s: MatchStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(s, MatchStatus::Completed);
        assert_eq!(s.as_str(), "completed");
    }

    #[test]
    fn test_ready_is_terminal() {
        assert!(DocumentStatus::is_ready("ready"));
        assert!(!DocumentStatus::is_ready("processing"));
    }
}
