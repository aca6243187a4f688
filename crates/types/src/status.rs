// crates/types/src/status.rs
//! Job status enum and normalization of raw server status strings.

use serde::{Deserialize, Serialize};

/// Status of a tracked job.
///
/// `NotApplicable` is a sentinel used by the document-level aggregate
/// (no meaningful status); a job's own record never holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
    Stopped,
    NotApplicable,
}

impl JobStatus {
    /// Terminal statuses never transition again and are never polled.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Stopped
        )
    }

    /// Normalize a raw status string from the remote service.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    /// Unknown non-empty strings map to `Running` (the job is doing
    /// *something* we don't have a name for), except strings containing
    /// "error" which map to `Failed`. Empty input maps to `NotApplicable`.
    pub fn from_raw(raw: &str) -> Self {
        let s = raw.trim().to_ascii_lowercase();
        match s.as_str() {
            "" => Self::NotApplicable,
            "queued" | "pending" => Self::Queued,
            "running" | "processing" | "in_progress" => Self::Running,
            "completed" | "complete" | "done" | "success" => Self::Completed,
            "failed" | "failure" => Self::Failed,
            "cancelled" | "canceled" => Self::Cancelled,
            "stopped" => Self::Stopped,
            _ if s.contains("error") => Self::Failed,
            _ => Self::Running,
        }
    }

    /// Wire spelling used by the remote service and persisted records.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Stopped => "STOPPED",
            Self::NotApplicable => "NOT_APPLICABLE",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
