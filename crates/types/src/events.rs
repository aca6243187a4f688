// crates/types/src/events.rs
//! Change notifications emitted by the trackers.
//!
//! Consumers (UI listeners, toast renderers) subscribe to these over a
//! broadcast channel; the trackers never reach into UI state directly.

use serde::{Deserialize, Serialize};

use crate::job::{JobId, JobRecord};

/// What happened to a tracked job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobEventType {
    TrackingStarted,
    ProgressUpdate,
    JobCompleted,
    /// The job left active tracking (delayed-cleanup grace window ended).
    JobCleanup,
    /// Credential refresh failed; user action required.
    AuthFailed,
    /// Backend misconfiguration (5xx / realtime unsupported); not retryable.
    ConfigError,
}

/// Per-job change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub job_id: JobId,
    pub event_type: JobEventType,
    pub job: JobRecord,
    /// Epoch ms when the event was emitted.
    pub timestamp: i64,
}

/// A discrete sub-item the realtime protocol reported as finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubItemCompletion {
    /// Id of the finished sub-item.
    pub item_id: String,
    /// Document item the sub-item belongs to, when the server links one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_item_id: Option<String>,
    /// Epoch ms the server recorded for the completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

/// Emitted once per sub-item completion, separate from [`JobEvent`] so a
/// grid cell can react without re-rendering the whole job row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEvent {
    pub job_id: JobId,
    pub completion: SubItemCompletion,
    pub timestamp: i64,
}
