// crates/client/src/service.rs
//! Remote job service contract and wire types.
//!
//! The REST endpoints themselves are an external collaborator; the
//! trackers consume only this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use respond_types::{ProgressConfig, SubItemCompletion};

use crate::error::ClientError;

/// What the caller wants started. The variant decides which remote start
/// endpoint is used.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum StartPayload {
    /// One question answered as a single legacy job.
    Single {
        item_id: String,
        #[serde(skip_serializing_if = "Value::is_null", default)]
        input: Value,
    },
    /// Many items answered together under one master job.
    Batch {
        item_ids: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        stage_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        group_id: Option<String>,
    },
}

impl StartPayload {
    pub fn is_batch(&self) -> bool {
        matches!(self, Self::Batch { .. })
    }
}

/// Response from either start endpoint. `job_id` is optional on the wire
/// but its absence is a hard [`ClientError::Malformed`] for the caller.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartJobResponse {
    pub job_id: Option<String>,
    pub shard_key: Option<String>,
    pub sub_job_count: Option<u32>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub progress_config: Option<ProgressConfig>,
}

/// Response from the legacy full-status endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: String,
    pub progress: Option<u8>,
    pub steps_completed: Option<u32>,
    pub steps_total: Option<u32>,
    /// Completed results payload, present once the job finishes.
    pub results: Option<Value>,
}

/// Response from the realtime incremental-progress endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeResponse {
    pub status: String,
    pub progress: Option<u8>,
    /// Sub-items finished since the caller's watermark.
    #[serde(default)]
    pub recent_completions: Vec<SubItemCompletion>,
    /// False means this job does not support the realtime protocol.
    #[serde(default)]
    pub enhanced_available: bool,
}

/// One entry from the active-jobs listing for the authenticated principal.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveJobSummary {
    pub job_id: String,
    pub status: String,
    pub progress: Option<u8>,
    pub shard_key: Option<String>,
    pub sub_job_count: Option<u32>,
    pub sub_jobs_completed: Option<u32>,
    pub doc_id: Option<String>,
    pub description: Option<String>,
    /// Epoch ms the server recorded as the job's creation time.
    pub created_at: Option<i64>,
}

/// The external job backend, contract-only.
#[async_trait]
pub trait JobService: Send + Sync {
    /// Start a job. Dispatches to the single or batch endpoint by
    /// payload shape.
    async fn start_job(&self, payload: &StartPayload) -> Result<StartJobResponse, ClientError>;

    /// Legacy full-status poll. `shard_key` is forwarded when the job
    /// kind carries one.
    async fn poll_status(
        &self,
        job_id: &str,
        shard_key: Option<&str>,
    ) -> Result<StatusResponse, ClientError>;

    /// Realtime incremental poll since a watermark. Requires the shard
    /// key; callers must not invoke this without one.
    async fn poll_realtime(
        &self,
        job_id: &str,
        since: Option<i64>,
        shard_key: &str,
    ) -> Result<RealtimeResponse, ClientError>;

    /// Request cancellation of a job.
    async fn cancel(&self, job_id: &str, shard_key: Option<&str>) -> Result<(), ClientError>;

    /// All jobs currently active for the authenticated principal.
    async fn list_active(&self) -> Result<Vec<ActiveJobSummary>, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn payload_discrimination() {
        let single = StartPayload::Single {
            item_id: "q-1".into(),
            input: Value::Null,
        };
        let batch = StartPayload::Batch {
            item_ids: vec!["q-1".into(), "q-2".into()],
            stage_id: None,
            group_id: Some("g".into()),
        };
        assert!(!single.is_batch());
        assert!(batch.is_batch());
    }

    #[test]
    fn realtime_response_defaults() {
        let resp: RealtimeResponse = serde_json::from_str(r#"{"status":"RUNNING"}"#).unwrap();
        assert_eq!(resp.recent_completions.len(), 0);
        assert!(!resp.enhanced_available);
    }

    #[test]
    fn start_response_tolerates_missing_fields() {
        let resp: StartJobResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.job_id.is_none());
        assert!(resp.shard_key.is_none());
    }
}
