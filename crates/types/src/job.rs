// crates/types/src/job.rs
//! The tracked job record and its kind-specific metadata.

use serde::{Deserialize, Serialize};

use crate::progress::ProgressConfig;
use crate::status::JobStatus;

/// Server-issued job identifier.
pub type JobId = String;

/// Prefix marking a master job (a batch of sub-jobs tracked as one id).
pub const MASTER_JOB_PREFIX: &str = "master_";

/// Whether an id names a master/batch job.
pub fn is_master_job_id(id: &str) -> bool {
    id.starts_with(MASTER_JOB_PREFIX)
}

/// Which flavor of server-side work a job represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Single-question answer job (legacy status endpoint only).
    Legacy,
    /// Master job covering many sub-items, supports the realtime protocol.
    Batch,
    /// Long-running external pipeline run.
    Pipeline,
}

/// Kind-specific metadata. Each variant carries only the fields its kind
/// actually has, so call sites never probe for absent fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobMeta {
    Legacy {
        /// Epoch ms when the job was created server-side.
        created_at: i64,
    },
    Batch {
        /// Tenant shard the remote service needs to locate this job.
        /// Required before any realtime poll; its absence there is a
        /// hard error.
        shard_key: Option<String>,
        sub_jobs_total: u32,
        sub_jobs_completed: u32,
        /// Stage/group linkage within the questionnaire, when known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stage_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group_id: Option<String>,
        created_at: i64,
    },
    Pipeline {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pipeline_id: Option<String>,
        created_at: i64,
    },
}

impl JobMeta {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Legacy { .. } => JobKind::Legacy,
            Self::Batch { .. } => JobKind::Batch,
            Self::Pipeline { .. } => JobKind::Pipeline,
        }
    }

    pub fn created_at(&self) -> i64 {
        match self {
            Self::Legacy { created_at }
            | Self::Batch { created_at, .. }
            | Self::Pipeline { created_at, .. } => *created_at,
        }
    }

    /// Tenant shard key, present only on batch jobs that carry one.
    pub fn shard_key(&self) -> Option<&str> {
        match self {
            Self::Batch { shard_key, .. } => shard_key.as_deref(),
            _ => None,
        }
    }
}

/// Why polling for a job was stopped without the job itself finishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    AuthExpired,
    ServerError,
    TooManyFailures,
}

/// Recorded when polling halts for a non-terminal job so a later session
/// can surface "paused" state and offer manual resumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollingStop {
    pub reason: StopReason,
    /// Epoch ms when polling stopped.
    pub at: i64,
}

/// The central tracked entity. One per server-issued job id; persisted to
/// the durable store on every mutation (debounced).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Real progress, 0–100. Monotonically non-decreasing while the
    /// status is non-terminal.
    pub progress: u8,
    /// Epoch ms when tracking started.
    pub start_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    pub meta: JobMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Human-readable failure message, set when status is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Server-supplied hints for synthetic progress interpolation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_config: Option<ProgressConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polling_stop: Option<PollingStop>,
}

impl JobRecord {
    /// A fresh record for a just-started job.
    pub fn new(job_id: impl Into<JobId>, status: JobStatus, meta: JobMeta, now: i64) -> Self {
        Self {
            job_id: job_id.into(),
            status,
            progress: 0,
            start_time: now,
            end_time: None,
            meta,
            doc_id: None,
            doc_item_id: None,
            description: None,
            error: None,
            progress_config: None,
            polling_stop: None,
        }
    }

    pub fn kind(&self) -> JobKind {
        self.meta.kind()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
