// crates/tracker/src/strategy.rs
//! Poll-cadence selection.
//!
//! Which strategy a job uses is a fixed table keyed by job kind —
//! batch/master jobs get the adaptive realtime path, everything else
//! polls the legacy status endpoint at a fixed rate.

use std::time::Duration;

use respond_types::{JobKind, JobStatus};

/// How a job's polling cadence is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStrategy {
    /// Fixed interval per job kind, legacy full-status endpoint.
    FixedInterval,
    /// Per-status variable interval, realtime incremental endpoint.
    Adaptive,
}

/// Strategy table. Batch jobs are the "enhanced" kind.
pub fn strategy_for(kind: JobKind) -> PollStrategy {
    match kind {
        JobKind::Batch => PollStrategy::Adaptive,
        JobKind::Legacy | JobKind::Pipeline => PollStrategy::FixedInterval,
    }
}

/// Fixed-interval table per job kind.
pub fn fixed_interval(kind: JobKind) -> Duration {
    match kind {
        JobKind::Batch => Duration::from_secs(10),
        JobKind::Pipeline => Duration::from_secs(8),
        JobKind::Legacy => Duration::from_secs(5),
    }
}

/// Adaptive per-status table. `active_subitems` collapses the interval
/// to 1 s while the server is actively finishing sub-items.
pub fn adaptive_interval(status: JobStatus, active_subitems: bool) -> Duration {
    if active_subitems && !status.is_terminal() {
        return Duration::from_secs(1);
    }
    match status {
        JobStatus::Queued => Duration::from_secs(10),
        JobStatus::Running | JobStatus::NotApplicable => Duration::from_secs(30),
        // Trailing cleanup checks after a terminal report.
        _ => Duration::from_secs(60),
    }
}
