// crates/tracker/src/lib.rs
//! Client-side tracking and polling of long-running answer-generation
//! jobs.
//!
//! [`JobTracker`] owns the in-memory job map and one polling task per
//! job. Poll cadence is chosen per job by a [`strategy`] table: legacy
//! and pipeline jobs use fixed intervals against the full-status
//! endpoint, batch/master jobs use per-status adaptive intervals against
//! the realtime incremental-progress endpoint, with synthetic progress
//! interpolation and exponential error backoff. State is persisted to a
//! durable store (debounced) so jobs survive reloads, and reconciled
//! with the remote service's active-job listing across sessions.

pub mod aggregate;
pub mod backoff;
pub mod events;
pub mod strategy;
pub mod synthetic;
pub mod tracker;

mod error;
mod recover;
mod tick;

pub use aggregate::aggregate_status;
pub use error::TrackerError;
pub use events::JobEvents;
pub use tracker::{CompletedResultsHook, JobTracker, TrackerConfig};
