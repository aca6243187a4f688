// crates/store/src/lib.rs
//! Durable job persistence: a size- and age-bounded key-value map of
//! job records, used for cross-reload and cross-session recovery.
//!
//! The store itself makes no transactional claims. Two concurrent
//! writers (two tabs, two processes) are last-write-wins; this is
//! acceptable because polling is an idempotent read of authoritative
//! server state.

pub mod backend;
pub mod coalesce;
pub mod retention;
mod store;

pub use backend::{BackendError, FileBackend, KeyValueBackend, MemoryBackend};
pub use coalesce::CoalescingWriter;
pub use retention::{LogoutOutcome, RetentionOutcome, RetentionPolicy, TIMEOUT_ERROR_MESSAGE};
pub use store::{JobStore, StoreError};
