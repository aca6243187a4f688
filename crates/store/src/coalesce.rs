// crates/store/src/coalesce.rs
//! Write-coalescing queue in front of the durable store.
//!
//! Polling mutates records every few seconds across many jobs; writing
//! each mutation through would hammer the backend. Bursts within the
//! debounce window collapse into one flush. Policy-critical paths
//! (cleanup, logout) bypass the window via [`CoalescingWriter::flush_now`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::warn;

use respond_types::JobRecord;

use crate::store::JobStore;

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

struct Inner {
    store: JobStore,
    delay: Duration,
    pending: Mutex<HashMap<String, JobRecord>>,
    flush_scheduled: AtomicBool,
}

impl Inner {
    fn flush(&self) {
        let drained: Vec<JobRecord> = {
            let mut pending = self
                .pending
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            pending.drain().map(|(_, record)| record).collect()
        };
        for record in drained {
            if let Err(e) = self.store.save_job(&record) {
                warn!(job_id = %record.job_id, "debounced save failed: {e}");
            }
        }
    }
}

/// Debounced writer over a [`JobStore`]. Cheap to clone; clones share
/// the same buffer.
#[derive(Clone)]
pub struct CoalescingWriter {
    inner: Arc<Inner>,
}

impl CoalescingWriter {
    pub fn new(store: JobStore) -> Self {
        Self::with_delay(store, DEFAULT_DEBOUNCE)
    }

    pub fn with_delay(store: JobStore, delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                delay,
                pending: Mutex::new(HashMap::new()),
                flush_scheduled: AtomicBool::new(false),
            }),
        }
    }

    /// Queue a record for writing. The latest record per job id wins
    /// within one window. Must be called from within a tokio runtime.
    pub fn enqueue(&self, record: JobRecord) {
        {
            let mut pending = self
                .inner
                .pending
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            pending.insert(record.job_id.clone(), record);
        }

        if !self.inner.flush_scheduled.swap(true, Ordering::SeqCst) {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                tokio::time::sleep(inner.delay).await;
                // Clear the flag before draining so an enqueue racing with
                // this flush schedules a fresh window for itself.
                inner.flush_scheduled.store(false, Ordering::SeqCst);
                inner.flush();
            });
        }
    }

    /// Write everything buffered right now, synchronously.
    pub fn flush_now(&self) {
        self.inner.flush();
    }

    /// Remove a job from the durable store immediately, dropping any
    /// buffered write for it.
    pub fn remove_now(&self, job_id: &str) {
        {
            let mut pending = self
                .inner
                .pending
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            pending.remove(job_id);
        }
        if let Err(e) = self.inner.store.remove_job(job_id) {
            warn!(job_id, "remove failed: {e}");
        }
    }
}
