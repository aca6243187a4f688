// crates/store/src/store.rs
//! Typed job-record view over a [`KeyValueBackend`].

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use respond_types::JobRecord;

use crate::backend::{BackendError, KeyValueBackend};

const KEY_PREFIX: &str = "respond.job.";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("corrupt job record for {job_id}: {message}")]
    CorruptRecord { job_id: String, message: String },
}

/// Durable map of job id → [`JobRecord`].
#[derive(Clone)]
pub struct JobStore {
    backend: Arc<dyn KeyValueBackend>,
}

impl JobStore {
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self { backend }
    }

    fn key(job_id: &str) -> String {
        format!("{KEY_PREFIX}{job_id}")
    }

    pub fn save_job(&self, record: &JobRecord) -> Result<(), StoreError> {
        let body = serde_json::to_string(record).map_err(|e| StoreError::CorruptRecord {
            job_id: record.job_id.clone(),
            message: e.to_string(),
        })?;
        self.backend.set(&Self::key(&record.job_id), &body)?;
        Ok(())
    }

    pub fn load_job(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError> {
        let Some(body) = self.backend.get(&Self::key(job_id))? else {
            return Ok(None);
        };
        let record = serde_json::from_str(&body).map_err(|e| StoreError::CorruptRecord {
            job_id: job_id.to_string(),
            message: e.to_string(),
        })?;
        Ok(Some(record))
    }

    pub fn remove_job(&self, job_id: &str) -> Result<(), StoreError> {
        self.backend.remove(&Self::key(job_id))?;
        Ok(())
    }

    /// Every persisted record. Records that fail to parse are skipped
    /// (and logged) rather than failing the whole load; one bad entry
    /// must not block restoration of the rest.
    pub fn all_jobs(&self) -> Result<Vec<JobRecord>, StoreError> {
        let mut out = Vec::new();
        for key in self.backend.keys()? {
            let Some(job_id) = key.strip_prefix(KEY_PREFIX) else {
                continue;
            };
            match self.load_job(job_id) {
                Ok(Some(record)) => out.push(record),
                Ok(None) => {}
                Err(e) => warn!(job_id, "skipping unreadable job record: {e}"),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use respond_types::{JobMeta, JobStatus};

    fn store() -> JobStore {
        JobStore::new(Arc::new(MemoryBackend::new()))
    }

    fn record(id: &str) -> JobRecord {
        JobRecord::new(id, JobStatus::Running, JobMeta::Legacy { created_at: 1 }, 2)
    }

    #[test]
    fn save_load_remove_round_trip() {
        let store = store();
        let rec = record("j1");
        store.save_job(&rec).unwrap();
        assert_eq!(store.load_job("j1").unwrap(), Some(rec));

        store.remove_job("j1").unwrap();
        assert_eq!(store.load_job("j1").unwrap(), None);
    }

    #[test]
    fn all_jobs_lists_only_job_keys() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set("unrelated.key", "junk").unwrap();
        let store = JobStore::new(backend);

        store.save_job(&record("a")).unwrap();
        store.save_job(&record("b")).unwrap();

        let mut ids: Vec<_> = store
            .all_jobs()
            .unwrap()
            .into_iter()
            .map(|r| r.job_id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn corrupt_record_is_skipped_in_bulk_load() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set("respond.job.bad", "not json").unwrap();
        let store = JobStore::new(backend);
        store.save_job(&record("good")).unwrap();

        let jobs = store.all_jobs().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_id, "good");
    }

    #[test]
    fn load_missing_is_none() {
        assert_eq!(store().load_job("nope").unwrap(), None);
    }
}
