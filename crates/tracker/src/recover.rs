// crates/tracker/src/recover.rs
//! Remote reconciliation: merge the server's active-job listing into the
//! local job map.
//!
//! The listing is the authority on jobs this client never saw (started
//! from another tab or device); the local record is the authority on
//! anything it already tracks. A locally terminal record is never
//! reopened by a stale listing entry.

use tracing::{debug, info};

use respond_types::{is_master_job_id, JobMeta, JobRecord, JobStatus};

use crate::error::TrackerError;
use crate::tracker::{now_ms, JobTracker, TrackedJob};

impl JobTracker {
    /// Fetch the active-job listing and merge it into local tracking.
    ///
    /// Known jobs get their status/progress/counters topped up; unknown
    /// non-terminal jobs are reconstructed from the summary and start
    /// polling. Returns how many jobs were newly discovered. Signed-out
    /// callers get `Ok(0)` without a network call.
    pub async fn refresh_all_jobs(&self) -> Result<usize, TrackerError> {
        let inner = &self.inner;
        if !inner.credentials.is_authenticated() {
            debug!("not authenticated; skipping remote job refresh");
            return Ok(0);
        }

        let summaries = inner.service.list_active().await?;
        let now = now_ms();
        let mut discovered = 0usize;
        let mut resume = Vec::new();

        {
            let mut jobs = inner.write_jobs();
            for summary in summaries {
                let status = JobStatus::from_raw(&summary.status);

                if let Some(job) = jobs.get_mut(&summary.job_id) {
                    // Known job: top up from the summary without ever
                    // downgrading local terminal state or rewinding
                    // progress.
                    if !job.record.is_terminal() {
                        if status != JobStatus::NotApplicable {
                            job.record.status = status;
                        }
                        if let Some(p) = summary.progress {
                            // Routed through the synthetic state when
                            // present, or a later synthetic tick would
                            // rewind the displayed value.
                            let merged = match &mut job.synthetic {
                                Some(synth) => synth.observe_real(p.min(100)),
                                None => p.min(100),
                            };
                            job.record.progress = job.record.progress.max(merged);
                        }
                    }
                    if let JobMeta::Batch {
                        shard_key,
                        sub_jobs_total,
                        sub_jobs_completed,
                        ..
                    } = &mut job.record.meta
                    {
                        if shard_key.is_none() {
                            *shard_key = summary.shard_key.clone();
                        }
                        if *sub_jobs_total == 0 {
                            *sub_jobs_total = summary.sub_job_count.unwrap_or(0);
                        }
                        if let Some(done) = summary.sub_jobs_completed {
                            *sub_jobs_completed = (*sub_jobs_completed).max(done);
                        }
                    }
                    inner.writer.enqueue(job.record.clone());
                    if !job.record.is_terminal() && !job.has_active_timer() {
                        resume.push(job.record.job_id.clone());
                    }
                    continue;
                }

                // Unknown and already finished: nothing worth tracking.
                if status.is_terminal() {
                    continue;
                }

                let record = reconstruct_record(
                    &summary,
                    status,
                    inner.config.default_shard_key.as_deref(),
                    now,
                );
                debug!(job_id = %record.job_id, "discovered remote job");
                inner.writer.enqueue(record.clone());
                resume.push(record.job_id.clone());
                jobs.insert(record.job_id.clone(), TrackedJob::new(record, now));
                discovered += 1;
            }
        }
        inner.writer.flush_now();

        for job_id in &resume {
            inner.spawn_polling(job_id);
        }
        info!(
            discovered,
            resumed = resume.len(),
            "remote job reconciliation complete"
        );
        Ok(discovered)
    }
}

/// Rebuild a tracking record for a job this client has never seen. The
/// master-id prefix decides the kind; a missing shard key falls back to
/// the configured session default.
fn reconstruct_record(
    summary: &respond_client::ActiveJobSummary,
    status: JobStatus,
    default_shard_key: Option<&str>,
    now: i64,
) -> JobRecord {
    let created_at = summary.created_at.unwrap_or(now);
    let meta = if is_master_job_id(&summary.job_id) {
        JobMeta::Batch {
            shard_key: summary
                .shard_key
                .clone()
                .or_else(|| default_shard_key.map(str::to_string)),
            sub_jobs_total: summary.sub_job_count.unwrap_or(0),
            sub_jobs_completed: summary.sub_jobs_completed.unwrap_or(0),
            stage_id: None,
            group_id: None,
            created_at,
        }
    } else {
        JobMeta::Legacy { created_at }
    };

    let status = if status == JobStatus::NotApplicable {
        JobStatus::Queued
    } else {
        status
    };
    let mut record = JobRecord::new(summary.job_id.clone(), status, meta, created_at);
    record.progress = summary.progress.unwrap_or(0).min(100);
    record.doc_id = summary.doc_id.clone();
    record.description = summary.description.clone();
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use respond_client::ActiveJobSummary;
    use respond_types::JobKind;

    fn summary(job_id: &str) -> ActiveJobSummary {
        ActiveJobSummary {
            job_id: job_id.into(),
            status: "RUNNING".into(),
            progress: Some(40),
            shard_key: None,
            sub_job_count: Some(4),
            sub_jobs_completed: Some(1),
            doc_id: Some("doc-3".into()),
            description: None,
            created_at: Some(1_000),
        }
    }

    #[test]
    fn master_ids_reconstruct_as_batch() {
        let record = reconstruct_record(&summary("master_x"), JobStatus::Running, Some("t-1"), 5_000);
        assert_eq!(record.kind(), JobKind::Batch);
        assert_eq!(record.meta.shard_key(), Some("t-1"));
        assert_eq!(record.progress, 40);
        assert_eq!(record.start_time, 1_000);
    }

    #[test]
    fn plain_ids_reconstruct_as_legacy() {
        let record = reconstruct_record(&summary("j-9"), JobStatus::Queued, None, 5_000);
        assert_eq!(record.kind(), JobKind::Legacy);
        assert_eq!(record.meta.shard_key(), None);
    }

    #[test]
    fn summary_shard_key_beats_default() {
        let mut s = summary("master_x");
        s.shard_key = Some("from-server".into());
        let record = reconstruct_record(&s, JobStatus::Running, Some("fallback"), 5_000);
        assert_eq!(record.meta.shard_key(), Some("from-server"));
    }

    #[test]
    fn missing_created_at_falls_back_to_now() {
        let mut s = summary("j-9");
        s.created_at = None;
        let record = reconstruct_record(&s, JobStatus::Running, None, 7_777);
        assert_eq!(record.start_time, 7_777);
        assert_eq!(record.meta.created_at(), 7_777);
    }
}
