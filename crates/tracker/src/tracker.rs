// crates/tracker/src/tracker.rs
//! The job tracker: in-memory job map, per-job polling tasks, lifecycle.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use respond_client::{ClientError, CredentialProvider, JobService, StartPayload};
use respond_store::{CoalescingWriter, JobStore, RetentionPolicy};
use respond_types::{
    JobEventType, JobId, JobKind, JobMeta, JobRecord, JobStatus, PollingStop, StopReason,
};

use crate::aggregate::aggregate_status;
use crate::backoff::ErrorTracking;
use crate::error::TrackerError;
use crate::events::JobEvents;
use crate::strategy::{adaptive_interval, fixed_interval, strategy_for, PollStrategy};
use crate::synthetic::SyntheticProgress;
use crate::tick::TickOutcome;

/// Hook invoked when a batch job reaches COMPLETED, so the application
/// can fetch and apply the finished results. External collaborator; the
/// tracker only calls it.
pub type CompletedResultsHook = Arc<dyn Fn(&JobRecord) + Send + Sync>;

/// Tracker tuning. Defaults match product behavior.
#[derive(Clone)]
pub struct TrackerConfig {
    pub retention: RetentionPolicy,
    /// How long a terminal job stays in active tracking before cleanup.
    pub cleanup_grace: Duration,
    /// Debounce window for durable-store writes.
    pub write_debounce: Duration,
    /// Shard key applied to remotely discovered jobs whose summaries
    /// omit one (derived from session context by the application).
    pub default_shard_key: Option<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            retention: RetentionPolicy::default(),
            cleanup_grace: Duration::from_secs(5),
            write_debounce: Duration::from_millis(500),
            default_shard_key: None,
        }
    }
}

/// In-memory tracking entry: the persisted record plus transient state
/// that never leaves the session (timer handle, synthetic progress,
/// error streak, realtime watermark).
pub(crate) struct TrackedJob {
    pub record: JobRecord,
    pub poll: Option<CancellationToken>,
    pub synthetic: Option<SyntheticProgress>,
    pub errors: ErrorTracking,
    /// Since-timestamp for the next realtime poll.
    pub watermark: Option<i64>,
    /// Last realtime response reported sub-items actively finishing.
    pub active_subitems: bool,
}

impl TrackedJob {
    pub(crate) fn new(record: JobRecord, now: i64) -> Self {
        let synthetic = match record.kind() {
            JobKind::Batch if !record.is_terminal() => {
                let mut synth =
                    SyntheticProgress::new(record.progress_config.unwrap_or_default(), now);
                // Restored and remotely discovered records carry earned
                // progress; the interpolation must start from that floor,
                // not from a fresh startup ramp.
                synth.observe_real(record.progress);
                Some(synth)
            }
            _ => None,
        };
        Self {
            record,
            poll: None,
            synthetic,
            errors: ErrorTracking::new(),
            watermark: None,
            active_subitems: false,
        }
    }

    pub(crate) fn has_active_timer(&self) -> bool {
        self.poll.as_ref().is_some_and(|t| !t.is_cancelled())
    }
}

pub(crate) struct TrackerInner {
    pub service: Arc<dyn JobService>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub store: JobStore,
    pub writer: CoalescingWriter,
    pub events: JobEvents,
    pub jobs: RwLock<HashMap<JobId, TrackedJob>>,
    pub config: TrackerConfig,
    pub completed_hook: Option<CompletedResultsHook>,
}

/// Tracks long-running answer-generation jobs for one session context.
///
/// One instance per page/session owns the job map and the durable store
/// exclusively; all mutation goes through its methods.
pub struct JobTracker {
    pub(crate) inner: Arc<TrackerInner>,
}

impl JobTracker {
    pub fn new(
        service: Arc<dyn JobService>,
        credentials: Arc<dyn CredentialProvider>,
        store: JobStore,
        config: TrackerConfig,
    ) -> Self {
        let writer = CoalescingWriter::with_delay(store.clone(), config.write_debounce);
        Self {
            inner: Arc::new(TrackerInner {
                service,
                credentials,
                store,
                writer,
                events: JobEvents::new(),
                jobs: RwLock::new(HashMap::new()),
                config,
                completed_hook: None,
            }),
        }
    }

    /// Install the completed-results hook. Must be called before any job
    /// is started or restored.
    pub fn with_completed_results_hook(mut self, hook: CompletedResultsHook) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.completed_hook = Some(hook),
            None => warn!("completed-results hook installed after tracker was shared; ignored"),
        }
        self
    }

    /// Event access for UI listeners.
    pub fn events(&self) -> &JobEvents {
        &self.inner.events
    }

    /// Restore persisted jobs, apply retention, resume polling, then
    /// reconcile with the remote service's active-job listing. Called
    /// once after construction. Skips everything when signed out.
    pub async fn initialize(&self) -> Result<(), TrackerError> {
        if !self.inner.credentials.is_authenticated() {
            debug!("not authenticated; skipping job restoration");
            return Ok(());
        }
        self.restore_unfinished_jobs()?;
        // Remote reconciliation is best-effort at startup; a dead network
        // must not prevent locally known jobs from resuming.
        if let Err(e) = self.refresh_all_jobs().await {
            warn!("remote job reconciliation failed: {e}");
        }
        Ok(())
    }

    /// Start a job and begin tracking it. The payload shape picks the
    /// remote endpoint; the response must carry a job id.
    pub async fn start_job(
        &self,
        payload: StartPayload,
        doc_id: Option<String>,
        doc_item_id: Option<String>,
    ) -> Result<JobRecord, TrackerError> {
        if !self.inner.credentials.is_authenticated() {
            return Err(ClientError::NotAuthenticated.into());
        }

        let resp = self.inner.service.start_job(&payload).await?;
        let job_id = resp.job_id.ok_or(TrackerError::MissingJobId)?;
        let now = now_ms();

        let status = resp
            .status
            .as_deref()
            .map(JobStatus::from_raw)
            .filter(|s| !s.is_terminal() && *s != JobStatus::NotApplicable)
            .unwrap_or(JobStatus::Queued);

        let meta = match &payload {
            StartPayload::Batch {
                item_ids,
                stage_id,
                group_id,
            } => JobMeta::Batch {
                shard_key: resp.shard_key,
                sub_jobs_total: resp.sub_job_count.unwrap_or(item_ids.len() as u32),
                sub_jobs_completed: 0,
                stage_id: stage_id.clone(),
                group_id: group_id.clone(),
                created_at: now,
            },
            StartPayload::Single { .. } => JobMeta::Legacy { created_at: now },
        };

        let mut record = JobRecord::new(job_id.clone(), status, meta, now);
        record.doc_id = doc_id;
        record.doc_item_id = doc_item_id;
        record.description = resp.description;
        record.progress_config = resp.progress_config;

        info!(job_id = %record.job_id, kind = ?record.kind(), "job started");

        {
            let mut jobs = self.inner.write_jobs();
            // Re-registering an id replaces the old entry; its timer is
            // cancelled so exactly one poll loop exists per id.
            if let Some(previous) = jobs.insert(job_id.clone(), TrackedJob::new(record.clone(), now))
            {
                if let Some(token) = previous.poll {
                    token.cancel();
                }
            }
        }
        self.inner.writer.enqueue(record.clone());
        self.inner.events.emit(JobEventType::TrackingStarted, &record, now);
        self.inner.spawn_polling(&job_id);

        Ok(record)
    }

    /// Cancel a job remotely and locally. No-op for ids not tracked here
    /// or already terminal.
    pub async fn cancel_job(&self, job_id: &str) -> Result<(), TrackerError> {
        let shard = {
            let jobs = self.inner.read_jobs();
            match jobs.get(job_id) {
                Some(job) if !job.record.is_terminal() => {
                    job.record.meta.shard_key().map(str::to_string)
                }
                _ => return Ok(()),
            }
        };

        self.inner.service.cancel(job_id, shard.as_deref()).await?;

        // The timer is cleared only after the remote call resolves.
        let now = now_ms();
        let record = {
            let mut jobs = self.inner.write_jobs();
            let Some(job) = jobs.get_mut(job_id) else {
                return Ok(());
            };
            if let Some(token) = job.poll.take() {
                token.cancel();
            }
            // A poll tick may have finished the job while the remote
            // cancel was in flight; its terminal handling already ran.
            if job.record.is_terminal() {
                return Ok(());
            }
            job.record.status = JobStatus::Cancelled;
            job.record.end_time = Some(now);
            job.record.clone()
        };

        self.inner.writer.enqueue(record.clone());
        self.inner.writer.flush_now();
        self.inner.events.emit(JobEventType::JobCompleted, &record, now);
        self.inner.schedule_cleanup(job_id);
        info!(job_id, "job cancelled");
        Ok(())
    }

    /// Load persisted records, apply the retention policy, and resume
    /// polling for surviving non-terminal jobs.
    pub fn restore_unfinished_jobs(&self) -> Result<(), TrackerError> {
        let now = now_ms();
        let persisted = self.inner.store.all_jobs()?;
        let outcome = self.inner.config.retention.apply(persisted, now);

        for job_id in &outcome.removed {
            self.inner.writer.remove_now(job_id);
        }
        for job_id in &outcome.force_failed {
            warn!(job_id, "job exceeded maximum execution time; forced to FAILED");
        }

        let mut resume = Vec::new();
        {
            let mut jobs = self.inner.write_jobs();
            for record in outcome.kept {
                if record.status == JobStatus::Running || record.status == JobStatus::Queued {
                    resume.push(record.job_id.clone());
                }
                self.inner.writer.enqueue(record.clone());
                jobs.insert(record.job_id.clone(), TrackedJob::new(record, now));
            }
        }
        self.inner.writer.flush_now();

        for job_id in &resume {
            self.inner.spawn_polling(job_id);
        }
        info!(
            restored = self.inner.read_jobs().len(),
            resumed = resume.len(),
            "restored persisted jobs"
        );
        Ok(())
    }

    /// Aggressive eviction on sign-out: every non-terminal job is
    /// dropped (it cannot continue without credentials), terminal jobs
    /// older than the grace window go too, and all polling stops.
    pub fn handle_user_logout(&self) {
        let now = now_ms();
        let records: Vec<JobRecord> = {
            let mut jobs = self.inner.write_jobs();
            for job in jobs.values_mut() {
                if let Some(token) = job.poll.take() {
                    token.cancel();
                }
            }
            jobs.values().map(|j| j.record.clone()).collect()
        };

        // Union of in-memory and persisted records, in-memory wins.
        let mut by_id: HashMap<String, JobRecord> = HashMap::new();
        if let Ok(persisted) = self.inner.store.all_jobs() {
            for record in persisted {
                by_id.insert(record.job_id.clone(), record);
            }
        }
        for record in records {
            by_id.insert(record.job_id.clone(), record);
        }

        let outcome = self
            .inner
            .config
            .retention
            .apply_logout(by_id.into_values().collect(), now);

        {
            let mut jobs = self.inner.write_jobs();
            for job_id in &outcome.removed {
                jobs.remove(job_id);
                self.inner.writer.remove_now(job_id);
            }
        }
        self.inner.writer.flush_now();
        info!(evicted = outcome.removed.len(), "logout eviction complete");
    }

    // -- Reads ----------------------------------------------------------------

    pub fn get_all_jobs(&self) -> Vec<JobRecord> {
        self.inner
            .read_jobs()
            .values()
            .map(|j| j.record.clone())
            .collect()
    }

    pub fn get_job_details(&self, job_id: &str) -> Option<JobRecord> {
        self.inner.read_jobs().get(job_id).map(|j| j.record.clone())
    }

    pub fn get_jobs_for_document(&self, doc_id: &str) -> Vec<JobRecord> {
        self.inner
            .read_jobs()
            .values()
            .filter(|j| j.record.doc_id.as_deref() == Some(doc_id))
            .map(|j| j.record.clone())
            .collect()
    }

    /// Aggregate status over every job associated with a document plus
    /// caller-supplied extra statuses (e.g. sub-item grid rows).
    pub fn document_aggregate_status(&self, doc_id: &str, extra: &[String]) -> JobStatus {
        let mut statuses: Vec<String> = self
            .get_jobs_for_document(doc_id)
            .into_iter()
            .map(|r| r.status.as_str().to_string())
            .collect();
        statuses.extend(extra.iter().cloned());
        aggregate_status(&statuses)
    }
}

impl TrackerInner {
    pub(crate) fn read_jobs(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<JobId, TrackedJob>> {
        self.jobs
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub(crate) fn write_jobs(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<JobId, TrackedJob>> {
        self.jobs
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Spawn the polling loop for a job, replacing (and cancelling) any
    /// existing one so exactly one timer runs per id.
    ///
    /// The loop re-evaluates the interval before each sleep, which gives
    /// the adaptive reschedule-on-change behavior without an explicit
    /// teardown: a new per-status interval simply applies from the next
    /// tick.
    pub(crate) fn spawn_polling(self: &Arc<Self>, job_id: &str) {
        let token = CancellationToken::new();
        {
            let mut jobs = self.write_jobs();
            let Some(job) = jobs.get_mut(job_id) else {
                return;
            };
            if job.record.is_terminal() {
                return;
            }
            if let Some(previous) = job.poll.replace(token.clone()) {
                previous.cancel();
            }
        }

        let inner = Arc::clone(self);
        let job_id = job_id.to_string();
        tokio::spawn(async move {
            loop {
                let Some(interval) = inner.next_interval(&job_id) else {
                    break;
                };
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                match inner.poll_once(&job_id).await {
                    TickOutcome::Continue => {}
                    TickOutcome::Stop => break,
                }
            }
            debug!(job_id, "polling loop ended");
        });
    }

    /// Interval until the next tick for a job, `None` when the job left
    /// the map. Adaptive jobs use the per-status table scaled by error
    /// backoff; fixed jobs use the per-kind constant.
    fn next_interval(&self, job_id: &str) -> Option<Duration> {
        let jobs = self.read_jobs();
        let job = jobs.get(job_id)?;
        let base = match strategy_for(job.record.kind()) {
            PollStrategy::Adaptive => {
                let base = adaptive_interval(job.record.status, job.active_subitems);
                job.errors.scaled(base)
            }
            PollStrategy::FixedInterval => fixed_interval(job.record.kind()),
        };
        Some(base)
    }

    /// Stop a job's polling and record why, for later manual resumption.
    pub(crate) fn stop_polling_with_reason(&self, job_id: &str, reason: StopReason, now: i64) {
        let record = {
            let mut jobs = self.write_jobs();
            let Some(job) = jobs.get_mut(job_id) else {
                return;
            };
            if let Some(token) = job.poll.take() {
                token.cancel();
            }
            job.record.polling_stop = Some(PollingStop { reason, at: now });
            job.record.clone()
        };
        self.writer.enqueue(record);
        self.writer.flush_now();
    }

    /// Remove a terminal job from active tracking after the grace
    /// window. The durable history record stays; only the in-memory
    /// entry (timer, synthetic/error state) goes.
    pub(crate) fn schedule_cleanup(self: &Arc<Self>, job_id: &str) {
        let inner = Arc::clone(self);
        let job_id = job_id.to_string();
        let grace = self.config.cleanup_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let removed = {
                let mut jobs = inner.write_jobs();
                jobs.remove(&job_id)
            };
            if let Some(job) = removed {
                if let Some(token) = job.poll {
                    token.cancel();
                }
                inner
                    .events
                    .emit(JobEventType::JobCleanup, &job.record, now_ms());
                debug!(job_id, "removed from active tracking");
            }
        });
    }
}

/// Current wall-clock time in epoch ms.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
