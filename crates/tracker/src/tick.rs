// crates/tracker/src/tick.rs
//! One poll tick: fetch, apply, contain errors.
//!
//! Everything in here runs inside a job's polling task. Failures are
//! reflected in backoff state and events; they never propagate out of
//! the tick, so one misbehaving job cannot crash the tracker or other
//! jobs' timers.

use std::sync::Arc;

use tracing::{debug, error, warn};

use respond_client::{ClientError, RealtimeResponse, StatusResponse};
use respond_types::{JobEventType, JobKind, JobMeta, JobRecord, JobStatus, StopReason};

use crate::strategy::{strategy_for, PollStrategy};
use crate::tracker::{now_ms, TrackerInner};

/// Whether the polling loop should keep going after a tick.
pub(crate) enum TickOutcome {
    Continue,
    Stop,
}

impl TrackerInner {
    pub(crate) async fn poll_once(self: &Arc<Self>, job_id: &str) -> TickOutcome {
        // Credential gate: no token means no tick and no timer.
        if !self.credentials.is_authenticated() {
            debug!(job_id, "credential absent; stopping poll");
            self.stop_polling_with_reason(job_id, StopReason::AuthExpired, now_ms());
            return TickOutcome::Stop;
        }

        let (strategy, shard, watermark) = {
            let jobs = self.read_jobs();
            let Some(job) = jobs.get(job_id) else {
                return TickOutcome::Stop;
            };
            if job.record.is_terminal() {
                return TickOutcome::Stop;
            }
            (
                strategy_for(job.record.kind()),
                job.record.meta.shard_key().map(str::to_string),
                job.watermark,
            )
        };

        let err = match strategy {
            PollStrategy::Adaptive => {
                // The shard key is mandatory for realtime polling; its
                // absence is a configuration error, never a silent skip.
                let Some(shard) = shard else {
                    error!(job_id, "realtime poll attempted without shard key");
                    let now = now_ms();
                    self.emit_for(job_id, JobEventType::ConfigError, now);
                    self.stop_polling_with_reason(job_id, StopReason::ServerError, now);
                    return TickOutcome::Stop;
                };
                match self.service.poll_realtime(job_id, watermark, &shard).await {
                    Ok(resp) => return self.apply_realtime(job_id, resp),
                    Err(e) => e,
                }
            }
            PollStrategy::FixedInterval => {
                match self.service.poll_status(job_id, shard.as_deref()).await {
                    Ok(resp) => return self.apply_status(job_id, resp),
                    Err(e) => e,
                }
            }
        };

        self.handle_tick_error(job_id, err).await
    }

    /// Apply a successful realtime response: advance the watermark,
    /// merge status/progress/counters, emit completions, handle the
    /// terminal transition.
    fn apply_realtime(self: &Arc<Self>, job_id: &str, resp: RealtimeResponse) -> TickOutcome {
        let now = now_ms();
        let status = JobStatus::from_raw(&resp.status);
        let completions = resp.recent_completions;

        let Some((record, became_terminal, changed)) = ({
            let mut jobs = self.write_jobs();
            jobs.get_mut(job_id).map(|job| {
                let prev_status = job.record.status;
                let prev_progress = job.record.progress;

                job.errors.record_success();
                job.watermark = Some(now);
                job.active_subitems = !completions.is_empty();

                if let JobMeta::Batch {
                    sub_jobs_total,
                    sub_jobs_completed,
                    ..
                } = &mut job.record.meta
                {
                    let next = sub_jobs_completed.saturating_add(completions.len() as u32);
                    *sub_jobs_completed = if *sub_jobs_total > 0 {
                        next.min(*sub_jobs_total)
                    } else {
                        next
                    };
                }

                if let Some(synth) = &mut job.synthetic {
                    if let Some(real) = resp.progress {
                        synth.observe_real(real);
                    }
                    job.record.progress = synth.tick(now, status);
                } else if let Some(real) = resp.progress {
                    job.record.progress = job.record.progress.max(real.min(100));
                }

                let became_terminal = status.is_terminal() && !prev_status.is_terminal();
                if status != JobStatus::NotApplicable {
                    job.record.status = status;
                }
                if became_terminal {
                    job.record.end_time = Some(now);
                    if status == JobStatus::Completed {
                        job.record.progress = 100;
                    }
                    if let Some(token) = job.poll.take() {
                        token.cancel();
                    }
                }
                let changed = job.record.status != prev_status
                    || job.record.progress != prev_progress;
                (job.record.clone(), became_terminal, changed)
            })
        }) else {
            return TickOutcome::Stop;
        };

        for completion in completions {
            self.events.emit_completion(job_id, completion, now);
        }

        self.finish_tick(job_id, record, became_terminal, changed, now)
    }

    /// Apply a successful legacy full-status response.
    fn apply_status(self: &Arc<Self>, job_id: &str, resp: StatusResponse) -> TickOutcome {
        let now = now_ms();
        let status = JobStatus::from_raw(&resp.status);

        // Derive progress from step counts when the server omits the
        // percentage.
        let real_progress = resp.progress.or_else(|| {
            match (resp.steps_completed, resp.steps_total) {
                (Some(done), Some(total)) if total > 0 => {
                    Some(((done.min(total) as u64 * 100) / total as u64) as u8)
                }
                _ => None,
            }
        });

        let Some((record, became_terminal, changed)) = ({
            let mut jobs = self.write_jobs();
            jobs.get_mut(job_id).map(|job| {
                let prev_status = job.record.status;
                let prev_progress = job.record.progress;

                job.errors.record_success();
                if let Some(real) = real_progress {
                    job.record.progress = job.record.progress.max(real.min(100));
                }

                let became_terminal = status.is_terminal() && !prev_status.is_terminal();
                if status != JobStatus::NotApplicable {
                    job.record.status = status;
                }
                if became_terminal {
                    job.record.end_time = Some(now);
                    if status == JobStatus::Completed {
                        job.record.progress = 100;
                    }
                    if let Some(token) = job.poll.take() {
                        token.cancel();
                    }
                }
                let changed = job.record.status != prev_status
                    || job.record.progress != prev_progress;
                (job.record.clone(), became_terminal, changed)
            })
        }) else {
            return TickOutcome::Stop;
        };

        self.finish_tick(job_id, record, became_terminal, changed, now)
    }

    fn finish_tick(
        self: &Arc<Self>,
        job_id: &str,
        record: JobRecord,
        became_terminal: bool,
        changed: bool,
        now: i64,
    ) -> TickOutcome {
        if became_terminal {
            self.writer.enqueue(record.clone());
            self.writer.flush_now();
            self.events.emit(JobEventType::JobCompleted, &record, now);
            if record.kind() == JobKind::Batch && record.status == JobStatus::Completed {
                if let Some(hook) = &self.completed_hook {
                    hook(&record);
                }
            }
            self.schedule_cleanup(job_id);
            return TickOutcome::Stop;
        }
        if changed {
            self.writer.enqueue(record.clone());
            self.events.emit(JobEventType::ProgressUpdate, &record, now);
        }
        TickOutcome::Continue
    }

    /// Contain a failed tick according to the error taxonomy.
    async fn handle_tick_error(self: &Arc<Self>, job_id: &str, err: ClientError) -> TickOutcome {
        let now = now_ms();
        match err {
            ClientError::NotAuthenticated => {
                self.stop_polling_with_reason(job_id, StopReason::AuthExpired, now);
                TickOutcome::Stop
            }
            ClientError::AuthExpired => match self.credentials.refresh().await {
                Ok(()) => {
                    debug!(job_id, "credential refreshed; polling resumes");
                    TickOutcome::Continue
                }
                Err(refresh_err) => {
                    warn!(job_id, "credential refresh failed: {refresh_err}");
                    self.emit_for(job_id, JobEventType::AuthFailed, now);
                    self.stop_polling_with_reason(job_id, StopReason::AuthExpired, now);
                    TickOutcome::Stop
                }
            },
            e if e.is_fatal_config() => {
                error!(job_id, "fatal backend error during poll: {e}");
                self.emit_for(job_id, JobEventType::ConfigError, now);
                self.stop_polling_with_reason(job_id, StopReason::ServerError, now);
                TickOutcome::Stop
            }
            e => {
                let (consecutive, exhausted) = {
                    let mut jobs = self.write_jobs();
                    match jobs.get_mut(job_id) {
                        Some(job) => {
                            let count = job.errors.record_failure(now);
                            (count, job.errors.exhausted())
                        }
                        None => return TickOutcome::Stop,
                    }
                };
                warn!(job_id, consecutive, "poll tick failed: {e}");
                if exhausted {
                    self.stop_polling_with_reason(job_id, StopReason::TooManyFailures, now);
                    TickOutcome::Stop
                } else {
                    TickOutcome::Continue
                }
            }
        }
    }

    /// Emit an event carrying the job's current record, if still tracked.
    fn emit_for(&self, job_id: &str, event_type: JobEventType, now: i64) {
        let record = self.read_jobs().get(job_id).map(|j| j.record.clone());
        if let Some(record) = record {
            self.events.emit(event_type, &record, now);
        }
    }
}
