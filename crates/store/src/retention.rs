// crates/store/src/retention.rs
//! Retention and eviction policy for persisted job records.
//!
//! The policy is pure: callers (the trackers) feed it the record set and
//! the current time and mirror the returned mutations into both memory
//! and the durable store.

use respond_types::{JobRecord, JobStatus};

/// Failure message written onto jobs force-failed by the age cap.
pub const TIMEOUT_ERROR_MESSAGE: &str = "exceeded maximum execution time";

const HOUR_MS: i64 = 60 * 60 * 1000;

/// Age/count bounds for stored jobs.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    /// A RUNNING/QUEUED job older than this is force-failed.
    pub max_execution_age_ms: i64,
    /// Records older than this are deleted outright.
    pub max_history_age_ms: i64,
    /// Hard cap on stored records; oldest by start time evicted first.
    pub max_stored_jobs: usize,
    /// On logout, terminal jobs older than this are evicted too.
    pub logout_terminal_grace_ms: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_execution_age_ms: 12 * HOUR_MS,
            max_history_age_ms: 7 * 24 * HOUR_MS,
            max_stored_jobs: 50,
            logout_terminal_grace_ms: 30 * 60 * 1000,
        }
    }
}

/// Result of a retention pass.
#[derive(Debug, Default)]
pub struct RetentionOutcome {
    /// Surviving records, with force-failed mutations already applied.
    pub kept: Vec<JobRecord>,
    /// Ids of records whose status was forced to FAILED by the age cap.
    pub force_failed: Vec<String>,
    /// Ids deleted outright (history age or count eviction).
    pub removed: Vec<String>,
}

/// Result of the logout eviction pass.
#[derive(Debug, Default)]
pub struct LogoutOutcome {
    pub kept: Vec<JobRecord>,
    pub removed: Vec<String>,
}

impl RetentionPolicy {
    /// Apply the age, history, and count rules to a record set.
    pub fn apply(&self, jobs: Vec<JobRecord>, now: i64) -> RetentionOutcome {
        let mut outcome = RetentionOutcome::default();

        for mut job in jobs {
            let age = now.saturating_sub(job.start_time);
            if age > self.max_history_age_ms {
                outcome.removed.push(job.job_id);
                continue;
            }
            if !job.is_terminal() && age > self.max_execution_age_ms {
                job.status = JobStatus::Failed;
                job.end_time = Some(now);
                job.error = Some(TIMEOUT_ERROR_MESSAGE.to_string());
                outcome.force_failed.push(job.job_id.clone());
            }
            outcome.kept.push(job);
        }

        if outcome.kept.len() > self.max_stored_jobs {
            // Most recent by start time survive.
            outcome.kept.sort_by_key(|j| std::cmp::Reverse(j.start_time));
            for evicted in outcome.kept.split_off(self.max_stored_jobs) {
                outcome.removed.push(evicted.job_id);
            }
        }

        outcome
    }

    /// Aggressive eviction on logout: every non-terminal job goes (it
    /// cannot continue without credentials), and so does every terminal
    /// job older than the grace window.
    pub fn apply_logout(&self, jobs: Vec<JobRecord>, now: i64) -> LogoutOutcome {
        let mut outcome = LogoutOutcome::default();
        for job in jobs {
            if !job.is_terminal() {
                outcome.removed.push(job.job_id);
                continue;
            }
            let finished_at = job.end_time.unwrap_or(job.start_time);
            if now.saturating_sub(finished_at) > self.logout_terminal_grace_ms {
                outcome.removed.push(job.job_id);
            } else {
                outcome.kept.push(job);
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use respond_types::JobMeta;

    fn job(id: &str, status: JobStatus, start_time: i64) -> JobRecord {
        let mut rec = JobRecord::new(
            id,
            status,
            JobMeta::Legacy {
                created_at: start_time,
            },
            start_time,
        );
        if status.is_terminal() {
            rec.end_time = Some(start_time + 1000);
        }
        rec
    }

    const NOW: i64 = 1_000 * HOUR_MS;

    #[test]
    fn overage_running_job_is_force_failed() {
        let policy = RetentionPolicy::default();
        let jobs = vec![job("old", JobStatus::Running, NOW - 13 * HOUR_MS)];

        let outcome = policy.apply(jobs, NOW);
        assert_eq!(outcome.force_failed, vec!["old"]);
        assert_eq!(outcome.kept.len(), 1);
        let failed = &outcome.kept[0];
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.end_time, Some(NOW));
        assert_eq!(failed.error.as_deref(), Some(TIMEOUT_ERROR_MESSAGE));
    }

    #[test]
    fn fresh_running_job_is_untouched() {
        let policy = RetentionPolicy::default();
        let outcome = policy.apply(vec![job("j", JobStatus::Running, NOW - HOUR_MS)], NOW);
        assert!(outcome.force_failed.is_empty());
        assert_eq!(outcome.kept[0].status, JobStatus::Running);
    }

    #[test]
    fn ancient_history_is_deleted() {
        let policy = RetentionPolicy::default();
        let jobs = vec![
            job("ancient", JobStatus::Completed, NOW - 8 * 24 * HOUR_MS),
            job("recent", JobStatus::Completed, NOW - HOUR_MS),
        ];
        let outcome = policy.apply(jobs, NOW);
        assert_eq!(outcome.removed, vec!["ancient"]);
        assert_eq!(outcome.kept.len(), 1);
        assert_eq!(outcome.kept[0].job_id, "recent");
    }

    #[test]
    fn count_cap_keeps_most_recent() {
        let policy = RetentionPolicy {
            max_stored_jobs: 2,
            ..Default::default()
        };
        let jobs = vec![
            job("oldest", JobStatus::Completed, NOW - 3 * HOUR_MS),
            job("middle", JobStatus::Completed, NOW - 2 * HOUR_MS),
            job("newest", JobStatus::Completed, NOW - HOUR_MS),
        ];
        let outcome = policy.apply(jobs, NOW);
        assert_eq!(outcome.kept.len(), 2);
        let kept: Vec<_> = outcome.kept.iter().map(|j| j.job_id.as_str()).collect();
        assert_eq!(kept, vec!["newest", "middle"]);
        assert_eq!(outcome.removed, vec!["oldest"]);
    }

    #[test]
    fn logout_evicts_non_terminal_and_stale_terminal() {
        let policy = RetentionPolicy::default();
        let jobs = vec![
            job("running", JobStatus::Running, NOW - HOUR_MS),
            job("queued", JobStatus::Queued, NOW),
            job("old-done", JobStatus::Completed, NOW - 2 * HOUR_MS),
            job("fresh-done", JobStatus::Completed, NOW - 60_000),
        ];
        let outcome = policy.apply_logout(jobs, NOW);

        let kept: Vec<_> = outcome.kept.iter().map(|j| j.job_id.as_str()).collect();
        assert_eq!(kept, vec!["fresh-done"]);

        let mut removed = outcome.removed;
        removed.sort();
        assert_eq!(removed, vec!["old-done", "queued", "running"]);
    }
}
