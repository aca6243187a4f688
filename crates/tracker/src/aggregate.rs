// crates/tracker/src/aggregate.rs
//! Document-level status aggregation.

use respond_types::JobStatus;

/// Collapse a set of child job/item statuses into one aggregate status.
///
/// Input entries are trimmed and matched case-insensitively; empty
/// entries are discarded. Rules evaluate in order, first match wins:
///
/// 1. no entries → `NotApplicable`
/// 2. any FAILED → `Failed`
/// 3. any RUNNING → `Running`
/// 4. all COMPLETED → `Completed`
/// 5. all STOPPED or CANCELLED (mixed allowed) → `Stopped`
/// 6. otherwise → `NotApplicable`
///
/// Rule 5 deliberately displays CANCELLED children as STOPPED; that
/// collapsing is long-standing product behavior and is preserved as-is.
pub fn aggregate_status<S: AsRef<str>>(statuses: &[S]) -> JobStatus {
    let normalized: Vec<&str> = statuses
        .iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty())
        .collect();

    if normalized.is_empty() {
        return JobStatus::NotApplicable;
    }

    let is = |s: &str, name: &str| s.eq_ignore_ascii_case(name);

    if normalized.iter().any(|s| is(s, "FAILED")) {
        return JobStatus::Failed;
    }
    if normalized.iter().any(|s| is(s, "RUNNING")) {
        return JobStatus::Running;
    }
    if normalized.iter().all(|s| is(s, "COMPLETED")) {
        return JobStatus::Completed;
    }
    if normalized
        .iter()
        .all(|s| is(s, "STOPPED") || is(s, "CANCELLED"))
    {
        return JobStatus::Stopped;
    }
    JobStatus::NotApplicable
}
