// crates/tracker/src/events.rs
//! Broadcast emitters for job change notifications.

use tokio::sync::broadcast;

use respond_types::{CompletionEvent, JobEvent, JobEventType, JobRecord, SubItemCompletion};

const CHANNEL_CAPACITY: usize = 256;

/// Emits [`JobEvent`]s and per-sub-item [`CompletionEvent`]s to any
/// number of subscribers. Cloning shares the underlying channels.
#[derive(Clone)]
pub struct JobEvents {
    job_tx: broadcast::Sender<JobEvent>,
    completion_tx: broadcast::Sender<CompletionEvent>,
}

impl JobEvents {
    pub fn new() -> Self {
        let (job_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (completion_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            job_tx,
            completion_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.job_tx.subscribe()
    }

    pub fn subscribe_completions(&self) -> broadcast::Receiver<CompletionEvent> {
        self.completion_tx.subscribe()
    }

    /// Emit a job event. No subscribers is fine; the send error is
    /// ignored.
    pub fn emit(&self, event_type: JobEventType, job: &JobRecord, now: i64) {
        let _ = self.job_tx.send(JobEvent {
            job_id: job.job_id.clone(),
            event_type,
            job: job.clone(),
            timestamp: now,
        });
    }

    pub fn emit_completion(&self, job_id: &str, completion: SubItemCompletion, now: i64) {
        let _ = self.completion_tx.send(CompletionEvent {
            job_id: job_id.to_string(),
            completion,
            timestamp: now,
        });
    }
}

impl Default for JobEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use respond_types::{JobMeta, JobStatus};

    fn record() -> JobRecord {
        JobRecord::new("j1", JobStatus::Running, JobMeta::Legacy { created_at: 1 }, 2)
    }

    #[tokio::test]
    async fn subscribers_receive_events() {
        let events = JobEvents::new();
        let mut rx = events.subscribe();

        events.emit(JobEventType::TrackingStarted, &record(), 10);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, JobEventType::TrackingStarted);
        assert_eq!(event.job_id, "j1");
        assert_eq!(event.timestamp, 10);
    }

    #[tokio::test]
    async fn completion_channel_is_separate() {
        let events = JobEvents::new();
        let mut jobs_rx = events.subscribe();
        let mut completions_rx = events.subscribe_completions();

        events.emit_completion(
            "master_b1",
            SubItemCompletion {
                item_id: "item-1".into(),
                doc_item_id: None,
                completed_at: None,
            },
            5,
        );

        let completion = completions_rx.recv().await.unwrap();
        assert_eq!(completion.completion.item_id, "item-1");
        assert!(jobs_rx.try_recv().is_err());
    }

    #[test]
    fn emit_without_subscribers_is_silent() {
        let events = JobEvents::new();
        events.emit(JobEventType::ProgressUpdate, &record(), 1);
    }
}
