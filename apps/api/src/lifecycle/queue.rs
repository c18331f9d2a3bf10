//! Bounded in-process queue feeding the scoring workers.
//!
//! Submission enqueues without waiting. If the queue is full or closed the record simply
//! stays `pending`, and `recover_stale` finds it again through its stored résumé.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::extraction::ResumeFormat;
use crate::lifecycle::is_claimable;
use crate::lifecycle::processor::ApplicationProcessor;
use crate::store::{ApplicationStore, StoreError};

#[derive(Debug, Clone)]
pub enum ResumeSource {
    /// Bytes still in memory from the submission request.
    Inline { bytes: Bytes, format: ResumeFormat },
    /// Fetched again from the object store.
    Stored { path: String, format: ResumeFormat },
}

#[derive(Debug, Clone)]
pub struct ScoringTask {
    pub application_id: Uuid,
    pub resume: ResumeSource,
}

#[derive(Clone)]
pub struct ScoringQueue {
    tx: mpsc::Sender<ScoringTask>,
}

impl ScoringQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ScoringTask>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Returns `false` when the task was not accepted.
    pub fn enqueue(&self, task: ScoringTask) -> bool {
        match self.tx.try_send(task) {
            Ok(()) => true,
            Err(TrySendError::Full(task)) => {
                warn!(
                    application_id = %task.application_id,
                    "Scoring queue full, leaving application pending for recovery"
                );
                false
            }
            Err(TrySendError::Closed(task)) => {
                error!(
                    application_id = %task.application_id,
                    "Scoring queue closed, leaving application pending for recovery"
                );
                false
            }
        }
    }
}

/// Runs queued tasks with at most `concurrency` in flight. Ends when every sender is dropped
/// and the in-flight tasks have finished.
pub fn spawn_dispatcher(
    mut rx: mpsc::Receiver<ScoringTask>,
    processor: Arc<ApplicationProcessor>,
    concurrency: usize,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!("Scoring task aborted: {e}");
                    }
                }
                received = rx.recv() => {
                    let Some(task) = received else { break };
                    let Ok(permit) = semaphore.clone().acquire_owned().await else { break };
                    let processor = processor.clone();
                    tasks.spawn(async move {
                        let _permit = permit;
                        run_task(&processor, task).await;
                    });
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Scoring task aborted: {e}");
            }
        }
        info!("Scoring dispatcher stopped");
    })
}

async fn run_task(processor: &ApplicationProcessor, task: ScoringTask) {
    let id = task.application_id;
    match processor.process(task).await {
        Ok(outcome) => debug!(application_id = %id, ?outcome, "Scoring task finished"),
        Err(e) => error!(
            application_id = %id,
            "Scoring outcome could not be recorded, left for stale recovery: {e}"
        ),
    }
}

/// Re-enqueues records stuck in `processing` past `stale_after`, `pending` records with a
/// stored résumé that were never picked up, and `failed` records that have had fewer than
/// `max_runs` runs. Returns how many were queued.
pub async fn recover_stale(
    store: &dyn ApplicationStore,
    queue: &ScoringQueue,
    stale_after: chrono::Duration,
    max_runs: u32,
    limit: u32,
) -> Result<usize, StoreError> {
    let stale_before = Utc::now() - stale_after;
    let candidates = store.list_recoverable(stale_before, max_runs, limit).await?;

    let mut queued = 0;
    for app in candidates.iter().filter(|a| is_claimable(a, stale_before)) {
        let Some(file) = &app.resume else {
            warn!(application_id = %app.id, "Recoverable application has no stored resume, skipping");
            continue;
        };
        let Some(format) = ResumeFormat::from_mime(&file.content_type) else {
            warn!(
                application_id = %app.id,
                content_type = %file.content_type,
                "Stored resume has an unsupported type, skipping"
            );
            continue;
        };
        let task = ScoringTask {
            application_id: app.id,
            resume: ResumeSource::Stored {
                path: file.path.clone(),
                format,
            },
        };
        if !queue.enqueue(task) {
            break;
        }
        queued += 1;
    }

    if queued > 0 {
        info!(queued, "Re-enqueued stale and failed applications");
    }
    Ok(queued)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::lifecycle::processor::tests::{docx_task, harness, seed};
    use crate::models::application::{ProcessingStatus, ResumeFile};

    #[tokio::test]
    async fn test_dispatcher_drains_queue() {
        let h = harness(72).await;
        let first = seed(&h, true).await;
        let second = seed(&h, true).await;

        let (queue, rx) = ScoringQueue::new(8);
        let worker = spawn_dispatcher(rx, h.processor.clone(), 1);
        assert!(queue.enqueue(docx_task(first.id)));
        assert!(queue.enqueue(docx_task(second.id)));
        drop(queue);

        tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .unwrap()
            .unwrap();

        for id in [first.id, second.id] {
            let app = h.store.get_application(id).await.unwrap().unwrap();
            assert_eq!(app.processing_status, ProcessingStatus::Completed);
            assert_eq!(app.fit_score, Some(72));
        }
    }

    #[tokio::test]
    async fn test_full_queue_rejects_without_blocking() {
        let (queue, _rx) = ScoringQueue::new(1);
        assert!(queue.enqueue(docx_task(Uuid::new_v4())));
        assert!(!queue.enqueue(docx_task(Uuid::new_v4())));
    }

    #[tokio::test]
    async fn test_recover_stale_requeues_stuck_unpicked_and_failed_records() {
        let h = harness(72).await;
        let long_ago = Utc::now() - chrono::Duration::hours(2);
        let resume = ResumeFile {
            path: "resumes/a.pdf".into(),
            url: "memory://resumes/a.pdf".into(),
            file_name: "a.pdf".into(),
            content_type: "application/pdf".into(),
        };

        let mut stuck = seed(&h, true).await;
        stuck.resume = Some(resume.clone());
        stuck.applied_at = long_ago;
        stuck.processing_status = ProcessingStatus::Processing;
        stuck.processing_started_at = Some(long_ago);
        h.store.put_application(stuck.clone()).await;

        let mut unpicked = seed(&h, true).await;
        unpicked.resume = Some(resume.clone());
        unpicked.applied_at = long_ago;
        h.store.put_application(unpicked.clone()).await;

        let mut failed = seed(&h, true).await;
        failed.resume = Some(resume.clone());
        failed.processing_status = ProcessingStatus::Failed;
        failed.processing_completed_at = Some(long_ago);
        failed.processing_runs = 1;
        h.store.put_application(failed.clone()).await;

        // Out of runs: left for a human
        let mut exhausted = seed(&h, true).await;
        exhausted.resume = Some(resume);
        exhausted.processing_status = ProcessingStatus::Failed;
        exhausted.processing_completed_at = Some(long_ago);
        exhausted.processing_runs = 3;
        h.store.put_application(exhausted).await;

        // Fresh and without a résumé: never recovered
        seed(&h, true).await;

        let (queue, mut rx) = ScoringQueue::new(8);
        let queued = recover_stale(h.store.as_ref(), &queue, chrono::Duration::minutes(10), 3, 50)
            .await
            .unwrap();
        assert_eq!(queued, 3);

        let mut ids = vec![
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
        ]
        .into_iter()
        .map(|t| {
            assert!(matches!(t.resume, ResumeSource::Stored { .. }));
            t.application_id
        })
        .collect::<Vec<_>>();
        ids.sort();
        let mut expected = vec![stuck.id, unpicked.id, failed.id];
        expected.sort();
        assert_eq!(ids, expected);
    }
}
