//! In-memory job queue.
//!
//! Pending jobs are keyed by job id: enqueuing an id that is already pending
//! replaces the earlier entry. Claiming a job removes it from the pending set.

use async_trait::async_trait;
use courier_common::AppResult;
use courier_core::{Message, MessageDispatch};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::clock::SharedClock;
use crate::handler::{JobHandler, JobOutcome, JobQueue, QueuedJob, run_job};
use crate::jobs::SendMessageJob;

/// A job waiting in the queue.
#[derive(Debug, Clone)]
pub struct PendingJob<J> {
    /// The job.
    pub job: J,
    /// Requested delay, if any.
    pub delay: Option<Duration>,
    /// Epoch milliseconds from which the job may be claimed.
    pub ready_at: i64,
}

/// Job queue held in memory.
#[derive(Debug, Clone)]
pub struct MemoryJobQueue<J> {
    clock: SharedClock,
    pending: Arc<Mutex<Vec<PendingJob<J>>>>,
}

impl<J: QueuedJob + Clone> MemoryJobQueue<J> {
    /// Create an empty queue reading time from `clock`.
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Snapshot of pending jobs in enqueue order.
    pub async fn pending(&self) -> Vec<PendingJob<J>> {
        self.pending.lock().await.clone()
    }

    /// Number of pending jobs.
    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Whether nothing is pending.
    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }

    /// Claim the earliest due job, removing it from the pending set.
    pub async fn claim_due(&self) -> Option<J> {
        let now = self.clock.now_ms();
        let mut pending = self.pending.lock().await;

        let index = pending
            .iter()
            .enumerate()
            .filter(|(_, p)| p.ready_at <= now)
            .min_by_key(|(i, p)| (p.ready_at, *i))
            .map(|(i, _)| i)?;

        Some(pending.remove(index).job)
    }

    /// Claim every job due now and run them concurrently through `handler`.
    ///
    /// Jobs the handler re-enqueues are not picked up again by this call.
    pub async fn drain_due<H>(&self, handler: &H) -> Vec<AppResult<JobOutcome>>
    where
        H: JobHandler<Job = J>,
    {
        let mut claimed = Vec::new();
        while let Some(job) = self.claim_due().await {
            claimed.push(job);
        }

        join_all(claimed.into_iter().map(|job| run_job(handler, self, job))).await
    }
}

#[async_trait]
impl<J: QueuedJob + Clone> JobQueue<J> for MemoryJobQueue<J> {
    async fn enqueue(&self, job: J, delay: Option<Duration>) -> AppResult<()> {
        let delay_ms = delay.map_or(0, |d| d.as_millis() as i64);
        let ready_at = self.clock.now_ms().saturating_add(delay_ms);

        let mut pending = self.pending.lock().await;
        pending.retain(|p| p.job.job_id() != job.job_id());
        pending.push(PendingJob {
            job,
            delay,
            ready_at,
        });
        Ok(())
    }
}

#[async_trait]
impl MessageDispatch for MemoryJobQueue<SendMessageJob> {
    async fn dispatch(&self, message: &Message) -> AppResult<()> {
        self.enqueue(SendMessageJob::new(message.clone()), None)
            .await
    }
}
