//! Job handler capability and the requeue driver.
//!
//! A handler decides what happens to one dequeued job; the driver applies
//! that decision to the queue. Any consumer loop (the apalis worker, the
//! in-memory queue) runs jobs through [`run_job`].

use async_trait::async_trait;
use courier_common::AppResult;
use std::time::Duration;
use tracing::warn;

/// A job that carries its own identity.
pub trait QueuedJob: Send + Sync + 'static {
    /// Stable job id. Re-enqueues of the same logical job share it.
    fn job_id(&self) -> &str;

    /// Failed delivery attempts recorded on this job.
    fn failed_attempts(&self) -> u32;

    /// The same job with one more failed attempt recorded.
    #[must_use]
    fn with_failed_attempt(self) -> Self
    where
        Self: Sized;
}

/// What a handler did with a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The job was delivered using `token`.
    Delivered {
        /// Token the delivery was made with.
        token: String,
    },
    /// No capacity right now; put the job back after `delay`.
    Requeue {
        /// Delay before the job becomes due again.
        delay: Duration,
    },
    /// The attempt failed; put the job back as failed attempt `attempt`.
    Retry {
        /// Failed attempts including this one.
        attempt: u32,
        /// Delay before the next attempt.
        delay: Duration,
    },
}

/// Processes one job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Job type handled.
    type Job: QueuedJob;

    /// Handle a job. An error ends the job; retries are expressed as
    /// [`JobOutcome::Retry`].
    async fn handle(&self, job: &Self::Job) -> AppResult<JobOutcome>;
}

/// Queue jobs can be put back into.
#[async_trait]
pub trait JobQueue<J>: Send + Sync {
    /// Enqueue `job`, due after `delay` if given.
    async fn enqueue(&self, job: J, delay: Option<Duration>) -> AppResult<()>;
}

/// Run `job` through `handler` and re-enqueue it under the same identity if
/// the handler asks for it. A retried job carries one more failed attempt.
pub async fn run_job<H, Q>(handler: &H, queue: &Q, job: H::Job) -> AppResult<JobOutcome>
where
    H: JobHandler + ?Sized,
    Q: JobQueue<H::Job> + ?Sized,
{
    let outcome = handler.handle(&job).await?;

    match &outcome {
        JobOutcome::Delivered { .. } => {}
        JobOutcome::Requeue { delay } => {
            warn!(
                job_id = %job.job_id(),
                delay_ms = delay.as_millis() as u64,
                "Re-queuing job"
            );
            queue.enqueue(job, Some(*delay)).await?;
        }
        JobOutcome::Retry { attempt, delay } => {
            warn!(
                job_id = %job.job_id(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Scheduling retry"
            );
            queue.enqueue(job.with_failed_attempt(), Some(*delay)).await?;
        }
    }

    Ok(outcome)
}
