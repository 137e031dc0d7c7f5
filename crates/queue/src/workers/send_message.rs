//! Send-message worker.

use std::sync::Arc;

use apalis::prelude::*;
use async_trait::async_trait;
use courier_common::AppResult;
use courier_core::Sender;
use tracing::{error, info, warn};

use crate::handler::{JobHandler, JobOutcome, JobQueue, QueuedJob, run_job};
use crate::jobs::SendMessageJob;
use crate::retry::BackoffPolicy;
use crate::token_bucket::TokenBucket;

/// Gates each delivery behind a token from the bucket.
///
/// A failed delivery is rescheduled after the retry backoff until the job
/// has used up `retry.retries` retries; the last failure is returned as an
/// error.
#[derive(Clone)]
pub struct SendMessageHandler {
    bucket: Arc<TokenBucket>,
    sender: Sender,
    retry: BackoffPolicy,
}

impl SendMessageHandler {
    /// Create a new send-message handler.
    #[must_use]
    pub const fn new(bucket: Arc<TokenBucket>, sender: Sender, retry: BackoffPolicy) -> Self {
        Self {
            bucket,
            sender,
            retry,
        }
    }
}

#[async_trait]
impl JobHandler for SendMessageHandler {
    type Job = SendMessageJob;

    async fn handle(&self, job: &SendMessageJob) -> AppResult<JobOutcome> {
        let Some(token) = self.bucket.get_available_token().await else {
            warn!(
                message_id = %job.job_id(),
                "No available API tokens for message"
            );
            return Ok(JobOutcome::Requeue {
                delay: self.bucket.cooldown_window(),
            });
        };

        // The token stays reserved even if the send fails.
        if let Err(e) = self.sender.send(&job.message, &token).await {
            let attempt = job.failed_attempts.saturating_add(1);
            if attempt > self.retry.retries {
                return Err(e);
            }

            warn!(
                message_id = %job.job_id(),
                token = %token,
                attempt,
                error = %e,
                "Delivery failed, scheduling retry"
            );
            return Ok(JobOutcome::Retry {
                attempt,
                delay: self.retry.delay_for_attempt(attempt),
            });
        }

        Ok(JobOutcome::Delivered { token })
    }
}

/// Context for the send-message worker.
#[derive(Clone)]
pub struct SendMessageContext {
    /// Handler deciding each job's outcome.
    pub handler: SendMessageHandler,
    /// Queue requeued jobs go back into.
    pub queue: Arc<dyn JobQueue<SendMessageJob>>,
}

impl SendMessageContext {
    /// Create a new send-message context.
    #[must_use]
    pub fn new(handler: SendMessageHandler, queue: Arc<dyn JobQueue<SendMessageJob>>) -> Self {
        Self { handler, queue }
    }
}

/// Worker function for delivering messages.
///
/// # Errors
/// Returns an error once the delivery has failed on every allowed attempt,
/// or if the re-enqueue fails.
pub async fn send_message_worker(
    job: SendMessageJob,
    ctx: Data<SendMessageContext>,
) -> Result<(), Error> {
    let message_id = job.job_id().to_string();

    match run_job(&ctx.handler, ctx.queue.as_ref(), job).await {
        Ok(JobOutcome::Delivered { token }) => {
            info!(message_id = %message_id, token = %token, "Message delivered");
            Ok(())
        }
        Ok(JobOutcome::Requeue { delay }) => {
            info!(
                message_id = %message_id,
                delay_ms = delay.as_millis() as u64,
                "Message re-queued"
            );
            Ok(())
        }
        Ok(JobOutcome::Retry { attempt, delay }) => {
            info!(
                message_id = %message_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Message delivery retry scheduled"
            );
            Ok(())
        }
        Err(e) => {
            error!(message_id = %message_id, error = %e, "Failed to deliver message");
            let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(e);
            Err(Error::Failed(boxed.into()))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::memory_queue::MemoryJobQueue;
    use crate::retry::BackoffPolicy;
    use crate::store::{LedgerKeys, MemoryLedgerStore};
    use crate::token_bucket::TokenBucketConfig;
    use courier_common::{AppError, IdGenerator};
    use courier_core::{Message, MessageSender};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn send(&self, message: &Message, token: &str) -> AppResult<()> {
            self.sent
                .lock()
                .unwrap()
                .push((message.id().to_string(), token.to_string()));
            if self.fail {
                return Err(AppError::Delivery("provider down".to_string()));
            }
            Ok(())
        }
    }

    fn setup(
        tokens: &[&str],
        sender: Arc<RecordingSender>,
        retry: BackoffPolicy,
    ) -> (SendMessageHandler, Arc<TokenBucket>, MemoryJobQueue<SendMessageJob>) {
        let clock = ManualClock::new(0);
        let store = Arc::new(MemoryLedgerStore::new(Arc::new(clock.clone())));
        let bucket = Arc::new(TokenBucket::new(
            store,
            Arc::new(clock.clone()),
            &LedgerKeys::with_prefix("test"),
            TokenBucketConfig {
                tokens: tokens.iter().map(ToString::to_string).collect(),
                cooldown: Duration::from_millis(1000),
                lock_ttl: Duration::from_secs(10),
                lock_backoff: BackoffPolicy::no_retry(),
            },
        ));
        let queue = MemoryJobQueue::new(Arc::new(clock));
        (SendMessageHandler::new(bucket.clone(), sender, retry), bucket, queue)
    }

    fn job() -> SendMessageJob {
        SendMessageJob::new(Message::create(
            &IdGenerator::new(),
            "s".to_string(),
            "b".to_string(),
            "t".to_string(),
        ))
    }

    #[tokio::test]
    async fn test_delivers_with_granted_token() {
        let sender = Arc::new(RecordingSender::default());
        let (handler, _, queue) = setup(&["tok"], sender.clone(), BackoffPolicy::no_retry());
        let job = job();

        let outcome = run_job(&handler, &queue, job.clone()).await.unwrap();

        assert_eq!(
            outcome,
            JobOutcome::Delivered {
                token: "tok".to_string()
            }
        );
        assert_eq!(
            sender.sent.lock().unwrap().as_slice(),
            [(job.job_id().to_string(), "tok".to_string())]
        );
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_requeues_without_delivery_when_no_token() {
        let sender = Arc::new(RecordingSender::default());
        let (handler, bucket, queue) = setup(&["tok"], sender.clone(), BackoffPolicy::no_retry());
        bucket.get_available_token().await.unwrap();
        let job = job();

        let outcome = run_job(&handler, &queue, job.clone()).await.unwrap();

        assert_eq!(
            outcome,
            JobOutcome::Requeue {
                delay: Duration::from_millis(1000)
            }
        );
        assert!(sender.sent.lock().unwrap().is_empty());

        let pending = queue.pending().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].job.job_id(), job.job_id());
        assert!(pending[0].delay >= Some(bucket.cooldown_window()));
    }

    #[tokio::test]
    async fn test_failed_delivery_keeps_token_reserved() {
        let sender = Arc::new(RecordingSender {
            fail: true,
            ..Default::default()
        });
        let (handler, bucket, queue) = setup(&["tok"], sender, BackoffPolicy::no_retry());

        let result = run_job(&handler, &queue, job()).await;

        assert!(matches!(result, Err(AppError::Delivery(_))));
        assert!(queue.is_empty().await);
        assert_eq!(bucket.available_at("tok").await.unwrap(), Some(1000));
        assert!(bucket.get_available_token().await.is_none());
    }

    #[tokio::test]
    async fn test_failed_delivery_schedules_retry() {
        let sender = Arc::new(RecordingSender {
            fail: true,
            ..Default::default()
        });
        let retry = BackoffPolicy::fixed(Duration::from_millis(6000), 2);
        let (handler, _, queue) = setup(&["tok"], sender, retry);
        let job = job();

        let outcome = run_job(&handler, &queue, job.clone()).await.unwrap();

        assert_eq!(
            outcome,
            JobOutcome::Retry {
                attempt: 1,
                delay: Duration::from_millis(6000)
            }
        );
        let pending = queue.pending().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].job.job_id(), job.job_id());
        assert_eq!(pending[0].job.failed_attempts, 1);
        assert_eq!(pending[0].ready_at, 6000);
    }

    #[tokio::test]
    async fn test_last_allowed_failure_is_an_error() {
        let sender = Arc::new(RecordingSender {
            fail: true,
            ..Default::default()
        });
        let retry = BackoffPolicy::fixed(Duration::from_millis(6000), 2);
        let (handler, _, queue) = setup(&["tok"], sender, retry);
        let job = job().with_failed_attempt().with_failed_attempt();

        let result = run_job(&handler, &queue, job).await;

        assert!(matches!(result, Err(AppError::Delivery(_))));
        assert!(queue.is_empty().await);
    }
}
