//! Redis-backed job queue.
//!
//! This module provides a Redis-based implementation of the dispatch seam
//! that queues jobs for the apalis worker to process.

use apalis::prelude::*;
use apalis_redis::RedisStorage;
use async_trait::async_trait;
use chrono::Utc;
use courier_common::{AppError, AppResult};
use courier_core::{Message, MessageDispatch};
use std::time::Duration;
use tracing::debug;

use crate::handler::{JobQueue, QueuedJob};
use crate::jobs::SendMessageJob;

/// Redis-backed send queue.
///
/// Wraps the apalis-redis storage consumed by the send-message worker.
///
/// Every enqueue becomes a new apalis task with its own task id; the message
/// id travels only in the payload. Unlike [`MemoryJobQueue`], enqueuing a
/// message id that is already pending does not replace the earlier task.
///
/// [`MemoryJobQueue`]: crate::memory_queue::MemoryJobQueue
#[derive(Clone)]
pub struct RedisJobQueue {
    storage: RedisStorage<SendMessageJob>,
}

impl RedisJobQueue {
    /// Create a new Redis job queue.
    #[must_use]
    pub const fn new(storage: RedisStorage<SendMessageJob>) -> Self {
        Self { storage }
    }

    /// The underlying storage, for registering workers.
    #[must_use]
    pub fn storage(&self) -> RedisStorage<SendMessageJob> {
        self.storage.clone()
    }
}

/// Unix second at which a job delayed by `delay` from `now_ms` becomes due.
///
/// apalis schedules with second precision, so this rounds up: a job is never
/// due before its delay has elapsed.
#[must_use]
pub fn schedule_at(now_ms: i64, delay: Duration) -> i64 {
    let due_ms = now_ms.saturating_add(delay.as_millis() as i64);
    due_ms.div_euclid(1000) + i64::from(due_ms.rem_euclid(1000) != 0)
}

#[async_trait]
impl JobQueue<SendMessageJob> for RedisJobQueue {
    async fn enqueue(&self, job: SendMessageJob, delay: Option<Duration>) -> AppResult<()> {
        let job_id = job.job_id().to_string();
        let mut storage = self.storage.clone();

        let result = match delay {
            Some(delay) => {
                let on = schedule_at(Utc::now().timestamp_millis(), delay);
                storage.schedule(job, on).await
            }
            None => storage.push(job).await,
        };

        result.map_err(|e| AppError::Queue(format!("Failed to queue job: {e}")))?;

        debug!(job_id = %job_id, delay = ?delay, "Queued send job");
        Ok(())
    }
}

#[async_trait]
impl MessageDispatch for RedisJobQueue {
    async fn dispatch(&self, message: &Message) -> AppResult<()> {
        self.enqueue(SendMessageJob::new(message.clone()), None)
            .await
    }
}
