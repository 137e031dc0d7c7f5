//! Rate-limited message dispatch for courier.
//!
//! This crate gates message delivery behind a small pool of API tokens shared
//! by every worker process:
//!
//! - **Store**: the shared rate ledger (Redis via fred, or in-memory)
//! - **Lock**: distributed mutual exclusion over the ledger
//! - **Token bucket**: first-fit token reservation with a per-token cooldown
//! - **Jobs**: the send-message job payload
//! - **Handler**: job handler capability and the requeue driver
//! - **Queues**: apalis-redis and in-memory job queues
//! - **Workers**: the apalis send-message worker

pub mod clock;
pub mod handler;
pub mod jobs;
pub mod lock;
pub mod memory_queue;
pub mod queue_impl;
pub mod retry;
pub mod store;
pub mod token_bucket;
pub mod workers;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use handler::{JobHandler, JobOutcome, JobQueue, QueuedJob, run_job};
pub use jobs::*;
pub use lock::DistributedLock;
pub use memory_queue::{MemoryJobQueue, PendingJob};
pub use queue_impl::RedisJobQueue;
pub use retry::BackoffPolicy;
pub use store::{
    LedgerKeys, LedgerStore, MemoryLedgerStore, RedisLedgerStore, StoreError, StoreResult,
};
pub use token_bucket::{TokenBucket, TokenBucketConfig};
pub use workers::*;
