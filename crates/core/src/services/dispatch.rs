//! Message dispatch seam.
//!
//! Provides an abstraction for queueing messages for delivery.
//! The actual implementation is provided by the queue crate.

use async_trait::async_trait;
use courier_common::AppResult;
use std::sync::Arc;

use crate::entities::Message;

/// Trait for queueing outbound messages.
///
/// This allows intake to enqueue messages without directly depending on the
/// queue implementation. Implementations key the job by the message id.
#[async_trait]
pub trait MessageDispatch: Send + Sync {
    /// Queue a message for immediate delivery.
    async fn dispatch(&self, message: &Message) -> AppResult<()>;
}

/// Wrapper for boxed `MessageDispatch` trait object.
pub type Dispatcher = Arc<dyn MessageDispatch>;
