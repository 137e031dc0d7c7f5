//! Batch intake service.

use courier_common::IdGenerator;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::dto::MessageDto;
use crate::entities::Message;
use crate::services::dispatch::Dispatcher;

/// Outcome of a batch intake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Ids of messages that were enqueued.
    pub enqueued: Vec<String>,
    /// Ids of messages whose enqueue failed.
    pub failed: Vec<String>,
}

/// Service turning batch requests into queued messages.
#[derive(Clone)]
pub struct MessagesService {
    dispatcher: Dispatcher,
    id_gen: IdGenerator,
}

impl MessagesService {
    /// Create a new messages service.
    #[must_use]
    pub const fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a message for every item and queue it.
    ///
    /// A failed enqueue is logged and reported; the remaining items are
    /// still processed.
    pub async fn batch_messages(&self, items: Vec<MessageDto>) -> BatchReport {
        let mut report = BatchReport::default();

        for item in items {
            let message = Message::create(&self.id_gen, item.subject, item.body, item.to);

            match self.dispatcher.dispatch(&message).await {
                Ok(()) => {
                    debug!(message_id = %message.id(), "Created message");
                    report.enqueued.push(message.id().to_string());
                }
                Err(e) => {
                    error!(message_id = %message.id(), error = %e, "Failed to enqueue message");
                    report.failed.push(message.id().to_string());
                }
            }
        }

        info!(
            enqueued = report.enqueued.len(),
            failed = report.failed.len(),
            "Batch accepted"
        );

        report
    }
}
