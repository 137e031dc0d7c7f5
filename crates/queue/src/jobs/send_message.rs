//! Message delivery job.

use courier_core::Message;
use serde::{Deserialize, Serialize};

use crate::handler::QueuedJob;

/// Job to deliver one message.
///
/// The payload is the message fields plus a failed-attempt counter; the
/// message id is the job identity, so a re-enqueued job is recognized as the
/// same unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageJob {
    /// The message to deliver.
    #[serde(flatten)]
    pub message: Message,
    /// Failed delivery attempts so far.
    #[serde(default)]
    pub failed_attempts: u32,
}

impl SendMessageJob {
    /// Create a new send job.
    #[must_use]
    pub const fn new(message: Message) -> Self {
        Self {
            message,
            failed_attempts: 0,
        }
    }
}

impl From<Message> for SendMessageJob {
    fn from(message: Message) -> Self {
        Self::new(message)
    }
}

impl QueuedJob for SendMessageJob {
    fn job_id(&self) -> &str {
        self.message.id()
    }

    fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    fn with_failed_attempt(self) -> Self {
        Self {
            failed_attempts: self.failed_attempts.saturating_add(1),
            ..self
        }
    }
}
