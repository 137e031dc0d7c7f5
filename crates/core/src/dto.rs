//! Batch intake request types.

use serde::Deserialize;
use validator::Validate;

/// One outbound message as submitted by a client.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MessageDto {
    /// Message subject.
    pub subject: String,
    /// Message body.
    pub body: String,
    /// Recipient address.
    #[validate(length(min = 1))]
    pub to: String,
}

/// A batch of messages to enqueue.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendMessagesRequest {
    /// Messages in submission order.
    #[validate(nested)]
    pub messages: Vec<MessageDto>,
}
