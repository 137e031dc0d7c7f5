//! Job workers.

mod send_message;

pub use send_message::{SendMessageContext, SendMessageHandler, send_message_worker};
