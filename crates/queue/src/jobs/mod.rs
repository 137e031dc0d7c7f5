//! Job definitions.

mod send_message;

pub use send_message::SendMessageJob;
