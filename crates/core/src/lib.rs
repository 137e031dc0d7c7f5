//! Core business logic for courier.
//!
//! - **Entities**: the immutable [`Message`] value carried by queue jobs
//! - **DTOs**: batch intake request shapes
//! - **Services**: batch intake, the dispatch seam towards the job queue and
//!   the sender capability used by workers

pub mod dto;
pub mod entities;
pub mod services;

pub use dto::{MessageDto, SendMessagesRequest};
pub use entities::Message;
pub use services::*;
