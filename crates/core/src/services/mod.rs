//! Business logic services.

pub mod dispatch;
pub mod messages;
pub mod sender;

pub use dispatch::{Dispatcher, MessageDispatch};
pub use messages::{BatchReport, MessagesService};
pub use sender::{HttpMessageSender, MessageSender, Sender, SimulatedSender, build_sender};
