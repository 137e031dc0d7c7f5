//! Shared handler state.

use courier_core::MessagesService;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    /// Batch intake service.
    pub messages: MessagesService,
}

impl AppState {
    /// Create the state around the intake service.
    #[must_use]
    pub const fn new(messages: MessagesService) -> Self {
        Self { messages }
    }
}
