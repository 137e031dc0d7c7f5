//! ID generation utilities.

use uuid::Uuid;

/// ID generator for messages and lock holders.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new random UUID v4.
    ///
    /// Used for message ids, which double as queue job ids.
    #[must_use]
    pub fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Generate an opaque lock holder identifier.
    #[must_use]
    pub fn generate_holder_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}
