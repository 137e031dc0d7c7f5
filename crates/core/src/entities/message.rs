//! Outbound message entity.

use chrono::{DateTime, Utc};
use courier_common::IdGenerator;
use serde::{Deserialize, Serialize};

/// One outbound message.
///
/// Created once at intake and read back unchanged by the worker that
/// delivers it. The serialized form is the queue job payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    id: String,
    subject: String,
    body: String,
    to: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Message {
    /// Create a new message with a fresh id and matching timestamps.
    #[must_use]
    pub fn create(id_gen: &IdGenerator, subject: String, body: String, to: String) -> Self {
        let now = Utc::now();
        Self {
            id: id_gen.generate(),
            subject,
            body,
            to,
            created_at: now,
            updated_at: now,
        }
    }

    /// Message id, also used as the queue job id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Subject line.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Message body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Recipient address.
    #[must_use]
    pub fn to(&self) -> &str {
        &self.to
    }

    /// Time the message was accepted.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last modification time; equal to `created_at` for a new message.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
