//! Message intake endpoints.

use axum::{Json, Router, extract::State, routing::post};
use courier_common::AppResult;
use courier_core::{BatchReport, SendMessagesRequest};
use serde::Serialize;
use tracing::debug;
use validator::Validate;

use crate::response::ApiResponse;
use crate::state::AppState;

/// Batch intake acknowledgement.
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    /// Number of messages queued.
    pub enqueued: usize,
    /// Number of messages that could not be queued.
    pub failed: usize,
    /// Ids of the queued messages, in request order.
    pub ids: Vec<String>,
}

impl From<BatchReport> for BatchResponse {
    fn from(report: BatchReport) -> Self {
        Self {
            enqueued: report.enqueued.len(),
            failed: report.failed.len(),
            ids: report.enqueued,
        }
    }
}

/// Queue a batch of messages for delivery.
async fn batch(
    State(state): State<AppState>,
    Json(req): Json<SendMessagesRequest>,
) -> AppResult<ApiResponse<BatchResponse>> {
    req.validate()?;
    debug!(count = req.messages.len(), "Received message batch");

    let report = state.messages.batch_messages(req.messages).await;

    Ok(ApiResponse::accepted(report.into()))
}

/// Message intake routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/batch", post(batch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_counts_report() {
        let report = BatchReport {
            enqueued: vec!["a".to_string(), "b".to_string()],
            failed: vec!["c".to_string()],
        };

        let response = BatchResponse::from(report);
        assert_eq!(response.enqueued, 2);
        assert_eq!(response.failed, 1);
        assert_eq!(response.ids, ["a", "b"]);
    }
}
