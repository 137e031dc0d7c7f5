//! API integration tests.
//!
//! These tests drive the intake router end to end with an in-process
//! dispatcher.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
    response::Response,
};
use courier_api::{AppState, health_router, router as api_router};
use courier_common::{AppError, AppResult};
use courier_core::{Message, MessageDispatch, MessagesService};
use serde_json::{Value, json};
use tower::ServiceExt;

/// Dispatcher that records messages, rejecting any whose subject is "reject".
#[derive(Default)]
struct RecordingDispatch {
    messages: Mutex<Vec<Message>>,
}

#[async_trait]
impl MessageDispatch for RecordingDispatch {
    async fn dispatch(&self, message: &Message) -> AppResult<()> {
        if message.subject() == "reject" {
            return Err(AppError::Queue("queue unavailable".to_string()));
        }
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}

fn create_test_router() -> (Router, Arc<RecordingDispatch>) {
    let dispatch = Arc::new(RecordingDispatch::default());
    let state = AppState::new(MessagesService::new(dispatch.clone()));

    let app = Router::new()
        .merge(health_router())
        .nest("/v1", api_router())
        .with_state(state);

    (app, dispatch)
}

async fn post_batch(app: Router, body: Value) -> Response {
    app.oneshot(
        Request::builder()
            .uri("/v1/messages/batch")
            .method("POST")
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_batch_is_accepted_and_queued() {
    let (app, dispatch) = create_test_router();

    let response = post_batch(
        app,
        json!({
            "messages": [
                { "subject": "a", "body": "b", "to": "c" },
                { "subject": "d", "body": "e", "to": "f" }
            ]
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = json_body(response).await;
    assert_eq!(body["data"]["enqueued"], 2);
    assert_eq!(body["data"]["failed"], 0);

    let queued = dispatch.messages.lock().unwrap().clone();
    assert_eq!(queued.len(), 2);
    assert_eq!(queued[0].subject(), "a");
    assert_eq!(queued[1].to(), "f");
    assert_ne!(queued[0].id(), queued[1].id());
    assert_eq!(body["data"]["ids"], json!([queued[0].id(), queued[1].id()]));
}

#[tokio::test]
async fn test_empty_recipient_is_rejected() {
    let (app, dispatch) = create_test_router();

    let response = post_batch(
        app,
        json!({ "messages": [{ "subject": "a", "body": "b", "to": "" }] }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(dispatch.messages.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_partial_failure_is_reported() {
    let (app, dispatch) = create_test_router();

    let response = post_batch(
        app,
        json!({
            "messages": [
                { "subject": "reject", "body": "b", "to": "c" },
                { "subject": "ok", "body": "b", "to": "c" }
            ]
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json_body(response).await;
    assert_eq!(body["data"]["enqueued"], 1);
    assert_eq!(body["data"]["failed"], 1);
    assert_eq!(dispatch.messages.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_malformed_body_is_client_error() {
    let (app, _) = create_test_router();

    let response = post_batch(app, json!({ "messages": [{ "subject": "a" }] })).await;

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = create_test_router();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_unknown_endpoint_returns_404() {
    let (app, _) = create_test_router();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/unknown")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
