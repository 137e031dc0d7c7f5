//! HTTP API layer for courier.
//!
//! This crate provides the REST intake surface:
//!
//! - **Endpoints**: batch message intake and liveness
//! - **Response**: the `{ "data": ... }` envelope
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod response;
pub mod state;

pub use endpoints::{health_router, router};
pub use state::AppState;
