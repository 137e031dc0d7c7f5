//! Message delivery through a rate-limited API token.

use async_trait::async_trait;
use courier_common::config::DeliveryConfig;
use courier_common::{AppError, AppResult};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::entities::Message;

/// Capability to deliver one message using one API token.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Deliver `message` authenticated as `token`.
    async fn send(&self, message: &Message, token: &str) -> AppResult<()>;
}

/// Wrapper for boxed `MessageSender` trait object.
pub type Sender = Arc<dyn MessageSender>;

/// Sender that only waits and logs, standing in for a real provider.
#[derive(Debug, Clone)]
pub struct SimulatedSender {
    latency: Duration,
}

impl SimulatedSender {
    /// Create a simulated sender with the given per-message latency.
    #[must_use]
    pub const fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl MessageSender for SimulatedSender {
    async fn send(&self, message: &Message, token: &str) -> AppResult<()> {
        tokio::time::sleep(self.latency).await;
        debug!(message_id = %message.id(), token = %token, "Message sent using token");
        Ok(())
    }
}

/// Sender posting messages as JSON to an HTTP endpoint.
#[derive(Clone)]
pub struct HttpMessageSender {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpMessageSender {
    /// Create a new HTTP sender.
    pub fn new(endpoint: String, timeout: Duration) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            endpoint,
        })
    }
}

#[async_trait]
impl MessageSender for HttpMessageSender {
    async fn send(&self, message: &Message, token: &str) -> AppResult<()> {
        let body = json!({
            "id": message.id(),
            "subject": message.subject(),
            "body": message.body(),
            "to": message.to(),
        });

        let response = self
            .http_client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {token}"))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Delivery(format!("Request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            debug!(message_id = %message.id(), status = %status, "Provider accepted message");
            Ok(())
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(AppError::Delivery(format!("Provider returned {status}: {text}")))
        }
    }
}

/// Build the sender selected by the delivery configuration.
pub fn build_sender(config: &DeliveryConfig) -> AppResult<Sender> {
    match &config.endpoint {
        Some(endpoint) => Ok(Arc::new(HttpMessageSender::new(
            endpoint.clone(),
            Duration::from_millis(config.timeout_ms),
        )?)),
        None => Ok(Arc::new(SimulatedSender::new(Duration::from_millis(
            config.simulated_latency_ms,
        )))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_common::IdGenerator;

    #[tokio::test]
    async fn test_simulated_sender_succeeds() {
        let sender = SimulatedSender::new(Duration::from_millis(1));
        let message = Message::create(
            &IdGenerator::new(),
            "s".to_string(),
            "b".to_string(),
            "t".to_string(),
        );

        assert!(sender.send(&message, "token-a").await.is_ok());
    }

    #[test]
    fn test_build_sender_without_endpoint() {
        let config = DeliveryConfig::default();
        assert!(build_sender(&config).is_ok());
    }

    #[test]
    fn test_build_sender_with_endpoint() {
        let config = DeliveryConfig {
            endpoint: Some("http://localhost:9/messages".to_string()),
            ..Default::default()
        };
        assert!(build_sender(&config).is_ok());
    }
}
