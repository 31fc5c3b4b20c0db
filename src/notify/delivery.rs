//! HTTP callback delivery with retry and backoff
//!
//! Delivery is best-effort at-least-once within a running process: a
//! failed POST is retried with exponential backoff, and after the final
//! attempt the notification is dropped and logged. Nothing is requeued.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, instrument, warn};

/// A delivery attempt failure.
///
/// 4xx responses are not distinguished from 5xx: both count as a failed
/// attempt and are retried the same way.
#[derive(Debug)]
pub enum DeliveryError {
    /// The request did not complete within the configured timeout
    Timeout,

    /// The callback endpoint could not be reached
    Connection(String),

    /// The endpoint answered with a non-success status
    Status(u16),

    /// Any other client-side request failure
    Request(String),
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryError::Timeout => write!(f, "delivery timed out"),
            DeliveryError::Connection(msg) => write!(f, "connection failed: {}", msg),
            DeliveryError::Status(code) => write!(f, "callback returned status {}", code),
            DeliveryError::Request(msg) => write!(f, "request failed: {}", msg),
        }
    }
}

impl std::error::Error for DeliveryError {}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DeliveryError::Timeout
        } else if err.is_connect() {
            DeliveryError::Connection(err.to_string())
        } else {
            DeliveryError::Request(err.to_string())
        }
    }
}

/// HTTP sender shared by the dispatcher and the report aggregator.
///
/// The client is built once and reused across requests.
#[derive(Debug, Clone)]
pub struct NotificationSender {
    client: Client,
    max_retries: u32,
}

impl NotificationSender {
    pub fn new(timeout_secs: u64, max_retries: u32) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .expect("Failed to build HTTP client"),
            max_retries,
        }
    }

    /// POST a payload with retries.
    ///
    /// Attempts up to `max_retries` times, sleeping `2^attempt` seconds
    /// between attempts (none after the last). Returns the last error if
    /// every attempt failed.
    #[instrument(skip(self, payload))]
    pub async fn send(
        &self,
        callback_uri: &str,
        payload: &serde_json::Value,
    ) -> Result<(), DeliveryError> {
        let mut last_error = DeliveryError::Request("no attempts made".to_string());

        for attempt in 0..self.max_retries {
            match self.send_once(callback_uri, payload).await {
                Ok(()) => {
                    debug!("notification delivered to {callback_uri}");
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "delivery attempt {}/{} to {callback_uri} failed: {e}",
                        attempt + 1,
                        self.max_retries
                    );
                    last_error = e;
                }
            }

            if attempt + 1 < self.max_retries {
                tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
            }
        }

        warn!(
            "notification delivery failed after {} attempts: {callback_uri}",
            self.max_retries
        );
        Err(last_error)
    }

    /// A single delivery attempt with no retries.
    ///
    /// Success is any of 200, 201, 202, 204.
    pub async fn send_once(
        &self,
        callback_uri: &str,
        payload: &serde_json::Value,
    ) -> Result<(), DeliveryError> {
        let response = self.client.post(callback_uri).json(payload).send().await?;

        match response.status().as_u16() {
            200 | 201 | 202 | 204 => Ok(()),
            code => Err(DeliveryError::Status(code)),
        }
    }
}
