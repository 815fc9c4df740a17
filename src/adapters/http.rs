//! HTTP delivery adapter.
//!
//! Endpoint: POST {endpoint}
//! Body: `{"commands": [...]}`; a 200 answer lists the processed order ids.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use tracing::debug;

use super::{Delivery, DeliveryError};
use crate::domain::{CommandBatch, OrderId, ProcessedBatch};

const APPLICATION_JSON: &str = "application/json";

/// Default endpoint of the local command API
pub const DEFAULT_ENDPOINT: &str = "http://localhost/api/v1/commands";

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Delivers batches to an HTTP endpoint with a fixed request timeout
pub struct HttpDelivery {
    endpoint: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpDelivery {
    /// Create a client for `endpoint`; every request times out after `timeout`
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into(),
            timeout,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Delivery for HttpDelivery {
    fn name(&self) -> &str {
        "http"
    }

    async fn deliver(&self, batch: &CommandBatch) -> Result<Vec<OrderId>, DeliveryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, APPLICATION_JSON)
            .header(CONTENT_TYPE, APPLICATION_JSON)
            .json(batch)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        debug!(status = status.as_u16(), %body, "Delivery endpoint response");

        if status != StatusCode::OK {
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let processed: ProcessedBatch = serde_json::from_str(&body)
            .map_err(|e| DeliveryError::MalformedResponse(e.to_string()))?;

        Ok(processed.order_ids())
    }
}

fn transport_error(e: reqwest::Error) -> DeliveryError {
    let kind = if e.is_timeout() {
        "timed out"
    } else if e.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    DeliveryError::Transport(format!("{}: {}", kind, e))
}
