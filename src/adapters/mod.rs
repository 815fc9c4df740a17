//! Delivery interfaces for downstream endpoints.
//!
//! A delivery adapter takes one batch of orders and reports back the ids the
//! endpoint confirmed as processed. Partial confirmation is normal.

pub mod http;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{CommandBatch, OrderId};

// Re-export the HTTP adapter
pub use http::HttpDelivery;

/// Errors that can occur delivering a batch
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// Endpoint answered with a non-success status
    #[error("Endpoint rejected batch with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Endpoint could not be reached (connect, timeout, I/O)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Success status, but the body is not a processed-commands document
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Trait for downstream delivery endpoints
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Send a batch and return the ids the endpoint confirmed
    async fn deliver(&self, batch: &CommandBatch) -> Result<Vec<OrderId>, DeliveryError>;
}

#[async_trait]
impl<T: Delivery + ?Sized> Delivery for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn deliver(&self, batch: &CommandBatch) -> Result<Vec<OrderId>, DeliveryError> {
        (**self).deliver(batch).await
    }
}
