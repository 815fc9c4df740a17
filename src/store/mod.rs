//! Order store interface.
//!
//! The relay sees the durable store through two operations only: list the
//! orders in a given status, and set the status of an explicit set of ids.
//! Everything else (schema, producers, other status transitions) belongs to
//! the store.

pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Order, OrderId, OrderStatus};

pub use sqlite::SqliteOrderStore;

/// Errors that can occur talking to the order store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt order row {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Unavailable(e.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Unavailable(format!("Store task failed: {}", e))
    }
}

/// Durable, queryable store of orders
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// List every order currently in `status`
    async fn list_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, StoreError>;

    /// Set `status` on exactly the given ids. An empty slice is a no-op.
    async fn set_status(&self, ids: &[OrderId], status: OrderStatus) -> Result<(), StoreError>;

    /// List every order eligible for forwarding
    async fn list_pending(&self) -> Result<Vec<Order>, StoreError> {
        self.list_by_status(OrderStatus::Pending).await
    }
}

#[async_trait]
impl<T: OrderStore + ?Sized> OrderStore for std::sync::Arc<T> {
    async fn list_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, StoreError> {
        (**self).list_by_status(status).await
    }

    async fn set_status(&self, ids: &[OrderId], status: OrderStatus) -> Result<(), StoreError> {
        (**self).set_status(ids, status).await
    }
}
