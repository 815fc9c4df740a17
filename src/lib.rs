//! order-relay - Polling relay for pending orders
//!
//! Moves orders from a durable store to a delivery endpoint on a fixed
//! cadence, and marks the ones the endpoint confirms as sent.
//!
//! # Architecture
//!
//! Each cycle runs fetch → forward → acknowledge in strict sequence:
//! - Pending orders are read from the store
//! - They are posted as one batch to the delivery endpoint
//! - The ids the endpoint confirms are moved to `sent`
//!
//! Anything not confirmed stays pending and is retried by the next cycle,
//! which gives at-least-once delivery.
//!
//! # Modules
//!
//! - `adapters`: Delivery endpoints (HTTP)
//! - `core`: Relay cycle and scheduler
//! - `domain`: Data structures (Order, CommandBatch)
//! - `store`: Order store interface and SQLite implementation
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run the relay loop
//! order-relay run
//!
//! # Run a single cycle
//! order-relay run --once
//!
//! # Inspect the store
//! order-relay status
//! order-relay list --status pending
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod store;

// Re-export main types at crate root for convenience
pub use adapters::{Delivery, DeliveryError, HttpDelivery};
pub use crate::core::{CycleOutcome, Relay, RelayError, Scheduler};
pub use domain::{CommandBatch, Order, OrderId, OrderStatus};
pub use store::{OrderStore, SqliteOrderStore, StoreError};
