//! Domain types for the order relay.
//!
//! This module contains the core data structures:
//! - Order: Unit of work with an id, a status and an opaque payload
//! - Command documents: Request/response bodies for the delivery endpoint

pub mod command;
pub mod order;

// Re-export commonly used types
pub use command::{CommandBatch, ProcessedBatch, ProcessedCommand};
pub use order::{Order, OrderId, OrderStatus, UnknownStatus};
