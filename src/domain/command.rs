//! Wire documents exchanged with the delivery endpoint.
//!
//! Request:  `{ "commands": [ <order>, ... ] }`
//! Response: `{ "commands": [ { "order_id": <id>, ... }, ... ] }`

use serde::{Deserialize, Serialize};

use super::order::{Order, OrderId};

/// A batch of orders sent in a single request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandBatch {
    pub commands: Vec<Order>,
}

impl CommandBatch {
    pub fn new(commands: Vec<Order>) -> Self {
        Self { commands }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Ids of every order in the batch, in batch order
    pub fn ids(&self) -> Vec<OrderId> {
        self.commands.iter().map(|order| order.id.clone()).collect()
    }
}

/// Response body listing the orders the endpoint processed
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessedBatch {
    pub commands: Vec<ProcessedCommand>,
}

/// One confirmed entry. Fields other than `order_id` are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessedCommand {
    pub order_id: OrderId,
}

impl ProcessedBatch {
    pub fn order_ids(self) -> Vec<OrderId> {
        self.commands.into_iter().map(|c| c.order_id).collect()
    }
}
