//! One relay cycle: fetch pending orders, forward them as a single batch,
//! acknowledge the ids the endpoint confirmed.
//!
//! A cycle keeps no state. Anything not acknowledged stays `pending` in the
//! store and is picked up again by the next cycle, which is the only retry
//! mechanism. Delivery is therefore at-least-once: if acknowledging fails
//! after a confirmed delivery, the same ids are sent again next time.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::adapters::{Delivery, DeliveryError};
use crate::domain::{CommandBatch, Order, OrderId, OrderStatus};
use crate::store::{OrderStore, StoreError};

/// Ways a cycle can fail. None of them are fatal to the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("Delivery failed with status {status}: {body}")]
    DeliveryFailed { status: u16, body: String },

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Malformed delivery response: {0}")]
    MalformedResponse(String),
}

impl RelayError {
    /// Stable label for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::DeliveryFailed { .. } => "delivery_failed",
            Self::TransportFailure(_) => "transport_failure",
            Self::MalformedResponse(_) => "malformed_response",
        }
    }
}

impl From<DeliveryError> for RelayError {
    fn from(e: DeliveryError) -> Self {
        match e {
            DeliveryError::Rejected { status, body } => Self::DeliveryFailed { status, body },
            DeliveryError::Transport(msg) => Self::TransportFailure(msg),
            DeliveryError::MalformedResponse(msg) => Self::MalformedResponse(msg),
        }
    }
}

/// Result of a cycle that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing was pending; no delivery was attempted
    Idle,

    /// A batch was delivered and the confirmed subset marked sent
    Delivered {
        forwarded: usize,
        acknowledged: Vec<OrderId>,
    },
}

impl CycleOutcome {
    /// Ids moved to `sent` by this cycle
    pub fn acknowledged(&self) -> &[OrderId] {
        match self {
            Self::Idle => &[],
            Self::Delivered { acknowledged, .. } => acknowledged,
        }
    }

    /// True when fewer orders were confirmed than forwarded
    pub fn is_partial(&self) -> bool {
        match self {
            Self::Idle => false,
            Self::Delivered {
                forwarded,
                acknowledged,
            } => acknowledged.len() < *forwarded,
        }
    }
}

/// Fetch → forward → acknowledge over a store and a delivery endpoint
pub struct Relay<S, D> {
    store: S,
    delivery: D,
    max_batch_size: Option<usize>,
}

impl<S: OrderStore, D: Delivery> Relay<S, D> {
    pub fn new(store: S, delivery: D) -> Self {
        Self {
            store,
            delivery,
            max_batch_size: None,
        }
    }

    /// Cap the number of orders forwarded per cycle
    pub fn with_max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = Some(max.max(1));
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn delivery(&self) -> &D {
        &self.delivery
    }

    /// Run one complete cycle
    #[instrument(skip(self), fields(delivery = %self.delivery.name()))]
    pub async fn run_cycle(&self) -> Result<CycleOutcome, RelayError> {
        let pending = self.fetch().await?;
        if pending.is_empty() {
            debug!("No pending orders");
            return Ok(CycleOutcome::Idle);
        }

        let batch = self.build_batch(pending);
        if batch.is_empty() {
            debug!("Nothing pending after filtering");
            return Ok(CycleOutcome::Idle);
        }

        let forwarded = batch.len();
        let confirmed = self.forward(&batch).await?;
        let acknowledged = self.acknowledge(confirmed).await?;

        Ok(CycleOutcome::Delivered {
            forwarded,
            acknowledged,
        })
    }

    /// Fetcher: every order currently pending
    pub async fn fetch(&self) -> Result<Vec<Order>, RelayError> {
        let orders = self.store.list_pending().await?;
        debug!(count = orders.len(), "Fetched pending orders");
        Ok(orders)
    }

    fn build_batch(&self, pending: Vec<Order>) -> CommandBatch {
        let mut orders: Vec<Order> = pending.into_iter().filter(Order::is_pending).collect();
        for order in orders.iter().filter(|o| o.shadows_own_fields()) {
            warn!(order_id = %order.id, "Payload keys order_id/status are not forwarded");
        }
        if let Some(max) = self.max_batch_size {
            if orders.len() > max {
                debug!(deferred = orders.len() - max, "Batch capped");
                orders.truncate(max);
            }
        }
        CommandBatch::new(orders)
    }

    /// Forwarder: deliver the batch and return the confirmed ids that were
    /// actually part of it, de-duplicated, in confirmation order.
    pub async fn forward(&self, batch: &CommandBatch) -> Result<Vec<OrderId>, RelayError> {
        info!(count = batch.len(), "Forwarding pending orders");

        // Failures carry status and body up to the cycle boundary, which logs them.
        let confirmed = self.delivery.deliver(batch).await?;

        let sent: HashSet<&OrderId> = batch.commands.iter().map(|o| &o.id).collect();
        let mut seen = HashSet::new();
        let mut accepted = Vec::with_capacity(confirmed.len());
        for id in confirmed {
            if !sent.contains(&id) {
                warn!(order_id = %id, "Endpoint confirmed an order that was not in the batch");
                continue;
            }
            if seen.insert(id.clone()) {
                accepted.push(id);
            }
        }

        if accepted.len() < batch.len() {
            debug!(
                forwarded = batch.len(),
                confirmed = accepted.len(),
                "Partial confirmation; unconfirmed orders stay pending"
            );
        }

        Ok(accepted)
    }

    /// Acknowledger: mark exactly the confirmed ids as sent
    pub async fn acknowledge(&self, ids: Vec<OrderId>) -> Result<Vec<OrderId>, RelayError> {
        if ids.is_empty() {
            return Ok(ids);
        }

        info!(order_ids = ?ids, "Updating processed orders");
        self.store.set_status(&ids, OrderStatus::Sent).await?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let store: RelayError = StoreError::Unavailable("down".into()).into();
        assert_eq!(store.kind(), "store_unavailable");

        let rejected: RelayError = DeliveryError::Rejected {
            status: 503,
            body: "busy".into(),
        }
        .into();
        assert_eq!(rejected.kind(), "delivery_failed");
        assert_eq!(rejected.to_string(), "Delivery failed with status 503: busy");

        let transport: RelayError = DeliveryError::Transport("refused".into()).into();
        assert_eq!(transport.kind(), "transport_failure");

        let malformed: RelayError = DeliveryError::MalformedResponse("eof".into()).into();
        assert_eq!(malformed.kind(), "malformed_response");
    }

    #[test]
    fn test_outcome_partial() {
        assert!(!CycleOutcome::Idle.is_partial());
        assert!(CycleOutcome::Idle.acknowledged().is_empty());

        let partial = CycleOutcome::Delivered {
            forwarded: 3,
            acknowledged: vec![OrderId::from("1"), OrderId::from("2")],
        };
        assert!(partial.is_partial());
        assert_eq!(partial.acknowledged().len(), 2);

        let full = CycleOutcome::Delivered {
            forwarded: 1,
            acknowledged: vec![OrderId::from("1")],
        };
        assert!(!full.is_partial());
    }
}
