//! Test doubles shared by the relay and scheduler integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use order_relay::adapters::{Delivery, DeliveryError};
use order_relay::domain::{CommandBatch, Order, OrderId, OrderStatus};
use order_relay::store::{OrderStore, SqliteOrderStore, StoreError};
use serde_json::{json, Map, Value};

/// Build a pending order with a small payload
pub fn order(id: &str) -> Order {
    let mut payload = Map::new();
    payload.insert("action".to_string(), json!({"name": "restart", "version": "v5"}));
    payload.insert("target".to_string(), json!({"id": format!("agent-{}", id)}));
    Order::pending(id, payload)
}

pub fn ids(raw: &[&str]) -> Vec<OrderId> {
    raw.iter().map(|id| OrderId::from(*id)).collect()
}

/// SQLite store that can be told to fail its next N list/update calls
pub struct FlakyStore {
    pub inner: SqliteOrderStore,
    fail_lists: AtomicUsize,
    fail_updates: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    updates: Mutex<Vec<Vec<OrderId>>>,
}

impl FlakyStore {
    pub async fn with_orders(ids: &[&str]) -> Self {
        let inner = SqliteOrderStore::open_in_memory().unwrap();
        for id in ids {
            inner.insert(&order(id)).await.unwrap();
        }
        Self {
            inner,
            fail_lists: AtomicUsize::new(0),
            fail_updates: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            updates: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_next_lists(&self, n: usize) {
        self.fail_lists.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_updates(&self, n: usize) {
        self.fail_updates.store(n, Ordering::SeqCst);
    }

    /// Id sets passed to successful `set_status` calls, in call order
    pub fn updates(&self) -> Vec<Vec<OrderId>> {
        self.updates.lock().unwrap().clone()
    }

    pub async fn status_of(&self, id: &str) -> OrderStatus {
        self.inner.get(&OrderId::from(id)).await.unwrap().unwrap().status
    }

    pub async fn pending_ids(&self) -> Vec<OrderId> {
        self.inner
            .list_pending()
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect()
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl OrderStore for FlakyStore {
    async fn list_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.fail_lists) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        self.inner.list_by_status(status).await
    }

    async fn set_status(&self, ids: &[OrderId], status: OrderStatus) -> Result<(), StoreError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.fail_updates) {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        self.inner.set_status(ids, status).await?;
        self.updates.lock().unwrap().push(ids.to_vec());
        Ok(())
    }
}

/// What the scripted endpoint answers for one request
#[derive(Debug, Clone)]
pub enum Reply {
    /// Confirm every order in the batch
    ConfirmAll,
    /// Confirm exactly these ids
    Confirm(Vec<&'static str>),
    /// Non-success status with a body
    Reject(u16, &'static str),
    /// Connection-level failure
    Transport,
    /// Success status with an unusable body
    Malformed,
    /// Confirm everything after a delay
    Slow(Duration),
    /// Panic inside the delivery call
    Panic,
}

/// Downstream endpoint that answers from a script and records every batch.
/// Once the script runs out it confirms everything.
pub struct ScriptedDelivery {
    replies: Mutex<VecDeque<Reply>>,
    batches: Mutex<Vec<CommandBatch>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl ScriptedDelivery {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            batches: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn confirm_all() -> Self {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    /// Ids sent in each recorded batch
    pub fn sent_ids(&self) -> Vec<Vec<OrderId>> {
        self.batches.lock().unwrap().iter().map(|b| b.ids()).collect()
    }

    pub fn last_batch(&self) -> Option<Value> {
        self.batches
            .lock()
            .unwrap()
            .last()
            .map(|b| serde_json::to_value(b).unwrap())
    }
}

#[async_trait]
impl Delivery for ScriptedDelivery {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn deliver(&self, batch: &CommandBatch) -> Result<Vec<OrderId>, DeliveryError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        self.batches.lock().unwrap().push(batch.clone());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Reply::ConfirmAll);

        let result = match reply {
            Reply::ConfirmAll => Ok(batch.ids()),
            Reply::Confirm(confirmed) => Ok(ids(&confirmed)),
            Reply::Reject(status, body) => Err(DeliveryError::Rejected {
                status,
                body: body.to_string(),
            }),
            Reply::Transport => Err(DeliveryError::Transport(
                "connection refused".to_string(),
            )),
            Reply::Malformed => Err(DeliveryError::MalformedResponse(
                "missing field `commands`".to_string(),
            )),
            Reply::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(batch.ids())
            }
            Reply::Panic => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                panic!("delivery exploded");
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
