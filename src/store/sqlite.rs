//! SQLite-backed order store.
//!
//! rusqlite is synchronous, so every call takes the connection lock inside
//! `spawn_blocking` and never holds it across an await point.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use super::{OrderStore, StoreError};
use crate::domain::{Order, OrderId, OrderStatus};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS orders (
    id          TEXT PRIMARY KEY,
    status      TEXT NOT NULL,
    payload     TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_orders_status ON orders (status, created_at);
";

/// Order store persisted in a single SQLite table
#[derive(Clone)]
pub struct SqliteOrderStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteOrderStore {
    /// Open (or create) a database file and ensure the schema exists
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Unavailable(format!(
                        "Failed to create store directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("Connection lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await?
    }

    /// Insert a new order (used by producers and tooling)
    pub async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        let id = order.id.to_string();
        let status = order.status.as_str();
        let payload = serde_json::to_string(&order.payload).map_err(|e| StoreError::Corrupt {
            id: id.clone(),
            reason: e.to_string(),
        })?;

        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
            conn.execute(
                "INSERT INTO orders (id, status, payload, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![id, status, payload, now],
            )?;
            Ok(())
        })
        .await
    }

    /// Fetch a single order by id
    pub async fn get(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT id, status, payload FROM orders WHERE id = ?1",
                    params![id],
                    read_row,
                )
                .optional()?;

            row.map(decode_row).transpose()
        })
        .await
    }

    /// Count orders in each status
    pub async fn count_by_status(&self) -> Result<HashMap<OrderStatus, usize>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT lower(status), COUNT(*) FROM orders GROUP BY lower(status)",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;

            let mut counts = HashMap::new();
            for row in rows {
                let (status, count) = row?;
                let status = status.parse::<OrderStatus>().map_err(|e| StoreError::Corrupt {
                    id: "<aggregate>".to_string(),
                    reason: e.to_string(),
                })?;
                counts.insert(status, count as usize);
            }
            Ok(counts)
        })
        .await
    }
}

#[async_trait]
impl OrderStore for SqliteOrderStore {
    async fn list_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, status, payload FROM orders
                 WHERE lower(status) = ?1
                 ORDER BY created_at, rowid",
            )?;
            let rows = stmt.query_map(params![status.as_str()], read_row)?;

            // An undecodable row must not hold back the rest of the table
            let mut orders = Vec::new();
            for row in rows {
                match decode_row(row?) {
                    Ok(order) => orders.push(order),
                    Err(StoreError::Corrupt { id, reason }) => {
                        warn!(order_id = %id, %reason, "Skipping unreadable order row");
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(orders)
        })
        .await
    }

    async fn set_status(&self, ids: &[OrderId], status: OrderStatus) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
            let tx = conn.transaction()?;
            let mut updated = 0usize;
            {
                let mut stmt =
                    tx.prepare("UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3")?;
                for id in &ids {
                    updated += stmt.execute(params![status.as_str(), now, id])?;
                }
            }
            tx.commit()?;

            debug!(requested = ids.len(), updated, %status, "Updated order status");
            Ok(())
        })
        .await
    }
}

type RawRow = (String, String, String);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn decode_row((id, status, payload): RawRow) -> Result<Order, StoreError> {
    let status = status.parse::<OrderStatus>().map_err(|e| StoreError::Corrupt {
        id: id.clone(),
        reason: e.to_string(),
    })?;
    let payload = serde_json::from_str(&payload).map_err(|e| StoreError::Corrupt {
        id: id.clone(),
        reason: format!("Invalid payload: {}", e),
    })?;

    Ok(Order {
        id: OrderId::new(id),
        status,
        payload,
    })
}
