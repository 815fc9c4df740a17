//! Orders: the unit of work tracked by status in the store.

use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Opaque order identifier assigned by the store.
///
/// Downstream endpoints echo ids back either as JSON strings or as JSON
/// integers, so both forms deserialize. Serialization is always a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for OrderId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for OrderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for OrderId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for OrderId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Unsigned(u64),
            Signed(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => Self(s),
            RawId::Unsigned(n) => Self(n.to_string()),
            RawId::Signed(n) => Self(n.to_string()),
        })
    }
}

/// Lifecycle status of an order.
///
/// The relay only reads `Pending` and writes `Sent`. `Success` and `Failure`
/// are terminal states owned by whoever processes orders downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created by a producer, waiting to be forwarded
    Pending,

    /// Confirmed as processed by the delivery endpoint
    Sent,

    /// Completed downstream
    Success,

    /// Failed downstream
    Failure,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [Self::Pending, Self::Sent, Self::Success, Self::Failure];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Error returned when parsing an unknown status string
#[derive(Debug, Clone, thiserror::Error)]
#[error("Unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// Payload keys that would collide with an order's own fields on the wire
const RESERVED_KEYS: [&str; 2] = ["order_id", "status"];

/// A unit of pending work.
///
/// On the wire an order is a single flat object: `order_id`, `status`, and
/// every payload field at the top level. Payload entries named like the
/// order's own fields are dropped when serializing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Order {
    /// Store-assigned identifier
    #[serde(rename = "order_id")]
    pub id: OrderId,

    /// Current status
    pub status: OrderStatus,

    /// Opaque structured record
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Order {
    /// Create a new pending order
    pub fn pending(id: impl Into<OrderId>, payload: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            status: OrderStatus::Pending,
            payload,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    /// True when the payload carries keys that serialization drops
    pub fn shadows_own_fields(&self) -> bool {
        RESERVED_KEYS.iter().any(|key| self.payload.contains_key(*key))
    }

    /// Payload entries that are written to the wire
    fn wire_payload(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.payload
            .iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
    }
}

impl Serialize for Order {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2 + self.wire_payload().count()))?;
        map.serialize_entry("order_id", &self.id)?;
        map.serialize_entry("status", &self.status)?;
        for (key, value) in self.wire_payload() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
