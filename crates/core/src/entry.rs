//! Entry: the unit of storage
//!
//! An entry carries the caller's value together with its TTL and creation
//! time. Expiry is never stored; it is recomputed against the clock on
//! every access so a reloaded snapshot stays truthful.
//!
//! On disk an entry is `{ "value": ..., "ttl": "30", "created_at": "..." }`
//! where an empty `ttl` string means the entry never expires.

use chrono::{DateTime, Utc};
use serde::de::{self, DeserializeOwned, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Bound for values a store can hold.
///
/// A store is generic over exactly one value type for its whole lifetime.
pub trait StoreValue: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> StoreValue for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Time-to-live in whole seconds. `Ttl::NEVER` disables expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ttl(Option<u64>);

impl Ttl {
    /// Never expires
    pub const NEVER: Ttl = Ttl(None);

    /// Expire `secs` seconds after creation
    pub fn seconds(secs: u64) -> Self {
        Ttl(Some(secs))
    }

    /// Number of seconds, or `None` for no expiry
    pub fn as_secs(&self) -> Option<u64> {
        self.0
    }

    /// Parse the persisted string form (`""` or decimal seconds)
    pub fn parse(s: &str) -> Result<Self, String> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Ttl::NEVER);
        }
        trimmed
            .parse::<u64>()
            .map(Ttl::seconds)
            .map_err(|e| format!("invalid ttl '{}': {}", s, e))
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(secs) => write!(f, "{}", secs),
            None => Ok(()),
        }
    }
}

impl From<Option<u64>> for Ttl {
    fn from(secs: Option<u64>) -> Self {
        Ttl(secs)
    }
}

impl Serialize for Ttl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ttl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TtlVisitor;

        impl<'de> Visitor<'de> for TtlVisitor {
            type Value = Ttl;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a ttl string of decimal seconds, possibly empty")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Ttl, E> {
                Ttl::parse(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(TtlVisitor)
    }
}

/// A stored record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry<V> {
    /// Caller's payload
    pub value: V,
    /// Time-to-live, relative to `created_at`
    pub ttl: Ttl,
    /// Set once at creation
    pub created_at: DateTime<Utc>,
}

impl<V> Entry<V> {
    /// Create an entry stamped with the current time
    pub fn new(value: V, ttl: Ttl) -> Self {
        Self::with_created_at(value, ttl, Utc::now())
    }

    /// Create an entry with an explicit creation time
    pub fn with_created_at(value: V, ttl: Ttl, created_at: DateTime<Utc>) -> Self {
        Self {
            value,
            ttl,
            created_at,
        }
    }

    /// Instant after which the entry is expired, `None` if it never expires.
    ///
    /// A TTL too large to represent is treated as no expiry.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.ttl.as_secs()?).ok()?;
        let delta = chrono::Duration::try_seconds(secs)?;
        self.created_at.checked_add_signed(delta)
    }

    /// Expired iff `now` is strictly past `created_at + ttl`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at() {
            Some(deadline) => now > deadline,
            None => false,
        }
    }

    /// Check expiry against the wall clock
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}
