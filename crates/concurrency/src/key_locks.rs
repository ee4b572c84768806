//! Per-key reader/writer locks
//!
//! Every operation on a key holds that key's lock for its whole duration:
//! reads take it shared, create/update/delete take it exclusive. Distinct
//! keys never contend.
//!
//! ## Registry lifetime
//!
//! Locks are created on first use and removed when the last guard for the
//! key is dropped, so the registry only tracks keys that are in use right
//! now. A lock is reference counted by the registry itself, by each waiter
//! and by each holder; the entry is removed only when the registry holds the
//! sole reference, checked under the registry mutex.
//!
//! ## Ordering
//!
//! Multi-key acquisition sorts and de-duplicates the keys first. Any two
//! batches therefore acquire overlapping keys in the same order.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{Mutex, RawRwLock, RwLock};

type KeyLock = Arc<RwLock<()>>;
type Registry = Arc<Mutex<HashMap<String, KeyLock>>>;

/// Registry of per-key locks
#[derive(Debug, Default, Clone)]
pub struct KeyLockManager {
    locks: Registry,
}

// Guards are held for their Drop, never read
#[allow(dead_code)]
enum Held {
    Shared(ArcRwLockReadGuard<RawRwLock, ()>),
    Exclusive(ArcRwLockWriteGuard<RawRwLock, ()>),
}

/// Holds one key's lock until dropped
#[must_use = "the key is unlocked as soon as the guard is dropped"]
pub struct KeyGuard {
    registry: Registry,
    key: String,
    held: Option<Held>,
}

impl KeyGuard {
    /// Key this guard protects
    pub fn key(&self) -> &str {
        &self.key
    }

    /// True if held exclusively
    pub fn is_exclusive(&self) -> bool {
        matches!(self.held, Some(Held::Exclusive(_)))
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        // Unlock before inspecting the count so our own reference is gone
        self.held.take();
        let mut locks = self.registry.lock();
        if let Some(lock) = locks.get(&self.key) {
            if Arc::strong_count(lock) == 1 {
                locks.remove(&self.key);
            }
        }
    }
}

impl std::fmt::Debug for KeyGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyGuard")
            .field("key", &self.key)
            .field("exclusive", &self.is_exclusive())
            .finish()
    }
}

/// Exclusive locks on a set of keys, acquired in sorted order
#[must_use = "the keys are unlocked as soon as the guard is dropped"]
#[derive(Debug)]
pub struct MultiKeyGuard {
    guards: Vec<KeyGuard>,
}

impl MultiKeyGuard {
    /// Number of distinct keys held
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    /// True if no keys are held
    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}

impl KeyLockManager {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, key: &str) -> KeyLock {
        let mut locks = self.locks.lock();
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Block until `key` can be held shared
    pub fn lock_shared(&self, key: &str) -> KeyGuard {
        let lock = self.handle(key);
        let guard = lock.read_arc();
        drop(lock);
        KeyGuard {
            registry: self.locks.clone(),
            key: key.to_string(),
            held: Some(Held::Shared(guard)),
        }
    }

    /// Block until `key` can be held exclusively
    pub fn lock_exclusive(&self, key: &str) -> KeyGuard {
        let lock = self.handle(key);
        let guard = lock.write_arc();
        drop(lock);
        KeyGuard {
            registry: self.locks.clone(),
            key: key.to_string(),
            held: Some(Held::Exclusive(guard)),
        }
    }

    /// Exclusively lock every key in `keys`, in sorted order, duplicates once
    pub fn lock_many_exclusive<'a, I>(&self, keys: I) -> MultiKeyGuard
    where
        I: IntoIterator<Item = &'a str>,
    {
        let ordered: BTreeSet<&str> = keys.into_iter().collect();
        let guards = ordered
            .into_iter()
            .map(|key| self.lock_exclusive(key))
            .collect();
        MultiKeyGuard { guards }
    }

    /// Number of keys currently tracked
    pub fn tracked_keys(&self) -> usize {
        self.locks.lock().len()
    }
}
