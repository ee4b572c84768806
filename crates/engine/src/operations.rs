//! Operation engine
//!
//! Owns the authoritative in-memory map and runs every mutation through the
//! same sequence:
//!
//! ```text
//! validate → account → mutate memory → sync snapshot
//!                                         │
//!                              failure ───┴──► undo memory change
//! ```
//!
//! ## Locking
//!
//! Two layers, always taken in this order:
//! 1. the key's lock (shared for reads, exclusive for writes)
//! 2. the map gate (`RwLock` around the map)
//!
//! The sweeper takes only the gate. Reads hold the gate shared; writes and
//! evictions hold it exclusively across the snapshot sync, so the file never
//! lags behind a mutation another thread can observe.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, warn};

use snapkv_concurrency::{KeyLockManager, Lane, OperationHandler};
use snapkv_core::{Entry, Limits, StoreError, StoreResult, StoreValue, Ttl};
use snapkv_storage::SnapshotStore;

/// A request travelling through the dispatcher
#[derive(Debug)]
pub enum Operation<V> {
    /// Insert a new key
    Create {
        /// Key to insert
        key: String,
        /// Value to store
        value: V,
        /// Time-to-live
        ttl: Ttl,
    },
    /// Fetch a live entry
    Read {
        /// Key to fetch
        key: String,
    },
    /// Replace the value of a live entry
    Update {
        /// Key to update
        key: String,
        /// New value
        value: V,
    },
    /// Remove a live entry
    Delete {
        /// Key to remove
        key: String,
    },
    /// Insert many new keys, all or nothing
    BatchCreate {
        /// Keys with their values and TTLs
        entries: HashMap<String, (V, Ttl)>,
    },
}

impl<V> Operation<V> {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Create { .. } => "create",
            Operation::Read { .. } => "read",
            Operation::Update { .. } => "update",
            Operation::Delete { .. } => "delete",
            Operation::BatchCreate { .. } => "batch_create",
        }
    }
}

/// Successful result of an [`Operation`]
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<V> {
    /// Mutation committed
    Done,
    /// Entry returned by a read
    Entry(Entry<V>),
}

/// Outcome of one expiry sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepReport {
    /// Entries removed from memory
    pub evicted: usize,
    /// False if the follow-up sync failed; memory keeps the evictions
    pub persisted: bool,
}

/// In-memory map plus the rules for changing it
pub struct OperationEngine<V> {
    map: RwLock<HashMap<String, Entry<V>>>,
    key_locks: KeyLockManager,
    snapshot: SnapshotStore,
    limits: Limits,
}

impl<V: StoreValue> OperationEngine<V> {
    /// Engine over an already-loaded map
    pub fn new(data: HashMap<String, Entry<V>>, snapshot: SnapshotStore, limits: Limits) -> Self {
        OperationEngine {
            map: RwLock::new(data),
            key_locks: KeyLockManager::new(),
            snapshot,
            limits,
        }
    }

    /// Limits in force
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Snapshot backing this engine
    pub fn snapshot(&self) -> &SnapshotStore {
        &self.snapshot
    }

    /// Number of entries in memory, expired or not
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// True if the map is empty
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    /// Keys currently holding a lock entry
    pub fn locked_keys(&self) -> usize {
        self.key_locks.tracked_keys()
    }

    /// Insert `key` if no live entry holds it.
    ///
    /// An expired entry under the same key is replaced; the eviction and the
    /// insert are persisted together.
    pub fn create(&self, key: &str, value: V, ttl: Ttl) -> StoreResult<()> {
        self.limits.validate_key(key)?;
        let _guard = self.key_locks.lock_exclusive(key);

        let mut map = self.map.write();
        if map.get(key).is_some_and(|e| !e.is_expired()) {
            return Err(StoreError::EntryExists(key.to_string()));
        }

        let entry = Entry::new(value, ttl);
        let size = self.limits.entry_size(&entry)?;
        self.limits.admit(self.snapshot.file_size_bytes()?, size)?;

        let stale = map.insert(key.to_string(), entry);
        if let Err(e) = self.snapshot.sync(&map) {
            match stale {
                Some(old) => map.insert(key.to_string(), old),
                None => map.remove(key),
            };
            warn!(target: "snapkv::engine", key, error = %e, "Create rolled back");
            return Err(e);
        }

        debug!(target: "snapkv::engine", key, size_bytes = size, "Created");
        Ok(())
    }

    /// Fetch a live entry.
    ///
    /// An expired entry is evicted and reported as `KeyExpired`. If the
    /// eviction cannot be persisted the entry is put back and the read still
    /// fails with `KeyExpired`.
    pub fn read(&self, key: &str) -> StoreResult<Entry<V>> {
        let _guard = self.key_locks.lock_shared(key);

        {
            let map = self.map.read();
            match map.get(key) {
                None => return Err(StoreError::KeyNotFound(key.to_string())),
                Some(entry) if !entry.is_expired() => return Ok(entry.clone()),
                Some(_) => {}
            }
        }

        // Expired: retake the gate exclusively and re-check, another reader
        // or the sweeper may have evicted it in between
        let mut map = self.map.write();
        match map.get(key) {
            None => return Err(StoreError::KeyExpired(key.to_string())),
            Some(entry) if !entry.is_expired() => return Ok(entry.clone()),
            Some(_) => {}
        }
        if let Err(e) = self.evict(&mut map, key) {
            warn!(
                target: "snapkv::engine",
                key,
                error = %e,
                "Lazy eviction on read could not be persisted"
            );
        }
        Err(StoreError::KeyExpired(key.to_string()))
    }

    /// Replace the value of a live entry. `created_at` and `ttl` are kept.
    pub fn update(&self, key: &str, value: V) -> StoreResult<()> {
        self.limits.validate_key(key)?;
        let _guard = self.key_locks.lock_exclusive(key);

        let mut map = self.map.write();
        let current = map
            .get(key)
            .map(|e| (e.is_expired(), e.ttl, e.created_at));
        let (ttl, created_at) = match current {
            None => return Err(StoreError::KeyNotFound(key.to_string())),
            Some((true, _, _)) => {
                self.evict(&mut map, key)?;
                return Err(StoreError::KeyExpired(key.to_string()));
            }
            Some((false, ttl, created_at)) => (ttl, created_at),
        };

        let entry = Entry::with_created_at(value, ttl, created_at);
        let size = self.limits.entry_size(&entry)?;
        self.limits.admit(self.snapshot.file_size_bytes()?, size)?;

        let previous = map.insert(key.to_string(), entry);
        if let Err(e) = self.snapshot.sync(&map) {
            if let Some(old) = previous {
                map.insert(key.to_string(), old);
            }
            warn!(target: "snapkv::engine", key, error = %e, "Update rolled back");
            return Err(e);
        }

        debug!(target: "snapkv::engine", key, size_bytes = size, "Updated");
        Ok(())
    }

    /// Remove a live entry.
    ///
    /// An expired entry is evicted and reported as `KeyExpired`; if that
    /// eviction cannot be persisted the error is `PersistenceFailed`.
    ///
    /// No key-length check: a key too long to create is simply not found.
    pub fn delete(&self, key: &str) -> StoreResult<()> {
        let _guard = self.key_locks.lock_exclusive(key);

        let mut map = self.map.write();
        let expired = match map.get(key) {
            None => return Err(StoreError::KeyNotFound(key.to_string())),
            Some(entry) => entry.is_expired(),
        };
        self.evict(&mut map, key)?;
        if expired {
            return Err(StoreError::KeyExpired(key.to_string()));
        }

        debug!(target: "snapkv::engine", key, "Deleted");
        Ok(())
    }

    /// Insert every entry or none of them.
    ///
    /// Keys are checked in sorted order and the first bad one fails the
    /// whole batch before anything is touched.
    pub fn batch_create(&self, entries: HashMap<String, (V, Ttl)>) -> StoreResult<()> {
        self.limits.check_batch_count(entries.len())?;
        let ordered: BTreeMap<String, (V, Ttl)> = entries.into_iter().collect();
        for key in ordered.keys() {
            self.limits.validate_key(key)?;
        }

        let _guards = self
            .key_locks
            .lock_many_exclusive(ordered.keys().map(String::as_str));

        let mut map = self.map.write();
        for key in ordered.keys() {
            if map.get(key).is_some_and(|e| !e.is_expired()) {
                return Err(StoreError::EntryExists(key.clone()));
            }
        }

        let now = Utc::now();
        let mut batch = HashMap::with_capacity(ordered.len());
        for (key, (value, ttl)) in ordered {
            let entry = Entry::with_created_at(value, ttl, now);
            self.limits.entry_size(&entry)?;
            batch.insert(key, entry);
        }
        let size = self.limits.batch_size(&batch)?;
        self.limits.admit(self.snapshot.file_size_bytes()?, size)?;

        let count = batch.len();
        let keys: Vec<String> = batch.keys().cloned().collect();
        let mut displaced = Vec::new();
        for (key, entry) in batch {
            if let Some(old) = map.insert(key.clone(), entry) {
                displaced.push((key, old));
            }
        }

        if let Err(e) = self.snapshot.sync(&map) {
            for key in &keys {
                map.remove(key);
            }
            map.extend(displaced);
            warn!(target: "snapkv::engine", count, error = %e, "Batch create rolled back");
            return Err(e);
        }

        debug!(target: "snapkv::engine", count, size_bytes = size, "Batch created");
        Ok(())
    }

    /// Remove every expired entry and persist once.
    ///
    /// A failed sync is logged and the evictions stay in memory; the next
    /// successful write carries them to disk.
    pub fn sweep(&self) -> SweepReport {
        let mut map = self.map.write();
        let now = Utc::now();
        let before = map.len();
        map.retain(|_, entry| !entry.is_expired_at(now));
        let evicted = before - map.len();

        if evicted == 0 {
            return SweepReport {
                evicted,
                persisted: true,
            };
        }

        let persisted = match self.snapshot.sync(&map) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    target: "snapkv::sweeper",
                    evicted,
                    error = %e,
                    "Sweep evictions not persisted"
                );
                false
            }
        };
        debug!(target: "snapkv::sweeper", evicted, persisted, "Sweep finished");
        SweepReport { evicted, persisted }
    }

    /// Remove `key` and persist; put it back if the sync fails
    fn evict(&self, map: &mut HashMap<String, Entry<V>>, key: &str) -> StoreResult<()> {
        let Some(removed) = map.remove(key) else {
            return Ok(());
        };
        if let Err(e) = self.snapshot.sync(map) {
            map.insert(key.to_string(), removed);
            return Err(e);
        }
        Ok(())
    }
}

impl<V: StoreValue> OperationHandler for OperationEngine<V> {
    type Op = Operation<V>;
    type Output = StoreResult<Reply<V>>;

    fn lane(&self, op: &Operation<V>) -> Lane {
        match op {
            Operation::Read { .. } => Lane::Read,
            _ => Lane::Write,
        }
    }

    fn execute(&self, op: Operation<V>) -> StoreResult<Reply<V>> {
        let name = op.name();
        let result = match op {
            Operation::Create { key, value, ttl } => {
                self.create(&key, value, ttl).map(|_| Reply::Done)
            }
            Operation::Read { key } => self.read(&key).map(Reply::Entry),
            Operation::Update { key, value } => self.update(&key, value).map(|_| Reply::Done),
            Operation::Delete { key } => self.delete(&key).map(|_| Reply::Done),
            Operation::BatchCreate { entries } => {
                self.batch_create(entries).map(|_| Reply::Done)
            }
        };
        if let Err(e) = &result {
            debug!(target: "snapkv::engine", op = name, error = %e, "Operation rejected");
        }
        result
    }
}
