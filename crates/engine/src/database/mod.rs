//! Store: the public handle
//!
//! Opening a store wires the layers together in this order:
//! 1. validate config and file name
//! 2. create the directory, take the process lock
//! 3. remove a leftover temp file, load or initialize the snapshot
//! 4. start the dispatcher workers and the expiry sweeper
//!
//! Every operation checks the lifecycle first, then goes through the
//! dispatcher. `close()` tears down in reverse: stop admitting, stop the
//! sweeper, drain the dispatcher, release the lock.
//!
//! # Example
//!
//! ```ignore
//! use snapkv_engine::{Store, Ttl};
//!
//! let store: Store<String> = Store::open("users", Some(dir.path()))?;
//! store.create("alice", "admin".to_string(), Ttl::NEVER)?;
//! assert_eq!(store.read("alice")?, "admin");
//! store.close()?;
//! ```

pub mod config;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use snapkv_concurrency::Dispatcher;
use snapkv_core::{Entry, StoreError, StoreResult, StoreValue, Ttl};
use snapkv_storage::{DataFilePaths, IdentityCodec, ProcessLock, SnapshotStore, StorageCodec};

use crate::background::ExpirySweeper;
use crate::lifecycle::Lifecycle;
use crate::operations::{Operation, OperationEngine, Reply, SweepReport};

pub use config::StoreConfig;

/// An open key-value store backed by one snapshot file
pub struct Store<V: StoreValue> {
    engine: Arc<OperationEngine<V>>,
    dispatcher: Dispatcher<OperationEngine<V>>,
    sweeper: ExpirySweeper,
    lifecycle: Lifecycle,
    lock: ProcessLock,
    paths: DataFilePaths,
    config: StoreConfig,
}

impl<V: StoreValue> Store<V> {
    /// Open `name` in `dir` (current directory if `None`) with defaults
    pub fn open(name: &str, dir: Option<&Path>) -> StoreResult<Self> {
        Self::open_with_config(name, dir, StoreConfig::default())
    }

    /// Open with an explicit configuration
    pub fn open_with_config(
        name: &str,
        dir: Option<&Path>,
        config: StoreConfig,
    ) -> StoreResult<Self> {
        Self::open_with_codec(name, dir, config, Box::new(IdentityCodec))
    }

    /// Open with an explicit configuration and snapshot codec
    pub fn open_with_codec(
        name: &str,
        dir: Option<&Path>,
        config: StoreConfig,
        codec: Box<dyn StorageCodec>,
    ) -> StoreResult<Self> {
        config.validate()?;
        let paths = DataFilePaths::new(dir.unwrap_or_else(|| Path::new(".")), name)?;
        paths.create_dir()?;

        // Lock before reading so a second owner never sees a half-written file
        let lock = ProcessLock::acquire(paths.lock_file())?;

        let snapshot = SnapshotStore::with_codec(paths.clone(), codec);
        let data = snapshot.initialize()?;
        let loaded = data.len();

        let engine = Arc::new(OperationEngine::new(data, snapshot, config.limits()));
        let dispatcher = Dispatcher::start(engine.clone(), &config.dispatcher_config())?;
        let sweeper = ExpirySweeper::start(engine.clone(), config.sweep_interval())?;

        info!(
            target: "snapkv::store",
            path = %paths.data_file().display(),
            entries = loaded,
            "Store opened"
        );

        Ok(Store {
            engine,
            dispatcher,
            sweeper,
            lifecycle: Lifecycle::new(),
            lock,
            paths,
            config,
        })
    }

    fn call(&self, op: Operation<V>) -> StoreResult<Reply<V>> {
        self.lifecycle.ensure_open()?;
        self.dispatcher.call(op)?
    }

    fn expect_done(reply: Reply<V>) -> StoreResult<()> {
        match reply {
            Reply::Done => Ok(()),
            Reply::Entry(_) => Err(StoreError::internal("unexpected entry reply")),
        }
    }

    /// Insert a new entry
    pub fn create(&self, key: &str, value: V, ttl: Ttl) -> StoreResult<()> {
        self.call(Operation::Create {
            key: key.to_string(),
            value,
            ttl,
        })
        .and_then(Self::expect_done)
    }

    /// Value of a live entry
    pub fn read(&self, key: &str) -> StoreResult<V> {
        self.read_entry(key).map(|entry| entry.value)
    }

    /// A live entry with its TTL and creation time
    pub fn read_entry(&self, key: &str) -> StoreResult<Entry<V>> {
        match self.call(Operation::Read {
            key: key.to_string(),
        })? {
            Reply::Entry(entry) => Ok(entry),
            Reply::Done => Err(StoreError::internal("read returned no entry")),
        }
    }

    /// Replace the value of a live entry, keeping its TTL window
    pub fn update(&self, key: &str, value: V) -> StoreResult<()> {
        self.call(Operation::Update {
            key: key.to_string(),
            value,
        })
        .and_then(Self::expect_done)
    }

    /// Remove a live entry
    pub fn delete(&self, key: &str) -> StoreResult<()> {
        self.call(Operation::Delete {
            key: key.to_string(),
        })
        .and_then(Self::expect_done)
    }

    /// Insert every entry of `entries` or none of them
    pub fn batch_create(&self, entries: HashMap<String, (V, Ttl)>) -> StoreResult<()> {
        self.call(Operation::BatchCreate { entries })
            .and_then(Self::expect_done)
    }

    /// Run one expiry sweep now, outside the periodic schedule
    pub fn sweep_expired(&self) -> StoreResult<SweepReport> {
        self.lifecycle.ensure_open()?;
        Ok(self.engine.sweep())
    }

    /// Stop admitting operations, drain pending ones and release the lock.
    ///
    /// A second call fails with `AlreadyClosed`.
    pub fn close(&self) -> StoreResult<()> {
        self.lifecycle.begin_close()?;

        self.sweeper.stop();
        self.dispatcher.close();

        let released = self.lock.release();
        self.lifecycle.finish_close();

        match &released {
            Ok(()) => info!(
                target: "snapkv::store",
                path = %self.paths.data_file().display(),
                "Store closed"
            ),
            Err(e) => warn!(
                target: "snapkv::store",
                path = %self.paths.data_file().display(),
                error = %e,
                "Store closed but lock release failed"
            ),
        }
        released
    }

    /// True until `close()` begins
    pub fn is_open(&self) -> bool {
        self.lifecycle.is_open()
    }

    /// Number of entries in memory, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        self.engine.len()
    }

    /// True if there are no entries in memory
    pub fn is_empty(&self) -> bool {
        self.engine.is_empty()
    }

    /// Path of the snapshot file
    pub fn path(&self) -> PathBuf {
        self.paths.data_file()
    }

    /// Current snapshot file size in KB
    pub fn file_size_kb(&self) -> StoreResult<f64> {
        self.engine.snapshot().file_size_kb()
    }

    /// Configuration this store was opened with
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

impl<V: StoreValue> Drop for Store<V> {
    fn drop(&mut self) {
        if self.lifecycle.is_open() {
            let _ = self.close();
        }
    }
}

impl<V: StoreValue> std::fmt::Debug for Store<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.paths.data_file())
            .field("state", &self.lifecycle.state())
            .finish()
    }
}
