//! snapkv - embeddable single-file key-value store
//!
//! An in-memory map persisted to one JSON file, with per-entry TTL expiry,
//! size quotas and a dispatcher that lets many threads share one store.
//!
//! # Quick Start
//!
//! ```ignore
//! use snapkv::{Store, Ttl};
//!
//! let store: Store<String> = Store::open("sessions", Some(dir))?;
//! store.create("abc", "user-1".to_string(), Ttl::seconds(30))?;
//! let who = store.read("abc")?;
//! store.close()?;
//! ```
//!
//! # Architecture
//!
//! - `snapkv-core`: entries, limits, errors
//! - `snapkv-storage`: snapshot file, codec seam, process lock
//! - `snapkv-concurrency`: per-key locks and the dispatcher
//! - `snapkv-engine`: operation engine, sweeper, lifecycle, [`Store`]
//!
//! Only the store handle and its vocabulary are re-exported here.

pub use snapkv_core::{Entry, Limits, StoreError, StoreResult, StoreValue, Ttl};
pub use snapkv_engine::{Store, StoreConfig, SweepReport};
pub use snapkv_storage::{
    validate_file_name, CodecError, DataFilePathError, IdentityCodec, StorageCodec,
    DEFAULT_FILE_NAME,
};
