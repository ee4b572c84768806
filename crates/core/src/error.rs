//! Error types for snapkv
//!
//! Every failure a caller can observe is a [`StoreError`] variant.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! ## Taxonomy
//!
//! | Class | Variants | Mutation attempted? |
//! |-------|----------|---------------------|
//! | validation | `InvalidName`, `KeyTooLong`, `EntryExists`, `KeyNotFound`, `KeyExpired`, `InvalidConfig` | no |
//! | quota | `EntryTooLarge`, `QuotaExceeded`, `BatchTooLarge` | no |
//! | persistence | `PersistenceFailed`, `CorruptSnapshot`, `SizeUnavailable`, `Io` | rolled back |
//! | lifecycle | `Closed`, `AlreadyClosed`, `Timeout` | no |
//! | ownership | `AlreadyLocked` | no (fatal to that open only) |

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for snapkv operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Error types for the store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Data file name rejected by validation
    #[error("Invalid file name: {0}")]
    InvalidName(String),

    /// Key is longer than the configured maximum
    #[error("Key length {len} exceeds maximum of {max} characters")]
    KeyTooLong {
        /// Length of the offending key in characters
        len: usize,
        /// Configured maximum
        max: usize,
    },

    /// A live entry already exists under this key
    #[error("Entry already exists: {0}")]
    EntryExists(String),

    /// No entry exists under this key
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// The entry existed but its TTL has elapsed; it has been evicted
    #[error("Key expired: {0}")]
    KeyExpired(String),

    /// Serialized entry exceeds the per-entry size limit
    #[error("Entry size {size_bytes} bytes exceeds limit of {limit_bytes} bytes")]
    EntryTooLarge {
        /// Serialized size of the rejected entry
        size_bytes: u64,
        /// Configured per-entry limit
        limit_bytes: u64,
    },

    /// Admitting the write would push the snapshot past the storage limit
    #[error("Storage quota exceeded: requested {requested_kb:.2} KB, available {available_kb:.2} KB")]
    QuotaExceeded {
        /// Size of the incoming write
        requested_kb: f64,
        /// Remaining headroom before the write
        available_kb: f64,
    },

    /// Batch has more entries than allowed
    #[error("Batch of {count} entries exceeds maximum of {max}")]
    BatchTooLarge {
        /// Number of entries in the rejected batch
        count: usize,
        /// Configured maximum
        max: usize,
    },

    /// Snapshot could not be written; the in-memory change was rolled back
    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),

    /// Snapshot file exists but could not be decoded
    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    /// Snapshot file could not be stat'ed
    #[error("File size unavailable: {0}")]
    SizeUnavailable(String),

    /// Another handle holds the process-exclusivity lock
    #[error("Data file at '{}' is locked by another owner", .0.display())]
    AlreadyLocked(PathBuf),

    /// Operation attempted on a closed store
    #[error("Store is closed")]
    Closed,

    /// `close()` called more than once
    #[error("Store is already closed")]
    AlreadyClosed,

    /// Caller deadline elapsed before the response arrived
    #[error("Operation timed out waiting for a response")]
    Timeout,

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Create a persistence failure from any displayable cause
    pub fn persistence(cause: impl std::fmt::Display) -> Self {
        StoreError::PersistenceFailed(cause.to_string())
    }

    /// Create a corrupt snapshot error from any displayable cause
    pub fn corrupt(cause: impl std::fmt::Display) -> Self {
        StoreError::CorruptSnapshot(cause.to_string())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        StoreError::Internal(msg.into())
    }

    /// Bad input that was rejected before any state was touched
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidName(_)
                | StoreError::KeyTooLong { .. }
                | StoreError::EntryExists(_)
                | StoreError::KeyNotFound(_)
                | StoreError::KeyExpired(_)
                | StoreError::InvalidConfig(_)
        )
    }

    /// Size or count limit violation, reported before any mutation
    pub fn is_quota(&self) -> bool {
        matches!(
            self,
            StoreError::EntryTooLarge { .. }
                | StoreError::QuotaExceeded { .. }
                | StoreError::BatchTooLarge { .. }
        )
    }

    /// Disk or encoding failure
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            StoreError::PersistenceFailed(_)
                | StoreError::CorruptSnapshot(_)
                | StoreError::SizeUnavailable(_)
                | StoreError::Io(_)
        )
    }

    /// Rejected because of the store's open/closed state
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            StoreError::Closed | StoreError::AlreadyClosed | StoreError::Timeout
        )
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::PersistenceFailed(format!("encode failed: {}", e))
    }
}
