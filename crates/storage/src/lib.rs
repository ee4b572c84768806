//! On-disk layer for snapkv
//!
//! - [`codec`]: byte transformation seam between serialization and disk
//! - [`paths`]: data file naming and validation
//! - [`snapshot`]: whole-map snapshot with atomic replace
//! - [`lock`]: single-owner lock on the data file

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod lock;
pub mod paths;
pub mod snapshot;

pub use codec::{CodecError, IdentityCodec, StorageCodec};
pub use lock::ProcessLock;
pub use paths::{validate_file_name, DataFilePathError, DataFilePaths, DEFAULT_FILE_NAME};
pub use snapshot::SnapshotStore;
