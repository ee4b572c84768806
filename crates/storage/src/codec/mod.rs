//! Byte seam between the JSON encoder and the data file
//!
//! `SnapshotStore` hands the serialized map to a [`StorageCodec`] before
//! writing and passes file bytes back through it before parsing. Stores
//! opened without an explicit codec use [`IdentityCodec`].

mod identity;
mod traits;

pub use identity::IdentityCodec;
pub use traits::{CodecError, StorageCodec};
