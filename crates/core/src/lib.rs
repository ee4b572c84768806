//! Core types for snapkv
//!
//! This crate defines the shared vocabulary of the store:
//! - Entry: value + TTL + creation time, with derived expiry
//! - Limits: key length, entry size, storage and batch quotas
//! - StoreError: the single error type surfaced to callers
//!
//! It has no I/O and no threads; the storage and engine crates build on it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entry;
pub mod error;
pub mod limits;

pub use entry::{Entry, StoreValue, Ttl};
pub use error::{StoreError, StoreResult};
pub use limits::{bytes_to_kb, Limits, KB};
