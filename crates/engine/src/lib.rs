//! Store engine for snapkv
//!
//! This crate wires the lower layers into a usable store:
//! - Store: open/close, the public operations
//! - OperationEngine: validation, accounting, mutation, rollback
//! - ExpirySweeper: periodic TTL eviction
//! - Lifecycle: open/closing/closed gate
//!
//! The engine is the only component that holds the in-memory map.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod background;
pub mod database;
pub mod lifecycle;
pub mod operations;

pub use background::ExpirySweeper;
pub use database::{Store, StoreConfig};
pub use lifecycle::{Lifecycle, LifecycleState};
pub use operations::{Operation, OperationEngine, Reply, SweepReport};

pub use snapkv_core::{Entry, StoreError, StoreResult, StoreValue, Ttl};
