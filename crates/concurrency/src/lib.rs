//! Concurrency layer for snapkv
//!
//! - [`KeyLockManager`]: per-key reader/writer locks with automatic cleanup
//! - [`Dispatcher`]: bounded write/read lanes feeding one writer and a
//!   pool of readers, with one-shot replies

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dispatcher;
pub mod key_locks;

pub use dispatcher::{DispatchError, Dispatcher, DispatcherConfig, Lane, OperationHandler};
pub use key_locks::{KeyGuard, KeyLockManager, MultiKeyGuard};
