//! Open/closed state of a store
//!
//! `Open → Closing → Closed`. Only `Open` admits new operations. The
//! transition out of `Open` happens exactly once, which is what makes a
//! second `close()` report `AlreadyClosed`.

use std::sync::atomic::{AtomicU8, Ordering};

use snapkv_core::{StoreError, StoreResult};

/// Lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    /// Accepting operations
    Open = 0,
    /// Draining; new operations are rejected
    Closing = 1,
    /// Terminal
    Closed = 2,
}

impl LifecycleState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => LifecycleState::Open,
            1 => LifecycleState::Closing,
            _ => LifecycleState::Closed,
        }
    }
}

/// Atomic lifecycle state shared by all callers of a store
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Start in `Open`
    pub fn new() -> Self {
        Lifecycle {
            state: AtomicU8::new(LifecycleState::Open as u8),
        }
    }

    /// Current state
    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// True only in `Open`
    pub fn is_open(&self) -> bool {
        self.state() == LifecycleState::Open
    }

    /// `Closed` unless the store is open
    pub fn ensure_open(&self) -> StoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(StoreError::Closed)
        }
    }

    /// Move `Open → Closing`. Fails with `AlreadyClosed` for every caller
    /// but the first.
    pub fn begin_close(&self) -> StoreResult<()> {
        self.state
            .compare_exchange(
                LifecycleState::Open as u8,
                LifecycleState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|_| StoreError::AlreadyClosed)
    }

    /// Move to `Closed`
    pub fn finish_close(&self) {
        self.state
            .store(LifecycleState::Closed as u8, Ordering::Release);
    }
}
