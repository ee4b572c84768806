//! Size limits and capacity accounting
//!
//! Pure functions that measure what a write would cost and compare it against
//! the configured limits. Nothing here touches the map or the disk; callers
//! run these checks strictly before committing anything.
//!
//! ## Units
//!
//! Limits are configured in kilobytes where 1 KB = 1024 bytes. Measurements
//! are taken in bytes and compared against `limit_kb * 1024`, so there is a
//! single conversion point.

use crate::entry::Entry;
use crate::error::{StoreError, StoreResult};
use serde::Serialize;
use std::collections::HashMap;

/// Bytes per kilobyte
pub const KB: u64 = 1024;

/// Default per-entry limit: 16 MiB
pub const DEFAULT_ENTRY_SIZE_LIMIT_KB: u64 = 16 * 1024;

/// Default aggregate storage limit: 1 GiB
pub const DEFAULT_STORAGE_LIMIT_KB: u64 = 1024 * 1024;

/// Default maximum number of entries in one batch
pub const DEFAULT_BATCH_LIMIT: usize = 500;

/// Default maximum key length in characters
pub const DEFAULT_MAX_KEY_LEN: usize = 32;

/// Convert a byte count to fractional kilobytes
pub fn bytes_to_kb(bytes: u64) -> f64 {
    bytes as f64 / KB as f64
}

/// Limits enforced before any write is admitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum key length in characters (default: 32)
    pub max_key_len: usize,

    /// Maximum serialized entry size in KB (default: 16 MiB)
    pub entry_size_limit_kb: u64,

    /// Maximum snapshot file size in KB (default: 1 GiB)
    pub storage_limit_kb: u64,

    /// Maximum entries per batch (default: 500)
    pub batch_limit: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_key_len: DEFAULT_MAX_KEY_LEN,
            entry_size_limit_kb: DEFAULT_ENTRY_SIZE_LIMIT_KB,
            storage_limit_kb: DEFAULT_STORAGE_LIMIT_KB,
            batch_limit: DEFAULT_BATCH_LIMIT,
        }
    }
}

impl Limits {
    /// Per-entry limit in bytes
    pub fn entry_size_limit_bytes(&self) -> u64 {
        self.entry_size_limit_kb.saturating_mul(KB)
    }

    /// Storage limit in bytes
    pub fn storage_limit_bytes(&self) -> u64 {
        self.storage_limit_kb.saturating_mul(KB)
    }

    /// Reject keys longer than `max_key_len` characters
    pub fn validate_key(&self, key: &str) -> StoreResult<()> {
        let len = key.chars().count();
        if len > self.max_key_len {
            return Err(StoreError::KeyTooLong {
                len,
                max: self.max_key_len,
            });
        }
        Ok(())
    }

    /// Serialized size of one entry in bytes.
    ///
    /// Fails with `EntryTooLarge` if the entry exceeds the per-entry limit.
    pub fn entry_size<V: Serialize>(&self, entry: &Entry<V>) -> StoreResult<u64> {
        let size = serde_json::to_vec(entry)?.len() as u64;
        let limit = self.entry_size_limit_bytes();
        if size > limit {
            return Err(StoreError::EntryTooLarge {
                size_bytes: size,
                limit_bytes: limit,
            });
        }
        Ok(size)
    }

    /// Reject batches with more than `batch_limit` entries
    pub fn check_batch_count(&self, count: usize) -> StoreResult<()> {
        if count > self.batch_limit {
            return Err(StoreError::BatchTooLarge {
                count,
                max: self.batch_limit,
            });
        }
        Ok(())
    }

    /// Serialized size of a whole batch in bytes.
    ///
    /// Measured as one map encode, which is what actually lands in the
    /// snapshot, rather than the sum of per-entry encodings.
    pub fn batch_size<V: Serialize>(&self, batch: &HashMap<String, Entry<V>>) -> StoreResult<u64> {
        Ok(serde_json::to_vec(batch)?.len() as u64)
    }

    /// True if `current + incoming` fits within the storage limit
    pub fn can_admit(&self, current_bytes: u64, incoming_bytes: u64) -> bool {
        current_bytes.saturating_add(incoming_bytes) <= self.storage_limit_bytes()
    }

    /// Like [`can_admit`](Self::can_admit) but reports the headroom on failure
    pub fn admit(&self, current_bytes: u64, incoming_bytes: u64) -> StoreResult<()> {
        if self.can_admit(current_bytes, incoming_bytes) {
            return Ok(());
        }
        let available = self.storage_limit_bytes().saturating_sub(current_bytes);
        Err(StoreError::QuotaExceeded {
            requested_kb: bytes_to_kb(incoming_bytes),
            available_kb: bytes_to_kb(available),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Ttl;
    use proptest::prelude::*;

    fn small_limits() -> Limits {
        Limits {
            max_key_len: 4,
            entry_size_limit_kb: 1,
            storage_limit_kb: 4,
            batch_limit: 3,
        }
    }

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.max_key_len, 32);
        assert_eq!(limits.batch_limit, 500);
        assert_eq!(limits.entry_size_limit_bytes(), 16 * 1024 * 1024);
        assert_eq!(limits.storage_limit_bytes(), 1024 * 1024 * 1024);
    }

    #[test]
    fn test_validate_key_counts_characters() {
        let limits = small_limits();
        assert!(limits.validate_key("abcd").is_ok());
        // Four characters, eight bytes
        assert!(limits.validate_key("éééé").is_ok());
        assert!(matches!(
            limits.validate_key("abcde"),
            Err(StoreError::KeyTooLong { len: 5, max: 4 })
        ));
    }

    #[test]
    fn test_entry_size_limit_is_in_kilobytes() {
        let limits = small_limits();

        let fits = Entry::new("x".repeat(900), Ttl::NEVER);
        let size = limits.entry_size(&fits).unwrap();
        assert!(size > 900 && size <= 1024);

        let too_big = Entry::new("x".repeat(1024), Ttl::NEVER);
        match limits.entry_size(&too_big) {
            Err(StoreError::EntryTooLarge {
                size_bytes,
                limit_bytes,
            }) => {
                assert_eq!(limit_bytes, 1024);
                assert!(size_bytes > 1024);
            }
            other => panic!("expected EntryTooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_batch_count() {
        let limits = small_limits();
        assert!(limits.check_batch_count(3).is_ok());
        assert!(matches!(
            limits.check_batch_count(4),
            Err(StoreError::BatchTooLarge { count: 4, max: 3 })
        ));
    }

    #[test]
    fn test_batch_size_is_single_map_encode() {
        let limits = Limits::default();
        let mut batch = HashMap::new();
        batch.insert("a".to_string(), Entry::new(1u32, Ttl::NEVER));
        batch.insert("b".to_string(), Entry::new(2u32, Ttl::seconds(3)));

        let expected = serde_json::to_vec(&batch).unwrap().len() as u64;
        assert_eq!(limits.batch_size(&batch).unwrap(), expected);
    }

    #[test]
    fn test_admit_reports_headroom() {
        let limits = small_limits();
        assert!(limits.admit(3 * KB, KB).is_ok());

        match limits.admit(3 * KB, KB + 512) {
            Err(StoreError::QuotaExceeded {
                requested_kb,
                available_kb,
            }) => {
                assert_eq!(requested_kb, 1.5);
                assert_eq!(available_kb, 1.0);
            }
            other => panic!("expected QuotaExceeded, got {:?}", other),
        }
    }

    #[test]
    fn test_admit_when_already_over_limit() {
        let limits = small_limits();
        match limits.admit(10 * KB, 1) {
            Err(StoreError::QuotaExceeded { available_kb, .. }) => assert_eq!(available_kb, 0.0),
            other => panic!("expected QuotaExceeded, got {:?}", other),
        }
    }

    proptest! {
        #[test]
        fn prop_can_admit_matches_arithmetic(
            limit_kb in 0u64..10_000,
            current in 0u64..20_000_000,
            incoming in 0u64..20_000_000,
        ) {
            let limits = Limits { storage_limit_kb: limit_kb, ..Limits::default() };
            prop_assert_eq!(
                limits.can_admit(current, incoming),
                current + incoming <= limit_kb * KB
            );
            prop_assert_eq!(limits.admit(current, incoming).is_ok(), limits.can_admit(current, incoming));
        }
    }
}
