//! Property tests over whole store handles

use std::collections::HashMap;

use proptest::prelude::*;
use snapkv_engine::{Store, StoreConfig, StoreError, Ttl};
use tempfile::TempDir;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_created_entries_survive_reopen(
        data in prop::collection::hash_map("[a-z]{1,8}", any::<u32>(), 0..20)
    ) {
        let temp_dir = TempDir::new().unwrap();
        {
            let store: Store<u32> = Store::open("props", Some(temp_dir.path())).unwrap();
            for (key, value) in &data {
                store.create(key, *value, Ttl::NEVER).unwrap();
            }
            store.close().unwrap();
        }

        let store: Store<u32> = Store::open("props", Some(temp_dir.path())).unwrap();
        prop_assert_eq!(store.len(), data.len());
        for (key, value) in &data {
            prop_assert_eq!(store.read(key).unwrap(), *value);
        }
    }

    #[test]
    fn prop_quota_rejections_leave_store_untouched(
        sizes in prop::collection::vec(0usize..700, 1..16)
    ) {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::default().with_storage_limit_kb(2);
        let store: Store<String> =
            Store::open_with_config("quota", Some(temp_dir.path()), config).unwrap();

        let mut accepted = HashMap::new();
        for (i, size) in sizes.iter().enumerate() {
            let key = format!("k{}", i);
            let size_before = store.file_size_kb().unwrap();
            let len_before = store.len();
            match store.create(&key, "v".repeat(*size), Ttl::NEVER) {
                Ok(()) => {
                    prop_assert!(size_before <= 2.0);
                    accepted.insert(key, *size);
                }
                Err(StoreError::QuotaExceeded { requested_kb, available_kb }) => {
                    prop_assert!(requested_kb > available_kb);
                    prop_assert_eq!(store.len(), len_before);
                    prop_assert_eq!(store.file_size_kb().unwrap(), size_before);
                }
                Err(other) => prop_assert!(false, "unexpected error: {:?}", other),
            }
        }

        prop_assert_eq!(store.len(), accepted.len());
        store.close().unwrap();

        let reopened: Store<String> = Store::open("quota", Some(temp_dir.path())).unwrap();
        prop_assert_eq!(reopened.len(), accepted.len());
        for (key, size) in &accepted {
            prop_assert_eq!(reopened.read(key).unwrap().len(), *size);
        }
    }
}
