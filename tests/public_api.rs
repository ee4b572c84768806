//! Smoke tests against the top-level re-exports only

use serde::{Deserialize, Serialize};
use snapkv::{
    validate_file_name, DataFilePathError, Store, StoreConfig, StoreError, Ttl, DEFAULT_FILE_NAME,
};
use std::collections::HashMap;
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Session {
    user: String,
    hits: u32,
}

#[test]
fn test_round_trip_through_facade() {
    let dir = TempDir::new().unwrap();

    {
        let store: Store<Session> = Store::open("sessions", Some(dir.path())).unwrap();
        store
            .create(
                "s1",
                Session {
                    user: "ana".into(),
                    hits: 1,
                },
                Ttl::NEVER,
            )
            .unwrap();

        let mut batch = HashMap::new();
        for i in 0..3 {
            batch.insert(
                format!("b{}", i),
                (
                    Session {
                        user: format!("u{}", i),
                        hits: i,
                    },
                    Ttl::seconds(3600),
                ),
            );
        }
        store.batch_create(batch).unwrap();
        store.close().unwrap();
    }

    let store: Store<Session> = Store::open("sessions.json", Some(dir.path())).unwrap();
    assert_eq!(store.len(), 4);
    assert_eq!(store.read("s1").unwrap().user, "ana");
    assert_eq!(store.read_entry("b2").unwrap().ttl, Ttl::seconds(3600));
}

#[test]
fn test_errors_are_classified() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::default().with_max_key_len(4);
    let store: Store<u32> = Store::open_with_config("nums", Some(dir.path()), config).unwrap();

    assert!(matches!(
        store.create("toolong", 1, Ttl::NEVER),
        Err(StoreError::KeyTooLong { len: 7, max: 4 })
    ));
    assert!(matches!(store.read("nope"), Err(StoreError::KeyNotFound(_))));

    store.close().unwrap();
    assert!(matches!(store.close(), Err(StoreError::AlreadyClosed)));
}

#[test]
fn test_file_name_rules_exposed() {
    assert_eq!(DEFAULT_FILE_NAME, "default_file.json");
    assert!(validate_file_name("users").is_ok());
    assert!(matches!(
        validate_file_name("a.b.json"),
        Err(DataFilePathError::ExtraDot)
    ));
}
