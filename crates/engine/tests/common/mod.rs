//! Shared fixtures for the engine integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use snapkv_engine::{Store, StoreConfig};
use snapkv_storage::{CodecError, StorageCodec};

/// Install a test subscriber once; honours RUST_LOG
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub age: u32,
}

pub fn person(name: &str, age: u32) -> Person {
    Person {
        name: name.to_string(),
        age,
    }
}

/// Identity codec whose encode fails while the switch is on
pub struct FailSwitch {
    fail: Arc<AtomicBool>,
}

impl FailSwitch {
    pub fn new() -> (Self, Arc<AtomicBool>) {
        let fail = Arc::new(AtomicBool::new(false));
        (FailSwitch { fail: fail.clone() }, fail)
    }
}

impl StorageCodec for FailSwitch {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CodecError::EncodeError("injected failure".into()));
        }
        Ok(data.to_vec())
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }

    fn codec_id(&self) -> &str {
        "fail-switch"
    }
}

/// Identity codec that sleeps on every encode
pub struct SlowCodec(pub Duration);

impl StorageCodec for SlowCodec {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        thread::sleep(self.0);
        Ok(data.to_vec())
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }

    fn codec_id(&self) -> &str {
        "slow"
    }
}

/// Open a store whose snapshot writes can be made to fail
pub fn open_failable<V: snapkv_engine::StoreValue>(
    dir: &Path,
    name: &str,
) -> (Store<V>, Arc<AtomicBool>) {
    let (codec, fail) = FailSwitch::new();
    let store =
        Store::open_with_codec(name, Some(dir), StoreConfig::default(), Box::new(codec)).unwrap();
    (store, fail)
}
