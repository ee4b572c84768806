//! Store configuration
//!
//! Every field has a default, so an empty TOML file is a valid config. The
//! store never writes a config file on its own; `write_to_file` exists for
//! tools that want to materialize one.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use snapkv_concurrency::DispatcherConfig;
use snapkv_core::limits::{
    DEFAULT_BATCH_LIMIT, DEFAULT_ENTRY_SIZE_LIMIT_KB, DEFAULT_MAX_KEY_LEN,
    DEFAULT_STORAGE_LIMIT_KB,
};
use snapkv_core::{Limits, StoreError, StoreResult};

/// Store configuration, loadable from TOML.
///
/// # Example
///
/// ```toml
/// entry_size_limit_kb = 16384
/// storage_limit_kb = 1048576
/// batch_limit = 500
/// sweep_interval_ms = 60000
/// # call_timeout_ms = 5000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Per-entry serialized size limit in KB (1 KB = 1024 bytes)
    #[serde(default = "default_entry_size_limit_kb")]
    pub entry_size_limit_kb: u64,
    /// Snapshot file size limit in KB
    #[serde(default = "default_storage_limit_kb")]
    pub storage_limit_kb: u64,
    /// Max entries per batch create
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
    /// Max key length in characters
    #[serde(default = "default_max_key_len")]
    pub max_key_len: usize,
    /// Period of the background expiry sweep
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// Bound of each dispatcher lane
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Reader threads serving the read lane
    #[serde(default = "default_reader_threads")]
    pub reader_threads: usize,
    /// How long a caller waits for a reply before giving up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_timeout_ms: Option<u64>,
}

fn default_entry_size_limit_kb() -> u64 {
    DEFAULT_ENTRY_SIZE_LIMIT_KB
}

fn default_storage_limit_kb() -> u64 {
    DEFAULT_STORAGE_LIMIT_KB
}

fn default_batch_limit() -> usize {
    DEFAULT_BATCH_LIMIT
}

fn default_max_key_len() -> usize {
    DEFAULT_MAX_KEY_LEN
}

fn default_sweep_interval_ms() -> u64 {
    60_000
}

fn default_queue_capacity() -> usize {
    100
}

fn default_reader_threads() -> usize {
    2
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            entry_size_limit_kb: default_entry_size_limit_kb(),
            storage_limit_kb: default_storage_limit_kb(),
            batch_limit: default_batch_limit(),
            max_key_len: default_max_key_len(),
            sweep_interval_ms: default_sweep_interval_ms(),
            queue_capacity: default_queue_capacity(),
            reader_threads: default_reader_threads(),
            call_timeout_ms: None,
        }
    }
}

impl StoreConfig {
    /// Set the per-entry limit
    pub fn with_entry_size_limit_kb(mut self, kb: u64) -> Self {
        self.entry_size_limit_kb = kb;
        self
    }

    /// Set the storage limit
    pub fn with_storage_limit_kb(mut self, kb: u64) -> Self {
        self.storage_limit_kb = kb;
        self
    }

    /// Set the batch limit
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit;
        self
    }

    /// Set the maximum key length
    pub fn with_max_key_len(mut self, len: usize) -> Self {
        self.max_key_len = len;
        self
    }

    /// Set the sweep period
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the lane bound
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the reader pool size
    pub fn with_reader_threads(mut self, threads: usize) -> Self {
        self.reader_threads = threads;
        self
    }

    /// Set or clear the caller deadline
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout_ms = timeout.map(|d| d.as_millis() as u64);
        self
    }

    /// Reject values the store cannot run with
    pub fn validate(&self) -> StoreResult<()> {
        let checks: [(bool, &str); 7] = [
            (self.entry_size_limit_kb == 0, "entry_size_limit_kb must be greater than 0"),
            (self.storage_limit_kb == 0, "storage_limit_kb must be greater than 0"),
            (self.batch_limit == 0, "batch_limit must be greater than 0"),
            (self.max_key_len == 0, "max_key_len must be greater than 0"),
            (self.sweep_interval_ms == 0, "sweep_interval_ms must be greater than 0"),
            (self.queue_capacity == 0, "queue_capacity must be greater than 0"),
            (self.reader_threads == 0, "reader_threads must be greater than 0"),
        ];
        if let Some((_, msg)) = checks.iter().find(|(bad, _)| *bad) {
            return Err(StoreError::InvalidConfig(msg.to_string()));
        }
        if self.call_timeout_ms == Some(0) {
            return Err(StoreError::InvalidConfig(
                "call_timeout_ms must be greater than 0 when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Limits enforced by the operation engine
    pub fn limits(&self) -> Limits {
        Limits {
            max_key_len: self.max_key_len,
            entry_size_limit_kb: self.entry_size_limit_kb,
            storage_limit_kb: self.storage_limit_kb,
            batch_limit: self.batch_limit,
        }
    }

    /// Sizing for the dispatcher
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            queue_capacity: self.queue_capacity,
            reader_threads: self.reader_threads,
            call_timeout: self.call_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Sweep period
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Read, parse and validate a config file.
    pub fn from_file(path: &Path) -> StoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StoreError::internal(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: StoreConfig = toml::from_str(&content).map_err(|e| {
            StoreError::InvalidConfig(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> StoreResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| StoreError::internal(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            StoreError::internal(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_matches_documented_values() {
        let config = StoreConfig::default();
        assert_eq!(config.entry_size_limit_kb, 16 * 1024);
        assert_eq!(config.storage_limit_kb, 1024 * 1024);
        assert_eq!(config.batch_limit, 500);
        assert_eq!(config.max_key_len, 32);
        assert_eq!(config.queue_capacity, 100);
        assert!(config.call_timeout_ms.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: StoreConfig = toml::from_str("").unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides_only_named_fields() {
        let config: StoreConfig =
            toml::from_str("batch_limit = 10\ncall_timeout_ms = 250\n").unwrap();
        assert_eq!(config.batch_limit, 10);
        assert_eq!(config.call_timeout_ms, Some(250));
        assert_eq!(config.storage_limit_kb, 1024 * 1024);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = StoreConfig::default().with_reader_threads(0);
        assert!(matches!(config.validate(), Err(StoreError::InvalidConfig(_))));

        let config = StoreConfig::default().with_call_timeout(Some(Duration::ZERO));
        assert!(matches!(config.validate(), Err(StoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapkv.toml");

        let config = StoreConfig::default()
            .with_storage_limit_kb(64)
            .with_sweep_interval(Duration::from_millis(500))
            .with_call_timeout(Some(Duration::from_secs(2)));
        config.write_to_file(&path).unwrap();

        assert_eq!(StoreConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_from_file_rejects_invalid_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapkv.toml");
        std::fs::write(&path, "queue_capacity = 0\n").unwrap();

        assert!(matches!(
            StoreConfig::from_file(&path),
            Err(StoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_from_file_reports_parse_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapkv.toml");
        std::fs::write(&path, "batch_limit = \"many\"\n").unwrap();

        let err = StoreConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("snapkv.toml"));
    }

    #[test]
    fn test_derived_settings() {
        let config = StoreConfig::default()
            .with_max_key_len(8)
            .with_call_timeout(Some(Duration::from_millis(40)));
        assert_eq!(config.limits().max_key_len, 8);
        assert_eq!(
            config.dispatcher_config().call_timeout,
            Some(Duration::from_millis(40))
        );
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
    }
}
