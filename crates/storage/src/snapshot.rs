//! Crash-safe snapshot store
//!
//! The whole map is persisted as one JSON document. Every sync rewrites the
//! file with the write-fsync-rename pattern:
//! 1. Write the encoded snapshot to `<datafile>.tmp`
//! 2. fsync the temporary file
//! 3. Atomic rename over `<datafile>`
//! 4. fsync the parent directory (logged, not fatal: the rename already
//!    made the new snapshot visible)
//!
//! Readers of the data file therefore see either the previous snapshot or
//! the new one, never a partial write.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use snapkv_core::{bytes_to_kb, Entry, StoreError, StoreResult};

use crate::codec::{IdentityCodec, StorageCodec};
use crate::paths::DataFilePaths;

/// Reads and writes the snapshot file of one store
pub struct SnapshotStore {
    paths: DataFilePaths,
    codec: Box<dyn StorageCodec>,
}

impl SnapshotStore {
    /// Snapshot store using the identity codec
    pub fn new(paths: DataFilePaths) -> Self {
        Self::with_codec(paths, Box::new(IdentityCodec))
    }

    /// Snapshot store with an explicit codec
    pub fn with_codec(paths: DataFilePaths, codec: Box<dyn StorageCodec>) -> Self {
        SnapshotStore { paths, codec }
    }

    /// File layout
    pub fn paths(&self) -> &DataFilePaths {
        &self.paths
    }

    /// True if the data file exists
    pub fn exists(&self) -> bool {
        self.paths.data_file().exists()
    }

    /// Persist the entire map.
    ///
    /// On failure the previous data file is left in place and the scratch
    /// file is removed. Once the rename has landed the sync succeeds; a
    /// failed directory fsync afterwards is only logged.
    pub fn sync<V: Serialize>(&self, data: &HashMap<String, Entry<V>>) -> StoreResult<()> {
        let json = serde_json::to_vec(data)?;
        let encoded = self
            .codec
            .encode(&json)
            .map_err(StoreError::persistence)?;

        let temp_path = self.paths.temp_file();
        if let Err(e) = self.write_and_rename(&temp_path, &encoded) {
            let _ = fs::remove_file(&temp_path);
            warn!(
                target: "snapkv::snapshot",
                path = %self.paths.data_file().display(),
                error = %e,
                "Snapshot sync failed"
            );
            return Err(StoreError::persistence(e));
        }

        // The new file is in place from here on; callers must not roll back
        let dir_synced = sync_dir(self.paths.dir());

        debug!(
            target: "snapkv::snapshot",
            entries = data.len(),
            dir_synced,
            bytes = encoded.len(),
            "Snapshot synced"
        );
        Ok(())
    }

    fn write_and_rename(&self, temp_path: &Path, bytes: &[u8]) -> io::Result<()> {
        // Step 1: Write to temporary file
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(temp_path)?;
        file.write_all(bytes)?;

        // Step 2: fsync the file
        file.sync_all()?;
        drop(file);

        // Step 3: Atomic rename
        fs::rename(temp_path, self.paths.data_file())?;
        Ok(())
    }

    /// Read and decode the data file
    pub fn load<V: DeserializeOwned>(&self) -> StoreResult<HashMap<String, Entry<V>>> {
        let bytes = fs::read(self.paths.data_file())?;
        let decoded = self.codec.decode(&bytes).map_err(StoreError::corrupt)?;
        serde_json::from_slice(&decoded).map_err(StoreError::corrupt)
    }

    /// Load the existing snapshot, or write an empty one if there is none.
    ///
    /// Removes a scratch file left over from an interrupted sync first.
    pub fn initialize<V: Serialize + DeserializeOwned>(
        &self,
    ) -> StoreResult<HashMap<String, Entry<V>>> {
        let removed = self.cleanup_temp_files()?;
        if removed > 0 {
            info!(
                target: "snapkv::snapshot",
                path = %self.paths.temp_file().display(),
                "Removed leftover temporary snapshot"
            );
        }

        if self.exists() {
            let data = self.load()?;
            info!(
                target: "snapkv::snapshot",
                path = %self.paths.data_file().display(),
                entries = data.len(),
                codec = self.codec.codec_id(),
                "Snapshot loaded"
            );
            return Ok(data);
        }

        let empty = HashMap::new();
        self.sync(&empty)?;
        info!(
            target: "snapkv::snapshot",
            path = %self.paths.data_file().display(),
            "Created empty snapshot"
        );
        Ok(empty)
    }

    /// Current size of the data file in bytes
    pub fn file_size_bytes(&self) -> StoreResult<u64> {
        fs::metadata(self.paths.data_file())
            .map(|m| m.len())
            .map_err(|e| StoreError::SizeUnavailable(e.to_string()))
    }

    /// Current size of the data file in KB (1 KB = 1024 bytes)
    pub fn file_size_kb(&self) -> StoreResult<f64> {
        self.file_size_bytes().map(bytes_to_kb)
    }

    /// Remove the scratch file if an interrupted sync left one behind.
    ///
    /// Returns the number of files removed.
    pub fn cleanup_temp_files(&self) -> io::Result<usize> {
        match fs::remove_file(self.paths.temp_file()) {
            Ok(()) => Ok(1),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("paths", &self.paths)
            .field("codec", &self.codec.codec_id())
            .finish()
    }
}

/// fsync `dir` so a rename inside it survives a crash. Returns false and
/// logs if the directory could not be synced.
fn sync_dir(dir: &Path) -> bool {
    match File::open(dir).and_then(|d| d.sync_all()) {
        Ok(()) => true,
        Err(e) => {
            warn!(
                target: "snapkv::snapshot",
                dir = %dir.display(),
                error = %e,
                "Directory fsync failed after snapshot rename"
            );
            false
        }
    }
}
