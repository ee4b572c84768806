//! Data file naming
//!
//! A store lives in a single JSON file inside a directory, next to two
//! sidecar files:
//!
//! ```text
//! <dir>/
//! ├── data.json        # Snapshot of the whole map
//! ├── data.json.lock   # Process-exclusivity lock (never deleted)
//! └── data.json.tmp    # Only present while a sync is in flight
//! ```

use std::path::{Path, PathBuf};
use thiserror::Error;

use snapkv_core::StoreError;

/// Name used when the caller supplies an empty file name
pub const DEFAULT_FILE_NAME: &str = "default_file.json";

/// Longest accepted file name, in characters, before `.json` is appended
pub const MAX_FILE_NAME_LEN: usize = 24;

const DATA_EXTENSION: &str = ".json";
const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const RESERVED_NAMES: &[&str] = &[
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

/// Reasons a data file name is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataFilePathError {
    /// Name longer than [`MAX_FILE_NAME_LEN`]
    #[error("file name exceeds max limit of {max} characters (got {len})")]
    TooLong {
        /// Length of the trimmed name
        len: usize,
        /// Maximum allowed
        max: usize,
    },

    /// Name contains a path separator, wildcard or control character
    #[error("file name contains invalid character {0:?}")]
    InvalidCharacter(char),

    /// Base name is reserved on Windows
    #[error("file name '{0}' is a reserved name")]
    ReservedName(String),

    /// Extension present but not `.json`
    #[error("wrong file extension '{0}', expected .json")]
    WrongExtension(String),

    /// More than one dot in the name
    #[error("file name contains an extra dot")]
    ExtraDot,

    /// Nothing before the extension
    #[error("file name has no base name")]
    EmptyStem,
}

impl From<DataFilePathError> for StoreError {
    fn from(e: DataFilePathError) -> Self {
        StoreError::InvalidName(e.to_string())
    }
}

/// Validate a caller-supplied data file name and normalize it.
///
/// Returns the name to use on disk: trimmed, with `.json` appended when no
/// extension was given. An empty name maps to [`DEFAULT_FILE_NAME`].
pub fn validate_file_name(name: &str) -> Result<String, DataFilePathError> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(DEFAULT_FILE_NAME.to_string());
    }

    let len = name.chars().count();
    if len > MAX_FILE_NAME_LEN {
        return Err(DataFilePathError::TooLong {
            len,
            max: MAX_FILE_NAME_LEN,
        });
    }

    if let Some(c) = name
        .chars()
        .find(|c| INVALID_CHARS.contains(c) || c.is_ascii_control())
    {
        return Err(DataFilePathError::InvalidCharacter(c));
    }

    let (stem, ext) = match name.rfind('.') {
        Some(idx) => (&name[..idx], &name[idx..]),
        None => (name, ""),
    };

    let lowered = stem.to_ascii_lowercase();
    if RESERVED_NAMES.contains(&lowered.as_str()) {
        return Err(DataFilePathError::ReservedName(stem.to_string()));
    }

    if ext.is_empty() {
        return Ok(format!("{}{}", name, DATA_EXTENSION));
    }
    if ext != DATA_EXTENSION {
        return Err(DataFilePathError::WrongExtension(ext.to_string()));
    }
    if stem.is_empty() {
        return Err(DataFilePathError::EmptyStem);
    }
    if stem.contains('.') {
        return Err(DataFilePathError::ExtraDot);
    }
    Ok(name.to_string())
}

/// Paths of one store's data file and its sidecars
#[derive(Debug, Clone)]
pub struct DataFilePaths {
    dir: PathBuf,
    file_name: String,
}

impl DataFilePaths {
    /// Validate `file_name` and place it in `dir`
    pub fn new(dir: impl AsRef<Path>, file_name: &str) -> Result<Self, DataFilePathError> {
        Ok(DataFilePaths {
            dir: dir.as_ref().to_path_buf(),
            file_name: validate_file_name(file_name)?,
        })
    }

    /// Directory holding the data file
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Normalized file name
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The snapshot file
    pub fn data_file(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    /// The lock file
    pub fn lock_file(&self) -> PathBuf {
        self.dir.join(format!("{}.lock", self.file_name))
    }

    /// Scratch file written during a sync, then renamed over the data file
    pub fn temp_file(&self) -> PathBuf {
        self.dir.join(format!("{}.tmp", self.file_name))
    }

    /// Create the directory if it does not exist
    pub fn create_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }
}
