/// Transforms snapshot bytes on their way to and from the data file.
///
/// Shared between the writer thread and the sweeper, hence `Send + Sync`.
pub trait StorageCodec: Send + Sync {
    /// Bytes to write for a serialized snapshot. An error aborts the sync
    /// before the temp file is created.
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Serialized snapshot recovered from file bytes
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Name shown in logs
    fn codec_id(&self) -> &str;
}

/// Failure inside a codec
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Snapshot bytes could not be encoded
    #[error("snapshot encode failed: {0}")]
    EncodeError(String),

    /// File bytes could not be decoded
    #[error("snapshot decode failed: {0}")]
    DecodeError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_error_messages() {
        let err = CodecError::EncodeError("disk quota".into());
        assert_eq!(err.to_string(), "snapshot encode failed: disk quota");
        let err = CodecError::DecodeError("bad header".into());
        assert_eq!(err.to_string(), "snapshot decode failed: bad header");
    }
}
