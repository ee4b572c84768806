//! Pass-through codec

use super::traits::{CodecError, StorageCodec};

/// Writes the snapshot JSON exactly as serialized
///
/// ```
/// use snapkv_storage::{IdentityCodec, StorageCodec};
///
/// let snapshot = br#"{"k":{"value":1,"ttl":"","created_at":"2024-01-01T00:00:00Z"}}"#;
/// let on_disk = IdentityCodec.encode(snapshot).unwrap();
/// assert_eq!(IdentityCodec.decode(&on_disk).unwrap(), snapshot.to_vec());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCodec;

impl StorageCodec for IdentityCodec {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }

    fn codec_id(&self) -> &str {
        "identity"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_map_is_written_verbatim() {
        assert_eq!(IdentityCodec.encode(b"{}").unwrap(), b"{}".to_vec());
        assert_eq!(IdentityCodec.decode(b"{}").unwrap(), b"{}".to_vec());
    }

    #[test]
    fn test_boxed_codec_reports_its_id() {
        let codec: Box<dyn StorageCodec> = Box::new(IdentityCodec);
        assert_eq!(codec.codec_id(), "identity");
    }
}
