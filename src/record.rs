use crate::error::LogError;
use serde::{Deserialize, Serialize};

/// A record stored in the log.
///
/// The offset is assigned by the engine on append — any value supplied by
/// the caller is overwritten before the record is encoded. The store treats
/// the encoded bytes as an opaque payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Record payload bytes.
    pub value: Vec<u8>,
    /// Logical offset assigned when this record was appended.
    pub offset: u64,
}

impl Record {
    /// Create a record with an unassigned offset.
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self {
            value: value.into(),
            offset: 0,
        }
    }

    /// Encode to the binary payload written to a store.
    pub fn encode(&self) -> Result<Vec<u8>, LogError> {
        bincode::serialize(self).map_err(|e| LogError::EncodeError(e.to_string()))
    }

    /// Decode a payload previously produced by [`Record::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, LogError> {
        bincode::deserialize(bytes).map_err(|e| LogError::DecodeError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut record = Record::new(b"hello world".to_vec());
        record.offset = 42;

        let bytes = record.encode().expect("failed to encode");
        let decoded = Record::decode(&bytes).expect("failed to decode");

        assert_eq!(decoded, record);
    }

    #[test]
    fn test_decode_garbage_fails() {
        // A truncated buffer cannot carry the value length, let alone the
        // payload and offset.
        let result = Record::decode(&[0x01]);
        assert!(matches!(result, Err(LogError::DecodeError(_))));
    }

    #[test]
    fn test_empty_value() {
        let record = Record::new(Vec::new());
        let bytes = record.encode().expect("failed to encode");
        let decoded = Record::decode(&bytes).expect("failed to decode");

        assert!(decoded.value.is_empty());
        assert_eq!(decoded.offset, 0);
    }
}
