use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

const BATCH_PREFIX: &[u8] = br#"{"items":["#;
const BATCH_SUFFIX: &[u8] = b"]}";

/// An error returned when a telemetry item cannot be encoded.
#[derive(Debug, thiserror::Error)]
#[error("failed to encode telemetry item")]
pub struct EncodeError(#[from] serde_json::Error);

/// An append-only store of pre-encoded JSON records.
///
/// Records are encoded once on [`append`](Self::append). Building the batch only concatenates
/// the stored bytes and never re-parses them.
#[derive(Debug, Default)]
pub struct BatchBuffer {
    items: Vec<Vec<u8>>,
    items_data_size: usize,
}

impl BatchBuffer {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes the item and appends it.
    ///
    /// On error the store is left unchanged.
    pub fn append<T: Serialize + ?Sized>(&mut self, item: &T) -> Result<(), EncodeError> {
        let encoded = serde_json::to_vec(item)?;
        self.items_data_size += encoded.len();
        self.items.push(encoded);
        Ok(())
    }

    /// Returns the number of stored records.
    pub fn items_count(&self) -> usize {
        self.items.len()
    }

    /// Returns the sum of the encoded sizes of all stored records.
    pub fn items_data_size(&self) -> usize {
        self.items_data_size
    }

    /// Returns `true` if no records are stored.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the batch `{"items":[...]}` of all stored records in insertion order.
    pub fn batched_data(&self) -> Bytes {
        let separators = self.items.len().saturating_sub(1);
        let capacity =
            BATCH_PREFIX.len() + self.items_data_size + separators + BATCH_SUFFIX.len();

        let mut buf = BytesMut::with_capacity(capacity);
        buf.put_slice(BATCH_PREFIX);
        for (index, item) in self.items.iter().enumerate() {
            if index > 0 {
                buf.put_u8(b',');
            }
            buf.put_slice(item);
        }
        buf.put_slice(BATCH_SUFFIX);

        buf.freeze()
    }

    /// Removes all records.
    pub fn clear(&mut self) {
        self.items.clear();
        self.items_data_size = 0;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;

    #[test]
    fn test_empty_batch() {
        let store = BatchBuffer::new();
        assert!(store.is_empty());
        assert_eq!(&store.batched_data()[..], br#"{"items":[]}"#);
    }

    #[test]
    fn test_append_tracks_size_and_count() {
        let mut store = BatchBuffer::new();
        store.append(&json!({"body": "a"})).unwrap();
        store.append(&json!({"body": "bc"})).unwrap();

        assert_eq!(store.items_count(), 2);
        assert_eq!(
            store.items_data_size(),
            r#"{"body":"a"}"#.len() + r#"{"body":"bc"}"#.len()
        );
        assert_eq!(
            &store.batched_data()[..],
            br#"{"items":[{"body":"a"},{"body":"bc"}]}"#
        );

        store.clear();
        assert_eq!(store.items_count(), 0);
        assert_eq!(store.items_data_size(), 0);
    }

    #[test]
    fn test_encode_error_leaves_store_unchanged() {
        // JSON object keys must be strings.
        let invalid = BTreeMap::from([(vec![1u8], 1)]);

        let mut store = BatchBuffer::new();
        store.append(&json!({"body": "a"})).unwrap();
        assert!(store.append(&invalid).is_err());

        assert_eq!(store.items_count(), 1);
        assert_eq!(store.items_data_size(), r#"{"body":"a"}"#.len());
    }
}
