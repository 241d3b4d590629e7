//! Cache store access for mailboxes
//!
//! A user's whole inbox lives under one key as a list of [`MailRecord`]s. The
//! store offers only whole-value `get` and `set`: there is no locking, no
//! compare-and-swap and no versioning, and values may be evicted at any time.
//! Every `set` overwrites what is there, so two writers racing on the same key
//! resolve as last-writer-wins.
//!
//! ## Backends
//!
//! - [`MemcachedStore`]: memcached ASCII protocol over TCP, the production store
//! - [`MemoryStore`]: in-process map used by tests and local tooling

mod memcached;
mod memory;
mod types;

use std::future::Future;

pub use memcached::MemcachedStore;
pub use memory::MemoryStore;
pub use types::{CacheError, MailRecord};

/// Key -> list-of-records store backing every mailbox.
pub trait CacheStore: Send + Sync {
    /// Fetch the record list stored under `key`.
    ///
    /// Returns `Ok(None)` when the key is absent (never stored, expired or
    /// evicted). Transport failures are reported as errors.
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<Vec<MailRecord>>, CacheError>> + Send;

    /// Replace the value stored under `key` with `records`.
    fn set(
        &self,
        key: &str,
        records: &[MailRecord],
    ) -> impl Future<Output = Result<(), CacheError>> + Send;
}

/// Encode a record list the way it is stored in the cache.
pub(crate) fn encode_records(records: &[MailRecord]) -> Result<Vec<u8>, CacheError> {
    serde_json::to_vec(records).map_err(|e| CacheError::Encode(e.to_string()))
}

/// Decode a cached value into a record list.
pub(crate) fn decode_records(data: &[u8]) -> Result<Vec<MailRecord>, CacheError> {
    serde_json::from_slice(data).map_err(|e| CacheError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_use_delivery_field_names() {
        let records = vec![MailRecord {
            message_id: 7,
            read_state: true,
            raw_message: "Subject: hi\r\n\r\nbody".to_string(),
        }];

        let encoded = String::from_utf8(encode_records(&records).unwrap()).unwrap();
        assert!(encoded.contains("\"Message_ID\":7"));
        assert!(encoded.contains("\"Read_State\":true"));
        assert!(encoded.contains("\"Message\":\"Subject: hi"));

        let decoded = decode_records(encoded.as_bytes()).unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = decode_records(b"not json").unwrap_err();
        assert!(matches!(err, CacheError::Decode(_)));
    }
}
