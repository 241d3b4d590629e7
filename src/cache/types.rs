//! Shared types for cache store implementations
//!
//! This module contains the types every backend agrees on:
//! - The stored unit of mail (`MailRecord`)
//! - Error types

use serde::{Deserialize, Serialize};

/// One stored message as written by the mail-receiving subsystem
///
/// The serialized field names are shared with the process that delivers mail
/// into the cache, so they must not change.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MailRecord {
    /// Identifier assigned at delivery time. Not guaranteed unique.
    #[serde(rename = "Message_ID")]
    pub message_id: i64,

    /// Whether the message has been read
    #[serde(rename = "Read_State")]
    pub read_state: bool,

    /// Full RFC 5322 / MIME text of the message
    #[serde(rename = "Message")]
    pub raw_message: String,
}

impl MailRecord {
    pub fn new(message_id: i64, raw_message: impl Into<String>) -> Self {
        Self {
            message_id,
            read_state: false,
            raw_message: raw_message.into(),
        }
    }
}

/// Errors that can occur during cache operations
///
/// A missing key is not an error: stores report it as `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache store unavailable: {0}")]
    Unavailable(#[from] std::io::Error),

    #[error("cache protocol error: {0}")]
    Protocol(String),

    #[error("cache refused to store key {0}")]
    NotStored(String),

    #[error("invalid cache key `{0}`")]
    InvalidKey(String),

    #[error("no cache servers configured")]
    NoServers,

    #[error("failed to encode cached value: {0}")]
    Encode(String),

    #[error("failed to decode cached value: {0}")]
    Decode(String),
}
