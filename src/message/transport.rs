//! Wire representations handed to web clients.
//!
//! Field names and their declaration order are the JSON contract, including the
//! historical `recieved_date` spelling.

use serde::{Deserialize, Serialize};

/// One message as sent to a client.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MessageTransportRecord {
    pub subject: Option<String>,
    pub recieved_date: Option<String>,
    pub sender: Option<String>,
    /// Escaped, `<br />`-delimited, wrapped body
    pub content: String,
    pub msg_id: i64,
    pub read_state: bool,
}

/// Envelope returned for a "latest messages" listing.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MailboxListing {
    pub msg_count: usize,
    pub messages: Vec<MessageTransportRecord>,
}

impl MailboxListing {
    pub fn new(messages: Vec<MessageTransportRecord>) -> Self {
        Self {
            msg_count: messages.len(),
            messages,
        }
    }
}
