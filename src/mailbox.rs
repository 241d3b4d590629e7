//! One user's inbox, as a snapshot of the cache.
//!
//! A [`Mailbox`] fetches the full record list stored under the user's address
//! when it is opened and works on that in-memory copy from then on. It never
//! re-reads the cache, so expiry or another process's writes go unnoticed
//! until the next `open`.
//!
//! ## Write-back
//!
//! Deleting a message writes the whole remaining list back under the same key
//! with an unconditional `set`. Anything another process stored under that key
//! since this mailbox was opened (a newly delivered message, a concurrent
//! delete) is overwritten: the last writer wins and nothing is merged. The
//! cache offers no compare-and-swap to do better, and this module does not try.
//!
//! ## Ordering
//!
//! Records are stored oldest first. Listings are presented newest first; id
//! lookups scan in storage order and stop at the first match, so duplicate ids
//! resolve to the oldest record carrying them.

use std::sync::Arc;

use crate::cache::{CacheStore, MailRecord};
use crate::error::{InboxError, InboxResult};
use crate::message::{MailboxListing, Message, MessageTransportRecord};

pub struct Mailbox<S> {
    store: Arc<S>,
    email_address: String,
    mail_list: Vec<MailRecord>,
}

impl<S: CacheStore> Mailbox<S> {
    /// Fetch the inbox stored under `address`.
    ///
    /// ## Errors
    ///
    /// - `InvalidAddress` if the address is not ASCII (it is the cache key)
    /// - `NoSuchUser` if the cache has nothing under the address
    /// - `Cache` if the store could not be read
    ///
    /// A present but empty list opens fine with zero messages.
    pub async fn open(store: Arc<S>, address: &str) -> InboxResult<Self> {
        if !address.is_ascii() {
            return Err(InboxError::InvalidAddress(address.to_string()));
        }

        let mail_list = store
            .get(address)
            .await?
            .ok_or_else(|| InboxError::NoSuchUser(address.to_string()))?;

        log::debug!("opened mailbox {} with {} messages", address, mail_list.len());

        Ok(Self {
            store,
            email_address: address.to_string(),
            mail_list,
        })
    }

    pub fn email_address(&self) -> &str {
        &self.email_address
    }

    pub fn message_count(&self) -> usize {
        self.mail_list.len()
    }

    /// Up to `count` messages, newest first. Short inboxes give short results.
    pub fn latest_messages(&self, count: usize) -> Vec<Message> {
        self.mail_list
            .iter()
            .rev()
            .take(count)
            .map(Message::new)
            .collect()
    }

    /// Transport form of [`Mailbox::latest_messages`].
    pub fn latest_listing(&self, count: usize) -> MailboxListing {
        let messages = self
            .latest_messages(count)
            .iter()
            .map(Message::to_transport)
            .collect();
        MailboxListing::new(messages)
    }

    /// Every stored record, in storage order.
    pub fn all_messages(&self) -> &[MailRecord] {
        &self.mail_list
    }

    fn position(&self, id: i64) -> Option<usize> {
        self.mail_list
            .iter()
            .position(|record| record.message_id == id)
    }

    /// First message (in storage order) carrying `id`.
    pub fn message_by_id(&self, id: i64) -> InboxResult<Message> {
        self.position(id)
            .map(|index| Message::new(&self.mail_list[index]))
            .ok_or(InboxError::NoSuchMessage(id))
    }

    /// Transport form of [`Mailbox::message_by_id`].
    pub fn message_transport(&self, id: i64) -> InboxResult<MessageTransportRecord> {
        self.message_by_id(id).map(|message| message.to_transport())
    }

    /// Remove the first message carrying `id` and write the list back.
    ///
    /// Returns `Ok(false)` without touching the cache when no message has the
    /// id. The write-back overwrites the key unconditionally (see the module
    /// docs). If it fails, the record is put back in the snapshot and the
    /// cache error is returned.
    pub async fn delete_message(&mut self, id: i64) -> InboxResult<bool> {
        let Some(index) = self.position(id) else {
            log::debug!("delete of unknown message {} in {}", id, self.email_address);
            return Ok(false);
        };

        let removed = self.mail_list.remove(index);
        if let Err(e) = self.store.set(&self.email_address, &self.mail_list).await {
            log::error!(
                "failed to write back {} after deleting message {}: {}",
                self.email_address,
                id,
                e
            );
            self.mail_list.insert(index, removed);
            return Err(e.into());
        }

        log::info!(
            "deleted message {} from {} ({} remaining)",
            id,
            self.email_address,
            self.mail_list.len()
        );
        Ok(true)
    }

    /// Reserved. Does nothing; read state is never persisted.
    pub fn mark_message_read(&self, _index: usize) {}
}
