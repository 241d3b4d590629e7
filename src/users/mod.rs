//! Inbox users: per-address password protection and the gate in front of
//! [`Mailbox`](crate::mailbox::Mailbox).
//!
//! User records live in the relational store, not the cache. A user exists for
//! any address that has been looked up, whether or not mail is cached for it.

mod directory;
mod model;
mod store;

pub use directory::UserDirectory;
pub use model::EmailUser;
pub use store::{MemoryUserStore, PgUserStore, UserStore};
