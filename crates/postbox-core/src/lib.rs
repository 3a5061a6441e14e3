//! # postbox-core
//!
//! Core of the `Postbox` personal mail client.
//!
//! This crate provides:
//! - Identity directory of registered users
//! - Message store (content and recipient lists)
//! - Mailbox index (per-user folder views with read/trash flags)
//! - Mail service (draft, send, read and trash lifecycle, transactional)
//! - Address history ranking for recipient autocomplete
//! - Local storage (`SQLite`)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod config;
mod db;
mod error;
pub mod history;
pub mod identity;
pub mod mailbox;
pub mod service;
pub mod store;

pub use config::Config;
pub use db::{Database, Tx};
pub use error::{Error, ErrorKind, Result};
pub use history::{AddressHistory, AddressUsage, HistoryStats};
pub use identity::{
    IdentityDirectory, NewUser, RegistrationError, Role, User, UserId, UserRepository,
};
pub use mailbox::{Folder, FolderSummary, MailboxEntry, MailboxIndex, SqliteMailboxIndex};
pub use service::{MailService, RecipientLookup};
pub use store::{
    Composition, Message, MessageId, MessageStore, RecipientClass, ResolvedMessage,
    SqliteMessageStore,
};
