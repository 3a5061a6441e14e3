//! Mail lifecycle service composed over the store, index and directory.

mod mail;

pub use mail::{MailService, RecipientLookup};
