//! Message store: message content and recipient fan-out rows.
//!
//! Operations take a caller-supplied connection so the mail service can
//! compose several of them inside one transaction.

mod model;
mod repository;

use std::future::Future;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

pub use model::{Composition, Message, MessageId, RecipientClass, ResolvedMessage};
pub use repository::SqliteMessageStore;
pub(crate) use repository::{fill_recipients, row_to_message};

use crate::Result;
use crate::identity::UserId;

/// Durable storage of message content, independent of any mailbox view.
pub trait MessageStore: Send + Sync {
    /// Persist a message and one recipient row per To/Cc/Bcc address.
    ///
    /// Fails with [`Error::Validation`](crate::Error::Validation) if `sender`
    /// is unset. Ids are otherwise stored as given; resolving them against the
    /// identity directory is the caller's job.
    fn create_message(
        &self,
        conn: &mut SqliteConnection,
        sender: UserId,
        content: &Composition,
        sent_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<MessageId>> + Send;

    /// Replace a message's content and its full recipient set.
    ///
    /// Fails with [`Error::NotFound`](crate::Error::NotFound) if `id` does
    /// not exist.
    fn update_message(
        &self,
        conn: &mut SqliteConnection,
        id: MessageId,
        content: &Composition,
        sent_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Physically remove a message, its recipient rows and mailbox entries.
    fn delete_message(
        &self,
        conn: &mut SqliteConnection,
        id: MessageId,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Load one message.
    fn find_by_id(
        &self,
        conn: &mut SqliteConnection,
        id: MessageId,
    ) -> impl Future<Output = Result<Message>> + Send;

    /// Every message authored by `sender`, newest first.
    fn find_by_sender(
        &self,
        conn: &mut SqliteConnection,
        sender: UserId,
    ) -> impl Future<Output = Result<Vec<Message>>> + Send;
}
