//! Mailbox index: the per-user, per-folder projection over the message store.

mod model;
mod repository;

use std::future::Future;

use sqlx::SqliteConnection;

pub use model::{Folder, FolderSummary, MailboxEntry};
pub use repository::SqliteMailboxIndex;

use crate::Result;
use crate::identity::UserId;
use crate::store::MessageId;

/// Per-(user, message) views with folder placement and flags.
pub trait MailboxIndex: Send + Sync {
    /// Make `message` visible to `user` in `folder`, unread and not deleted.
    ///
    /// Fails with [`Error::Conflict`](crate::Error::Conflict) if the user
    /// already has a view of the message.
    fn add_entry(
        &self,
        conn: &mut SqliteConnection,
        user: UserId,
        message: MessageId,
        folder: Folder,
    ) -> impl Future<Output = Result<()>> + Send;

    /// The user's entry for `message`, if any.
    fn find_entry(
        &self,
        conn: &mut SqliteConnection,
        user: UserId,
        message: MessageId,
    ) -> impl Future<Output = Result<Option<MailboxEntry>>> + Send;

    /// How many users have a view of `message`.
    fn count_entries(
        &self,
        conn: &mut SqliteConnection,
        message: MessageId,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Every entry of `user`, optionally restricted to one folder, each joined
    /// with its message. Ordering is not part of the contract.
    fn find_by_user_and_folder(
        &self,
        conn: &mut SqliteConnection,
        user: UserId,
        folder: Option<Folder>,
    ) -> impl Future<Output = Result<Vec<MailboxEntry>>> + Send;

    /// Per-folder totals for `user`.
    fn folder_summary(
        &self,
        conn: &mut SqliteConnection,
        user: UserId,
    ) -> impl Future<Output = Result<Vec<FolderSummary>>> + Send;

    /// Set the read flag. Setting it again is a no-op.
    fn set_read(
        &self,
        conn: &mut SqliteConnection,
        user: UserId,
        message: MessageId,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Set the deleted flag. Setting it again is a no-op.
    fn set_deleted(
        &self,
        conn: &mut SqliteConnection,
        user: UserId,
        message: MessageId,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Retract an entry entirely.
    fn remove_entry(
        &self,
        conn: &mut SqliteConnection,
        user: UserId,
        message: MessageId,
    ) -> impl Future<Output = Result<()>> + Send;
}
