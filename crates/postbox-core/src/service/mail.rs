//! Mail service: the compose → draft → send lifecycle.
//!
//! Every multi-row write runs in one transaction. A [`Tx`](crate::db::Tx)
//! that is dropped before `commit` rolls back, so any `?` on the way out
//! leaves the store untouched.

use std::collections::HashSet;

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::identity::{IdentityDirectory, User, UserId, UserRepository, normalize_email};
use crate::mailbox::{Folder, FolderSummary, MailboxEntry, MailboxIndex, SqliteMailboxIndex};
use crate::store::{
    Composition, Message, MessageId, MessageStore, ResolvedMessage, SqliteMessageStore,
};
use crate::{Database, Error, Result};

/// Outcome of resolving typed addresses to registered users.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientLookup {
    /// Users that matched, in input order, without duplicates.
    pub found: Vec<User>,
    /// Normalized addresses that matched nobody.
    pub unknown: Vec<String>,
}

/// Orchestrates the message store and mailbox index.
pub struct MailService<S = SqliteMessageStore, M = SqliteMailboxIndex, D = UserRepository> {
    db: Database,
    store: S,
    index: M,
    directory: D,
}

impl MailService {
    /// Service over the `SQLite` store, index and user directory of `db`.
    #[must_use]
    pub fn sqlite(db: &Database) -> Self {
        Self::new(
            db.clone(),
            SqliteMessageStore::new(),
            SqliteMailboxIndex::new(),
            UserRepository::new(db),
        )
    }
}

impl<S, M, D> MailService<S, M, D>
where
    S: MessageStore,
    M: MailboxIndex,
    D: IdentityDirectory,
{
    /// Assemble a service from its parts.
    pub const fn new(db: Database, store: S, index: M, directory: D) -> Self {
        Self {
            db,
            store,
            index,
            directory,
        }
    }

    /// The identity directory used for validation and read-time resolution.
    pub const fn directory(&self) -> &D {
        &self.directory
    }

    /// Start a draft owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `owner` or any recipient is not a
    /// registered user, or a storage error.
    pub async fn create_draft(&self, owner: UserId, content: &Composition) -> Result<Message> {
        self.require_registered(owner, content).await?;

        let mut tx = self.db.begin().await?;
        let id = self
            .store
            .create_message(&mut tx, owner, content, Utc::now())
            .await?;
        self.index
            .add_entry(&mut tx, owner, id, Folder::Drafts)
            .await?;
        let draft = self.store.find_by_id(&mut tx, id).await?;
        tx.commit().await?;

        info!("Created draft {id} for user {owner}");
        Ok(draft)
    }

    /// Replace the content of a draft.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the message does not exist,
    /// [`Error::InvalidState`] if it is not `owner`'s draft, or
    /// [`Error::Validation`] if `owner` or a recipient is not registered.
    pub async fn update_draft(
        &self,
        owner: UserId,
        draft: MessageId,
        content: &Composition,
    ) -> Result<Message> {
        self.require_registered(owner, content).await?;

        let mut tx = self.db.begin().await?;
        self.require_sole_draft(&mut tx, owner, draft).await?;
        self.store
            .update_message(&mut tx, draft, content, Utc::now())
            .await?;
        let updated = self.store.find_by_id(&mut tx, draft).await?;
        tx.commit().await?;

        debug!("Updated draft {draft} for user {owner}");
        Ok(updated)
    }

    /// Discard a draft: retract its DRAFTS entry, then delete the message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the message does not exist or
    /// [`Error::InvalidState`] if it is not `owner`'s draft.
    pub async fn delete_draft(&self, owner: UserId, draft: MessageId) -> Result<()> {
        let mut tx = self.db.begin().await?;
        self.require_sole_draft(&mut tx, owner, draft).await?;
        self.index.remove_entry(&mut tx, owner, draft).await?;
        self.store.delete_message(&mut tx, draft).await?;
        tx.commit().await?;

        info!("Discarded draft {draft} of user {owner}");
        Ok(())
    }

    /// Send a new message.
    ///
    /// Creates one SENT entry for the sender and one INBOX entry per distinct
    /// `to` recipient. Cc and Bcc recipients are stored on the message but
    /// get no mailbox entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `to` is empty or the sender or a
    /// recipient is not registered, or a storage error. Nothing is written
    /// on failure.
    pub async fn send(&self, sender: UserId, content: &Composition) -> Result<Message> {
        require_primary_recipient(content)?;
        self.require_registered(sender, content).await?;

        let mut tx = self.db.begin().await?;
        let id = self
            .store
            .create_message(&mut tx, sender, content, Utc::now())
            .await?;
        self.fan_out(&mut tx, sender, id, &content.to).await?;
        let sent = self.store.find_by_id(&mut tx, id).await?;
        tx.commit().await?;

        info!(
            "User {sender} sent message {id} to {} recipient(s)",
            content.to.len()
        );
        Ok(sent)
    }

    /// Promote a draft to a sent message, keeping its id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the draft does not exist,
    /// [`Error::InvalidState`] if it is not `owner`'s draft, or
    /// [`Error::Validation`] if it has no `to` recipient or addresses an
    /// unregistered user.
    pub async fn send_draft(&self, owner: UserId, draft: MessageId) -> Result<Message> {
        let content = {
            let mut conn = self.db.acquire().await?;
            self.store.find_by_id(&mut conn, draft).await?.composition()
        };
        require_primary_recipient(&content)?;
        self.require_registered(owner, &content).await?;

        let mut tx = self.db.begin().await?;
        let message = self.require_sole_draft(&mut tx, owner, draft).await?;
        let content = message.composition();
        require_primary_recipient(&content)?;

        self.index.remove_entry(&mut tx, owner, draft).await?;
        self.store
            .update_message(&mut tx, draft, &content, Utc::now())
            .await?;
        self.fan_out(&mut tx, owner, draft, &content.to).await?;
        let sent = self.store.find_by_id(&mut tx, draft).await?;
        tx.commit().await?;

        info!("User {owner} sent draft {draft}");
        Ok(sent)
    }

    /// Mark a message read for `user`. Repeating is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `user` has no entry for the message.
    pub async fn mark_as_read(&self, user: UserId, message: MessageId) -> Result<()> {
        let mut conn = self.db.acquire().await?;
        self.index.set_read(&mut conn, user, message).await
    }

    /// Move a message to the trash for `user`. Repeating is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `user` has no entry for the message.
    pub async fn mark_as_deleted(&self, user: UserId, message: MessageId) -> Result<()> {
        let mut conn = self.db.acquire().await?;
        self.index.set_deleted(&mut conn, user, message).await
    }

    /// `user`'s entries, optionally restricted to one folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_user_and_folder(
        &self,
        user: UserId,
        folder: Option<Folder>,
    ) -> Result<Vec<MailboxEntry>> {
        let mut conn = self.db.acquire().await?;
        self.index
            .find_by_user_and_folder(&mut conn, user, folder)
            .await
    }

    /// Messages in `user`'s SENT folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_sent_by_user(&self, user: UserId) -> Result<Vec<Message>> {
        let entries = self
            .find_by_user_and_folder(user, Some(Folder::Sent))
            .await?;
        Ok(entries.into_iter().map(|entry| entry.message).collect())
    }

    /// Every message authored by `sender`, drafts included, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_sender(&self, sender: UserId) -> Result<Vec<Message>> {
        let mut conn = self.db.acquire().await?;
        self.store.find_by_sender(&mut conn, sender).await
    }

    /// Look up one message by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if it does not exist.
    pub async fn find_message(&self, id: MessageId) -> Result<Message> {
        let mut conn = self.db.acquire().await?;
        self.store.find_by_id(&mut conn, id).await
    }

    /// Per-folder totals for `user`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn folder_summary(&self, user: UserId) -> Result<Vec<FolderSummary>> {
        let mut conn = self.db.acquire().await?;
        self.index.folder_summary(&mut conn, user).await
    }

    /// Resolve a message's user references for display. See
    /// [`Message::resolve`].
    ///
    /// # Errors
    ///
    /// Returns an error only if the directory lookup fails.
    pub async fn resolve(&self, message: &Message) -> Result<ResolvedMessage> {
        message.resolve(&self.directory).await
    }

    /// Resolve typed addresses to registered users.
    ///
    /// Blank inputs are skipped; repeated addresses are reported once.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory lookup fails.
    pub async fn lookup_recipients<I, A>(&self, addresses: I) -> Result<RecipientLookup>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<str>,
    {
        let mut lookup = RecipientLookup::default();
        let mut seen = HashSet::new();

        for address in addresses {
            let address = normalize_email(address.as_ref());
            if address.is_empty() || !seen.insert(address.clone()) {
                continue;
            }
            match self.directory.find_by_email(&address).await? {
                Some(user) => lookup.found.push(user),
                None => lookup.unknown.push(address),
            }
        }

        Ok(lookup)
    }

    /// SENT entry for the sender, INBOX entry per distinct `to` recipient.
    async fn fan_out(
        &self,
        conn: &mut SqliteConnection,
        sender: UserId,
        message: MessageId,
        to: &[UserId],
    ) -> Result<()> {
        self.index
            .add_entry(conn, sender, message, Folder::Sent)
            .await?;

        let mut delivered = HashSet::from([sender]);
        for &recipient in to {
            if delivered.insert(recipient) {
                self.index
                    .add_entry(conn, recipient, message, Folder::Inbox)
                    .await?;
            }
        }
        Ok(())
    }

    /// Load `draft` and check that its only entry is `owner`'s DRAFTS entry.
    async fn require_sole_draft(
        &self,
        conn: &mut SqliteConnection,
        owner: UserId,
        draft: MessageId,
    ) -> Result<Message> {
        let message = self.store.find_by_id(conn, draft).await?;

        let is_owned_draft = self
            .index
            .find_entry(conn, owner, draft)
            .await?
            .is_some_and(|entry| entry.folder == Folder::Drafts);
        if !is_owned_draft {
            return Err(Error::InvalidState(format!(
                "message {draft} is not a draft of user {owner}"
            )));
        }

        if self.index.count_entries(conn, draft).await? != 1 {
            return Err(Error::InvalidState(format!(
                "message {draft} is visible to other users"
            )));
        }

        Ok(message)
    }

    /// The author and every recipient id must name a registered user.
    async fn require_registered(&self, author: UserId, content: &Composition) -> Result<()> {
        if self.directory.find_by_id(author).await?.is_none() {
            return Err(Error::Validation(format!(
                "sender {author} is not a registered user"
            )));
        }

        let mut checked = HashSet::from([author]);
        for &id in content.to.iter().chain(&content.cc).chain(&content.bcc) {
            if checked.insert(id) && self.directory.find_by_id(id).await?.is_none() {
                return Err(Error::Validation(format!(
                    "recipient {id} is not a registered user"
                )));
            }
        }
        Ok(())
    }
}

fn require_primary_recipient(content: &Composition) -> Result<()> {
    if content.to.is_empty() {
        return Err(Error::Validation(
            "at least one recipient is required".into(),
        ));
    }
    Ok(())
}
