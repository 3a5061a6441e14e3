//! `SQLite` mailbox index.

use sqlx::Row;
use sqlx::SqliteConnection;
use sqlx::sqlite::SqliteRow;
use tracing::{debug, warn};

use super::MailboxIndex;
use super::model::{Folder, FolderSummary, MailboxEntry};
use crate::identity::UserId;
use crate::store::{MessageId, fill_recipients, row_to_message};
use crate::{Error, Result};

/// Mailbox index over the `mailbox_entries` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteMailboxIndex;

impl SqliteMailboxIndex {
    /// Create a new index.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[derive(Debug, Clone, Copy)]
enum Flag {
    Read,
    Deleted,
}

impl MailboxIndex for SqliteMailboxIndex {
    async fn add_entry(
        &self,
        conn: &mut SqliteConnection,
        user: UserId,
        message: MessageId,
        folder: Folder,
    ) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO mailbox_entries (user_id, message_id, folder, is_read, is_deleted)
            VALUES (?, ?, ?, 0, 0)
            ",
        )
        .bind(user.0)
        .bind(message.0)
        .bind(folder.as_str())
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            if matches!(&e, sqlx::Error::Database(db) if db.is_foreign_key_violation()) {
                Error::NotFound(format!("message {message}"))
            } else {
                Error::from_unique_violation(
                    e,
                    format!("user {user} already has a view of message {message}"),
                )
            }
        })?;

        debug!("Filed message {message} for user {user} in {}", folder.as_str());
        Ok(())
    }

    async fn find_entry(
        &self,
        conn: &mut SqliteConnection,
        user: UserId,
        message: MessageId,
    ) -> Result<Option<MailboxEntry>> {
        let row = sqlx::query(
            r"
            SELECT e.user_id, e.folder, e.is_read, e.is_deleted,
                   m.id AS message_id, m.sender_id, m.subject, m.body, m.sent_at
            FROM mailbox_entries e
            JOIN messages m ON m.id = e.message_id
            WHERE e.user_id = ? AND e.message_id = ?
            ",
        )
        .bind(user.0)
        .bind(message.0)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut entry = row_to_entry(&row);
        fill_recipients(conn, &mut entry.message).await?;
        Ok(Some(entry))
    }

    async fn count_entries(&self, conn: &mut SqliteConnection, message: MessageId) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM mailbox_entries WHERE message_id = ?")
                .bind(message.0)
                .fetch_one(&mut *conn)
                .await?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn find_by_user_and_folder(
        &self,
        conn: &mut SqliteConnection,
        user: UserId,
        folder: Option<Folder>,
    ) -> Result<Vec<MailboxEntry>> {
        let folder = folder.map(|f| f.as_str());
        let rows = sqlx::query(
            r"
            SELECT e.user_id, e.folder, e.is_read, e.is_deleted,
                   m.id AS message_id, m.sender_id, m.subject, m.body, m.sent_at
            FROM mailbox_entries e
            JOIN messages m ON m.id = e.message_id
            WHERE e.user_id = ? AND (? IS NULL OR e.folder = ?)
            ORDER BY m.sent_at DESC, m.id DESC
            ",
        )
        .bind(user.0)
        .bind(folder)
        .bind(folder)
        .fetch_all(&mut *conn)
        .await?;

        let mut entries: Vec<MailboxEntry> = rows.iter().map(row_to_entry).collect();
        for entry in &mut entries {
            fill_recipients(conn, &mut entry.message).await?;
        }
        Ok(entries)
    }

    async fn folder_summary(
        &self,
        conn: &mut SqliteConnection,
        user: UserId,
    ) -> Result<Vec<FolderSummary>> {
        let rows = sqlx::query(
            r"
            SELECT folder,
                   SUM(CASE WHEN is_deleted = 0 THEN 1 ELSE 0 END) AS total,
                   SUM(CASE WHEN is_deleted = 0 AND is_read = 0 THEN 1 ELSE 0 END) AS unread
            FROM mailbox_entries
            WHERE user_id = ?
            GROUP BY folder
            ",
        )
        .bind(user.0)
        .fetch_all(&mut *conn)
        .await?;

        let mut summary: Vec<FolderSummary> = Folder::ALL
            .iter()
            .map(|&folder| FolderSummary {
                folder,
                total: 0,
                unread: 0,
            })
            .collect();

        for row in &rows {
            let name: &str = row.get("folder");
            let Some(folder) = Folder::parse(name) else {
                warn!("Skipping entries in unknown folder {name:?} for user {user}");
                continue;
            };
            if let Some(slot) = summary.iter_mut().find(|s| s.folder == folder) {
                slot.total = count_column(row, "total");
                slot.unread = count_column(row, "unread");
            }
        }

        Ok(summary)
    }

    async fn set_read(
        &self,
        conn: &mut SqliteConnection,
        user: UserId,
        message: MessageId,
    ) -> Result<()> {
        set_flag(conn, user, message, Flag::Read).await
    }

    async fn set_deleted(
        &self,
        conn: &mut SqliteConnection,
        user: UserId,
        message: MessageId,
    ) -> Result<()> {
        set_flag(conn, user, message, Flag::Deleted).await
    }

    async fn remove_entry(
        &self,
        conn: &mut SqliteConnection,
        user: UserId,
        message: MessageId,
    ) -> Result<()> {
        let removed = sqlx::query("DELETE FROM mailbox_entries WHERE user_id = ? AND message_id = ?")
            .bind(user.0)
            .bind(message.0)
            .execute(&mut *conn)
            .await?;

        if removed.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "no entry for message {message} and user {user}"
            )));
        }

        debug!("Removed entry for message {message} and user {user}");
        Ok(())
    }
}

/// Flip a flag to true. Matching an already-true row still counts as a hit,
/// so repeats are no-ops rather than errors.
async fn set_flag(
    conn: &mut SqliteConnection,
    user: UserId,
    message: MessageId,
    flag: Flag,
) -> Result<()> {
    let sql = match flag {
        Flag::Read => "UPDATE mailbox_entries SET is_read = 1 WHERE user_id = ? AND message_id = ?",
        Flag::Deleted => {
            "UPDATE mailbox_entries SET is_deleted = 1 WHERE user_id = ? AND message_id = ?"
        }
    };

    let updated = sqlx::query(sql)
        .bind(user.0)
        .bind(message.0)
        .execute(&mut *conn)
        .await?;

    if updated.rows_affected() == 0 {
        return Err(Error::NotFound(format!(
            "no entry for message {message} and user {user}"
        )));
    }

    debug!("Set {flag:?} on message {message} for user {user}");
    Ok(())
}

/// Read a non-negative count column, clamping out-of-range values.
fn count_column(row: &SqliteRow, column: &str) -> u32 {
    let raw: i64 = row.get(column);
    u32::try_from(raw).unwrap_or_else(|_| {
        warn!("Count {column} = {raw} out of range");
        if raw < 0 {
            0
        } else {
            u32::MAX
        }
    })
}

/// Convert a joined entry row to a `MailboxEntry`. Recipients are filled in
/// separately.
fn row_to_entry(row: &SqliteRow) -> MailboxEntry {
    let message = row_to_message(row);
    let name: &str = row.get("folder");
    let folder = Folder::parse(name).unwrap_or_else(|| {
        warn!("Message {} filed in unknown folder {name:?}, listing as inbox", message.id);
        Folder::Inbox
    });

    MailboxEntry {
        user: UserId::new(row.get("user_id")),
        message,
        folder,
        is_read: row.get("is_read"),
        is_deleted: row.get("is_deleted"),
    }
}
