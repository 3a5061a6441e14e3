//! `SQLite` message store.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::SqliteConnection;
use sqlx::sqlite::SqliteRow;
use tracing::debug;

use super::MessageStore;
use super::model::{Composition, Message, MessageId, RecipientClass};
use crate::identity::UserId;
use crate::{Error, Result};

/// Message store over the `messages` and `message_recipients` tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteMessageStore;

impl SqliteMessageStore {
    /// Create a new store.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MessageStore for SqliteMessageStore {
    async fn create_message(
        &self,
        conn: &mut SqliteConnection,
        sender: UserId,
        content: &Composition,
        sent_at: DateTime<Utc>,
    ) -> Result<MessageId> {
        if !sender.is_set() {
            return Err(Error::Validation("message sender is unset".into()));
        }

        let result = sqlx::query(
            r"
            INSERT INTO messages (sender_id, subject, body, sent_at)
            VALUES (?, ?, ?, ?)
            ",
        )
        .bind(sender.0)
        .bind(&content.subject)
        .bind(&content.body)
        .bind(sent_at)
        .execute(&mut *conn)
        .await?;

        let id = MessageId::new(result.last_insert_rowid());
        insert_recipients(conn, id, content).await?;

        debug!("Stored message {id} from {sender}");
        Ok(id)
    }

    async fn update_message(
        &self,
        conn: &mut SqliteConnection,
        id: MessageId,
        content: &Composition,
        sent_at: DateTime<Utc>,
    ) -> Result<()> {
        let updated = sqlx::query(
            r"
            UPDATE messages
            SET subject = ?, body = ?, sent_at = ?
            WHERE id = ?
            ",
        )
        .bind(&content.subject)
        .bind(&content.body)
        .bind(sent_at)
        .bind(id.0)
        .execute(&mut *conn)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(Error::NotFound(format!("message {id}")));
        }

        sqlx::query("DELETE FROM message_recipients WHERE message_id = ?")
            .bind(id.0)
            .execute(&mut *conn)
            .await?;
        insert_recipients(conn, id, content).await?;

        debug!("Updated message {id}");
        Ok(())
    }

    async fn delete_message(&self, conn: &mut SqliteConnection, id: MessageId) -> Result<()> {
        // Recipient rows and mailbox entries go with it (ON DELETE CASCADE)
        let deleted = sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(id.0)
            .execute(&mut *conn)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(Error::NotFound(format!("message {id}")));
        }

        debug!("Deleted message {id}");
        Ok(())
    }

    async fn find_by_id(&self, conn: &mut SqliteConnection, id: MessageId) -> Result<Message> {
        let row = sqlx::query(
            r"
            SELECT id AS message_id, sender_id, subject, body, sent_at
            FROM messages
            WHERE id = ?
            ",
        )
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("message {id}")))?;

        let mut message = row_to_message(&row);
        fill_recipients(conn, &mut message).await?;
        Ok(message)
    }

    async fn find_by_sender(
        &self,
        conn: &mut SqliteConnection,
        sender: UserId,
    ) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            r"
            SELECT id AS message_id, sender_id, subject, body, sent_at
            FROM messages
            WHERE sender_id = ?
            ORDER BY sent_at DESC, id DESC
            ",
        )
        .bind(sender.0)
        .fetch_all(&mut *conn)
        .await?;

        let mut messages: Vec<Message> = rows.iter().map(row_to_message).collect();
        for message in &mut messages {
            fill_recipients(conn, message).await?;
        }
        Ok(messages)
    }
}

/// Write one fan-out row per recipient, tagged with class and position.
async fn insert_recipients(
    conn: &mut SqliteConnection,
    id: MessageId,
    content: &Composition,
) -> Result<()> {
    for class in RecipientClass::ALL {
        for (position, recipient) in content.recipients(class).iter().enumerate() {
            #[allow(clippy::cast_possible_wrap)]
            let position = position as i64;

            sqlx::query(
                r"
                INSERT INTO message_recipients (message_id, recipient_id, class, position)
                VALUES (?, ?, ?, ?)
                ",
            )
            .bind(id.0)
            .bind(recipient.0)
            .bind(class.as_str())
            .bind(position)
            .execute(&mut *conn)
            .await?;
        }
    }
    Ok(())
}

/// Load the To, Cc and Bcc lists of `message`, each in addressing order.
pub(crate) async fn fill_recipients(conn: &mut SqliteConnection, message: &mut Message) -> Result<()> {
    let rows = sqlx::query(
        r"
        SELECT recipient_id, class
        FROM message_recipients
        WHERE message_id = ?
        ORDER BY class, position
        ",
    )
    .bind(message.id.0)
    .fetch_all(&mut *conn)
    .await?;

    message.to.clear();
    message.cc.clear();
    message.bcc.clear();
    for row in &rows {
        let recipient = UserId::new(row.get("recipient_id"));
        match RecipientClass::parse(row.get("class")) {
            Some(RecipientClass::To) => message.to.push(recipient),
            Some(RecipientClass::Cc) => message.cc.push(recipient),
            Some(RecipientClass::Bcc) => message.bcc.push(recipient),
            None => {}
        }
    }
    Ok(())
}

/// Convert a row selecting `message_id, sender_id, subject, body, sent_at`
/// into a Message with empty recipient lists.
pub(crate) fn row_to_message(row: &SqliteRow) -> Message {
    Message {
        id: MessageId::new(row.get("message_id")),
        sender: UserId::new(row.get("sender_id")),
        to: Vec::new(),
        cc: Vec::new(),
        bcc: Vec::new(),
        subject: row.get("subject"),
        body: row.get("body"),
        sent_at: row.get("sent_at"),
    }
}
