//! Connection pool and schema.
//!
//! Every component shares one pool so that the mail service can run message
//! and mailbox writes inside a single transaction.

use std::str::FromStr;

use sqlx::Sqlite;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::{Config, Result};

/// A scoped transaction. Dropping it without calling `commit` rolls back.
pub type Tx = sqlx::Transaction<'static, Sqlite>;

/// Handle to the backing `SQLite` store.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database described by `config`.
    ///
    /// Creates the parent directory and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the connection
    /// fails or schema creation fails.
    pub async fn open(config: &Config) -> Result<Self> {
        if let Some(parent) = config.database_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.database_path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        tracing::debug!("Opened database at {}", config.database_path.display());
        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    /// Create an in-memory database for testing.
    ///
    /// Uses a single connection that is never recycled, since every
    /// `SQLite` memory connection is its own database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    /// Start a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection is available or `BEGIN` fails.
    pub async fn begin(&self) -> Result<Tx> {
        Ok(self.pool.begin().await?)
    }

    /// Check out a plain connection for reads.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection is available.
    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        Ok(self.pool.acquire().await?)
    }

    pub(crate) const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                last_name TEXT NOT NULL DEFAULT '',
                email TEXT NOT NULL UNIQUE,
                role TEXT NOT NULL DEFAULT 'USER',
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        // No foreign key to users: a deleted user leaves a dangling sender
        // id that reads resolve to nothing.
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_id INTEGER NOT NULL,
                subject TEXT NOT NULL DEFAULT '',
                body TEXT NOT NULL DEFAULT '',
                sent_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages(sender_id)
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS message_recipients (
                message_id INTEGER NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                recipient_id INTEGER NOT NULL,
                class TEXT NOT NULL CHECK (class IN ('TO', 'CC', 'BCC')),
                position INTEGER NOT NULL,
                PRIMARY KEY (message_id, class, position)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS mailbox_entries (
                user_id INTEGER NOT NULL,
                message_id INTEGER NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                folder TEXT NOT NULL CHECK (folder IN ('INBOX', 'SENT', 'DRAFTS')),
                is_read INTEGER NOT NULL DEFAULT 0,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (user_id, message_id)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        // Folder listings filter on (user, folder)
        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_mailbox_user_folder
            ON mailbox_entries(user_id, folder)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
