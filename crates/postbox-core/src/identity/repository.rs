//! User storage repository.

use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use tracing::{debug, info};

use super::IdentityDirectory;
use super::model::{NewUser, Role, User, UserId, normalize_email};
use super::validation::validate_registration;
use crate::{Database, Error, Result};

/// Repository for registered users.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Create a repository backed by `db`.
    #[must_use]
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Register a new user.
    ///
    /// The email is stored normalized (trimmed, lowercase).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the registration is incomplete,
    /// [`Error::Conflict`] if the email is already registered, or a storage
    /// error if the insert fails.
    pub async fn create(&self, new_user: &NewUser) -> Result<User> {
        if let Err(errors) = validate_registration(new_user) {
            let message = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::Validation(message));
        }

        let email = normalize_email(&new_user.email);
        let result = sqlx::query(
            r"
            INSERT INTO users (name, last_name, email, role)
            VALUES (?, ?, ?, ?)
            ",
        )
        .bind(new_user.name.trim())
        .bind(new_user.last_name.trim())
        .bind(&email)
        .bind(new_user.role.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::from_unique_violation(e, format!("email {email} is already registered")))?;

        let id = UserId::new(result.last_insert_rowid());
        info!("Registered user {id}");

        Ok(User {
            id,
            name: new_user.name.trim().to_string(),
            last_name: new_user.last_name.trim().to_string(),
            email,
            role: new_user.role,
        })
    }

    /// Change a user's role.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no such user exists.
    pub async fn update_role(&self, id: UserId, role: Role) -> Result<()> {
        let result = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("user {id}")));
        }
        debug!("User {id} role set to {}", role.as_str());
        Ok(())
    }

    /// Change a user's name fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `name` is blank, or
    /// [`Error::NotFound`] if no such user exists.
    pub async fn update_name(&self, id: UserId, name: &str, last_name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::Validation("Name is required".into()));
        }

        let result = sqlx::query("UPDATE users SET name = ?, last_name = ? WHERE id = ?")
            .bind(name.trim())
            .bind(last_name.trim())
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    /// Remove a user record.
    ///
    /// Messages and mailbox entries that reference the user are left alone;
    /// reads resolve the missing user to nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no such user exists.
    pub async fn delete(&self, id: UserId) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("user {id}")));
        }
        info!("Deleted user {id}");
        Ok(())
    }

    /// Every user except `id`, in registration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_all_except(&self, id: UserId) -> Result<Vec<User>> {
        let rows = sqlx::query(
            r"
            SELECT id, name, last_name, email, role
            FROM users
            WHERE id != ?
            ORDER BY id ASC
            ",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_user).collect())
    }
}

impl IdentityDirectory for UserRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(
            r"
            SELECT id, name, last_name, email, role
            FROM users
            WHERE id = ?
            ",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_user))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            r"
            SELECT id, name, last_name, email, role
            FROM users
            WHERE email = ?
            ",
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_user))
    }

    async fn find_all(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(
            r"
            SELECT id, name, last_name, email, role
            FROM users
            ORDER BY id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_user).collect())
    }
}

/// Convert a database row to a User.
fn row_to_user(row: &SqliteRow) -> User {
    User {
        id: UserId::new(row.get("id")),
        name: row.get("name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        role: Role::parse(row.get("role")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn repo() -> UserRepository {
        UserRepository::new(&Database::in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let repo = repo().await;
        let ana = repo
            .create(&NewUser::new("Ana", "Diaz", " Ana@X.com "))
            .await
            .unwrap();
        assert_eq!(ana.email, "ana@x.com");

        let by_id = repo.find_by_id(ana.id).await.unwrap().unwrap();
        assert_eq!(by_id, ana);

        let by_email = repo.find_by_email("ANA@x.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, ana.id);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let repo = repo().await;
        repo.create(&NewUser::new("Ana", "", "ana@x.com"))
            .await
            .unwrap();

        let err = repo
            .create(&NewUser::new("Other", "", "ANA@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn test_invalid_registration_rejected() {
        let repo = repo().await;
        let err = repo
            .create(&NewUser::new("", "", "not-an-email"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(repo.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_all_in_registration_order() {
        let repo = repo().await;
        for email in ["c@x.com", "a@x.com", "b@x.com"] {
            repo.create(&NewUser::new("U", "", email)).await.unwrap();
        }

        let emails: Vec<String> = repo
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.email)
            .collect();
        assert_eq!(emails, ["c@x.com", "a@x.com", "b@x.com"]);
    }

    #[tokio::test]
    async fn test_find_all_except() {
        let repo = repo().await;
        let ana = repo
            .create(&NewUser::new("Ana", "", "ana@x.com"))
            .await
            .unwrap();
        repo.create(&NewUser::new("Bob", "", "bob@x.com"))
            .await
            .unwrap();

        let others = repo.find_all_except(ana.id).await.unwrap();
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].email, "bob@x.com");
    }

    #[tokio::test]
    async fn test_update_role_and_name() {
        let repo = repo().await;
        let ana = repo
            .create(&NewUser::new("Ana", "", "ana@x.com"))
            .await
            .unwrap();

        repo.update_role(ana.id, Role::Admin).await.unwrap();
        repo.update_name(ana.id, "Ana Maria", "Diaz").await.unwrap();

        let stored = repo.find_by_id(ana.id).await.unwrap().unwrap();
        assert!(stored.is_admin());
        assert_eq!(stored.name, "Ana Maria");
        assert_eq!(stored.last_name, "Diaz");
    }

    #[tokio::test]
    async fn test_missing_user_operations() {
        let repo = repo().await;
        let ghost = UserId::new(42);

        assert!(repo.find_by_id(ghost).await.unwrap().is_none());
        assert!(matches!(
            repo.update_role(ghost, Role::Admin).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(repo.delete(ghost).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = repo().await;
        let ana = repo
            .create(&NewUser::new("Ana", "", "ana@x.com"))
            .await
            .unwrap();

        repo.delete(ana.id).await.unwrap();
        assert!(repo.find_by_email("ana@x.com").await.unwrap().is_none());
    }
}
