use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};

const USER_COLUMNS: &str = "id, email, username, password_hash, enabled, \
     verification_code, verification_code_expires_at, created_at";

#[derive(Debug, Error)]
pub enum RepoError {
    /// A unique constraint rejected the write; carries the offending field.
    #[error("{0} is already taken")]
    Conflict(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Persistence port for user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError>;
    async fn list_all(&self) -> Result<Vec<User>, RepoError>;
    async fn create(&self, user: NewUser) -> Result<User, RepoError>;
    /// Writes back the mutable verification fields of an existing user.
    async fn save(&self, user: &User) -> Result<User, RepoError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Field a violated unique constraint guards, by the constraint names in the `users` migration.
fn conflicting_field(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("users_username_key") => "username",
        Some("users_email_key") => "email",
        Some(c) if c.contains("username") => "username",
        Some(c) if c.contains("email") => "email",
        _ => "email or username",
    }
}

fn map_write_err(e: sqlx::Error) -> RepoError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return RepoError::Conflict(conflicting_field(db_err.constraint()).to_string());
        }
    }
    RepoError::Database(e)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn list_all(&self) -> Result<Vec<User>, RepoError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn create(&self, user: NewUser) -> Result<User, RepoError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, username, password_hash, enabled,
                               verification_code, verification_code_expires_at)
            VALUES ($1, $2, $3, FALSE, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.verification_code)
        .bind(user.verification_code_expires_at)
        .fetch_one(&self.db)
        .await
        .map_err(map_write_err)
    }

    async fn save(&self, user: &User) -> Result<User, RepoError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET enabled = $2,
                   verification_code = $3,
                   verification_code_expires_at = $4
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(user.enabled)
        .bind(&user.verification_code)
        .bind(user.verification_code_expires_at)
        .fetch_one(&self.db)
        .await
        .map_err(map_write_err)
    }
}

#[cfg(test)]
pub use memory::InMemoryUserStore;
