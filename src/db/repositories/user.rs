//! User repository
//!
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::db::{Backend, DynDatabasePool};
use crate::models::{CreateUserInput, User};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user. Duplicate `auth_uid` or username surfaces as a unique
    /// violation in the error chain.
    async fn create(&self, input: &CreateUserInput) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_auth_uid(&self, auth_uid: &str) -> Result<Option<User>>;

    /// First user registered with this email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn username_exists(&self, username: &str) -> Result<bool>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

const USER_COLUMNS: &str =
    "id, auth_uid, username, email, display_name, avatar_url, bio, created_at, updated_at";

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, input: &CreateUserInput) -> Result<User> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_user_sqlite(pool, input).await,
            Backend::Mysql(pool) => create_user_mysql(pool, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get user by id")?;
                row.as_ref().map(row_to_user_sqlite).transpose()
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get user by id")?;
                row.as_ref().map(row_to_user_mysql).transpose()
            }
        }
    }

    async fn get_by_auth_uid(&self, auth_uid: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE auth_uid = ?", USER_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(&sql)
                    .bind(auth_uid)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get user by auth_uid")?;
                row.as_ref().map(row_to_user_sqlite).transpose()
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(&sql)
                    .bind(auth_uid)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get user by auth_uid")?;
                row.as_ref().map(row_to_user_mysql).transpose()
            }
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE email = ? ORDER BY id LIMIT 1",
            USER_COLUMNS
        );
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(&sql)
                    .bind(email)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get user by email")?;
                row.as_ref().map(row_to_user_sqlite).transpose()
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(&sql)
                    .bind(email)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get user by email")?;
                row.as_ref().map(row_to_user_mysql).transpose()
            }
        }
    }

    async fn username_exists(&self, username: &str) -> Result<bool> {
        let sql = "SELECT COUNT(*) FROM users WHERE username = ?";
        let count: i64 = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query_scalar(sql).bind(username).fetch_one(pool).await,
            Backend::Mysql(pool) => sqlx::query_scalar(sql).bind(username).fetch_one(pool).await,
        }
        .context("Failed to check username")?;
        Ok(count > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, input: &CreateUserInput) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (auth_uid, username, email, display_name, avatar_url, bio, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.auth_uid)
    .bind(&input.username)
    .bind(&input.email)
    .bind(&input.display_name)
    .bind(&input.avatar_url)
    .bind(&input.bio)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to insert user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        auth_uid: input.auth_uid.clone(),
        username: input.username.clone(),
        email: input.email.clone(),
        display_name: input.display_name.clone(),
        avatar_url: input.avatar_url.clone(),
        bio: input.bio.clone(),
        created_at: now,
        updated_at: now,
    })
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        auth_uid: row.try_get("auth_uid")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        display_name: row.try_get("display_name")?,
        avatar_url: row.try_get("avatar_url")?,
        bio: row.try_get("bio")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, input: &CreateUserInput) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (auth_uid, username, email, display_name, avatar_url, bio, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.auth_uid)
    .bind(&input.username)
    .bind(&input.email)
    .bind(&input.display_name)
    .bind(&input.avatar_url)
    .bind(&input.bio)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to insert user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        auth_uid: input.auth_uid.clone(),
        username: input.username.clone(),
        email: input.email.clone(),
        display_name: input.display_name.clone(),
        avatar_url: input.avatar_url.clone(),
        bio: input.bio.clone(),
        created_at: now,
        updated_at: now,
    })
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        auth_uid: row.try_get("auth_uid")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        display_name: row.try_get("display_name")?,
        avatar_url: row.try_get("avatar_url")?,
        bio: row.try_get("bio")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
