//! Seed helpers shared by repository and service tests

use sqlx::SqlitePool;

use crate::config::DatabaseConfig;
use crate::db::{create_pool, create_test_pool, migrations, DynDatabasePool};

pub async fn migrated_pool() -> DynDatabasePool {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// Migrated pool over a SQLite file inside `dir`, for tests that need real
/// file locking between connections
pub async fn migrated_file_pool(dir: &tempfile::TempDir) -> DynDatabasePool {
    let config = DatabaseConfig {
        url: dir.path().join("test.db").to_string_lossy().to_string(),
        ..DatabaseConfig::default()
    };
    let pool = create_pool(&config).await.expect("Failed to create file pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

pub fn sqlite(pool: &DynDatabasePool) -> &SqlitePool {
    pool.as_sqlite().expect("test pool is SQLite")
}

pub async fn insert_user(pool: &DynDatabasePool, username: &str, auth_uid: Option<&str>) -> i64 {
    sqlx::query("INSERT INTO users (auth_uid, username, email) VALUES (?, ?, ?)")
        .bind(auth_uid)
        .bind(username)
        .bind(format!("{}@example.com", username))
        .execute(sqlite(pool))
        .await
        .expect("Failed to create test user")
        .last_insert_rowid()
}

/// Insert an article. `age` pushes `updated_at` into the past by that many
/// minutes so feed order is deterministic.
pub async fn insert_article(
    pool: &DynDatabasePool,
    author_id: i64,
    slug: &str,
    status: &str,
    age: i64,
) -> i64 {
    let updated_at = chrono::Utc::now() - chrono::Duration::minutes(age);
    sqlx::query(
        r#"INSERT INTO articles (slug, title, content, excerpt, status, author_id, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(slug)
    .bind(format!("Title for {}", slug))
    .bind(format!("Content for {}", slug))
    .bind(format!("Excerpt for {}", slug))
    .bind(status)
    .bind(author_id)
    .bind(updated_at)
    .bind(updated_at)
    .execute(sqlite(pool))
    .await
    .expect("Failed to create test article")
    .last_insert_rowid()
}

pub async fn insert_tag(pool: &DynDatabasePool, name: &str) -> i64 {
    sqlx::query("INSERT INTO tags (name) VALUES (?)")
        .bind(name)
        .execute(sqlite(pool))
        .await
        .expect("Failed to create test tag")
        .last_insert_rowid()
}

pub async fn attach_tag(pool: &DynDatabasePool, article_id: i64, tag_id: i64) {
    sqlx::query("INSERT INTO article_tags (article_id, tag_id) VALUES (?, ?)")
        .bind(article_id)
        .bind(tag_id)
        .execute(sqlite(pool))
        .await
        .expect("Failed to tag test article");
}

pub async fn like_rows(pool: &DynDatabasePool, article_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE article_id = ?")
        .bind(article_id)
        .fetch_one(sqlite(pool))
        .await
        .expect("Failed to count likes")
}

pub async fn likes_counter(pool: &DynDatabasePool, article_id: i64) -> i64 {
    sqlx::query_scalar("SELECT likes_count FROM articles WHERE id = ?")
        .bind(article_id)
        .fetch_one(sqlite(pool))
        .await
        .expect("Failed to read likes_count")
}
