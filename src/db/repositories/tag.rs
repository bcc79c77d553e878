//! Tag repository
//!
//! - `TagRepository` trait defining the interface for tag data access
//! - `SqlxTagRepository` implementing the trait for SQLite and MySQL
//!
//! Name lookups ignore case, matching the unique index on `tags.name`.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Tag, TagWithCount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Insert a tag. A name that differs only in case from an existing one
    /// fails with a unique violation.
    async fn create(&self, name: &str, color: &str) -> Result<Tag>;

    /// Case-insensitive lookup by name
    async fn find_by_name(&self, name: &str) -> Result<Option<Tag>>;

    /// All tags with their article counts, most used first, then by name
    async fn list_with_counts(&self) -> Result<Vec<TagWithCount>>;
}

/// SQLx-based tag repository implementation
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

const LIST_WITH_COUNTS_SQL: &str = r#"
    SELECT t.id, t.name, t.color, t.created_at, COUNT(atg.article_id) AS article_count
    FROM tags t
    LEFT JOIN article_tags atg ON atg.tag_id = t.id
    GROUP BY t.id, t.name, t.color, t.created_at
    ORDER BY article_count DESC, t.name ASC
"#;

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn create(&self, name: &str, color: &str) -> Result<Tag> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_tag_sqlite(pool, name, color).await,
            Backend::Mysql(pool) => create_tag_mysql(pool, name, color).await,
        }
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Tag>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => find_tag_by_name_sqlite(pool, name).await,
            Backend::Mysql(pool) => find_tag_by_name_mysql(pool, name).await,
        }
    }

    async fn list_with_counts(&self) -> Result<Vec<TagWithCount>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_with_counts_sqlite(pool).await,
            Backend::Mysql(pool) => list_with_counts_mysql(pool).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_tag_sqlite(pool: &SqlitePool, name: &str, color: &str) -> Result<Tag> {
    let now = Utc::now();

    let result = sqlx::query("INSERT INTO tags (name, color, created_at) VALUES (?, ?, ?)")
        .bind(name)
        .bind(color)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to insert tag")?;

    Ok(Tag {
        id: result.last_insert_rowid(),
        name: name.to_string(),
        color: color.to_string(),
        created_at: now,
    })
}

async fn find_tag_by_name_sqlite(pool: &SqlitePool, name: &str) -> Result<Option<Tag>> {
    let row = sqlx::query(
        "SELECT id, name, color, created_at FROM tags WHERE name = ? COLLATE NOCASE",
    )
    .bind(name)
    .fetch_optional(pool)
    .await
    .context("Failed to get tag by name")?;

    row.as_ref().map(row_to_tag_sqlite).transpose()
}

async fn list_with_counts_sqlite(pool: &SqlitePool) -> Result<Vec<TagWithCount>> {
    let rows = sqlx::query(LIST_WITH_COUNTS_SQL)
        .fetch_all(pool)
        .await
        .context("Failed to list tags with counts")?;

    rows.iter()
        .map(|row| {
            Ok(TagWithCount {
                tag: row_to_tag_sqlite(row)?,
                article_count: row.try_get("article_count")?,
            })
        })
        .collect()
}

fn row_to_tag_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Tag> {
    Ok(Tag {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        color: row.try_get("color")?,
        created_at: row.try_get("created_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_tag_mysql(pool: &MySqlPool, name: &str, color: &str) -> Result<Tag> {
    let now = Utc::now();

    let result = sqlx::query("INSERT INTO tags (name, color, created_at) VALUES (?, ?, ?)")
        .bind(name)
        .bind(color)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to insert tag")?;

    Ok(Tag {
        id: result.last_insert_id() as i64,
        name: name.to_string(),
        color: color.to_string(),
        created_at: now,
    })
}

// The column collation is case-insensitive, so plain equality suffices.
async fn find_tag_by_name_mysql(pool: &MySqlPool, name: &str) -> Result<Option<Tag>> {
    let row = sqlx::query("SELECT id, name, color, created_at FROM tags WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by name")?;

    row.as_ref().map(row_to_tag_mysql).transpose()
}

async fn list_with_counts_mysql(pool: &MySqlPool) -> Result<Vec<TagWithCount>> {
    let rows = sqlx::query(LIST_WITH_COUNTS_SQL)
        .fetch_all(pool)
        .await
        .context("Failed to list tags with counts")?;

    rows.iter()
        .map(|row| {
            Ok(TagWithCount {
                tag: row_to_tag_mysql(row)?,
                article_count: row.try_get("article_count")?,
            })
        })
        .collect()
}

fn row_to_tag_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Tag> {
    Ok(Tag {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        color: row.try_get("color")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::is_unique_violation;
    use crate::db::repositories::fixtures;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxTagRepository) {
        let pool = fixtures::migrated_pool().await;
        let repo = SqlxTagRepository::new(pool.clone());
        (pool, repo)
    }

    #[tokio::test]
    async fn test_create_tag() {
        let (_pool, repo) = setup_test_repo().await;

        let created = repo.create("Roblox", "#ff0000").await.expect("Failed to create tag");

        assert!(created.id > 0);
        assert_eq!(created.name, "Roblox");
        assert_eq!(created.color, "#ff0000");
    }

    #[tokio::test]
    async fn test_find_by_name_ignores_case() {
        let (_pool, repo) = setup_test_repo().await;
        let created = repo.create("Lua", "#5271ff").await.unwrap();

        let found = repo.find_by_name("lua").await.unwrap().expect("tag should be found");
        assert_eq!(found.id, created.id);
        assert_eq!(found.name, "Lua");

        assert!(repo.find_by_name("Luau").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_same_name_different_case_violates_unique() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create("Lua", "#5271ff").await.unwrap();

        let err = repo.create("LUA", "#5271ff").await.unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_list_with_counts_empty() {
        let (_pool, repo) = setup_test_repo().await;
        assert!(repo.list_with_counts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_with_counts_sorted_by_count_then_name() {
        let (pool, repo) = setup_test_repo().await;
        let author = fixtures::insert_user(&pool, "author", None).await;
        let a1 = fixtures::insert_article(&pool, author, "a1", "published", 0).await;
        let a2 = fixtures::insert_article(&pool, author, "a2", "published", 0).await;

        let lua = fixtures::insert_tag(&pool, "Lua").await;
        let roblox = fixtures::insert_tag(&pool, "Roblox").await;
        fixtures::insert_tag(&pool, "3DCG").await;
        fixtures::insert_tag(&pool, "Blender").await;

        fixtures::attach_tag(&pool, a1, roblox).await;
        fixtures::attach_tag(&pool, a2, roblox).await;
        fixtures::attach_tag(&pool, a1, lua).await;

        let tags = repo.list_with_counts().await.unwrap();
        let summary: Vec<(&str, i64)> = tags
            .iter()
            .map(|t| (t.tag.name.as_str(), t.article_count))
            .collect();

        assert_eq!(
            summary,
            vec![("Roblox", 2), ("Lua", 1), ("3DCG", 0), ("Blender", 0)]
        );
    }
}
