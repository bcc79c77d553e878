//! Engagement repository: likes and bookmarks
//!
//! A toggle flips the (user, article) association and, for likes, moves
//! `articles.likes_count` in the same transaction, so the counter always
//! equals the number of like rows once the transaction commits.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{EngagementKind, ToggleOutcome};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, SqlitePool};
use std::sync::Arc;

/// Engagement repository trait
#[async_trait]
pub trait EngagementRepository: Send + Sync {
    /// Flip the association and return the resulting state.
    /// For likes the outcome carries the counter as read inside the transaction.
    async fn toggle(
        &self,
        kind: EngagementKind,
        user_id: i64,
        article_id: i64,
    ) -> Result<ToggleOutcome>;

    async fn is_active(&self, kind: EngagementKind, user_id: i64, article_id: i64)
        -> Result<bool>;

    /// Overwrite one article's counter with its like row count
    async fn recount_likes(&self, article_id: i64) -> Result<i64>;

    /// Repair every drifted counter; returns how many articles changed
    async fn reconcile_all_likes(&self) -> Result<u64>;
}

/// SQLx-based engagement repository implementation
pub struct SqlxEngagementRepository {
    pool: DynDatabasePool,
}

impl SqlxEngagementRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn EngagementRepository> {
        Arc::new(Self::new(pool))
    }
}

const LIKE_ROWS: &str = "SELECT COUNT(*) FROM likes l WHERE l.article_id = articles.id";

#[async_trait]
impl EngagementRepository for SqlxEngagementRepository {
    async fn toggle(
        &self,
        kind: EngagementKind,
        user_id: i64,
        article_id: i64,
    ) -> Result<ToggleOutcome> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => toggle_sqlite(pool, kind, user_id, article_id).await,
            Backend::Mysql(pool) => toggle_mysql(pool, kind, user_id, article_id).await,
        }
        .with_context(|| format!("Failed to toggle {} on article {}", kind, article_id))
    }

    async fn is_active(
        &self,
        kind: EngagementKind,
        user_id: i64,
        article_id: i64,
    ) -> Result<bool> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE user_id = ? AND article_id = ?",
            kind.table()
        );
        let count: i64 = match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query_scalar(&sql)
                    .bind(user_id)
                    .bind(article_id)
                    .fetch_one(pool)
                    .await
            }
            Backend::Mysql(pool) => {
                sqlx::query_scalar(&sql)
                    .bind(user_id)
                    .bind(article_id)
                    .fetch_one(pool)
                    .await
            }
        }
        .with_context(|| format!("Failed to read {} state", kind))?;
        Ok(count > 0)
    }

    async fn recount_likes(&self, article_id: i64) -> Result<i64> {
        let update = format!("UPDATE articles SET likes_count = ({}) WHERE id = ?", LIKE_ROWS);
        let select = "SELECT likes_count FROM articles WHERE id = ?";
        let count = match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(&update).bind(article_id).execute(pool).await?;
                sqlx::query_scalar(select).bind(article_id).fetch_one(pool).await
            }
            Backend::Mysql(pool) => {
                sqlx::query(&update).bind(article_id).execute(pool).await?;
                sqlx::query_scalar(select).bind(article_id).fetch_one(pool).await
            }
        }
        .context("Failed to recount likes")?;
        Ok(count)
    }

    async fn reconcile_all_likes(&self) -> Result<u64> {
        let sql = format!(
            "UPDATE articles SET likes_count = ({0}) WHERE likes_count <> ({0})",
            LIKE_ROWS
        );
        let result = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql).execute(pool).await.map(|r| r.rows_affected()),
            Backend::Mysql(pool) => sqlx::query(&sql).execute(pool).await.map(|r| r.rows_affected()),
        }
        .context("Failed to reconcile like counters")?;
        Ok(result)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

// The DELETE comes first so the transaction takes the write lock before it
// reads anything; concurrent toggles then run one after another.
async fn toggle_sqlite(
    pool: &SqlitePool,
    kind: EngagementKind,
    user_id: i64,
    article_id: i64,
) -> Result<ToggleOutcome> {
    let table = kind.table();
    let mut tx = pool.begin().await?;

    let removed = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = ? AND article_id = ?",
        table
    ))
    .bind(user_id)
    .bind(article_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let active = removed == 0;
    if active {
        sqlx::query(&format!(
            "INSERT INTO {} (user_id, article_id, created_at) VALUES (?, ?, ?)",
            table
        ))
        .bind(user_id)
        .bind(article_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
    }

    let likes_count = if kind.has_counter() {
        let adjust = if active {
            "UPDATE articles SET likes_count = likes_count + 1 WHERE id = ?"
        } else {
            "UPDATE articles SET likes_count = MAX(0, likes_count - 1) WHERE id = ?"
        };
        sqlx::query(adjust).bind(article_id).execute(&mut *tx).await?;

        let count: i64 = sqlx::query_scalar("SELECT likes_count FROM articles WHERE id = ?")
            .bind(article_id)
            .fetch_one(&mut *tx)
            .await?;
        Some(count)
    } else {
        None
    };

    tx.commit().await?;
    Ok(ToggleOutcome { active, likes_count })
}

// ============================================================================
// MySQL implementations
// ============================================================================

// Locking the article row serializes toggles on the same article.
async fn toggle_mysql(
    pool: &MySqlPool,
    kind: EngagementKind,
    user_id: i64,
    article_id: i64,
) -> Result<ToggleOutcome> {
    let table = kind.table();
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT id FROM articles WHERE id = ? FOR UPDATE")
        .bind(article_id)
        .fetch_one(&mut *tx)
        .await?;

    let existing: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {} WHERE user_id = ? AND article_id = ?",
        table
    ))
    .bind(user_id)
    .bind(article_id)
    .fetch_one(&mut *tx)
    .await?;

    let active = existing == 0;
    if active {
        sqlx::query(&format!(
            "INSERT INTO {} (user_id, article_id, created_at) VALUES (?, ?, ?)",
            table
        ))
        .bind(user_id)
        .bind(article_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
    } else {
        sqlx::query(&format!(
            "DELETE FROM {} WHERE user_id = ? AND article_id = ?",
            table
        ))
        .bind(user_id)
        .bind(article_id)
        .execute(&mut *tx)
        .await?;
    }

    let likes_count = if kind.has_counter() {
        let adjust = if active {
            "UPDATE articles SET likes_count = likes_count + 1 WHERE id = ?"
        } else {
            "UPDATE articles SET likes_count = GREATEST(0, likes_count - 1) WHERE id = ?"
        };
        sqlx::query(adjust).bind(article_id).execute(&mut *tx).await?;

        let count: i64 = sqlx::query_scalar("SELECT likes_count FROM articles WHERE id = ?")
            .bind(article_id)
            .fetch_one(&mut *tx)
            .await?;
        Some(count)
    } else {
        None
    };

    tx.commit().await?;
    Ok(ToggleOutcome { active, likes_count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::fixtures;

    async fn setup() -> (DynDatabasePool, SqlxEngagementRepository, i64, i64) {
        let pool = fixtures::migrated_pool().await;
        let user = fixtures::insert_user(&pool, "reader", None).await;
        let author = fixtures::insert_user(&pool, "author", None).await;
        let article = fixtures::insert_article(&pool, author, "post", "published", 0).await;
        let repo = SqlxEngagementRepository::new(pool.clone());
        (pool, repo, user, article)
    }

    #[tokio::test]
    async fn test_like_toggle_moves_counter() {
        let (pool, repo, user, article) = setup().await;

        let on = repo.toggle(EngagementKind::Like, user, article).await.unwrap();
        assert_eq!(on, ToggleOutcome { active: true, likes_count: Some(1) });
        assert!(repo.is_active(EngagementKind::Like, user, article).await.unwrap());

        let off = repo.toggle(EngagementKind::Like, user, article).await.unwrap();
        assert_eq!(off, ToggleOutcome { active: false, likes_count: Some(0) });
        assert!(!repo.is_active(EngagementKind::Like, user, article).await.unwrap());

        assert_eq!(fixtures::like_rows(&pool, article).await, 0);
        assert_eq!(fixtures::likes_counter(&pool, article).await, 0);
    }

    #[tokio::test]
    async fn test_bookmark_toggle_has_no_counter() {
        let (pool, repo, user, article) = setup().await;

        let on = repo.toggle(EngagementKind::Bookmark, user, article).await.unwrap();
        assert_eq!(on, ToggleOutcome { active: true, likes_count: None });
        assert!(repo.is_active(EngagementKind::Bookmark, user, article).await.unwrap());
        assert!(!repo.is_active(EngagementKind::Like, user, article).await.unwrap());
        assert_eq!(fixtures::likes_counter(&pool, article).await, 0);
    }

    #[tokio::test]
    async fn test_unlike_never_drives_counter_negative() {
        let (pool, repo, user, article) = setup().await;
        repo.toggle(EngagementKind::Like, user, article).await.unwrap();

        sqlx::query("UPDATE articles SET likes_count = 0 WHERE id = ?")
            .bind(article)
            .execute(fixtures::sqlite(&pool))
            .await
            .unwrap();

        let off = repo.toggle(EngagementKind::Like, user, article).await.unwrap();
        assert_eq!(off.likes_count, Some(0));
    }

    #[tokio::test]
    async fn test_toggle_on_missing_article_fails_cleanly() {
        let (pool, repo, user, _article) = setup().await;

        assert!(repo.toggle(EngagementKind::Like, user, 9999).await.is_err());
        assert_eq!(fixtures::like_rows(&pool, 9999).await, 0);
    }

    #[tokio::test]
    async fn test_recount_and_reconcile_repair_drift() {
        let (pool, repo, user, article) = setup().await;
        repo.toggle(EngagementKind::Like, user, article).await.unwrap();

        sqlx::query("UPDATE articles SET likes_count = 42 WHERE id = ?")
            .bind(article)
            .execute(fixtures::sqlite(&pool))
            .await
            .unwrap();
        assert_eq!(repo.recount_likes(article).await.unwrap(), 1);

        sqlx::query("UPDATE articles SET likes_count = 7")
            .execute(fixtures::sqlite(&pool))
            .await
            .unwrap();
        assert_eq!(repo.reconcile_all_likes().await.unwrap(), 1);
        assert_eq!(repo.reconcile_all_likes().await.unwrap(), 0);
        assert_eq!(fixtures::likes_counter(&pool, article).await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_toggles_keep_counter_consistent() {
        let pool = fixtures::migrated_pool().await;
        let author = fixtures::insert_user(&pool, "author", None).await;
        let article = fixtures::insert_article(&pool, author, "hot", "published", 0).await;

        let mut users = Vec::new();
        for i in 0..8 {
            users.push(fixtures::insert_user(&pool, &format!("fan{}", i), None).await);
        }

        let repo = Arc::new(SqlxEngagementRepository::new(pool.clone()));
        // Even-indexed users toggle three times (end liked), odd ones twice.
        let tasks = users.iter().enumerate().map(|(i, &user)| {
            let repo = repo.clone();
            let rounds = if i % 2 == 0 { 3 } else { 2 };
            tokio::spawn(async move {
                for _ in 0..rounds {
                    repo.toggle(EngagementKind::Like, user, article).await?;
                }
                anyhow::Ok(())
            })
        });

        for result in futures::future::join_all(tasks).await {
            result.expect("task panicked").expect("toggle failed");
        }

        assert_eq!(fixtures::like_rows(&pool, article).await, 4);
        assert_eq!(fixtures::likes_counter(&pool, article).await, 4);
    }
}
