//! Article repository
//!
//! - `ArticleRepository` trait defining the interface for article data access
//! - `SqlxArticleRepository` implementing the trait for SQLite and MySQL
//!
//! Listing queries join articles with their author and tags in one statement
//! (articles ⟕ article_tags ⟕ tags) and fold the rows into
//! [`ArticleWithMeta`] values. Tags keep the order they were attached in.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{
    Article, ArticleStatus, ArticleWithMeta, AuthorRef, AuthorSummary, CreateArticleInput,
    TagSummary, UpdateArticleInput,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Article repository trait
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Insert an article and attach `tag_ids` in the given order, atomically.
    /// A taken slug surfaces as a unique violation in the error chain.
    async fn create(&self, input: &CreateArticleInput, tag_ids: &[i64]) -> Result<Article>;

    /// Update an article. `Some(tag_ids)` replaces its tag list.
    async fn update(
        &self,
        id: i64,
        input: &UpdateArticleInput,
        tag_ids: Option<&[i64]>,
    ) -> Result<Article>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>>;

    async fn get_with_meta_by_slug(&self, slug: &str) -> Result<Option<ArticleWithMeta>>;

    /// Every article the viewer may see: all published articles plus, for an
    /// identified viewer, their own drafts. Newest update first.
    async fn list_visible(&self, viewer: Option<&AuthorRef>) -> Result<Vec<ArticleWithMeta>>;

    /// Articles by one author, newest update first
    async fn list_by_author(
        &self,
        author_id: i64,
        include_drafts: bool,
    ) -> Result<Vec<ArticleWithMeta>>;

    /// Add one view and return the new view count
    async fn increment_views(&self, id: i64) -> Result<i64>;
}

/// SQLx-based article repository implementation
pub struct SqlxArticleRepository {
    pool: DynDatabasePool,
}

impl SqlxArticleRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ArticleRepository> {
        Arc::new(Self::new(pool))
    }
}

const ARTICLE_COLUMNS: &str = "id, slug, title, content, excerpt, thumbnail_url, status, \
     likes_count, views_count, author_id, created_at, updated_at";

const META_SELECT: &str = r#"
    SELECT a.id, a.slug, a.title, a.content, a.excerpt, a.thumbnail_url, a.status,
           a.likes_count, a.views_count, a.author_id, a.created_at, a.updated_at,
           u.auth_uid AS author_auth_uid, u.username AS author_username,
           u.display_name AS author_display_name, u.avatar_url AS author_avatar_url,
           t.id AS tag_id, t.name AS tag_name, t.color AS tag_color
    FROM articles a
    JOIN users u ON u.id = a.author_id
    LEFT JOIN article_tags atg ON atg.article_id = a.id
    LEFT JOIN tags t ON t.id = atg.tag_id
"#;

// Rows of one article stay adjacent; tags follow attachment order.
const META_ORDER: &str = "ORDER BY a.updated_at DESC, a.id DESC, atg.id ASC";

fn visibility_clause(viewer: Option<&AuthorRef>) -> &'static str {
    match viewer {
        None => "a.status = 'published'",
        Some(AuthorRef::InternalId(_)) => "(a.status = 'published' OR a.author_id = ?)",
        Some(AuthorRef::ExternalId(_)) => "(a.status = 'published' OR u.auth_uid = ?)",
    }
}

fn meta_sql(filter: &str) -> String {
    format!("{} WHERE {} {}", META_SELECT, filter, META_ORDER)
}

/// One joined row: an article, its author, and at most one of its tags
struct MetaRow {
    article: Article,
    author: AuthorSummary,
    tag: Option<TagSummary>,
}

fn fold_meta_rows(rows: Vec<MetaRow>) -> Vec<ArticleWithMeta> {
    let mut articles: Vec<ArticleWithMeta> = Vec::new();
    for row in rows {
        match articles.last_mut() {
            Some(last) if last.article.id == row.article.id => {
                if let Some(tag) = row.tag {
                    last.tags.push(tag);
                }
            }
            _ => articles.push(ArticleWithMeta {
                article: row.article,
                author: row.author,
                tags: row.tag.into_iter().collect(),
            }),
        }
    }
    articles
}

fn parse_status(raw: &str) -> Result<ArticleStatus> {
    ArticleStatus::parse(raw).ok_or_else(|| anyhow!("Unknown article status in database: {}", raw))
}

#[async_trait]
impl ArticleRepository for SqlxArticleRepository {
    async fn create(&self, input: &CreateArticleInput, tag_ids: &[i64]) -> Result<Article> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_article_sqlite(pool, input, tag_ids).await,
            Backend::Mysql(pool) => create_article_mysql(pool, input, tag_ids).await,
        }
    }

    async fn update(
        &self,
        id: i64,
        input: &UpdateArticleInput,
        tag_ids: Option<&[i64]>,
    ) -> Result<Article> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => update_article_sqlite(pool, id, input, tag_ids).await,
            Backend::Mysql(pool) => update_article_mysql(pool, id, input, tag_ids).await,
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>> {
        let sql = format!("SELECT {} FROM articles WHERE slug = ?", ARTICLE_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get article by slug")?;
                row.as_ref().map(row_to_article_sqlite).transpose()
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get article by slug")?;
                row.as_ref().map(row_to_article_mysql).transpose()
            }
        }
    }

    async fn get_with_meta_by_slug(&self, slug: &str) -> Result<Option<ArticleWithMeta>> {
        let sql = meta_sql("a.slug = ?");
        let articles = match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let rows = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_all(pool)
                    .await
                    .context("Failed to get article with tags")?;
                rows_to_meta_sqlite(&rows)?
            }
            Backend::Mysql(pool) => {
                let rows = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_all(pool)
                    .await
                    .context("Failed to get article with tags")?;
                rows_to_meta_mysql(&rows)?
            }
        };
        Ok(articles.into_iter().next())
    }

    async fn list_visible(&self, viewer: Option<&AuthorRef>) -> Result<Vec<ArticleWithMeta>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_visible_sqlite(pool, viewer).await,
            Backend::Mysql(pool) => list_visible_mysql(pool, viewer).await,
        }
    }

    async fn list_by_author(
        &self,
        author_id: i64,
        include_drafts: bool,
    ) -> Result<Vec<ArticleWithMeta>> {
        let sql = meta_sql("a.author_id = ? AND (a.status = 'published' OR ?)");
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let rows = sqlx::query(&sql)
                    .bind(author_id)
                    .bind(include_drafts)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list articles by author")?;
                rows_to_meta_sqlite(&rows)
            }
            Backend::Mysql(pool) => {
                let rows = sqlx::query(&sql)
                    .bind(author_id)
                    .bind(include_drafts)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list articles by author")?;
                rows_to_meta_mysql(&rows)
            }
        }
    }

    async fn increment_views(&self, id: i64) -> Result<i64> {
        let update = "UPDATE articles SET views_count = views_count + 1 WHERE id = ?";
        let select = "SELECT views_count FROM articles WHERE id = ?";
        let views = match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(update).bind(id).execute(pool).await?;
                sqlx::query_scalar(select).bind(id).fetch_one(pool).await
            }
            Backend::Mysql(pool) => {
                sqlx::query(update).bind(id).execute(pool).await?;
                sqlx::query_scalar(select).bind(id).fetch_one(pool).await
            }
        }
        .context("Failed to increment view count")?;
        Ok(views)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_article_sqlite(
    pool: &SqlitePool,
    input: &CreateArticleInput,
    tag_ids: &[i64],
) -> Result<Article> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        INSERT INTO articles (slug, title, content, excerpt, thumbnail_url, status, author_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.slug)
    .bind(&input.title)
    .bind(&input.content)
    .bind(&input.excerpt)
    .bind(&input.thumbnail_url)
    .bind(input.status.as_str())
    .bind(input.author_id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to insert article")?;

    let id = result.last_insert_rowid();

    for tag_id in tag_ids {
        sqlx::query("INSERT INTO article_tags (article_id, tag_id) VALUES (?, ?)")
            .bind(id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .context("Failed to attach tag")?;
    }

    tx.commit().await?;

    Ok(Article {
        id,
        slug: input.slug.clone(),
        title: input.title.clone(),
        content: input.content.clone(),
        excerpt: Some(input.excerpt.clone()),
        thumbnail_url: input.thumbnail_url.clone(),
        status: input.status,
        likes_count: 0,
        views_count: 0,
        author_id: input.author_id,
        created_at: now,
        updated_at: now,
    })
}

async fn update_article_sqlite(
    pool: &SqlitePool,
    id: i64,
    input: &UpdateArticleInput,
    tag_ids: Option<&[i64]>,
) -> Result<Article> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE articles
        SET title = ?, content = ?, excerpt = ?,
            thumbnail_url = COALESCE(?, thumbnail_url),
            status = COALESCE(?, status),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&input.title)
    .bind(&input.content)
    .bind(&input.excerpt)
    .bind(&input.thumbnail_url)
    .bind(input.status.map(|s| s.as_str()))
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *tx)
    .await
    .context("Failed to update article")?;

    if let Some(tag_ids) = tag_ids {
        sqlx::query("DELETE FROM article_tags WHERE article_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear article tags")?;
        for tag_id in tag_ids {
            sqlx::query("INSERT INTO article_tags (article_id, tag_id) VALUES (?, ?)")
                .bind(id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await
                .context("Failed to attach tag")?;
        }
    }

    let sql = format!("SELECT {} FROM articles WHERE id = ?", ARTICLE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to reload updated article")?;
    let article = row_to_article_sqlite(&row)?;

    tx.commit().await?;
    Ok(article)
}

async fn list_visible_sqlite(
    pool: &SqlitePool,
    viewer: Option<&AuthorRef>,
) -> Result<Vec<ArticleWithMeta>> {
    let sql = meta_sql(visibility_clause(viewer));
    let query = sqlx::query(&sql);
    let query = match viewer {
        None => query,
        Some(AuthorRef::InternalId(id)) => query.bind(*id),
        Some(AuthorRef::ExternalId(uid)) => query.bind(uid.as_str()),
    };

    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list visible articles")?;
    rows_to_meta_sqlite(&rows)
}

fn row_to_article_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Article> {
    let status: String = row.try_get("status")?;
    Ok(Article {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        excerpt: row.try_get("excerpt")?,
        thumbnail_url: row.try_get("thumbnail_url")?,
        status: parse_status(&status)?,
        likes_count: row.try_get("likes_count")?,
        views_count: row.try_get("views_count")?,
        author_id: row.try_get("author_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_meta_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<MetaRow> {
    let article = row_to_article_sqlite(row)?;
    let author = AuthorSummary {
        id: article.author_id,
        auth_uid: row.try_get("author_auth_uid")?,
        username: row.try_get("author_username")?,
        display_name: row.try_get("author_display_name")?,
        avatar_url: row.try_get("author_avatar_url")?,
    };
    let tag = match row.try_get::<Option<i64>, _>("tag_id")? {
        Some(id) => Some(TagSummary {
            id,
            name: row.try_get("tag_name")?,
            color: row.try_get("tag_color")?,
        }),
        None => None,
    };
    Ok(MetaRow { article, author, tag })
}

fn rows_to_meta_sqlite(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<ArticleWithMeta>> {
    let rows = rows.iter().map(row_to_meta_sqlite).collect::<Result<Vec<_>>>()?;
    Ok(fold_meta_rows(rows))
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_article_mysql(
    pool: &MySqlPool,
    input: &CreateArticleInput,
    tag_ids: &[i64],
) -> Result<Article> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        INSERT INTO articles (slug, title, content, excerpt, thumbnail_url, status, author_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.slug)
    .bind(&input.title)
    .bind(&input.content)
    .bind(&input.excerpt)
    .bind(&input.thumbnail_url)
    .bind(input.status.as_str())
    .bind(input.author_id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to insert article")?;

    let id = result.last_insert_id() as i64;

    for tag_id in tag_ids {
        sqlx::query("INSERT INTO article_tags (article_id, tag_id) VALUES (?, ?)")
            .bind(id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .context("Failed to attach tag")?;
    }

    tx.commit().await?;

    Ok(Article {
        id,
        slug: input.slug.clone(),
        title: input.title.clone(),
        content: input.content.clone(),
        excerpt: Some(input.excerpt.clone()),
        thumbnail_url: input.thumbnail_url.clone(),
        status: input.status,
        likes_count: 0,
        views_count: 0,
        author_id: input.author_id,
        created_at: now,
        updated_at: now,
    })
}

async fn update_article_mysql(
    pool: &MySqlPool,
    id: i64,
    input: &UpdateArticleInput,
    tag_ids: Option<&[i64]>,
) -> Result<Article> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE articles
        SET title = ?, content = ?, excerpt = ?,
            thumbnail_url = COALESCE(?, thumbnail_url),
            status = COALESCE(?, status),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&input.title)
    .bind(&input.content)
    .bind(&input.excerpt)
    .bind(&input.thumbnail_url)
    .bind(input.status.map(|s| s.as_str()))
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *tx)
    .await
    .context("Failed to update article")?;

    if let Some(tag_ids) = tag_ids {
        sqlx::query("DELETE FROM article_tags WHERE article_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear article tags")?;
        for tag_id in tag_ids {
            sqlx::query("INSERT INTO article_tags (article_id, tag_id) VALUES (?, ?)")
                .bind(id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await
                .context("Failed to attach tag")?;
        }
    }

    let sql = format!("SELECT {} FROM articles WHERE id = ?", ARTICLE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to reload updated article")?;
    let article = row_to_article_mysql(&row)?;

    tx.commit().await?;
    Ok(article)
}

async fn list_visible_mysql(
    pool: &MySqlPool,
    viewer: Option<&AuthorRef>,
) -> Result<Vec<ArticleWithMeta>> {
    let sql = meta_sql(visibility_clause(viewer));
    let query = sqlx::query(&sql);
    let query = match viewer {
        None => query,
        Some(AuthorRef::InternalId(id)) => query.bind(*id),
        Some(AuthorRef::ExternalId(uid)) => query.bind(uid.as_str()),
    };

    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list visible articles")?;
    rows_to_meta_mysql(&rows)
}

fn row_to_article_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Article> {
    let status: String = row.try_get("status")?;
    Ok(Article {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        excerpt: row.try_get("excerpt")?,
        thumbnail_url: row.try_get("thumbnail_url")?,
        status: parse_status(&status)?,
        likes_count: row.try_get("likes_count")?,
        views_count: row.try_get("views_count")?,
        author_id: row.try_get("author_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_meta_mysql(row: &sqlx::mysql::MySqlRow) -> Result<MetaRow> {
    let article = row_to_article_mysql(row)?;
    let author = AuthorSummary {
        id: article.author_id,
        auth_uid: row.try_get("author_auth_uid")?,
        username: row.try_get("author_username")?,
        display_name: row.try_get("author_display_name")?,
        avatar_url: row.try_get("author_avatar_url")?,
    };
    let tag = match row.try_get::<Option<i64>, _>("tag_id")? {
        Some(id) => Some(TagSummary {
            id,
            name: row.try_get("tag_name")?,
            color: row.try_get("tag_color")?,
        }),
        None => None,
    };
    Ok(MetaRow { article, author, tag })
}

fn rows_to_meta_mysql(rows: &[sqlx::mysql::MySqlRow]) -> Result<Vec<ArticleWithMeta>> {
    let rows = rows.iter().map(row_to_meta_mysql).collect::<Result<Vec<_>>>()?;
    Ok(fold_meta_rows(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::is_unique_violation;
    use crate::db::repositories::fixtures;

    const UID: &str = "3f2b8c1e-9d4a-4b6f-8e2a-1c5d7f9a0b3e";

    async fn setup_test_repo() -> (DynDatabasePool, SqlxArticleRepository) {
        let pool = fixtures::migrated_pool().await;
        let repo = SqlxArticleRepository::new(pool.clone());
        (pool, repo)
    }

    fn new_article(slug: &str, author_id: i64, status: ArticleStatus) -> CreateArticleInput {
        CreateArticleInput {
            slug: slug.to_string(),
            title: format!("Title {}", slug),
            content: "# Heading\n\nBody".to_string(),
            excerpt: "Body".to_string(),
            thumbnail_url: None,
            status,
            author_id,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_by_slug() {
        let (pool, repo) = setup_test_repo().await;
        let author = fixtures::insert_user(&pool, "author", None).await;

        let created = repo
            .create(&new_article("intro-to-lua", author, ArticleStatus::Published), &[])
            .await
            .expect("Failed to create article");
        assert!(created.id > 0);

        let found = repo.get_by_slug("intro-to-lua").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.status, ArticleStatus::Published);
        assert_eq!(found.likes_count, 0);
        assert_eq!(found.views_count, 0);

        assert!(repo.get_by_slug("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_unique_violation() {
        let (pool, repo) = setup_test_repo().await;
        let author = fixtures::insert_user(&pool, "author", None).await;

        repo.create(&new_article("same", author, ArticleStatus::Published), &[])
            .await
            .unwrap();
        let err = repo
            .create(&new_article("same", author, ArticleStatus::Draft), &[])
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_failed_create_attaches_no_tags() {
        let (pool, repo) = setup_test_repo().await;
        let author = fixtures::insert_user(&pool, "author", None).await;

        // Unknown tag id fails the foreign key inside the transaction.
        let result = repo
            .create(&new_article("broken", author, ArticleStatus::Published), &[999])
            .await;
        assert!(result.is_err());
        assert!(repo.get_by_slug("broken").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_meta_keeps_tag_insertion_order() {
        let (pool, repo) = setup_test_repo().await;
        let author = fixtures::insert_user(&pool, "author", Some(UID)).await;
        let zeta = fixtures::insert_tag(&pool, "Zeta").await;
        let alpha = fixtures::insert_tag(&pool, "Alpha").await;
        let lua = fixtures::insert_tag(&pool, "Lua").await;

        repo.create(
            &new_article("ordered", author, ArticleStatus::Published),
            &[zeta, alpha, lua],
        )
        .await
        .unwrap();

        let meta = repo.get_with_meta_by_slug("ordered").await.unwrap().unwrap();
        let names: Vec<&str> = meta.tag_names().collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Lua"]);
        assert_eq!(meta.author.username, "author");
        assert_eq!(meta.author.auth_uid.as_deref(), Some(UID));
    }

    #[tokio::test]
    async fn test_untagged_article_has_empty_tags() {
        let (pool, repo) = setup_test_repo().await;
        let author = fixtures::insert_user(&pool, "author", None).await;
        fixtures::insert_article(&pool, author, "bare", "published", 0).await;

        let meta = repo.get_with_meta_by_slug("bare").await.unwrap().unwrap();
        assert!(meta.tags.is_empty());
    }

    #[tokio::test]
    async fn test_list_visible_orders_by_update_and_hides_drafts() {
        let (pool, repo) = setup_test_repo().await;
        let author = fixtures::insert_user(&pool, "author", Some(UID)).await;
        let other = fixtures::insert_user(&pool, "other", None).await;

        fixtures::insert_article(&pool, author, "old", "published", 30).await;
        fixtures::insert_article(&pool, other, "new", "published", 1).await;
        fixtures::insert_article(&pool, author, "draft", "draft", 5).await;

        let tag = fixtures::insert_tag(&pool, "Roblox").await;
        let new_id = repo.get_by_slug("new").await.unwrap().unwrap().id;
        fixtures::attach_tag(&pool, new_id, tag).await;

        let anonymous = repo.list_visible(None).await.unwrap();
        let slugs: Vec<&str> = anonymous.iter().map(|a| a.article.slug.as_str()).collect();
        assert_eq!(slugs, vec!["new", "old"]);

        let by_internal = repo
            .list_visible(Some(&AuthorRef::InternalId(author)))
            .await
            .unwrap();
        let slugs: Vec<&str> = by_internal.iter().map(|a| a.article.slug.as_str()).collect();
        assert_eq!(slugs, vec!["new", "draft", "old"]);

        let by_external = repo
            .list_visible(Some(&AuthorRef::ExternalId(UID.to_string())))
            .await
            .unwrap();
        assert_eq!(by_external.len(), 3);

        let by_stranger = repo
            .list_visible(Some(&AuthorRef::InternalId(other)))
            .await
            .unwrap();
        assert_eq!(by_stranger.len(), 2);
    }

    #[tokio::test]
    async fn test_list_by_author() {
        let (pool, repo) = setup_test_repo().await;
        let author = fixtures::insert_user(&pool, "author", None).await;
        let other = fixtures::insert_user(&pool, "other", None).await;

        fixtures::insert_article(&pool, author, "pub", "published", 2).await;
        fixtures::insert_article(&pool, author, "draft", "draft", 1).await;
        fixtures::insert_article(&pool, other, "theirs", "published", 0).await;

        let public = repo.list_by_author(author, false).await.unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].article.slug, "pub");

        let all = repo.list_by_author(author, true).await.unwrap();
        let slugs: Vec<&str> = all.iter().map(|a| a.article.slug.as_str()).collect();
        assert_eq!(slugs, vec!["draft", "pub"]);
    }

    #[tokio::test]
    async fn test_update_replaces_tags_and_keeps_thumbnail() {
        let (pool, repo) = setup_test_repo().await;
        let author = fixtures::insert_user(&pool, "author", None).await;
        let lua = fixtures::insert_tag(&pool, "Lua").await;
        let roblox = fixtures::insert_tag(&pool, "Roblox").await;

        let mut input = new_article("edit-me", author, ArticleStatus::Draft);
        input.thumbnail_url = Some("https://img.example.com/a.png".to_string());
        let created = repo.create(&input, &[lua]).await.unwrap();

        let updated = repo
            .update(
                created.id,
                &UpdateArticleInput {
                    title: "New title".to_string(),
                    content: "New content".to_string(),
                    excerpt: "New".to_string(),
                    thumbnail_url: None,
                    status: Some(ArticleStatus::Published),
                },
                Some(&[roblox, lua]),
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "New title");
        assert_eq!(updated.status, ArticleStatus::Published);
        assert_eq!(updated.thumbnail_url.as_deref(), Some("https://img.example.com/a.png"));
        assert!(updated.updated_at >= created.updated_at);

        let meta = repo.get_with_meta_by_slug("edit-me").await.unwrap().unwrap();
        let names: Vec<&str> = meta.tag_names().collect();
        assert_eq!(names, vec!["Roblox", "Lua"]);
    }

    #[tokio::test]
    async fn test_increment_views() {
        let (pool, repo) = setup_test_repo().await;
        let author = fixtures::insert_user(&pool, "author", None).await;
        let id = fixtures::insert_article(&pool, author, "viewed", "published", 0).await;

        assert_eq!(repo.increment_views(id).await.unwrap(), 1);
        assert_eq!(repo.increment_views(id).await.unwrap(), 2);
    }

    #[test]
    fn test_fold_meta_rows_groups_adjacent_rows() {
        let now = Utc::now();
        let article = |id: i64| Article {
            id,
            slug: format!("a{}", id),
            title: String::new(),
            content: String::new(),
            excerpt: None,
            thumbnail_url: None,
            status: ArticleStatus::Published,
            likes_count: 0,
            views_count: 0,
            author_id: 1,
            created_at: now,
            updated_at: now,
        };
        let author = AuthorSummary {
            id: 1,
            auth_uid: None,
            username: "u".into(),
            display_name: None,
            avatar_url: None,
        };
        let tag = |id: i64| TagSummary {
            id,
            name: format!("t{}", id),
            color: "#5271ff".into(),
        };

        let folded = fold_meta_rows(vec![
            MetaRow { article: article(2), author: author.clone(), tag: Some(tag(1)) },
            MetaRow { article: article(2), author: author.clone(), tag: Some(tag(3)) },
            MetaRow { article: article(1), author: author.clone(), tag: None },
        ]);

        assert_eq!(folded.len(), 2);
        assert_eq!(folded[0].tags, vec![tag(1), tag(3)]);
        assert!(folded[1].tags.is_empty());
    }
}
