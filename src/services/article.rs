//! Article service
//!
//! Implements business logic for articles:
//! - The tag-filtered feed, limited to what the viewer may see
//! - Single-article reads with draft restriction and view counting
//! - Create and update, including author provisioning and tag resolution
//! - Per-author listings

use crate::db::is_unique_violation;
use crate::db::repositories::ArticleRepository;
use crate::models::{
    Article, ArticleStatus, ArticleWithMeta, AuthorRef, CreateArticleInput, UpdateArticleInput,
};
use crate::services::feed::{self, FeedFilter, MainTags};
use crate::services::tag::{TagService, TagServiceError};
use crate::services::user::{ProfileHints, UserService, UserServiceError};
use anyhow::Context;
use std::sync::Arc;

/// Error types for article service operations
#[derive(Debug, thiserror::Error)]
pub enum ArticleServiceError {
    /// Article or author not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Draft requested by someone other than its author
    #[error("Article is not published: {0}")]
    Restricted(String),

    /// Caller is not the article's author
    #[error("Not the author of article: {0}")]
    Forbidden(String),

    /// Duplicate slug
    #[error("Article slug already exists: {0}")]
    DuplicateSlug(String),

    /// A concurrent write claimed a unique name
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<UserServiceError> for ArticleServiceError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::NotFound(id) => Self::NotFound(format!("User {}", id)),
            UserServiceError::ValidationError(msg) => Self::ValidationError(msg),
            UserServiceError::Conflict(msg) => Self::Conflict(msg),
            UserServiceError::InternalError(e) => Self::InternalError(e),
        }
    }
}

impl From<TagServiceError> for ArticleServiceError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::ValidationError(msg) => Self::ValidationError(msg),
            TagServiceError::Conflict(msg) => Self::Conflict(msg),
            TagServiceError::InternalError(e) => Self::InternalError(e),
        }
    }
}

/// A new article as submitted
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub author: AuthorRef,
    /// Profile used if `author` is an unseen identity-provider uid
    pub author_hints: ProfileHints,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub thumbnail_url: Option<String>,
    pub status: Option<ArticleStatus>,
    pub tags: Vec<String>,
}

/// Changes to an existing article as submitted
#[derive(Debug, Clone)]
pub struct ArticleChanges {
    /// Must name the article's author
    pub author: AuthorRef,
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub thumbnail_url: Option<String>,
    pub status: Option<ArticleStatus>,
    /// `Some` replaces the tag list
    pub tags: Option<Vec<String>>,
}

/// Article service
pub struct ArticleService {
    repo: Arc<dyn ArticleRepository>,
    users: Arc<UserService>,
    tags: Arc<TagService>,
    main_tags: MainTags,
}

impl ArticleService {
    pub fn new(
        repo: Arc<dyn ArticleRepository>,
        users: Arc<UserService>,
        tags: Arc<TagService>,
        main_tags: MainTags,
    ) -> Self {
        Self {
            repo,
            users,
            tags,
            main_tags,
        }
    }

    /// Articles visible to `viewer` that match `filter`, newest update first.
    ///
    /// Every published article is eligible; drafts only for their author.
    pub async fn list_feed(
        &self,
        viewer: Option<&AuthorRef>,
        filter: &FeedFilter,
    ) -> Result<Vec<ArticleWithMeta>, ArticleServiceError> {
        let articles = self
            .repo
            .list_visible(viewer)
            .await
            .context("Failed to list articles")?;
        Ok(feed::apply(articles, filter, &self.main_tags))
    }

    /// Fetch one article by slug.
    ///
    /// A published article read without `include_drafts` gains one view and
    /// is returned with the new count. Draft-inclusive reads never count.
    ///
    /// # Errors
    /// - `NotFound` if no article has this slug
    /// - `Restricted` if it is a draft and `viewer` is not its author
    pub async fn get_by_slug(
        &self,
        slug: &str,
        viewer: Option<&AuthorRef>,
        include_drafts: bool,
    ) -> Result<ArticleWithMeta, ArticleServiceError> {
        let mut article = self
            .repo
            .get_with_meta_by_slug(slug)
            .await
            .context("Failed to get article")?
            .ok_or_else(|| ArticleServiceError::NotFound(slug.to_string()))?;

        if !article.article.is_published() {
            let is_author = viewer.is_some_and(|v| v.matches(&article.author));
            if !is_author {
                return Err(ArticleServiceError::Restricted(slug.to_string()));
            }
        } else if !include_drafts {
            article.article.views_count = self
                .repo
                .increment_views(article.article.id)
                .await
                .context("Failed to count view")?;
        }

        Ok(article)
    }

    /// Create an article.
    ///
    /// The excerpt defaults to the first 200 characters of content and the
    /// status to published. An unseen identity-provider uid gets a user
    /// provisioned from `author_hints`.
    ///
    /// # Errors
    /// - `ValidationError` if title, content or slug is missing, or the slug
    ///   contains whitespace or `/`
    /// - `NotFound` if an internal author id names no user
    /// - `DuplicateSlug` if the slug is taken
    pub async fn create(&self, input: NewArticle) -> Result<ArticleWithMeta, ArticleServiceError> {
        let title = required(&input.title, "Title")?;
        let content = required(&input.content, "Content")?;
        let slug = validate_slug(&input.slug)?;

        if self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to check slug")?
            .is_some()
        {
            return Err(ArticleServiceError::DuplicateSlug(slug.to_string()));
        }

        let author = self
            .users
            .resolve_or_provision(&input.author, input.author_hints)
            .await?;
        let tags = self.tags.resolve_names(&input.tags).await?;
        let tag_ids: Vec<i64> = tags.iter().map(|t| t.id).collect();

        let create = CreateArticleInput {
            slug: slug.to_string(),
            title: title.to_string(),
            excerpt: excerpt_or_default(input.excerpt, content),
            content: content.to_string(),
            thumbnail_url: non_blank(input.thumbnail_url),
            status: input.status.unwrap_or_default(),
            author_id: author.id,
        };

        let created = match self.repo.create(&create, &tag_ids).await {
            Ok(article) => article,
            Err(e) if is_unique_violation(&e) => {
                return Err(ArticleServiceError::DuplicateSlug(slug.to_string()))
            }
            Err(e) => return Err(e.context("Failed to create article").into()),
        };
        tracing::info!(
            "Article {:?} created by user {} (id {})",
            created.slug,
            author.id,
            created.id
        );

        self.reload(&created.slug).await
    }

    /// Update the article at `slug`.
    ///
    /// Title and content are required. A missing excerpt is regenerated from
    /// content; a missing thumbnail or status keeps the current one; `tags`
    /// replaces the tag list when given.
    ///
    /// # Errors
    /// - `ValidationError` if title or content is missing
    /// - `NotFound` if no article has this slug
    /// - `Forbidden` if `changes.author` is not the article's author
    pub async fn update(
        &self,
        slug: &str,
        changes: ArticleChanges,
    ) -> Result<ArticleWithMeta, ArticleServiceError> {
        let title = required(&changes.title, "Title")?;
        let content = required(&changes.content, "Content")?;

        let existing = self
            .repo
            .get_with_meta_by_slug(slug)
            .await
            .context("Failed to get article")?
            .ok_or_else(|| ArticleServiceError::NotFound(slug.to_string()))?;

        if !changes.author.matches(&existing.author) {
            return Err(ArticleServiceError::Forbidden(slug.to_string()));
        }

        let tag_ids = match &changes.tags {
            Some(names) => Some(
                self.tags
                    .resolve_names(names)
                    .await?
                    .iter()
                    .map(|t| t.id)
                    .collect::<Vec<_>>(),
            ),
            None => None,
        };

        let update = UpdateArticleInput {
            title: title.to_string(),
            excerpt: excerpt_or_default(changes.excerpt, content),
            content: content.to_string(),
            thumbnail_url: non_blank(changes.thumbnail_url),
            status: changes.status,
        };

        self.repo
            .update(existing.article.id, &update, tag_ids.as_deref())
            .await
            .context("Failed to update article")?;
        tracing::info!("Article {:?} updated", slug);

        self.reload(slug).await
    }

    /// An author's articles, newest update first. Drafts are included only
    /// when `viewer` is that author. Unknown authors have no articles.
    pub async fn list_by_author(
        &self,
        author: &AuthorRef,
        viewer: Option<&AuthorRef>,
    ) -> Result<Vec<ArticleWithMeta>, ArticleServiceError> {
        let Some(user) = self.users.resolve(author).await? else {
            return Ok(Vec::new());
        };

        let include_drafts = viewer.is_some_and(|v| v.matches(&user.summary()));
        self.repo
            .list_by_author(user.id, include_drafts)
            .await
            .context("Failed to list articles by author")
            .map_err(Into::into)
    }

    async fn reload(&self, slug: &str) -> Result<ArticleWithMeta, ArticleServiceError> {
        self.repo
            .get_with_meta_by_slug(slug)
            .await
            .context("Failed to reload article")?
            .ok_or_else(|| ArticleServiceError::NotFound(slug.to_string()))
    }
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, ArticleServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ArticleServiceError::ValidationError(format!(
            "{} is required",
            field
        )));
    }
    Ok(trimmed)
}

/// Slugs are path segments: non-empty, no whitespace, no `/`.
pub fn validate_slug(slug: &str) -> Result<&str, ArticleServiceError> {
    let slug = required(slug, "Slug")?;
    if slug.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(ArticleServiceError::ValidationError(format!(
            "Slug must not contain whitespace or '/': {}",
            slug
        )));
    }
    Ok(slug)
}

fn excerpt_or_default(excerpt: Option<String>, content: &str) -> String {
    non_blank(excerpt).unwrap_or_else(|| Article::excerpt_from(content))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
