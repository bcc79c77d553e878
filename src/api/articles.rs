//! Article API endpoints
//!
//! - GET /api/v1/articles?tag=&q= - Feed, filtered by tag and search term
//! - POST /api/v1/articles - Create an article
//! - GET /api/v1/articles/{slug}?includeDrafts= - Single article
//! - PUT /api/v1/articles/{slug} - Update an article (author only)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{require_identifier, ApiError, AppState, Viewer};
use crate::models::{ArticleStatus, ArticleWithMeta, RawIdentifier};
use crate::services::{ArticleChanges, FeedFilter, NewArticle, ProfileHints};

/// Query parameters for the feed
#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    /// Tag name, or "その他" for articles without a main tag
    pub tag: Option<String>,
    /// Case-insensitive search over title and excerpt
    #[serde(alias = "search")]
    pub q: Option<String>,
}

/// Query parameters for a single article
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetArticleQuery {
    /// Preview mode: drafts may be returned to their author, views are not counted
    #[serde(default, alias = "include_drafts")]
    pub include_drafts: bool,
}

/// Request body for creating an article
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateArticleRequest {
    #[serde(alias = "author_id")]
    pub author_id: Option<RawIdentifier>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub slug: String,
    pub excerpt: Option<String>,
    #[serde(alias = "thumbnail_url")]
    pub thumbnail_url: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    // Profile hints for provisioning an unseen author
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(alias = "display_name")]
    pub display_name: Option<String>,
    #[serde(alias = "avatar_url")]
    pub avatar_url: Option<String>,
}

/// Request body for updating an article
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateArticleRequest {
    #[serde(alias = "author_id")]
    pub author_id: Option<RawIdentifier>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub excerpt: Option<String>,
    #[serde(alias = "thumbnail_url")]
    pub thumbnail_url: Option<String>,
    pub status: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct ArticleListResponse {
    pub articles: Vec<ArticleWithMeta>,
}

#[derive(Debug, Serialize)]
pub struct ArticleEnvelope {
    pub article: ArticleWithMeta,
}

/// Build the articles router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_articles).post(create_article))
        .route("/{slug}", get(get_article).put(update_article))
}

fn parse_status(raw: Option<&str>) -> Result<Option<ArticleStatus>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => ArticleStatus::parse(s)
            .map(Some)
            .ok_or_else(|| ApiError::validation_error(format!("Invalid status: {}", s))),
    }
}

/// GET /api/v1/articles
async fn list_articles(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<FeedQuery>,
) -> Result<Json<ArticleListResponse>, ApiError> {
    let filter = FeedFilter::new(query.q.as_deref(), query.tag.as_deref());
    let articles = state
        .article_service
        .list_feed(viewer.id(), &filter)
        .await?;

    Ok(Json(ArticleListResponse { articles }))
}

/// POST /api/v1/articles
async fn create_article(
    State(state): State<AppState>,
    Json(body): Json<CreateArticleRequest>,
) -> Result<(StatusCode, Json<ArticleEnvelope>), ApiError> {
    let author = require_identifier(body.author_id, "authorId")?;
    let status = parse_status(body.status.as_deref())?;

    let article = state
        .article_service
        .create(NewArticle {
            author,
            author_hints: ProfileHints {
                username: body.username,
                email: body.email,
                display_name: body.display_name,
                avatar_url: body.avatar_url,
            },
            slug: body.slug,
            title: body.title,
            content: body.content,
            excerpt: body.excerpt,
            thumbnail_url: body.thumbnail_url,
            status,
            tags: body.tags,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ArticleEnvelope { article })))
}

/// GET /api/v1/articles/{slug}
async fn get_article(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(slug): Path<String>,
    Query(query): Query<GetArticleQuery>,
) -> Result<Json<ArticleEnvelope>, ApiError> {
    let article = state
        .article_service
        .get_by_slug(&slug, viewer.id(), query.include_drafts)
        .await?;

    Ok(Json(ArticleEnvelope { article }))
}

/// PUT /api/v1/articles/{slug}
async fn update_article(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(body): Json<UpdateArticleRequest>,
) -> Result<Json<ArticleEnvelope>, ApiError> {
    let author = require_identifier(body.author_id, "authorId")?;
    let status = parse_status(body.status.as_deref())?;

    let article = state
        .article_service
        .update(
            &slug,
            ArticleChanges {
                author,
                title: body.title,
                content: body.content,
                excerpt: body.excerpt,
                thumbnail_url: body.thumbnail_url,
                status,
                tags: body.tags,
            },
        )
        .await?;

    Ok(Json(ArticleEnvelope { article }))
}
