//! Engagement API endpoints
//!
//! - POST /api/v1/articles/{slug}/like - Toggle a like
//! - POST /api/v1/articles/{slug}/bookmark - Toggle a bookmark
//! - GET /api/v1/articles/{slug}/engagement - Viewer's like/bookmark state
//! - POST /api/v1/articles/{slug}/likes/recount - Repair the like counter

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{require_identifier, ApiError, AppState, Viewer};
use crate::models::{EngagementKind, EngagementState, RawIdentifier};

/// Request body for toggles
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleRequest {
    #[serde(alias = "user_id")]
    pub user_id: Option<RawIdentifier>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeResponse {
    pub liked: bool,
    pub likes_count: i64,
}

#[derive(Debug, Serialize)]
pub struct BookmarkResponse {
    pub bookmarked: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecountResponse {
    pub likes_count: i64,
}

/// Build the engagement router, merged under `/articles`
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{slug}/like", post(toggle_like))
        .route("/{slug}/bookmark", post(toggle_bookmark))
        .route("/{slug}/engagement", get(get_engagement))
        .route("/{slug}/likes/recount", post(recount_likes))
}

/// POST /api/v1/articles/{slug}/like
async fn toggle_like(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(body): Json<ToggleRequest>,
) -> Result<Json<LikeResponse>, ApiError> {
    let user = require_identifier(body.user_id, "userId")?;
    let outcome = state
        .engagement_service
        .toggle(EngagementKind::Like, &user, &slug)
        .await?;

    Ok(Json(LikeResponse {
        liked: outcome.active,
        likes_count: outcome.likes_count.unwrap_or_default(),
    }))
}

/// POST /api/v1/articles/{slug}/bookmark
async fn toggle_bookmark(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(body): Json<ToggleRequest>,
) -> Result<Json<BookmarkResponse>, ApiError> {
    let user = require_identifier(body.user_id, "userId")?;
    let outcome = state
        .engagement_service
        .toggle(EngagementKind::Bookmark, &user, &slug)
        .await?;

    Ok(Json(BookmarkResponse {
        bookmarked: outcome.active,
    }))
}

/// GET /api/v1/articles/{slug}/engagement
async fn get_engagement(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(slug): Path<String>,
) -> Result<Json<EngagementState>, ApiError> {
    let engagement = state.engagement_service.state(&slug, viewer.id()).await?;
    Ok(Json(engagement))
}

/// POST /api/v1/articles/{slug}/likes/recount
async fn recount_likes(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<RecountResponse>, ApiError> {
    let likes_count = state.engagement_service.recount_likes(&slug).await?;
    Ok(Json(RecountResponse { likes_count }))
}
