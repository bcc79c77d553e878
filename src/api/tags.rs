//! Tag API endpoints
//!
//! - GET /api/v1/tags - Every tag with its article count
//! - POST /api/v1/tags - Create a tag, or return the existing one

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{Tag, TagWithCount};

/// Request body for creating a tag
#[derive(Debug, Deserialize)]
pub struct CreateTagRequest {
    #[serde(default)]
    pub name: String,
    pub color: Option<String>,
}

/// Response for tag list
#[derive(Debug, Serialize)]
pub struct TagListResponse {
    pub tags: Vec<TagWithCount>,
}

#[derive(Debug, Serialize)]
pub struct TagEnvelope {
    pub tag: Tag,
}

/// Build the tags router
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_tags).post(create_tag))
}

/// GET /api/v1/tags
async fn list_tags(State(state): State<AppState>) -> Result<Json<TagListResponse>, ApiError> {
    let tags = state.tag_service.list_with_counts().await?;
    Ok(Json(TagListResponse { tags }))
}

/// POST /api/v1/tags
///
/// 201 when the tag is new, 200 when a tag with the same name (ignoring
/// case) already exists.
async fn create_tag(
    State(state): State<AppState>,
    Json(body): Json<CreateTagRequest>,
) -> Result<(StatusCode, Json<TagEnvelope>), ApiError> {
    let (tag, created) = state
        .tag_service
        .create_or_get(&body.name, body.color.as_deref())
        .await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(TagEnvelope { tag })))
}
