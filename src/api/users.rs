//! User API endpoints
//!
//! - GET /api/v1/users?auth_uid=|email= - Look up a user
//! - POST /api/v1/users - Create a user, idempotent by `auth_uid`
//! - GET /api/v1/users/{userId}/articles - An author's articles

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::articles::ArticleListResponse;
use crate::api::middleware::{ApiError, AppState, Viewer};
use crate::models::{AuthorRef, User};
use crate::services::ProfileHints;

/// Query parameters for user lookup
#[derive(Debug, Default, Deserialize)]
pub struct FindUserQuery {
    #[serde(alias = "authUid")]
    pub auth_uid: Option<String>,
    pub email: Option<String>,
}

/// Request body for creating a user
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default, alias = "authUid")]
    pub auth_uid: String,
    pub email: Option<String>,
    pub username: Option<String>,
    #[serde(alias = "displayName")]
    pub display_name: Option<String>,
    #[serde(alias = "avatarUrl")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub message: String,
    pub created: bool,
    pub user: User,
}

/// Build the users router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(find_user).post(create_user))
        .route("/{user_id}/articles", get(list_user_articles))
}

/// GET /api/v1/users
async fn find_user(
    State(state): State<AppState>,
    Query(query): Query<FindUserQuery>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let user = state
        .user_service
        .find(query.auth_uid.as_deref(), query.email.as_deref())
        .await?;

    Ok(Json(UserEnvelope { user }))
}

/// POST /api/v1/users
async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreateUserResponse>), ApiError> {
    let hints = ProfileHints {
        username: body.username,
        email: body.email,
        display_name: body.display_name,
        avatar_url: body.avatar_url,
    };
    let (user, created) = state.user_service.create(&body.auth_uid, hints).await?;

    let (status, message) = if created {
        (StatusCode::CREATED, "User created successfully")
    } else {
        (StatusCode::OK, "User already exists")
    };
    Ok((
        status,
        Json(CreateUserResponse {
            message: message.to_string(),
            created,
            user,
        }),
    ))
}

/// GET /api/v1/users/{userId}/articles
///
/// Drafts are included when the `X-User-Id` viewer is this author.
async fn list_user_articles(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(user_id): Path<String>,
) -> Result<Json<ArticleListResponse>, ApiError> {
    let author = AuthorRef::parse(&user_id)
        .ok_or_else(|| ApiError::validation_error(format!("Invalid user id: {}", user_id)))?;

    let articles = state
        .article_service
        .list_by_author(&author, viewer.id())
        .await?;

    Ok(Json(ArticleListResponse { articles }))
}
