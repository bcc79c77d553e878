//! API plumbing shared by all handlers
//!
//! - `AppState`, the services every handler can reach
//! - `ApiError`, the JSON error body and its HTTP status mapping
//! - `Viewer`, the per-request viewer identity from the `X-User-Id` header

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::FeedConfig;
use crate::db::repositories::{
    SqlxArticleRepository, SqlxEngagementRepository, SqlxTagRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{AuthorRef, RawIdentifier};
use crate::services::{
    ArticleService, ArticleServiceError, EngagementService, EngagementServiceError, MainTags,
    TagService, TagServiceError, UserService, UserServiceError,
};

/// Header carrying the viewer's identifier (either shape)
pub const VIEWER_HEADER: &str = "x-user-id";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub user_service: Arc<UserService>,
    pub tag_service: Arc<TagService>,
    pub article_service: Arc<ArticleService>,
    pub engagement_service: Arc<EngagementService>,
}

impl AppState {
    /// Wire repositories and services over one pool
    pub fn new(pool: DynDatabasePool, feed: &FeedConfig) -> Self {
        let user_service = Arc::new(UserService::new(SqlxUserRepository::boxed(pool.clone())));
        let tag_service = Arc::new(TagService::new(
            SqlxTagRepository::boxed(pool.clone()),
            feed.default_tag_color.clone(),
        ));
        let article_repo = SqlxArticleRepository::boxed(pool.clone());
        let article_service = Arc::new(ArticleService::new(
            article_repo.clone(),
            user_service.clone(),
            tag_service.clone(),
            MainTags::new(feed.main_tags.iter().cloned()),
        ));
        let engagement_service = Arc::new(EngagementService::new(
            article_repo,
            SqlxEngagementRepository::boxed(pool.clone()),
            user_service.clone(),
        ));

        Self {
            pool,
            user_service,
            tag_service,
            article_service,
            engagement_service,
        }
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn restricted(message: impl Into<String>) -> Self {
        Self::new("RESTRICTED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    /// Log the full error chain and answer with a generic message. Debug
    /// builds also return the chain in `details`.
    pub fn internal(err: &anyhow::Error) -> Self {
        tracing::error!("Internal error: {:#}", err);
        if cfg!(debug_assertions) {
            Self::with_details(
                "INTERNAL_ERROR",
                "Internal server error",
                serde_json::Value::String(format!("{:#}", err)),
            )
        } else {
            Self::new("INTERNAL_ERROR", "Internal server error")
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" | "RESTRICTED" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

impl From<ArticleServiceError> for ApiError {
    fn from(err: ArticleServiceError) -> Self {
        match err {
            ArticleServiceError::NotFound(what) => Self::not_found(format!("Not found: {}", what)),
            ArticleServiceError::ValidationError(msg) => Self::validation_error(msg),
            ArticleServiceError::Restricted(slug) => {
                Self::restricted(format!("Article is not published: {}", slug))
            }
            ArticleServiceError::Forbidden(slug) => {
                Self::forbidden(format!("Only the author can edit article: {}", slug))
            }
            ArticleServiceError::DuplicateSlug(slug) => Self::with_details(
                "CONFLICT",
                format!("Article slug already exists: {}", slug),
                serde_json::json!({ "field": "slug", "value": slug }),
            ),
            ArticleServiceError::Conflict(msg) => Self::conflict(msg),
            ArticleServiceError::InternalError(e) => Self::internal(&e),
        }
    }
}

impl From<EngagementServiceError> for ApiError {
    fn from(err: EngagementServiceError) -> Self {
        match err {
            EngagementServiceError::ValidationError(msg) => Self::validation_error(msg),
            EngagementServiceError::NotFound(what) => {
                Self::not_found(format!("Not found: {}", what))
            }
            EngagementServiceError::Restricted(slug) => {
                Self::restricted(format!("Article is not published: {}", slug))
            }
            EngagementServiceError::InternalError(e) => Self::internal(&e),
        }
    }
}

impl From<TagServiceError> for ApiError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::ValidationError(msg) => Self::validation_error(msg),
            TagServiceError::Conflict(name) => {
                Self::conflict(format!("Tag could not be created: {}", name))
            }
            TagServiceError::InternalError(e) => Self::internal(&e),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::ValidationError(msg) => Self::validation_error(msg),
            UserServiceError::NotFound(key) => Self::not_found(format!("User not found: {}", key)),
            UserServiceError::Conflict(msg) => Self::conflict(msg),
            UserServiceError::InternalError(e) => Self::internal(&e),
        }
    }
}

/// The identifier of whoever is asking, taken from `X-User-Id`.
///
/// A missing or blank header is an anonymous viewer; a malformed one is
/// rejected.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<AuthorRef>);

impl Viewer {
    pub fn id(&self) -> Option<&AuthorRef> {
        self.0.as_ref()
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(VIEWER_HEADER) else {
            return Ok(Viewer(None));
        };

        let raw = value
            .to_str()
            .map_err(|_| ApiError::validation_error("X-User-Id header is not valid text"))?;
        if raw.trim().is_empty() {
            return Ok(Viewer(None));
        }

        AuthorRef::parse(raw)
            .map(|id| Viewer(Some(id)))
            .ok_or_else(|| ApiError::validation_error(format!("Invalid X-User-Id header: {}", raw)))
    }
}

/// Turn a body identifier into an [`AuthorRef`]; `field` names it in errors.
pub fn require_identifier(
    raw: Option<RawIdentifier>,
    field: &str,
) -> Result<AuthorRef, ApiError> {
    let raw = raw.ok_or_else(|| ApiError::validation_error(format!("{} is required", field)))?;
    AuthorRef::try_from(raw).map_err(ApiError::validation_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<Viewer, ApiError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(VIEWER_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Viewer::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_viewer_from_header() {
        assert!(extract(None).await.unwrap().0.is_none());
        assert!(extract(Some("  ")).await.unwrap().0.is_none());
        assert_eq!(
            extract(Some("42")).await.unwrap().0,
            Some(AuthorRef::InternalId(42))
        );
        assert_eq!(
            extract(Some("3F2B8C1E-9D4A-4B6F-8E2A-1C5D7F9A0B3E")).await.unwrap().0,
            Some(AuthorRef::ExternalId(
                "3f2b8c1e-9d4a-4b6f-8e2a-1c5d7f9a0b3e".to_string()
            ))
        );

        let err = extract(Some("not-an-id")).await.unwrap_err();
        assert_eq!(err.error.code, "VALIDATION_ERROR");
    }

    #[test]
    fn test_require_identifier() {
        assert!(matches!(
            require_identifier(Some(RawIdentifier::Number(7)), "userId"),
            Ok(AuthorRef::InternalId(7))
        ));
        assert!(matches!(
            require_identifier(Some(RawIdentifier::Text("7".into())), "userId"),
            Ok(AuthorRef::InternalId(7))
        ));

        let missing = require_identifier(None, "userId").unwrap_err();
        assert_eq!(missing.error.message, "userId is required");

        let bad = require_identifier(Some(RawIdentifier::Number(-1)), "userId").unwrap_err();
        assert_eq!(bad.error.code, "VALIDATION_ERROR");
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::restricted("x"), StatusCode::FORBIDDEN),
            (ApiError::forbidden("x"), StatusCode::FORBIDDEN),
            (ApiError::not_found("x"), StatusCode::NOT_FOUND),
            (ApiError::validation_error("x"), StatusCode::BAD_REQUEST),
            (ApiError::conflict("x"), StatusCode::CONFLICT),
            (ApiError::new("INTERNAL_ERROR", "x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_internal_error_hides_message() {
        let err = ApiError::internal(&anyhow::anyhow!("secret table name").context("query failed"));
        assert_eq!(err.error.code, "INTERNAL_ERROR");
        assert_eq!(err.error.message, "Internal server error");
    }
}
