//! API layer - HTTP handlers and routing
//!
//! Everything is mounted under `/api/v1`:
//! - Article endpoints (feed, single article, create, update)
//! - Engagement endpoints (likes, bookmarks)
//! - Tag endpoints
//! - User endpoints
//! - Health check

pub mod articles;
pub mod engagement;
pub mod health;
pub mod middleware;
pub mod tags;
pub mod users;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

pub use middleware::{ApiError, AppState, Viewer, VIEWER_HEADER};

/// Build the `/api/v1` router
pub fn build_api_router() -> Router<AppState> {
    Router::new()
        .nest("/articles", articles::router().merge(engagement::router()))
        .nest("/tags", tags::router())
        .nest("/users", users::router())
        .nest("/health", health::router())
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    Router::new()
        .nest("/api/v1", build_api_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(cors_origin)),
        )
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let allow_origin = if origin == "*" {
        AllowOrigin::any()
    } else {
        match origin.parse::<HeaderValue>() {
            Ok(value) => AllowOrigin::exact(value),
            Err(_) => {
                tracing::warn!("Invalid CORS origin {:?}, allowing any origin", origin);
                AllowOrigin::any()
            }
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(VIEWER_HEADER)])
}
