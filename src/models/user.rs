//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    /// Internal identifier
    pub id: i64,
    /// Identity-provider UUID; absent for legacy integer-only users
    pub auth_uid: Option<String>,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// The public slice of the user shown next to their articles
    pub fn summary(&self) -> AuthorSummary {
        AuthorSummary {
            id: self.id,
            auth_uid: self.auth_uid.clone(),
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

/// Author information embedded in article payloads
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorSummary {
    pub id: i64,
    pub auth_uid: Option<String>,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Input for creating a user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateUserInput {
    pub auth_uid: Option<String>,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

impl CreateUserInput {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            ..Self::default()
        }
    }

    pub fn with_auth_uid(mut self, auth_uid: impl Into<String>) -> Self {
        self.auth_uid = Some(auth_uid.into());
        self
    }
}
