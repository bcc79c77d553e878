//! User service
//!
//! Implements the user directory:
//! - Lookup by identity-provider uid or email
//! - Idempotent creation keyed by `auth_uid`
//! - Resolving an [`AuthorRef`] to a stored user, provisioning unseen
//!   identity-provider users on demand

use crate::db::is_unique_violation;
use crate::db::repositories::UserRepository;
use crate::models::{canonical_uid, AuthorRef, CreateUserInput, User};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

/// Avatar generator used when a user has no avatar of their own
const DEFAULT_AVATAR_BASE: &str = "https://api.dicebear.com/7.x/avataaars/svg?seed=";

/// Placeholder email domain for users provisioned without an email
const PLACEHOLDER_EMAIL_DOMAIN: &str = "temp.local";

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// User not found
    #[error("User not found: {0}")]
    NotFound(String),

    /// A concurrent insert claimed the username or uid
    #[error("User conflict: {0}")]
    Conflict(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Optional profile fields supplied alongside a uid. Blank values count as
/// absent.
#[derive(Debug, Clone, Default)]
pub struct ProfileHints {
    pub username: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl ProfileHints {
    fn normalized(self) -> Self {
        Self {
            username: non_blank(self.username),
            email: non_blank(self.email),
            display_name: non_blank(self.display_name),
            avatar_url: non_blank(self.avatar_url),
        }
    }
}

/// User service for the user directory
pub struct UserService {
    repo: Arc<dyn UserRepository>,
}

impl UserService {
    /// Create a new user service
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    /// Find a user by `auth_uid`, or by email when no uid is given.
    ///
    /// # Errors
    /// - `ValidationError` if neither key is given
    /// - `NotFound` if no user matches
    pub async fn find(
        &self,
        auth_uid: Option<&str>,
        email: Option<&str>,
    ) -> Result<User, UserServiceError> {
        let auth_uid = auth_uid
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|uid| canonical_uid(uid).unwrap_or_else(|| uid.to_string()));
        let email = email.map(str::trim).filter(|s| !s.is_empty());

        let (found, key) = match (auth_uid.as_deref(), email) {
            (Some(uid), _) => (
                self.repo
                    .get_by_auth_uid(uid)
                    .await
                    .context("Failed to look up user by auth_uid")?,
                uid,
            ),
            (None, Some(email)) => (
                self.repo
                    .get_by_email(email)
                    .await
                    .context("Failed to look up user by email")?,
                email,
            ),
            (None, None) => {
                return Err(UserServiceError::ValidationError(
                    "auth_uid or email is required".to_string(),
                ))
            }
        };

        found.ok_or_else(|| UserServiceError::NotFound(key.to_string()))
    }

    /// Create a user for `auth_uid`, or return the one that already exists.
    ///
    /// Returns the user and whether it was newly created. The username
    /// defaults to `user_<first 8 chars of uid>` and gets a `_<unix millis>`
    /// suffix when it is taken.
    ///
    /// # Errors
    /// - `ValidationError` if `auth_uid` or the email hint is missing, or
    ///   `auth_uid` is not UUID-shaped
    pub async fn create(
        &self,
        auth_uid: &str,
        hints: ProfileHints,
    ) -> Result<(User, bool), UserServiceError> {
        let hints = hints.normalized();
        if auth_uid.trim().is_empty() || hints.email.is_none() {
            return Err(UserServiceError::ValidationError(
                "auth_uid and email are required".to_string(),
            ));
        }
        let auth_uid = canonical_uid(auth_uid).ok_or_else(|| {
            UserServiceError::ValidationError(format!("auth_uid must be a UUID: {}", auth_uid))
        })?;

        self.create_or_get(&auth_uid, hints).await
    }

    /// Look up the user an identifier names, by the identifier's shape
    pub async fn resolve(&self, author: &AuthorRef) -> Result<Option<User>, UserServiceError> {
        let user = match author {
            AuthorRef::InternalId(id) => self.repo.get_by_id(*id).await,
            AuthorRef::ExternalId(uid) => self.repo.get_by_auth_uid(uid).await,
        }
        .with_context(|| format!("Failed to resolve user {}", author))?;
        Ok(user)
    }

    /// Like [`resolve`](Self::resolve) but fails with `NotFound` when absent
    pub async fn require(&self, author: &AuthorRef) -> Result<User, UserServiceError> {
        self.resolve(author)
            .await?
            .ok_or_else(|| UserServiceError::NotFound(author.to_string()))
    }

    /// Resolve an author, creating the user when an unseen identity-provider
    /// uid is given. Unknown internal ids are `NotFound`.
    pub async fn resolve_or_provision(
        &self,
        author: &AuthorRef,
        hints: ProfileHints,
    ) -> Result<User, UserServiceError> {
        if let Some(user) = self.resolve(author).await? {
            return Ok(user);
        }

        match author {
            AuthorRef::InternalId(id) => Err(UserServiceError::NotFound(id.to_string())),
            AuthorRef::ExternalId(uid) => {
                let (user, _) = self.create_or_get(uid, hints.normalized()).await?;
                tracing::info!("Provisioned user {} for auth_uid {}", user.id, uid);
                Ok(user)
            }
        }
    }

    async fn create_or_get(
        &self,
        auth_uid: &str,
        hints: ProfileHints,
    ) -> Result<(User, bool), UserServiceError> {
        if let Some(existing) = self
            .repo
            .get_by_auth_uid(auth_uid)
            .await
            .context("Failed to check existing user")?
        {
            return Ok((existing, false));
        }

        let base = hints
            .username
            .unwrap_or_else(|| format!("user_{}", auth_uid.chars().take(8).collect::<String>()));
        let username = if self
            .repo
            .username_exists(&base)
            .await
            .context("Failed to check username")?
        {
            format!("{}_{}", base, Utc::now().timestamp_millis())
        } else {
            base
        };

        let input = CreateUserInput {
            auth_uid: Some(auth_uid.to_string()),
            email: hints
                .email
                .unwrap_or_else(|| format!("{}@{}", auth_uid, PLACEHOLDER_EMAIL_DOMAIN)),
            display_name: Some(hints.display_name.unwrap_or_else(|| username.clone())),
            avatar_url: Some(
                hints
                    .avatar_url
                    .unwrap_or_else(|| format!("{}{}", DEFAULT_AVATAR_BASE, auth_uid)),
            ),
            bio: None,
            username,
        };

        match self.repo.create(&input).await {
            Ok(user) => Ok((user, true)),
            Err(e) if is_unique_violation(&e) => {
                // Another request created the same uid first.
                match self
                    .repo
                    .get_by_auth_uid(auth_uid)
                    .await
                    .context("Failed to re-read user")?
                {
                    Some(existing) => Ok((existing, false)),
                    None => Err(UserServiceError::Conflict(input.username)),
                }
            }
            Err(e) => Err(e.context("Failed to create user").into()),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
