//! Engagement service
//!
//! Likes and bookmarks on articles:
//! - Toggle for a resolved user, refused on drafts the user did not write
//! - A viewer's like/bookmark state for one article
//! - Like counter repair

use crate::db::repositories::{ArticleRepository, EngagementRepository};
use crate::models::{AuthorRef, EngagementKind, EngagementState, ToggleOutcome};
use crate::services::user::{UserService, UserServiceError};
use anyhow::Context;
use std::sync::Arc;

/// Error types for engagement service operations
#[derive(Debug, thiserror::Error)]
pub enum EngagementServiceError {
    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Article or user not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The article is a draft and the user is not its author
    #[error("Article is not published: {0}")]
    Restricted(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<UserServiceError> for EngagementServiceError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::NotFound(id) => Self::NotFound(format!("User {}", id)),
            UserServiceError::ValidationError(msg) => Self::ValidationError(msg),
            UserServiceError::Conflict(msg) => {
                Self::InternalError(anyhow::anyhow!("Unexpected user conflict: {}", msg))
            }
            UserServiceError::InternalError(e) => Self::InternalError(e),
        }
    }
}

/// Engagement service
pub struct EngagementService {
    articles: Arc<dyn ArticleRepository>,
    repo: Arc<dyn EngagementRepository>,
    users: Arc<UserService>,
}

impl EngagementService {
    pub fn new(
        articles: Arc<dyn ArticleRepository>,
        repo: Arc<dyn EngagementRepository>,
        users: Arc<UserService>,
    ) -> Self {
        Self {
            articles,
            repo,
            users,
        }
    }

    /// Toggle a like or bookmark for `user` on the article at `slug`.
    ///
    /// For likes the outcome carries the counter read back inside the
    /// toggle's transaction.
    ///
    /// # Errors
    /// - `NotFound` if the user or the article does not exist
    /// - `Restricted` if the article is a draft by someone else
    pub async fn toggle(
        &self,
        kind: EngagementKind,
        user: &AuthorRef,
        slug: &str,
    ) -> Result<ToggleOutcome, EngagementServiceError> {
        let user = self.users.require(user).await?;

        let article = self
            .articles
            .get_with_meta_by_slug(slug)
            .await
            .context("Failed to load article")?
            .ok_or_else(|| EngagementServiceError::NotFound(format!("Article {}", slug)))?;

        if !article.article.is_published() && article.author.id != user.id {
            return Err(EngagementServiceError::Restricted(slug.to_string()));
        }

        let outcome = self.repo.toggle(kind, user.id, article.article.id).await?;
        tracing::debug!(
            "User {} toggled {} on {}: active={} likes_count={:?}",
            user.id,
            kind,
            slug,
            outcome.active,
            outcome.likes_count
        );
        Ok(outcome)
    }

    /// A viewer's like and bookmark state for one article. Anonymous and
    /// unknown viewers have neither.
    pub async fn state(
        &self,
        slug: &str,
        viewer: Option<&AuthorRef>,
    ) -> Result<EngagementState, EngagementServiceError> {
        let article_id = self.article_id(slug).await?;

        let Some(viewer) = viewer else {
            return Ok(EngagementState::default());
        };
        let Some(user) = self.users.resolve(viewer).await? else {
            return Ok(EngagementState::default());
        };

        let (liked, bookmarked) = futures::try_join!(
            self.repo.is_active(EngagementKind::Like, user.id, article_id),
            self.repo.is_active(EngagementKind::Bookmark, user.id, article_id),
        )?;

        Ok(EngagementState { liked, bookmarked })
    }

    /// Re-derive one article's like counter from its like rows
    pub async fn recount_likes(&self, slug: &str) -> Result<i64, EngagementServiceError> {
        let article_id = self.article_id(slug).await?;
        let count = self.repo.recount_likes(article_id).await?;
        Ok(count)
    }

    /// Repair every drifted like counter; returns how many were fixed
    pub async fn reconcile_all(&self) -> Result<u64, EngagementServiceError> {
        let fixed = self.repo.reconcile_all_likes().await?;
        if fixed > 0 {
            tracing::warn!("Repaired like counters on {} articles", fixed);
        }
        Ok(fixed)
    }

    async fn article_id(&self, slug: &str) -> Result<i64, EngagementServiceError> {
        self.articles
            .get_by_slug(slug)
            .await
            .context("Failed to load article")?
            .map(|article| article.id)
            .ok_or_else(|| EngagementServiceError::NotFound(format!("Article {}", slug)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        fixtures, SqlxArticleRepository, SqlxEngagementRepository, SqlxUserRepository,
    };
    use crate::db::DynDatabasePool;

    const UID: &str = "3f2b8c1e-9d4a-4b6f-8e2a-1c5d7f9a0b3e";

    async fn setup_test_service() -> (DynDatabasePool, EngagementService) {
        let pool = fixtures::migrated_pool().await;
        let users = Arc::new(UserService::new(SqlxUserRepository::boxed(pool.clone())));
        let service = EngagementService::new(
            SqlxArticleRepository::boxed(pool.clone()),
            SqlxEngagementRepository::boxed(pool.clone()),
            users,
        );
        (pool, service)
    }

    #[tokio::test]
    async fn test_like_twice_restores_state() {
        let (pool, service) = setup_test_service().await;
        let author = fixtures::insert_user(&pool, "author", None).await;
        let reader = fixtures::insert_user(&pool, "reader", Some(UID)).await;
        fixtures::insert_article(&pool, author, "intro-to-lua", "published", 0).await;
        let reader_ref = AuthorRef::InternalId(reader);

        let on = service
            .toggle(EngagementKind::Like, &reader_ref, "intro-to-lua")
            .await
            .unwrap();
        assert_eq!(on, ToggleOutcome { active: true, likes_count: Some(1) });

        let state = service
            .state("intro-to-lua", Some(&AuthorRef::ExternalId(UID.to_string())))
            .await
            .unwrap();
        assert_eq!(state, EngagementState { liked: true, bookmarked: false });

        let off = service
            .toggle(EngagementKind::Like, &reader_ref, "intro-to-lua")
            .await
            .unwrap();
        assert_eq!(off, ToggleOutcome { active: false, likes_count: Some(0) });
    }

    #[tokio::test]
    async fn test_toggle_not_found() {
        let (pool, service) = setup_test_service().await;
        let author = fixtures::insert_user(&pool, "author", None).await;
        fixtures::insert_article(&pool, author, "post", "published", 0).await;

        assert!(matches!(
            service
                .toggle(EngagementKind::Like, &AuthorRef::InternalId(999), "post")
                .await,
            Err(EngagementServiceError::NotFound(_))
        ));
        assert!(matches!(
            service
                .toggle(EngagementKind::Bookmark, &AuthorRef::InternalId(author), "missing")
                .await,
            Err(EngagementServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_toggle_on_foreign_draft_is_restricted() {
        let (pool, service) = setup_test_service().await;
        let author = fixtures::insert_user(&pool, "author", None).await;
        let reader = fixtures::insert_user(&pool, "reader", None).await;
        fixtures::insert_article(&pool, author, "wip", "draft", 0).await;

        assert!(matches!(
            service
                .toggle(EngagementKind::Like, &AuthorRef::InternalId(reader), "wip")
                .await,
            Err(EngagementServiceError::Restricted(_))
        ));

        let own = service
            .toggle(EngagementKind::Bookmark, &AuthorRef::InternalId(author), "wip")
            .await
            .unwrap();
        assert!(own.active);
    }

    #[tokio::test]
    async fn test_state_for_anonymous_and_unknown_viewers() {
        let (pool, service) = setup_test_service().await;
        let author = fixtures::insert_user(&pool, "author", None).await;
        fixtures::insert_article(&pool, author, "post", "published", 0).await;

        assert_eq!(service.state("post", None).await.unwrap(), EngagementState::default());
        assert_eq!(
            service
                .state("post", Some(&AuthorRef::InternalId(999)))
                .await
                .unwrap(),
            EngagementState::default()
        );
        assert!(matches!(
            service.state("missing", None).await,
            Err(EngagementServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_recount_and_reconcile() {
        let (pool, service) = setup_test_service().await;
        let author = fixtures::insert_user(&pool, "author", None).await;
        let article = fixtures::insert_article(&pool, author, "post", "published", 0).await;
        service
            .toggle(EngagementKind::Like, &AuthorRef::InternalId(author), "post")
            .await
            .unwrap();

        sqlx::query("UPDATE articles SET likes_count = 10 WHERE id = ?")
            .bind(article)
            .execute(fixtures::sqlite(&pool))
            .await
            .unwrap();
        assert_eq!(service.recount_likes("post").await.unwrap(), 1);

        sqlx::query("UPDATE articles SET likes_count = 3 WHERE id = ?")
            .bind(article)
            .execute(fixtures::sqlite(&pool))
            .await
            .unwrap();
        assert_eq!(service.reconcile_all().await.unwrap(), 1);
        assert_eq!(fixtures::likes_counter(&pool, article).await, 1);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::db::repositories::{
        fixtures, SqlxArticleRepository, SqlxEngagementRepository, SqlxUserRepository,
    };
    use proptest::prelude::*;

    const USERS: usize = 4;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        /// Toggles from several users, repeats by the same user included,
        /// run concurrently against a file-backed database. Afterwards the
        /// counter equals the like rows and each user's state is the parity
        /// of their toggles.
        #[test]
        fn counter_matches_like_rows(toggles in prop::collection::vec(0..USERS, 0..24)) {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(4)
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let dir = tempfile::tempdir().unwrap();
                let pool = fixtures::migrated_file_pool(&dir).await;
                let author = fixtures::insert_user(&pool, "author", None).await;
                let article = fixtures::insert_article(&pool, author, "post", "published", 0).await;
                let mut users = Vec::new();
                for i in 0..USERS {
                    users.push(fixtures::insert_user(&pool, &format!("u{}", i), None).await);
                }

                let service = Arc::new(EngagementService::new(
                    SqlxArticleRepository::boxed(pool.clone()),
                    SqlxEngagementRepository::boxed(pool.clone()),
                    Arc::new(UserService::new(SqlxUserRepository::boxed(pool.clone()))),
                ));

                let tasks = toggles.iter().map(|&i| {
                    let service = service.clone();
                    let user = AuthorRef::InternalId(users[i]);
                    tokio::spawn(async move {
                        service.toggle(EngagementKind::Like, &user, "post").await
                    })
                });
                for result in futures::future::join_all(tasks).await {
                    result.expect("toggle task panicked").expect("toggle failed");
                }

                let rows = fixtures::like_rows(&pool, article).await;
                assert_eq!(fixtures::likes_counter(&pool, article).await, rows);

                let mut expected = 0;
                for (i, &user) in users.iter().enumerate() {
                    let liked = toggles.iter().filter(|&&t| t == i).count() % 2 == 1;
                    let state = service
                        .state("post", Some(&AuthorRef::InternalId(user)))
                        .await
                        .unwrap();
                    assert_eq!(state.liked, liked, "user {} toggled {:?}", i, toggles);
                    expected += i64::from(liked);
                }
                assert_eq!(rows, expected);

                pool.close().await;
            });
        }
    }
}
