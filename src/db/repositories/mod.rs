//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles one entity and hides the SQLite/MySQL split.

pub mod article;
pub mod engagement;
pub mod tag;
pub mod user;

#[cfg(test)]
pub(crate) mod fixtures;

pub use article::{ArticleRepository, SqlxArticleRepository};
pub use engagement::{EngagementRepository, SqlxEngagementRepository};
pub use tag::{SqlxTagRepository, TagRepository};
pub use user::{SqlxUserRepository, UserRepository};
