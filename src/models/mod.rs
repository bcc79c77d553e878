//! Data models
//!
//! Database entities, the enriched article view served by the feed, and the
//! identifier type used for authors and viewers.

mod article;
mod author_ref;
mod engagement;
mod tag;
mod user;

pub use article::{
    Article, ArticleStatus, ArticleWithMeta, CreateArticleInput, UpdateArticleInput,
    EXCERPT_LENGTH,
};
pub use author_ref::{canonical_uid, AuthorRef, RawIdentifier};
pub use engagement::{EngagementKind, EngagementState, ToggleOutcome};
pub use tag::{Tag, TagSummary, TagWithCount};
pub use user::{AuthorSummary, CreateUserInput, User};
