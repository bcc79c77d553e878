//! Services layer - Business logic
//!
//! Services own the rules repositories do not: visibility of drafts,
//! validation, identifier resolution and feed filtering. Each service has its
//! own error enum; the api layer maps those to HTTP responses.

pub mod article;
pub mod engagement;
pub mod feed;
pub mod tag;
pub mod user;

pub use article::{ArticleChanges, ArticleService, ArticleServiceError, NewArticle};
pub use engagement::{EngagementService, EngagementServiceError};
pub use feed::{FeedFilter, MainTags, TagFilter, OTHER_TAG};
pub use tag::{TagService, TagServiceError};
pub use user::{ProfileHints, UserService, UserServiceError};
