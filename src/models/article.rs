//! Article model
//!
//! - `Article` entity and its `ArticleStatus`
//! - `ArticleWithMeta`, the article joined with its author and ordered tags
//! - Input types for creating and updating articles

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AuthorSummary, TagSummary};

/// Number of characters of content used when no excerpt is supplied
pub const EXCERPT_LENGTH: usize = 200;

/// Article entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    pub id: i64,
    /// URL-friendly slug, globally unique
    pub slug: String,
    pub title: String,
    /// Markdown source
    pub content: String,
    pub excerpt: Option<String>,
    pub thumbnail_url: Option<String>,
    pub status: ArticleStatus,
    /// Always equal to the number of like rows for this article
    pub likes_count: i64,
    pub views_count: i64,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// Excerpt derived from content: its first [`EXCERPT_LENGTH`] characters.
    pub fn excerpt_from(content: &str) -> String {
        content.chars().take(EXCERPT_LENGTH).collect()
    }

    pub fn is_published(&self) -> bool {
        self.status == ArticleStatus::Published
    }
}

/// Article publication status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    /// Visible to its author only
    Draft,
    /// Visible to everyone
    #[default]
    Published,
}

impl ArticleStatus {
    /// Database representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::Published => "published",
        }
    }

    /// Parse the database or request representation
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Some(ArticleStatus::Draft),
            "published" => Some(ArticleStatus::Published),
            _ => None,
        }
    }
}

impl std::fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An article together with its author and its tags in attachment order.
///
/// `tags` is empty, never absent, for untagged articles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArticleWithMeta {
    #[serde(flatten)]
    pub article: Article,
    pub author: AuthorSummary,
    pub tags: Vec<TagSummary>,
}

impl ArticleWithMeta {
    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(|t| t.name.as_str())
    }

    /// Exact, case-sensitive tag membership
    pub fn has_tag(&self, name: &str) -> bool {
        self.tag_names().any(|t| t == name)
    }
}

/// Validated input for inserting an article
#[derive(Debug, Clone)]
pub struct CreateArticleInput {
    pub slug: String,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub thumbnail_url: Option<String>,
    pub status: ArticleStatus,
    pub author_id: i64,
}

/// Validated input for updating an article.
///
/// `thumbnail_url: None` keeps the current thumbnail.
#[derive(Debug, Clone)]
pub struct UpdateArticleInput {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub thumbnail_url: Option<String>,
    pub status: Option<ArticleStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [ArticleStatus::Draft, ArticleStatus::Published] {
            assert_eq!(ArticleStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ArticleStatus::parse("Published"), Some(ArticleStatus::Published));
        assert_eq!(ArticleStatus::parse("archived"), None);
    }

    #[test]
    fn test_excerpt_counts_characters_not_bytes() {
        let content = "ロブロックス".repeat(100);
        let excerpt = Article::excerpt_from(&content);
        assert_eq!(excerpt.chars().count(), EXCERPT_LENGTH);

        assert_eq!(Article::excerpt_from("short"), "short");
    }

    #[test]
    fn test_serialized_tags_never_null() {
        let now = Utc::now();
        let meta = ArticleWithMeta {
            article: Article {
                id: 1,
                slug: "a".into(),
                title: "A".into(),
                content: "c".into(),
                excerpt: None,
                thumbnail_url: None,
                status: ArticleStatus::Published,
                likes_count: 0,
                views_count: 0,
                author_id: 1,
                created_at: now,
                updated_at: now,
            },
            author: AuthorSummary {
                id: 1,
                auth_uid: None,
                username: "u".into(),
                display_name: None,
                avatar_url: None,
            },
            tags: Vec::new(),
        };

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["tags"], serde_json::json!([]));
        assert_eq!(json["slug"], "a");
        assert_eq!(json["status"], "published");
    }
}
