//! Engagement model: likes and bookmarks
//!
//! A (user, article) row in `likes` or `bookmarks` is the active state; there
//! is no separate flag.

use serde::{Deserialize, Serialize};

/// Which association a toggle acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementKind {
    Like,
    Bookmark,
}

impl EngagementKind {
    /// Association table holding the active rows
    pub fn table(&self) -> &'static str {
        match self {
            EngagementKind::Like => "likes",
            EngagementKind::Bookmark => "bookmarks",
        }
    }

    /// Only likes are mirrored by a counter on the article
    pub fn has_counter(&self) -> bool {
        matches!(self, EngagementKind::Like)
    }
}

impl std::fmt::Display for EngagementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngagementKind::Like => f.write_str("like"),
            EngagementKind::Bookmark => f.write_str("bookmark"),
        }
    }
}

/// Result of a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleOutcome {
    /// Whether the association exists after the toggle
    pub active: bool,
    /// Counter value read back inside the toggle's transaction (likes only)
    pub likes_count: Option<i64>,
}

/// A viewer's engagement with one article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngagementState {
    pub liked: bool,
    pub bookmarked: bool,
}
