//! Tag model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tag entity. Names are unique ignoring case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    /// Display color as `#rrggbb`
    pub color: String,
    pub created_at: DateTime<Utc>,
}

impl Tag {
    pub fn summary(&self) -> TagSummary {
        TagSummary {
            id: self.id,
            name: self.name.clone(),
            color: self.color.clone(),
        }
    }
}

/// Tag with the number of articles carrying it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagWithCount {
    #[serde(flatten)]
    pub tag: Tag,
    pub article_count: i64,
}

/// Tag as embedded in an article payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagSummary {
    pub id: i64,
    pub name: String,
    pub color: String,
}
