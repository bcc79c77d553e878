//! Tag service
//!
//! Implements the tag catalog:
//! - Tag list with article counts
//! - Create-or-get by name, case-insensitive
//! - Resolving tag names to rows when tagging articles

use crate::db::is_unique_violation;
use crate::db::repositories::TagRepository;
use crate::models::{Tag, TagWithCount};
use anyhow::Context;
use std::collections::HashSet;
use std::sync::Arc;

/// Error types for tag service operations
#[derive(Debug, thiserror::Error)]
pub enum TagServiceError {
    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A concurrent insert claimed the name but the row cannot be read back
    #[error("Tag conflict: {0}")]
    Conflict(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Tag service for managing the tag catalog
pub struct TagService {
    repo: Arc<dyn TagRepository>,
    default_color: String,
}

impl TagService {
    /// Create a new tag service. `default_color` is used when a tag is
    /// created without one.
    pub fn new(repo: Arc<dyn TagRepository>, default_color: impl Into<String>) -> Self {
        Self {
            repo,
            default_color: default_color.into(),
        }
    }

    /// All tags with their article counts, most used first
    pub async fn list_with_counts(&self) -> Result<Vec<TagWithCount>, TagServiceError> {
        self.repo
            .list_with_counts()
            .await
            .context("Failed to list tags")
            .map_err(Into::into)
    }

    /// Create a new tag or get the existing one by name.
    ///
    /// Returns the tag and whether it was newly created. Names are trimmed and
    /// compared case-insensitively, so "Lua" and "lua" are the same tag.
    ///
    /// # Errors
    /// - `ValidationError` if the name is empty or the color is not `#rrggbb`
    /// - `Conflict` if a concurrent insert won but its row cannot be read
    pub async fn create_or_get(
        &self,
        name: &str,
        color: Option<&str>,
    ) -> Result<(Tag, bool), TagServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TagServiceError::ValidationError(
                "Tag name cannot be empty".to_string(),
            ));
        }

        let color = match color.map(str::trim).filter(|c| !c.is_empty()) {
            Some(color) if is_hex_color(color) => color,
            Some(color) => {
                return Err(TagServiceError::ValidationError(format!(
                    "Invalid tag color: {}",
                    color
                )))
            }
            None => self.default_color.as_str(),
        };

        if let Some(existing) = self.find(name).await? {
            return Ok((existing, false));
        }

        match self.repo.create(name, color).await {
            Ok(tag) => {
                tracing::debug!("Created tag {:?} (id {})", tag.name, tag.id);
                Ok((tag, true))
            }
            Err(e) if is_unique_violation(&e) => {
                // Lost a race with another insert of the same name.
                match self.find(name).await? {
                    Some(existing) => Ok((existing, false)),
                    None => Err(TagServiceError::Conflict(name.to_string())),
                }
            }
            Err(e) => Err(e.context("Failed to create tag").into()),
        }
    }

    /// Resolve tag names to tags, creating missing ones with the default
    /// color. Blank names are skipped; names that resolve to the same tag
    /// appear once, at their first position.
    pub async fn resolve_names(&self, names: &[String]) -> Result<Vec<Tag>, TagServiceError> {
        let mut seen = HashSet::new();
        let mut tags = Vec::with_capacity(names.len());

        for name in names.iter().filter(|n| !n.trim().is_empty()) {
            let (tag, _) = self.create_or_get(name, None).await?;
            if seen.insert(tag.id) {
                tags.push(tag);
            }
        }

        Ok(tags)
    }

    async fn find(&self, name: &str) -> Result<Option<Tag>, TagServiceError> {
        self.repo
            .find_by_name(name)
            .await
            .context("Failed to check existing tag")
            .map_err(Into::into)
    }
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}
