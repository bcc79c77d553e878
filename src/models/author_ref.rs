//! Author and viewer identifiers
//!
//! Users are addressed either by the identity provider's UUID (`auth_uid`)
//! or by the internal integer id. The shape is decided once, when the raw
//! value enters the system, and carried as an [`AuthorRef`] afterwards.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::AuthorSummary;

static UUID_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("UUID pattern is valid")
});

/// A user identifier whose shape has already been decided
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuthorRef {
    /// Identity-provider UUID, matched against `users.auth_uid`
    ExternalId(String),
    /// Internal primary key, matched against `users.id`
    InternalId(i64),
}

impl AuthorRef {
    /// Parse a textual identifier.
    ///
    /// UUID-shaped text becomes `ExternalId` (lowercased), a positive
    /// integer becomes `InternalId`; anything else is rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Some(uid) = canonical_uid(raw) {
            return Some(Self::ExternalId(uid));
        }
        match raw.parse::<i64>() {
            Ok(id) if id > 0 => Some(Self::InternalId(id)),
            _ => None,
        }
    }

    /// Whether this identifier names the given author, under either shape.
    pub fn matches(&self, author: &AuthorSummary) -> bool {
        match self {
            Self::InternalId(id) => author.id == *id,
            Self::ExternalId(uid) => author
                .auth_uid
                .as_deref()
                .is_some_and(|stored| stored.eq_ignore_ascii_case(uid)),
        }
    }
}

/// Lowercased form of a UUID-shaped identity-provider uid, `None` for any
/// other text. Stored `auth_uid`s are always in this form.
pub fn canonical_uid(raw: &str) -> Option<String> {
    let raw = raw.trim();
    UUID_SHAPE
        .is_match(raw)
        .then(|| raw.to_ascii_lowercase())
}

impl std::fmt::Display for AuthorRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExternalId(uid) => f.write_str(uid),
            Self::InternalId(id) => write!(f, "{}", id),
        }
    }
}

/// An identifier exactly as it arrived in a JSON body: a number, a string,
/// or something unusable. Conversion into [`AuthorRef`] is fallible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawIdentifier {
    Number(i64),
    Text(String),
    Other(serde_json::Value),
}

impl TryFrom<RawIdentifier> for AuthorRef {
    type Error = String;

    fn try_from(raw: RawIdentifier) -> Result<Self, Self::Error> {
        match raw {
            RawIdentifier::Number(id) if id > 0 => Ok(Self::InternalId(id)),
            RawIdentifier::Number(id) => Err(format!("Invalid user id: {}", id)),
            RawIdentifier::Text(text) => {
                Self::parse(&text).ok_or_else(|| format!("Invalid user id: {}", text))
            }
            RawIdentifier::Other(value) => Err(format!("Invalid user id: {}", value)),
        }
    }
}
