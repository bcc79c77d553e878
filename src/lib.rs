//! Gamestudy - backend for a game-development study blog
//!
//! Articles written in Markdown, filtered by tag and search term, with likes,
//! bookmarks and view counts. Users are addressed either by the identity
//! provider's UUID or by the internal integer id.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
