//! Article model
//!
//! This module provides:
//! - `Article` entity: local metadata for a gist-backed article
//! - `ArticleKind` enum for the post/guide split
//! - Input types for creating and sync-updating articles
//!
//! The article body itself is never stored locally; it lives in the gist
//! identified by `gist_id` and is fetched (and cached) on demand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Article entity
///
/// `(owner_id, gist_id)` is unique and serves as the reconciliation key for
/// the refresh job; `(owner_id, slug)` is unique and serves as the URL key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    /// Unique identifier
    pub id: i64,
    /// Owning user ID
    pub owner_id: i64,
    /// Identifier of the gist holding the article body
    pub gist_id: String,
    /// Article title
    pub title: String,
    /// Short summary shown in listings and the feed
    pub summary: String,
    /// URL-friendly slug, derived from the title, unique per owner
    pub slug: String,
    /// Post / guide / unknown bucket
    pub kind: ArticleKind,
    /// Whether the article appears in public listings
    pub public: bool,
    /// Whether the article is still a draft
    pub draft: bool,
    /// Creation timestamp (publication date reported by the gist manifest)
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Article kind
///
/// The remote manifest may carry kinds this crate does not know about;
/// those map to `Unknown` and only ever surface in the owner's profile,
/// never in the public blog or guide listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArticleKind {
    /// Blog post
    #[default]
    Post,
    /// Long-form guide
    Guide,
    /// Anything else the remote host reported
    Unknown,
}

impl ArticleKind {
    /// Convert kind to its database/manifest string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleKind::Post => "post",
            ArticleKind::Guide => "guide",
            ArticleKind::Unknown => "unknown",
        }
    }

    /// Parse a kind from a manifest or database string.
    ///
    /// Unrecognized values land in the `Unknown` bucket rather than being
    /// treated as guides.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "post" => ArticleKind::Post,
            "guide" => ArticleKind::Guide,
            _ => ArticleKind::Unknown,
        }
    }
}

impl std::fmt::Display for ArticleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input for creating a new article record
#[derive(Debug, Clone)]
pub struct CreateArticleInput {
    /// Owning user ID
    pub owner_id: i64,
    /// Gist holding the body
    pub gist_id: String,
    /// Article title
    pub title: String,
    /// Short summary
    pub summary: String,
    /// URL slug
    pub slug: String,
    /// Post / guide bucket
    pub kind: ArticleKind,
    /// Publicly listed?
    pub public: bool,
    /// Draft?
    pub draft: bool,
    /// Publication timestamp from the gist manifest
    pub created_at: DateTime<Utc>,
}

/// Metadata overwritten on an existing article by the refresh job
#[derive(Debug, Clone)]
pub struct SyncArticleUpdate {
    /// New title
    pub title: String,
    /// New summary
    pub summary: String,
    /// Gist id as reported by the remote host
    pub gist_id: String,
    /// New kind
    pub kind: ArticleKind,
    /// Publication timestamp from the gist manifest
    pub updated_at: DateTime<Utc>,
}
