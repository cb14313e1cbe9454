//! Services layer - business logic
//!
//! Coordinates repositories, the gist host, the cache and the push channel:
//! - View assembly for the public pages and feed
//! - Article actions (create, fork, delete, publish toggle)
//! - The background refresh job
//! - Job capability tokens
//! - Markdown rendering and HTML sanitization

pub mod article;
pub mod assembler;
pub mod job_token;
pub mod markdown;
pub mod sanitize;
pub mod sync;

pub use article::{generate_slug, ArticleService, ArticleServiceError, NewArticleForm};
pub use assembler::{AssemblerError, EntryAssembler, EntryFilter, MissingContent, ViewEntry};
pub use job_token::{JobClaims, JobTokenError, JobTokenSigner};
pub use markdown::MarkdownRenderer;
pub use sanitize::Sanitizer;
pub use sync::{SyncError, SyncOutcome, SyncService};
