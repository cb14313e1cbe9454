//! Data models
//!
//! Entity types shared across repositories, services and handlers.

pub mod article;
pub mod session;
pub mod user;

pub use article::{Article, ArticleKind, CreateArticleInput, SyncArticleUpdate};
pub use session::Session;
pub use user::{IdentityProvider, SocialIdentity, User};
