//! Repository layer
//!
//! Trait-based data access with SQLx implementations for SQLite and MySQL.

pub mod article;
pub mod session;
pub mod user;

pub use article::{ArticleRepository, SqlxArticleRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
