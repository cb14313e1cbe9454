//! User repository
//!
//! Lookup-only data access for users and their linked external accounts.
//! Registration and OAuth linking write these tables from outside this
//! service; the blog only reads them.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{IdentityProvider, SocialIdentity, User};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use sqlx::Row;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by username (profile URLs)
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Get the user's linked account for one provider
    async fn identity(
        &self,
        user_id: i64,
        provider: IdentityProvider,
    ) -> Result<Option<SocialIdentity>>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a shared repository for dependency injection
    pub fn shared(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_USER: &str = "SELECT id, username, email, name, last_name, bio, gravatar_url, microblog_widget_id, created_at, updated_at FROM users";

const SELECT_IDENTITY: &str =
    "SELECT id, user_id, provider, remote_uid, access_token, screen_name FROM social_identities";

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("{} WHERE id = ?", SELECT_USER);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.as_sqlite().unwrap())
                    .await?;
                Ok(row.as_ref().map(user_from_sqlite_row))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.as_mysql().unwrap())
                    .await?;
                Ok(row.as_ref().map(user_from_mysql_row))
            }
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("{} WHERE username = ?", SELECT_USER);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(username)
                    .fetch_optional(self.pool.as_sqlite().unwrap())
                    .await?;
                Ok(row.as_ref().map(user_from_sqlite_row))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(username)
                    .fetch_optional(self.pool.as_mysql().unwrap())
                    .await?;
                Ok(row.as_ref().map(user_from_mysql_row))
            }
        }
    }

    async fn identity(
        &self,
        user_id: i64,
        provider: IdentityProvider,
    ) -> Result<Option<SocialIdentity>> {
        let sql = format!("{} WHERE user_id = ? AND provider = ?", SELECT_IDENTITY);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(user_id)
                    .bind(provider.as_str())
                    .fetch_optional(self.pool.as_sqlite().unwrap())
                    .await?;
                Ok(row.as_ref().and_then(identity_from_sqlite_row))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(user_id)
                    .bind(provider.as_str())
                    .fetch_optional(self.pool.as_mysql().unwrap())
                    .await?;
                Ok(row.as_ref().and_then(identity_from_mysql_row))
            }
        }
    }
}

fn user_from_sqlite_row(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        name: row.get("name"),
        last_name: row.get("last_name"),
        bio: row.get("bio"),
        gravatar_url: row.get("gravatar_url"),
        microblog_widget_id: row.get("microblog_widget_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn user_from_mysql_row(row: &sqlx::mysql::MySqlRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        name: row.get("name"),
        last_name: row.get("last_name"),
        bio: row.get("bio"),
        gravatar_url: row.get("gravatar_url"),
        microblog_widget_id: row.get("microblog_widget_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn identity_from_sqlite_row(row: &sqlx::sqlite::SqliteRow) -> Option<SocialIdentity> {
    let provider = IdentityProvider::parse(row.get::<String, _>("provider").as_str())?;
    Some(SocialIdentity {
        id: row.get("id"),
        user_id: row.get("user_id"),
        provider,
        remote_uid: row.get("remote_uid"),
        access_token: row.get("access_token"),
        screen_name: row.get("screen_name"),
    })
}

fn identity_from_mysql_row(row: &sqlx::mysql::MySqlRow) -> Option<SocialIdentity> {
    let provider = IdentityProvider::parse(row.get::<String, _>("provider").as_str())?;
    Some(SocialIdentity {
        id: row.get("id"),
        user_id: row.get("user_id"),
        provider,
        remote_uid: row.get("remote_uid"),
        access_token: row.get("access_token"),
        screen_name: row.get("screen_name"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations, DatabasePool};

    async fn setup() -> (DynDatabasePool, SqlxUserRepository) {
        let pool = create_test_pool().await.expect("test pool");
        migrations::run_migrations(&pool).await.expect("migrations");
        pool.execute(
            "INSERT INTO users (username, email, name, last_name) \
             VALUES ('alice', 'alice@example.com', 'Alice', 'Smith')",
        )
        .await
        .expect("seed user");
        let repo = SqlxUserRepository::new(pool.clone());
        (pool, repo)
    }

    #[tokio::test]
    async fn test_get_by_username() {
        let (_pool, repo) = setup().await;
        let user = repo.get_by_username("alice").await.unwrap().unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(user.display_name(), "Alice Smith");

        assert!(repo.get_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_identity_lookup_by_provider() {
        let (pool, repo) = setup().await;
        pool.execute(
            "INSERT INTO social_identities (user_id, provider, remote_uid, access_token) \
             VALUES (1, 'github', 'alice-gh', 'tok-123')",
        )
        .await
        .unwrap();

        let identity = repo
            .identity(1, IdentityProvider::Github)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(identity.remote_uid, "alice-gh");
        assert_eq!(identity.access_token.as_deref(), Some("tok-123"));

        let none = repo.identity(1, IdentityProvider::Twitter).await.unwrap();
        assert!(none.is_none());
    }
}
