//! Session repository
//!
//! Sessions are written by the external login surface and validated here by
//! the authentication middleware. Expired rows are pruned opportunistically.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Session;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::Row;
use std::sync::Arc;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Create a session for a user with the given lifetime, returning it
    /// with a freshly generated token.
    async fn create(&self, user_id: i64, ttl: Duration) -> Result<Session>;

    /// Look up a session by token, returning it only if not expired.
    async fn find_valid(&self, token: &str, now: DateTime<Utc>) -> Result<Option<Session>>;

    /// Delete all expired sessions, returning how many were removed.
    async fn prune_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// SQLx-based session repository implementation
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    /// Create a new SQLx session repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a shared repository for dependency injection
    pub fn shared(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, user_id: i64, ttl: Duration) -> Result<Session> {
        let now = Utc::now();
        let session = Session {
            id: uuid::Uuid::new_v4().simple().to_string(),
            user_id,
            expires_at: now + ttl,
            created_at: now,
        };

        let sql = "INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(&session.id)
                    .bind(session.user_id)
                    .bind(session.expires_at)
                    .bind(session.created_at)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(&session.id)
                    .bind(session.user_id)
                    .bind(session.expires_at)
                    .bind(session.created_at)
                    .execute(self.pool.as_mysql().unwrap())
                    .await?;
            }
        }
        Ok(session)
    }

    async fn find_valid(&self, token: &str, now: DateTime<Utc>) -> Result<Option<Session>> {
        let sql =
            "SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ? AND expires_at > ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(sql)
                    .bind(token)
                    .bind(now)
                    .fetch_optional(self.pool.as_sqlite().unwrap())
                    .await?;
                Ok(row.map(|row| Session {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    expires_at: row.get("expires_at"),
                    created_at: row.get("created_at"),
                }))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(sql)
                    .bind(token)
                    .bind(now)
                    .fetch_optional(self.pool.as_mysql().unwrap())
                    .await?;
                Ok(row.map(|row| Session {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    expires_at: row.get("expires_at"),
                    created_at: row.get("created_at"),
                }))
            }
        }
    }

    async fn prune_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let sql = "DELETE FROM sessions WHERE expires_at <= ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(now)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await?
                    .rows_affected()
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(now)
                    .execute(self.pool.as_mysql().unwrap())
                    .await?
                    .rows_affected()
            }
        };
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations, DatabasePool};

    async fn setup() -> SqlxSessionRepository {
        let pool = create_test_pool().await.expect("test pool");
        migrations::run_migrations(&pool).await.expect("migrations");
        pool.execute("INSERT INTO users (username, email) VALUES ('alice', 'alice@example.com')")
            .await
            .expect("seed user");
        SqlxSessionRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_validate() {
        let repo = setup().await;
        let session = repo.create(1, Duration::hours(1)).await.unwrap();

        let found = repo.find_valid(&session.id, Utc::now()).await.unwrap();
        assert_eq!(found.unwrap().user_id, 1);

        let unknown = repo.find_valid("nope", Utc::now()).await.unwrap();
        assert!(unknown.is_none());
    }

    #[tokio::test]
    async fn test_expired_sessions_rejected_and_pruned() {
        let repo = setup().await;
        let session = repo.create(1, Duration::hours(1)).await.unwrap();

        let later = Utc::now() + Duration::hours(2);
        assert!(repo.find_valid(&session.id, later).await.unwrap().is_none());

        let removed = repo.prune_expired(later).await.unwrap();
        assert_eq!(removed, 1);
    }
}
