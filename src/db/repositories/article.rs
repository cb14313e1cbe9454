//! Article repository
//!
//! Database operations for article metadata. Bodies live on the gist host
//! and are never stored here.
//!
//! This module provides:
//! - `ArticleRepository` trait defining the data access interface
//! - `SqlxArticleRepository` implementing it for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Article, ArticleKind, CreateArticleInput, SyncArticleUpdate};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Article repository trait
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Create a new article record
    async fn create(&self, input: &CreateArticleInput) -> Result<Article>;

    /// Get article by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Article>>;

    /// Get article by owner and slug (the URL key)
    async fn get_by_owner_and_slug(&self, owner_id: i64, slug: &str) -> Result<Option<Article>>;

    /// Get article by owner and gist id (the sync reconciliation key)
    async fn get_by_owner_and_gist(&self, owner_id: i64, gist_id: &str)
        -> Result<Option<Article>>;

    /// List all articles, newest first
    async fn list_all(&self) -> Result<Vec<Article>>;

    /// List one owner's articles, newest first
    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Article>>;

    /// Overwrite the sync-managed fields of an existing article
    async fn apply_sync_update(&self, id: i64, update: &SyncArticleUpdate) -> Result<()>;

    /// Set the draft flag. Returns false when the article does not exist.
    async fn set_draft(&self, id: i64, draft: bool) -> Result<bool>;

    /// Delete an article. Returns false when the article does not exist.
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based article repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxArticleRepository {
    pool: DynDatabasePool,
}

impl SqlxArticleRepository {
    /// Create a new SQLx article repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a shared repository for dependency injection
    pub fn shared(pool: DynDatabasePool) -> Arc<dyn ArticleRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ArticleRepository for SqlxArticleRepository {
    async fn create(&self, input: &CreateArticleInput) -> Result<Article> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_article_sqlite(self.pool.as_sqlite().unwrap(), input).await
            }
            DatabaseDriver::Mysql => {
                create_article_mysql(self.pool.as_mysql().unwrap(), input).await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>> {
        let sql = format!("{} WHERE id = ?", SELECT_ARTICLE);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.as_sqlite().unwrap())
                    .await?;
                row.as_ref().map(article_from_sqlite_row).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.as_mysql().unwrap())
                    .await?;
                row.as_ref().map(article_from_mysql_row).transpose()
            }
        }
    }

    async fn get_by_owner_and_slug(&self, owner_id: i64, slug: &str) -> Result<Option<Article>> {
        let sql = format!("{} WHERE owner_id = ? AND slug = ?", SELECT_ARTICLE);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(owner_id)
                    .bind(slug)
                    .fetch_optional(self.pool.as_sqlite().unwrap())
                    .await?;
                row.as_ref().map(article_from_sqlite_row).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(owner_id)
                    .bind(slug)
                    .fetch_optional(self.pool.as_mysql().unwrap())
                    .await?;
                row.as_ref().map(article_from_mysql_row).transpose()
            }
        }
    }

    async fn get_by_owner_and_gist(
        &self,
        owner_id: i64,
        gist_id: &str,
    ) -> Result<Option<Article>> {
        let sql = format!("{} WHERE owner_id = ? AND gist_id = ?", SELECT_ARTICLE);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(owner_id)
                    .bind(gist_id)
                    .fetch_optional(self.pool.as_sqlite().unwrap())
                    .await?;
                row.as_ref().map(article_from_sqlite_row).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(owner_id)
                    .bind(gist_id)
                    .fetch_optional(self.pool.as_mysql().unwrap())
                    .await?;
                row.as_ref().map(article_from_mysql_row).transpose()
            }
        }
    }

    async fn list_all(&self) -> Result<Vec<Article>> {
        let sql = format!("{} ORDER BY created_at DESC, id DESC", SELECT_ARTICLE);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .fetch_all(self.pool.as_sqlite().unwrap())
                    .await?;
                rows.iter().map(article_from_sqlite_row).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .fetch_all(self.pool.as_mysql().unwrap())
                    .await?;
                rows.iter().map(article_from_mysql_row).collect()
            }
        }
    }

    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Article>> {
        let sql = format!(
            "{} WHERE owner_id = ? ORDER BY created_at DESC, id DESC",
            SELECT_ARTICLE
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(owner_id)
                    .fetch_all(self.pool.as_sqlite().unwrap())
                    .await?;
                rows.iter().map(article_from_sqlite_row).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(owner_id)
                    .fetch_all(self.pool.as_mysql().unwrap())
                    .await?;
                rows.iter().map(article_from_mysql_row).collect()
            }
        }
    }

    async fn apply_sync_update(&self, id: i64, update: &SyncArticleUpdate) -> Result<()> {
        let sql = "UPDATE articles SET title = ?, summary = ?, gist_id = ?, kind = ?, updated_at = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(&update.title)
                    .bind(&update.summary)
                    .bind(&update.gist_id)
                    .bind(update.kind.as_str())
                    .bind(update.updated_at)
                    .bind(id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to apply sync update")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(&update.title)
                    .bind(&update.summary)
                    .bind(&update.gist_id)
                    .bind(update.kind.as_str())
                    .bind(update.updated_at)
                    .bind(id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to apply sync update")?;
            }
        }
        Ok(())
    }

    async fn set_draft(&self, id: i64, draft: bool) -> Result<bool> {
        let sql = "UPDATE articles SET draft = ? WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(draft)
                    .bind(id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await?
                    .rows_affected()
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(draft)
                    .bind(id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await?
                    .rows_affected()
            }
        };
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM articles WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await?
                    .rows_affected()
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await?
                    .rows_affected()
            }
        };
        Ok(affected > 0)
    }
}

const SELECT_ARTICLE: &str = "SELECT id, owner_id, gist_id, title, summary, slug, kind, public, draft, created_at, updated_at FROM articles";

const INSERT_ARTICLE: &str = "INSERT INTO articles (owner_id, gist_id, title, summary, slug, kind, public, draft, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

async fn create_article_sqlite(pool: &SqlitePool, input: &CreateArticleInput) -> Result<Article> {
    let result = sqlx::query(INSERT_ARTICLE)
        .bind(input.owner_id)
        .bind(&input.gist_id)
        .bind(&input.title)
        .bind(&input.summary)
        .bind(&input.slug)
        .bind(input.kind.as_str())
        .bind(input.public)
        .bind(input.draft)
        .bind(input.created_at)
        .bind(input.created_at)
        .execute(pool)
        .await
        .context("Failed to insert article")?;

    let id = result.last_insert_rowid();
    let sql = format!("{} WHERE id = ?", SELECT_ARTICLE);
    let row = sqlx::query(&sql).bind(id).fetch_one(pool).await?;
    article_from_sqlite_row(&row)
}

async fn create_article_mysql(pool: &MySqlPool, input: &CreateArticleInput) -> Result<Article> {
    let result = sqlx::query(INSERT_ARTICLE)
        .bind(input.owner_id)
        .bind(&input.gist_id)
        .bind(&input.title)
        .bind(&input.summary)
        .bind(&input.slug)
        .bind(input.kind.as_str())
        .bind(input.public)
        .bind(input.draft)
        .bind(input.created_at)
        .bind(input.created_at)
        .execute(pool)
        .await
        .context("Failed to insert article")?;

    let id = result.last_insert_id() as i64;
    let sql = format!("{} WHERE id = ?", SELECT_ARTICLE);
    let row = sqlx::query(&sql).bind(id).fetch_one(pool).await?;
    article_from_mysql_row(&row)
}

fn article_from_sqlite_row(row: &sqlx::sqlite::SqliteRow) -> Result<Article> {
    Ok(Article {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        gist_id: row.get("gist_id"),
        title: row.get("title"),
        summary: row.get("summary"),
        slug: row.get("slug"),
        kind: ArticleKind::parse(row.get::<String, _>("kind").as_str()),
        public: row.get("public"),
        draft: row.get("draft"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn article_from_mysql_row(row: &sqlx::mysql::MySqlRow) -> Result<Article> {
    Ok(Article {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        gist_id: row.get("gist_id"),
        title: row.get("title"),
        summary: row.get("summary"),
        slug: row.get("slug"),
        kind: ArticleKind::parse(row.get::<String, _>("kind").as_str()),
        public: row.get("public"),
        draft: row.get("draft"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
