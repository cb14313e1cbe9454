//! Article refresh job
//!
//! Reconciles one user's local article records against the full set of
//! article gists on the remote host. Existing records (matched on owner and
//! gist id) are overwritten in place; unknown gists become new draft
//! records. Each record is persisted individually; a failure partway leaves
//! earlier writes intact. Deletion is never performed here.

use std::sync::Arc;

use tracing::{info, warn};

use crate::db::repositories::{ArticleRepository, UserRepository};
use crate::gist::{GistDoc, GistHost};
use crate::models::{CreateArticleInput, IdentityProvider, SyncArticleUpdate};
use crate::push::{PushBroker, RELOAD};
use crate::services::article::unique_slug;

/// Refresh job errors
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The user does not exist
    #[error("Unknown user: {0}")]
    UnknownUser(i64),

    /// The user has no usable gist-host credential
    #[error("User {0} has no linked gist-host account")]
    MissingIdentity(i64),

    /// The remote listing failed; nothing was written
    #[error("Gist host unreachable: {0}")]
    Remote(#[source] anyhow::Error),

    /// Internal error before any per-item work started
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Counts reported by a finished (or partially finished) run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Articles newly inserted
    pub created: usize,
    /// Articles overwritten in place
    pub updated: usize,
    /// Remote items left unprocessed after a mid-run failure
    pub skipped: usize,
}

/// Reconciles local article metadata with the remote gist set
pub struct SyncService {
    host: Arc<dyn GistHost>,
    articles: Arc<dyn ArticleRepository>,
    users: Arc<dyn UserRepository>,
    push: PushBroker,
}

impl SyncService {
    /// Create a sync service
    pub fn new(
        host: Arc<dyn GistHost>,
        articles: Arc<dyn ArticleRepository>,
        users: Arc<dyn UserRepository>,
        push: PushBroker,
    ) -> Self {
        Self {
            host,
            articles,
            users,
            push,
        }
    }

    /// Refresh one user's articles, then signal `channel` to reload.
    ///
    /// A listing failure aborts the run before any writes and no signal is
    /// sent. A failure on an individual record stops processing but keeps
    /// earlier writes, and the reload signal is still sent; the browser is
    /// not told the difference.
    pub async fn refresh(&self, user_id: i64, channel: &str) -> Result<SyncOutcome, SyncError> {
        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(SyncError::UnknownUser(user_id))?;

        let identity = self
            .users
            .identity(user.id, IdentityProvider::Github)
            .await?
            .ok_or(SyncError::MissingIdentity(user.id))?;
        let token = identity
            .access_token
            .as_deref()
            .ok_or(SyncError::MissingIdentity(user.id))?;

        let docs = self
            .host
            .list_docs(&identity.remote_uid, token)
            .await
            .map_err(SyncError::Remote)?;

        let total = docs.len();
        let mut outcome = SyncOutcome::default();

        for (index, doc) in docs.iter().enumerate() {
            match self.reconcile(user.id, doc).await {
                Ok(created) => {
                    if created {
                        outcome.created += 1;
                    } else {
                        outcome.updated += 1;
                    }
                }
                Err(e) => {
                    warn!(
                        user_id = user.id,
                        gist_id = %doc.gist_id,
                        error = %e,
                        "Refresh stopped mid-run, earlier updates kept"
                    );
                    outcome.skipped = total - index;
                    break;
                }
            }

            // The body may have changed remotely; drop any cached copy.
            if let Err(e) = self.host.flush_content(&doc.gist_id).await {
                warn!(gist_id = %doc.gist_id, error = %e, "Cache flush failed");
            }
        }

        info!(
            user_id = user.id,
            created = outcome.created,
            updated = outcome.updated,
            skipped = outcome.skipped,
            "Article refresh finished"
        );

        self.push.send(channel, RELOAD);
        Ok(outcome)
    }

    /// Update-or-insert a single remote doc. Returns true when a new record
    /// was created.
    async fn reconcile(&self, owner_id: i64, doc: &GistDoc) -> anyhow::Result<bool> {
        match self
            .articles
            .get_by_owner_and_gist(owner_id, &doc.gist_id)
            .await?
        {
            Some(existing) => {
                self.articles
                    .apply_sync_update(
                        existing.id,
                        &SyncArticleUpdate {
                            title: doc.title.clone(),
                            summary: doc.summary.clone(),
                            gist_id: doc.gist_id.clone(),
                            kind: doc.kind,
                            updated_at: doc.published,
                        },
                    )
                    .await?;
                Ok(false)
            }
            None => {
                let slug =
                    unique_slug(self.articles.as_ref(), owner_id, &doc.title, &doc.gist_id).await?;
                // Newly discovered articles stay hidden until the owner
                // explicitly publishes them.
                self.articles
                    .create(&CreateArticleInput {
                        owner_id,
                        gist_id: doc.gist_id.clone(),
                        title: doc.title.clone(),
                        summary: doc.summary.clone(),
                        slug,
                        kind: doc.kind,
                        public: false,
                        draft: true,
                        created_at: doc.published,
                    })
                    .await?;
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxArticleRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations, DatabasePool, DynDatabasePool};
    use crate::gist::testing::FakeGistHost;
    use crate::models::ArticleKind;
    use chrono::{TimeZone, Utc};

    async fn setup() -> (DynDatabasePool, Arc<FakeGistHost>, SyncService) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        pool.execute("INSERT INTO users (username, email) VALUES ('alice', 'alice@example.com')")
            .await
            .unwrap();
        pool.execute(
            "INSERT INTO social_identities (user_id, provider, remote_uid, access_token) \
             VALUES (1, 'github', 'alice-gh', 'tok')",
        )
        .await
        .unwrap();

        let host = Arc::new(FakeGistHost::new());
        let service = SyncService::new(
            host.clone(),
            SqlxArticleRepository::shared(pool.clone()),
            SqlxUserRepository::shared(pool.clone()),
            PushBroker::new(),
        );
        (pool, host, service)
    }

    fn doc(gist_id: &str, title: &str, kind: ArticleKind, published: i64) -> GistDoc {
        GistDoc {
            gist_id: gist_id.to_string(),
            title: title.to_string(),
            summary: format!("{} summary", title),
            kind,
            published: Utc.timestamp_opt(published, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_refresh_creates_new_draft_articles() {
        let (pool, host, service) = setup().await;
        host.set_docs(vec![
            doc("g1", "First Post", ArticleKind::Post, 1_500_000_000),
            doc("g2", "A Guide", ArticleKind::Guide, 1_500_000_100),
        ]);

        let outcome = service.refresh(1, "chan").await.unwrap();
        assert_eq!(outcome.created, 2);
        assert_eq!(outcome.updated, 0);

        let repo = SqlxArticleRepository::new(pool);
        let created = repo.get_by_owner_and_gist(1, "g1").await.unwrap().unwrap();
        assert_eq!(created.title, "First Post");
        assert_eq!(created.slug, "first-post");
        assert!(created.draft);
        assert!(!created.public);
    }

    #[tokio::test]
    async fn test_refresh_updates_existing_by_reconciliation_key() {
        let (pool, host, service) = setup().await;
        let repo = SqlxArticleRepository::new(pool.clone());
        repo.create(&CreateArticleInput {
            owner_id: 1,
            gist_id: "g1".to_string(),
            title: "Old Title".to_string(),
            summary: "old".to_string(),
            slug: "old-title".to_string(),
            kind: ArticleKind::Post,
            public: true,
            draft: false,
            created_at: Utc.timestamp_opt(1_400_000_000, 0).unwrap(),
        })
        .await
        .unwrap();

        host.set_docs(vec![doc("g1", "New Title", ArticleKind::Guide, 1_600_000_000)]);

        let outcome = service.refresh(1, "chan").await.unwrap();
        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.created, 0);

        let updated = repo.get_by_owner_and_gist(1, "g1").await.unwrap().unwrap();
        assert_eq!(updated.title, "New Title");
        assert_eq!(updated.kind, ArticleKind::Guide);
        // Visibility and slug survive the overwrite
        assert!(updated.public);
        assert!(!updated.draft);
        assert_eq!(updated.slug, "old-title");
    }

    #[tokio::test]
    async fn test_refresh_never_deletes_articles_outside_remote_set() {
        let (pool, host, service) = setup().await;
        let repo = SqlxArticleRepository::new(pool.clone());
        repo.create(&CreateArticleInput {
            owner_id: 1,
            gist_id: "local-only".to_string(),
            title: "Local Only".to_string(),
            summary: String::new(),
            slug: "local-only".to_string(),
            kind: ArticleKind::Post,
            public: true,
            draft: false,
            created_at: Utc.timestamp_opt(1_400_000_000, 0).unwrap(),
        })
        .await
        .unwrap();

        host.set_docs(vec![doc("g1", "Remote", ArticleKind::Post, 1_600_000_000)]);
        service.refresh(1, "chan").await.unwrap();

        assert!(repo
            .get_by_owner_and_gist(1, "local-only")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_refresh_flushes_cache_per_item_and_signals_reload() {
        let (_pool, host, service) = setup().await;
        host.set_docs(vec![doc("g1", "One", ArticleKind::Post, 1_500_000_000)]);

        let mut rx = service.push.subscribe();
        service.refresh(1, "chan-42").await.unwrap();

        assert_eq!(*host.flushed.lock().unwrap(), vec!["g1".to_string()]);
        let message = rx.recv().await.unwrap();
        assert_eq!(message.channel, "chan-42");
        assert_eq!(message.payload, "reload");
    }

    #[tokio::test]
    async fn test_listing_failure_writes_nothing_and_sends_no_signal() {
        let (pool, host, service) = setup().await;
        *host.fail_listing.lock().unwrap() = true;

        let mut rx = service.push.subscribe();
        let result = service.refresh(1, "chan").await;
        assert!(matches!(result, Err(SyncError::Remote(_))));

        let repo = SqlxArticleRepository::new(pool);
        assert!(repo.list_by_owner(1).await.unwrap().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_missing_identity_is_an_error() {
        let (pool, _host, service) = setup().await;
        pool.execute("DELETE FROM social_identities").await.unwrap();

        let result = service.refresh(1, "chan").await;
        assert!(matches!(result, Err(SyncError::MissingIdentity(1))));
    }

    /// Repository wrapper whose writes start failing after a set number of
    /// successful creates, simulating the store dying mid-batch.
    struct FlakyArticleRepository {
        inner: SqlxArticleRepository,
        successes_allowed: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ArticleRepository for FlakyArticleRepository {
        async fn create(&self, input: &CreateArticleInput) -> anyhow::Result<crate::models::Article> {
            use std::sync::atomic::Ordering;
            if self.successes_allowed.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                n.checked_sub(1)
            }).is_err() {
                anyhow::bail!("store unavailable");
            }
            self.inner.create(input).await
        }

        async fn get_by_id(&self, id: i64) -> anyhow::Result<Option<crate::models::Article>> {
            self.inner.get_by_id(id).await
        }

        async fn get_by_owner_and_slug(
            &self,
            owner_id: i64,
            slug: &str,
        ) -> anyhow::Result<Option<crate::models::Article>> {
            self.inner.get_by_owner_and_slug(owner_id, slug).await
        }

        async fn get_by_owner_and_gist(
            &self,
            owner_id: i64,
            gist_id: &str,
        ) -> anyhow::Result<Option<crate::models::Article>> {
            self.inner.get_by_owner_and_gist(owner_id, gist_id).await
        }

        async fn list_all(&self) -> anyhow::Result<Vec<crate::models::Article>> {
            self.inner.list_all().await
        }

        async fn list_by_owner(&self, owner_id: i64) -> anyhow::Result<Vec<crate::models::Article>> {
            self.inner.list_by_owner(owner_id).await
        }

        async fn apply_sync_update(&self, id: i64, update: &SyncArticleUpdate) -> anyhow::Result<()> {
            self.inner.apply_sync_update(id, update).await
        }

        async fn set_draft(&self, id: i64, draft: bool) -> anyhow::Result<bool> {
            self.inner.set_draft(id, draft).await
        }

        async fn delete(&self, id: i64) -> anyhow::Result<bool> {
            self.inner.delete(id).await
        }
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_earlier_writes_and_still_signals() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        pool.execute("INSERT INTO users (username, email) VALUES ('alice', 'alice@example.com')")
            .await
            .unwrap();
        pool.execute(
            "INSERT INTO social_identities (user_id, provider, remote_uid, access_token) \
             VALUES (1, 'github', 'alice-gh', 'tok')",
        )
        .await
        .unwrap();

        let host = Arc::new(FakeGistHost::new());
        host.set_docs(vec![
            doc("g1", "One", ArticleKind::Post, 1_500_000_000),
            doc("g2", "Two", ArticleKind::Post, 1_500_000_001),
            doc("g3", "Three", ArticleKind::Post, 1_500_000_002),
        ]);

        // Allow exactly two creates before the store starts failing
        let flaky = Arc::new(FlakyArticleRepository {
            inner: SqlxArticleRepository::new(pool.clone()),
            successes_allowed: std::sync::atomic::AtomicUsize::new(2),
        });

        let service = SyncService::new(
            host,
            flaky,
            SqlxUserRepository::shared(pool.clone()),
            PushBroker::new(),
        );

        let mut rx = service.push.subscribe();
        let outcome = service.refresh(1, "chan").await.unwrap();
        assert_eq!(outcome.created, 2);
        assert_eq!(outcome.skipped, 1);

        // Exactly the first two records exist, untouched by the failure
        let repo = SqlxArticleRepository::new(pool);
        let articles = repo.list_by_owner(1).await.unwrap();
        assert_eq!(articles.len(), 2);
        assert!(repo.get_by_owner_and_gist(1, "g3").await.unwrap().is_none());

        // Partial success still tells the browser to reload
        assert_eq!(rx.recv().await.unwrap().payload, "reload");
    }
}
