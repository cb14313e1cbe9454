//! View assembly
//!
//! Joins article metadata from the store with body content from the gist
//! host and produces display-ready entries for the listing, feed, detail and
//! profile pages. Pure projection: the only side effect is the gist cache
//! being populated by fetches.

use std::sync::Arc;

use tracing::warn;

use crate::db::repositories::UserRepository;
use crate::gist::GistHost;
use crate::models::{Article, ArticleKind};
use crate::services::markdown::MarkdownRenderer;
use crate::services::sanitize::Sanitizer;

/// What to do with an article whose body cannot be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingContent {
    /// Omit the article from the result set (default)
    #[default]
    Skip,
    /// Include the article with placeholder body text
    Placeholder,
    /// Fail the whole assembly
    Error,
}

/// Which visibility rule a listing applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFilter {
    /// Public blog listing: public, published posts only
    PublicPosts,
    /// Public guide listing: public, published guides only
    PublicGuides,
    /// RSS feed: everything published, public flag ignored
    Feed,
    /// Profile page: everything published, all kinds
    Profile,
}

impl EntryFilter {
    fn matches(&self, article: &Article) -> bool {
        match self {
            EntryFilter::PublicPosts => {
                article.public && !article.draft && article.kind == ArticleKind::Post
            }
            EntryFilter::PublicGuides => {
                article.public && !article.draft && article.kind == ArticleKind::Guide
            }
            EntryFilter::Feed | EntryFilter::Profile => !article.draft,
        }
    }
}

/// Display-ready projection of an article. Never persisted.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ViewEntry {
    /// Article id
    pub article_id: i64,
    /// Sanitized title
    pub title: String,
    /// Sanitized summary
    pub summary: String,
    /// Rendered, sanitized body HTML
    pub html: String,
    /// Post / guide / unknown bucket
    pub kind: ArticleKind,
    /// URL slug
    pub slug: String,
    /// Owner's username
    pub owner_username: String,
    /// Owner's email (feed author field)
    pub owner_email: String,
    /// Creation timestamp
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Last update timestamp
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Assembly errors
#[derive(Debug, thiserror::Error)]
pub enum AssemblerError {
    /// Body unavailable under the `Error` policy
    #[error("Article body unavailable for gist {0}")]
    MissingBody(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Body text substituted under the `Placeholder` policy
const PLACEHOLDER_HTML: &str = "<p><em>This article is temporarily unavailable.</em></p>";

/// Builds `ViewEntry` lists from article records
pub struct EntryAssembler {
    host: Arc<dyn GistHost>,
    users: Arc<dyn UserRepository>,
    markdown: MarkdownRenderer,
    sanitizer: Sanitizer,
    policy: MissingContent,
}

impl EntryAssembler {
    /// Create an assembler with the default `Skip` policy
    pub fn new(host: Arc<dyn GistHost>, users: Arc<dyn UserRepository>) -> Self {
        Self {
            host,
            users,
            markdown: MarkdownRenderer::new(),
            sanitizer: Sanitizer::new(),
            policy: MissingContent::default(),
        }
    }

    /// Override the missing-content policy
    pub fn with_policy(mut self, policy: MissingContent) -> Self {
        self.policy = policy;
        self
    }

    /// Assemble entries for the given articles, preserving input order.
    ///
    /// Articles failing the filter are omitted before any remote fetch.
    /// Articles whose body cannot be fetched are handled per the configured
    /// policy.
    pub async fn assemble(
        &self,
        articles: &[Article],
        filter: EntryFilter,
    ) -> Result<Vec<ViewEntry>, AssemblerError> {
        let visible: Vec<&Article> = articles.iter().filter(|a| filter.matches(a)).collect();
        self.project(&visible).await
    }

    /// Assemble a single article's entry (detail page). Visibility is the
    /// caller's concern here; draft preview links must still render.
    pub async fn assemble_one(
        &self,
        article: &Article,
    ) -> Result<Option<ViewEntry>, AssemblerError> {
        let mut entries = self.project(&[article]).await?;
        Ok(entries.pop())
    }

    async fn project(&self, articles: &[&Article]) -> Result<Vec<ViewEntry>, AssemblerError> {
        let mut entries = Vec::new();

        for article in articles {
            let body = match self.host.content(&article.gist_id).await {
                Ok(Some(body)) if !body.is_empty() => Some(body),
                Ok(_) => None,
                Err(e) => {
                    warn!(gist_id = %article.gist_id, error = %e, "Body fetch failed");
                    None
                }
            };

            let html = match (body, self.policy) {
                (Some(body), _) => self.sanitizer.clean_html(&self.markdown.render(&body)),
                (None, MissingContent::Skip) => continue,
                (None, MissingContent::Placeholder) => PLACEHOLDER_HTML.to_string(),
                (None, MissingContent::Error) => {
                    return Err(AssemblerError::MissingBody(article.gist_id.clone()))
                }
            };

            let Some(owner) = self.users.get_by_id(article.owner_id).await? else {
                warn!(article_id = article.id, "Article owner missing, skipping");
                continue;
            };

            entries.push(ViewEntry {
                article_id: article.id,
                title: self.sanitizer.strip(&article.title),
                summary: self.sanitizer.strip(&article.summary),
                html,
                kind: article.kind,
                slug: article.slug.clone(),
                owner_username: owner.username,
                owner_email: owner.email,
                created_at: article.created_at,
                updated_at: article.updated_at,
            });
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxUserRepository;
    use crate::db::{create_test_pool, migrations, DatabasePool};
    use crate::gist::testing::FakeGistHost;
    use chrono::{TimeZone, Utc};

    async fn setup() -> (Arc<FakeGistHost>, EntryAssembler) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        pool.execute("INSERT INTO users (username, email) VALUES ('alice', 'alice@example.com')")
            .await
            .unwrap();

        let host = Arc::new(FakeGistHost::new());
        let users = SqlxUserRepository::shared(pool);
        let assembler = EntryAssembler::new(host.clone(), users);
        (host, assembler)
    }

    fn article(id: i64, gist_id: &str, kind: ArticleKind, public: bool, draft: bool) -> Article {
        let created = Utc.timestamp_opt(1_500_000_000 + id, 0).unwrap();
        Article {
            id,
            owner_id: 1,
            gist_id: gist_id.to_string(),
            title: format!("Title {}", id),
            summary: "Summary".to_string(),
            slug: format!("title-{}", id),
            kind,
            public,
            draft,
            created_at: created,
            updated_at: created,
        }
    }

    #[tokio::test]
    async fn test_public_posts_filter() {
        let (host, assembler) = setup().await;
        for gist in ["g1", "g2", "g3", "g4", "g5"] {
            host.insert_body(gist, "body");
        }

        let articles = vec![
            article(1, "g1", ArticleKind::Post, true, false),
            article(2, "g2", ArticleKind::Post, false, false), // not public
            article(3, "g3", ArticleKind::Post, true, true),   // draft
            article(4, "g4", ArticleKind::Guide, true, false), // wrong kind
            article(5, "g5", ArticleKind::Unknown, true, false), // unknown kind
        ];

        let entries = assembler
            .assemble(&articles, EntryFilter::PublicPosts)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].article_id, 1);
    }

    #[tokio::test]
    async fn test_unknown_kind_excluded_from_guides_but_on_profile() {
        let (host, assembler) = setup().await;
        host.insert_body("g1", "body");
        let articles = vec![article(1, "g1", ArticleKind::Unknown, true, false)];

        let guides = assembler
            .assemble(&articles, EntryFilter::PublicGuides)
            .await
            .unwrap();
        assert!(guides.is_empty());

        let profile = assembler
            .assemble(&articles, EntryFilter::Profile)
            .await
            .unwrap();
        assert_eq!(profile.len(), 1);
        assert_eq!(profile[0].kind, ArticleKind::Unknown);
    }

    #[tokio::test]
    async fn test_feed_ignores_public_flag_but_not_draft() {
        let (host, assembler) = setup().await;
        host.insert_body("g1", "body");
        host.insert_body("g2", "body");

        let articles = vec![
            article(1, "g1", ArticleKind::Post, false, false),
            article(2, "g2", ArticleKind::Post, true, true),
        ];

        let entries = assembler.assemble(&articles, EntryFilter::Feed).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].article_id, 1);
    }

    #[tokio::test]
    async fn test_missing_body_skipped_silently() {
        let (host, assembler) = setup().await;
        host.insert_body("g1", "body");
        // g2 has no body at all; g3 errors outright
        host.fail_content_for("g3");

        let articles = vec![
            article(1, "g1", ArticleKind::Post, true, false),
            article(2, "g2", ArticleKind::Post, true, false),
            article(3, "g3", ArticleKind::Post, true, false),
        ];

        let entries = assembler
            .assemble(&articles, EntryFilter::PublicPosts)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].article_id, 1);
    }

    #[tokio::test]
    async fn test_placeholder_policy_substitutes_body() {
        let (_host, assembler) = setup().await;
        let assembler = assembler.with_policy(MissingContent::Placeholder);

        let articles = vec![article(1, "gone", ArticleKind::Post, true, false)];
        let entries = assembler
            .assemble(&articles, EntryFilter::PublicPosts)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].html.contains("temporarily unavailable"));
    }

    #[tokio::test]
    async fn test_error_policy_propagates() {
        let (_host, assembler) = setup().await;
        let assembler = assembler.with_policy(MissingContent::Error);

        let articles = vec![article(1, "gone", ArticleKind::Post, true, false)];
        let result = assembler.assemble(&articles, EntryFilter::PublicPosts).await;
        assert!(matches!(result, Err(AssemblerError::MissingBody(_))));
    }

    #[tokio::test]
    async fn test_order_matches_input_and_content_is_sanitized() {
        let (host, assembler) = setup().await;
        host.insert_body("g1", "# One\n<script>alert(1)</script>");
        host.insert_body("g2", "# Two");

        let mut first = article(1, "g1", ArticleKind::Post, true, false);
        first.title = "<b>Bold</b> title".to_string();
        let articles = vec![first, article(2, "g2", ArticleKind::Post, true, false)];

        let entries = assembler
            .assemble(&articles, EntryFilter::PublicPosts)
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].article_id, 1);
        assert_eq!(entries[1].article_id, 2);
        assert!(entries[0].html.contains("<h1>"));
        assert!(!entries[0].html.contains("script"));
        assert_eq!(entries[0].title, "Bold title");
    }

    #[tokio::test]
    async fn test_assemble_one_renders_drafts() {
        let (host, assembler) = setup().await;
        host.insert_body("g1", "body");
        let draft = article(1, "g1", ArticleKind::Post, false, true);

        let entry = assembler.assemble_one(&draft).await.unwrap();
        assert!(entry.is_some());
    }
}
