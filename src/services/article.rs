//! Article actions
//!
//! Create, fork, delete, publish-toggle and cache-flush operations. Each is
//! a thin orchestration over the gist host and the article store: the gist
//! is the body of record, the store holds the metadata.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::config::GithubConfig;
use crate::db::repositories::{ArticleRepository, UserRepository};
use crate::gist::{GistHost, GistManifest, NewGist};
use crate::models::{Article, ArticleKind, CreateArticleInput, IdentityProvider, User};
use crate::render::Templates;

/// Error types for article actions
#[derive(Debug, thiserror::Error)]
pub enum ArticleServiceError {
    /// The user has no usable gist-host credential
    #[error("No linked gist-host account")]
    NotLinked,

    /// Article not found
    #[error("Article not found: {0}")]
    NotFound(i64),

    /// Article exists but belongs to someone else
    #[error("Article {0} is not owned by the current user")]
    NotOwned(i64),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// The gist is already mapped to a local article
    #[error("An article for gist {0} already exists")]
    Duplicate(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Form input for creating an article
#[derive(Debug, Clone)]
pub struct NewArticleForm {
    /// Article title
    pub title: String,
    /// Short summary
    pub summary: String,
    /// Post or guide
    pub kind: ArticleKind,
}

/// Article action service
pub struct ArticleService {
    articles: Arc<dyn ArticleRepository>,
    users: Arc<dyn UserRepository>,
    host: Arc<dyn GistHost>,
    templates: Arc<Templates>,
    github: GithubConfig,
    site_name: String,
}

impl ArticleService {
    /// Create an article service
    pub fn new(
        articles: Arc<dyn ArticleRepository>,
        users: Arc<dyn UserRepository>,
        host: Arc<dyn GistHost>,
        templates: Arc<Templates>,
        github: GithubConfig,
        site_name: String,
    ) -> Self {
        Self {
            articles,
            users,
            host,
            templates,
            github,
            site_name,
        }
    }

    /// The caller's gist-host access token, if an account is linked.
    pub async fn gist_credential(
        &self,
        user: &User,
    ) -> Result<Option<(String, String)>, ArticleServiceError> {
        let identity = self
            .users
            .identity(user.id, IdentityProvider::Github)
            .await?;
        Ok(identity.and_then(|identity| {
            identity
                .access_token
                .map(|token| (identity.remote_uid, token))
        }))
    }

    /// Create a new article: push a stub gist to the user's account, then
    /// record it locally as an unpublished draft.
    pub async fn create(
        &self,
        user: &User,
        form: &NewArticleForm,
    ) -> Result<Article, ArticleServiceError> {
        let title = form.title.trim();
        if title.is_empty() {
            return Err(ArticleServiceError::Validation(
                "Title must not be empty".to_string(),
            ));
        }
        let summary = form.summary.trim();

        let (remote_uid, token) = self
            .gist_credential(user)
            .await?
            .ok_or(ArticleServiceError::NotLinked)?;

        let published = Utc::now();
        let manifest = GistManifest {
            username: Some(remote_uid.clone()),
            title: title.to_string(),
            summary: summary.to_string(),
            kind: form.kind.as_str().to_string(),
            published: published.timestamp(),
        };
        let manifest_json = serde_json::to_string_pretty(&manifest)
            .map_err(|e| ArticleServiceError::Internal(e.into()))?;

        let mut context = tera::Context::new();
        context.insert("title", title);
        context.insert("summary", summary);
        context.insert("username", &remote_uid);
        let stub = self.templates.render("gist/article_stub.md", &context)?;

        let gist_id = self
            .host
            .create_doc(
                &token,
                &NewGist {
                    description: format!("{} for {}", title, self.site_name),
                    public: true,
                    files: vec![
                        (self.github.manifest_file.clone(), manifest_json),
                        (self.github.markdown_file.clone(), stub),
                    ],
                },
            )
            .await?;

        // Unlikely, but the gist may already be mapped locally
        if self
            .articles
            .get_by_owner_and_gist(user.id, &gist_id)
            .await?
            .is_some()
        {
            return Err(ArticleServiceError::Duplicate(gist_id));
        }

        let slug = unique_slug(self.articles.as_ref(), user.id, title, &gist_id).await?;
        let article = self
            .articles
            .create(&CreateArticleInput {
                owner_id: user.id,
                gist_id,
                title: title.to_string(),
                summary: summary.to_string(),
                slug,
                kind: form.kind,
                public: true,
                draft: true,
                created_at: published,
            })
            .await?;

        Ok(article)
    }

    /// Fork another user's article into the caller's account.
    ///
    /// Returns `None` when the source article is unknown or the fork yields
    /// no readable manifest; neither case writes anything.
    pub async fn fork(
        &self,
        user: &User,
        article_id: i64,
    ) -> Result<Option<Article>, ArticleServiceError> {
        let (_, token) = self
            .gist_credential(user)
            .await?
            .ok_or(ArticleServiceError::NotLinked)?;

        let Some(source) = self.articles.get_by_id(article_id).await? else {
            warn!(article_id, "Fork requested for unknown article");
            return Ok(None);
        };

        let Some(doc) = self.host.fork_doc(&token, &source.gist_id).await? else {
            warn!(gist_id = %source.gist_id, "Fork produced no readable manifest");
            return Ok(None);
        };

        if self
            .articles
            .get_by_owner_and_gist(user.id, &doc.gist_id)
            .await?
            .is_some()
        {
            return Err(ArticleServiceError::Duplicate(doc.gist_id));
        }

        let slug = unique_slug(self.articles.as_ref(), user.id, &doc.title, &doc.gist_id).await?;
        let article = self
            .articles
            .create(&CreateArticleInput {
                owner_id: user.id,
                gist_id: doc.gist_id.clone(),
                title: doc.title.clone(),
                summary: doc.summary.clone(),
                slug,
                kind: doc.kind,
                public: true,
                draft: true,
                created_at: doc.published,
            })
            .await?;

        Ok(Some(article))
    }

    /// Delete an owned article locally and on the gist host.
    pub async fn delete(&self, user: &User, article_id: i64) -> Result<(), ArticleServiceError> {
        let article = self.owned_article(user, article_id).await?;

        self.articles.delete(article.id).await?;

        // Local deletion wins; a failed remote delete only leaves an
        // orphaned gist behind.
        match self.gist_credential(user).await? {
            Some((_, token)) => {
                if let Err(e) = self.host.delete_doc(&token, &article.gist_id).await {
                    warn!(gist_id = %article.gist_id, error = %e, "Remote gist deletion failed");
                }
            }
            None => {
                warn!(gist_id = %article.gist_id, "No credential, remote gist not deleted");
            }
        }

        if let Err(e) = self.host.flush_content(&article.gist_id).await {
            warn!(gist_id = %article.gist_id, error = %e, "Cache flush failed");
        }

        Ok(())
    }

    /// Toggle the draft flag of an owned article.
    pub async fn set_draft(
        &self,
        user: &User,
        article_id: i64,
        draft: bool,
    ) -> Result<(), ArticleServiceError> {
        let article = self.owned_article(user, article_id).await?;
        self.articles.set_draft(article.id, draft).await?;
        Ok(())
    }

    /// Drop the cached body of an owned article.
    pub async fn flush_cache(
        &self,
        user: &User,
        article_id: i64,
    ) -> Result<(), ArticleServiceError> {
        let article = self.owned_article(user, article_id).await?;
        self.host.flush_content(&article.gist_id).await?;
        Ok(())
    }

    async fn owned_article(
        &self,
        user: &User,
        article_id: i64,
    ) -> Result<Article, ArticleServiceError> {
        let article = self
            .articles
            .get_by_id(article_id)
            .await?
            .ok_or(ArticleServiceError::NotFound(article_id))?;
        if article.owner_id != user.id {
            return Err(ArticleServiceError::NotOwned(article_id));
        }
        Ok(article)
    }
}

/// Generate a URL-friendly slug from a title.
///
/// Lowercases, maps runs of separators and ASCII punctuation to single
/// hyphens, and keeps non-ASCII characters as-is.
pub fn generate_slug(title: &str) -> String {
    let mapped: String = title
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || !c.is_ascii() {
                c
            } else {
                '-'
            }
        })
        .collect();

    let mut slug = String::new();
    let mut prev_hyphen = false;
    for c in mapped.chars() {
        if c == '-' {
            if !prev_hyphen && !slug.is_empty() {
                slug.push(c);
                prev_hyphen = true;
            }
        } else {
            slug.push(c);
            prev_hyphen = false;
        }
    }

    slug.trim_end_matches('-').to_string()
}

/// Derive a slug that is free for this owner, suffixing with a gist id
/// fragment when the plain slug is taken or empty.
pub async fn unique_slug(
    articles: &dyn ArticleRepository,
    owner_id: i64,
    title: &str,
    gist_id: &str,
) -> anyhow::Result<String> {
    let fragment: String = gist_id.chars().take(6).collect();
    let base = generate_slug(title);
    if base.is_empty() {
        return Ok(format!("article-{}", fragment));
    }

    if articles
        .get_by_owner_and_slug(owner_id, &base)
        .await?
        .is_none()
    {
        return Ok(base);
    }
    Ok(format!("{}-{}", base, fragment))
}
