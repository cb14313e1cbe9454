//! Gist host client
//!
//! Article bodies live as gists on the remote host. Every gist managed by
//! this crate contains two files: a JSON manifest describing the article
//! (title, summary, kind, publication date) and the markdown body itself.
//! The manifest is what the refresh job reconciles against.
//!
//! Fetched bodies are cached in the cache layer keyed by gist id; the
//! refresh job and the owner-facing flush endpoint invalidate those entries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::{Cache, CacheLayer};
use crate::config::GithubConfig;
use crate::models::ArticleKind;

/// Request timeout for gist API calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A remote article as described by its gist manifest
#[derive(Debug, Clone, PartialEq)]
pub struct GistDoc {
    /// Gist id on the remote host
    pub gist_id: String,
    /// Article title
    pub title: String,
    /// Article summary
    pub summary: String,
    /// Post / guide bucket
    pub kind: ArticleKind,
    /// Publication timestamp from the manifest
    pub published: DateTime<Utc>,
}

/// Payload for creating a new article gist
#[derive(Debug, Clone)]
pub struct NewGist {
    /// Gist description shown on the remote host
    pub description: String,
    /// Whether the gist itself is public
    pub public: bool,
    /// File name to content
    pub files: Vec<(String, String)>,
}

/// The manifest file stored inside every article gist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GistManifest {
    /// Author's username on the remote host
    #[serde(default)]
    pub username: Option<String>,
    /// Article title
    pub title: String,
    /// Article summary
    #[serde(default)]
    pub summary: String,
    /// Article kind ("post", "guide", ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// Publication time as epoch seconds
    pub published: i64,
}

/// Remote content host operations
#[async_trait]
pub trait GistHost: Send + Sync {
    /// Fetch the markdown body of a gist. Returns `None` when the gist or
    /// its body file is missing or empty. Successful fetches are cached.
    async fn content(&self, gist_id: &str) -> Result<Option<String>>;

    /// Drop the cached body for a gist
    async fn flush_content(&self, gist_id: &str) -> Result<()>;

    /// List all article gists owned by a remote user, parsed from their
    /// manifests. Gists without a manifest are ignored; gists whose
    /// manifest fails to parse are skipped with a warning.
    async fn list_docs(&self, remote_uid: &str, token: &str) -> Result<Vec<GistDoc>>;

    /// Create a new article gist, returning its id
    async fn create_doc(&self, token: &str, gist: &NewGist) -> Result<String>;

    /// Fork a gist into the caller's account. Returns `None` when the fork
    /// succeeded but carries no parseable manifest.
    async fn fork_doc(&self, token: &str, gist_id: &str) -> Result<Option<GistDoc>>;

    /// Delete a gist. A gist that is already gone is not an error.
    async fn delete_doc(&self, token: &str, gist_id: &str) -> Result<()>;
}

/// GitHub Gists API client
pub struct GithubGists {
    client: Client,
    base_url: String,
    manifest_file: String,
    markdown_file: String,
    cache: Arc<Cache>,
    cache_ttl: Duration,
}

/// Gist representation returned by the API
#[derive(Debug, Deserialize)]
struct GistResponse {
    id: String,
    #[serde(default)]
    files: HashMap<String, GistFile>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    #[serde(default)]
    content: Option<String>,
}

impl GithubGists {
    /// Create a new client from configuration.
    pub fn new(config: &GithubConfig, cache: Arc<Cache>, cache_ttl: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("gistpress/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            manifest_file: config.manifest_file.clone(),
            markdown_file: config.markdown_file.clone(),
            cache,
            cache_ttl,
        })
    }

    fn auth_headers(&self, token: &str) -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        if let Ok(value) = format!("Bearer {}", token).parse() {
            headers.insert(header::AUTHORIZATION, value);
        }
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            header::HeaderValue::from_static("2022-11-28"),
        );
        headers
    }

    fn cache_key(gist_id: &str) -> String {
        format!("gist:{}", gist_id)
    }

    /// Fetch a single gist. `None` on 404.
    async fn fetch_gist(&self, gist_id: &str, token: Option<&str>) -> Result<Option<GistResponse>> {
        let url = format!("{}/gists/{}", self.base_url, gist_id);

        let mut request = self.client.get(&url);
        if let Some(token) = token {
            request = request.headers(self.auth_headers(token));
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Gist fetch failed: {}", gist_id))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            anyhow::bail!("Gist API error {} fetching {}", response.status(), gist_id);
        }

        let gist = response
            .json::<GistResponse>()
            .await
            .with_context(|| format!("Invalid gist response for {}", gist_id))?;
        Ok(Some(gist))
    }

    /// Parse a gist's manifest file into a `GistDoc`.
    fn doc_from_gist(&self, gist: &GistResponse) -> Option<GistDoc> {
        let content = gist
            .files
            .get(&self.manifest_file)
            .and_then(|file| file.content.as_deref())?;

        let manifest: GistManifest = match serde_json::from_str(content) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(gist_id = %gist.id, error = %e, "Skipping gist with invalid manifest");
                return None;
            }
        };

        let published = Utc
            .timestamp_opt(manifest.published, 0)
            .single()
            .unwrap_or_else(Utc::now);

        Some(GistDoc {
            gist_id: gist.id.clone(),
            title: manifest.title,
            summary: manifest.summary,
            kind: ArticleKind::parse(&manifest.kind),
            published,
        })
    }
}

#[async_trait]
impl GistHost for GithubGists {
    async fn content(&self, gist_id: &str) -> Result<Option<String>> {
        let key = Self::cache_key(gist_id);
        if let Some(cached) = self.cache.get::<String>(&key).await? {
            return Ok(Some(cached));
        }

        let Some(gist) = self.fetch_gist(gist_id, None).await? else {
            return Ok(None);
        };

        let body = gist
            .files
            .get(&self.markdown_file)
            .and_then(|file| file.content.clone())
            .unwrap_or_default();

        if body.is_empty() {
            return Ok(None);
        }

        self.cache.set(&key, &body, self.cache_ttl).await?;
        Ok(Some(body))
    }

    async fn flush_content(&self, gist_id: &str) -> Result<()> {
        self.cache.delete(&Self::cache_key(gist_id)).await
    }

    async fn list_docs(&self, remote_uid: &str, token: &str) -> Result<Vec<GistDoc>> {
        let url = format!("{}/users/{}/gists", self.base_url, remote_uid);

        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers(token))
            .send()
            .await
            .with_context(|| format!("Gist listing failed for {}", remote_uid))?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Gist API error {} listing gists for {}",
                response.status(),
                remote_uid
            );
        }

        let listing = response
            .json::<Vec<GistResponse>>()
            .await
            .context("Invalid gist listing response")?;

        // The listing omits file contents, so each candidate gist is fetched
        // individually to read its manifest.
        let mut docs = Vec::new();
        for entry in listing {
            if !entry.files.contains_key(&self.manifest_file) {
                continue;
            }
            if let Some(gist) = self.fetch_gist(&entry.id, Some(token)).await? {
                if let Some(doc) = self.doc_from_gist(&gist) {
                    docs.push(doc);
                }
            }
        }

        Ok(docs)
    }

    async fn create_doc(&self, token: &str, gist: &NewGist) -> Result<String> {
        let url = format!("{}/gists", self.base_url);

        let files: serde_json::Map<String, serde_json::Value> = gist
            .files
            .iter()
            .map(|(name, content)| {
                (
                    name.clone(),
                    serde_json::json!({ "content": content }),
                )
            })
            .collect();

        let body = serde_json::json!({
            "description": gist.description,
            "public": gist.public,
            "files": files,
        });

        let response = self
            .client
            .post(&url)
            .headers(self.auth_headers(token))
            .json(&body)
            .send()
            .await
            .context("Gist creation failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Gist API error {} creating gist", response.status());
        }

        let created = response
            .json::<GistResponse>()
            .await
            .context("Invalid gist creation response")?;
        Ok(created.id)
    }

    async fn fork_doc(&self, token: &str, gist_id: &str) -> Result<Option<GistDoc>> {
        let url = format!("{}/gists/{}/forks", self.base_url, gist_id);

        let response = self
            .client
            .post(&url)
            .headers(self.auth_headers(token))
            .send()
            .await
            .with_context(|| format!("Gist fork failed: {}", gist_id))?;

        if !response.status().is_success() {
            anyhow::bail!("Gist API error {} forking {}", response.status(), gist_id);
        }

        let fork = response
            .json::<GistResponse>()
            .await
            .context("Invalid gist fork response")?;

        // The fork response is shallow; re-fetch for file contents.
        let Some(gist) = self.fetch_gist(&fork.id, Some(token)).await? else {
            return Ok(None);
        };
        Ok(self.doc_from_gist(&gist))
    }

    async fn delete_doc(&self, token: &str, gist_id: &str) -> Result<()> {
        let url = format!("{}/gists/{}", self.base_url, gist_id);

        let response = self
            .client
            .delete(&url)
            .headers(self.auth_headers(token))
            .send()
            .await
            .with_context(|| format!("Gist deletion failed: {}", gist_id))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        if !response.status().is_success() {
            anyhow::bail!("Gist API error {} deleting {}", response.status(), gist_id);
        }

        Ok(())
    }
}

/// In-memory gist host for service tests
#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Configurable fake implementing `GistHost` entirely in memory.
    #[derive(Default)]
    pub struct FakeGistHost {
        /// Body per gist id
        pub bodies: Mutex<HashMap<String, String>>,
        /// Docs returned by `list_docs`
        pub docs: Mutex<Vec<GistDoc>>,
        /// Gist ids whose body fetch fails
        pub failing_content: Mutex<HashSet<String>>,
        /// Fail `list_docs` entirely
        pub fail_listing: Mutex<bool>,
        /// Doc returned when forking a given gist id
        pub forks: Mutex<HashMap<String, GistDoc>>,
        /// Recorded flush calls
        pub flushed: Mutex<Vec<String>>,
        /// Recorded delete calls
        pub deleted: Mutex<Vec<String>>,
        /// Recorded create calls
        pub created: Mutex<Vec<NewGist>>,
        /// Id handed out for the next created gist
        pub next_gist_id: Mutex<String>,
    }

    impl FakeGistHost {
        pub fn new() -> Self {
            let fake = Self::default();
            *fake.next_gist_id.lock().unwrap() = "new-gist".to_string();
            fake
        }

        pub fn insert_body(&self, gist_id: &str, body: &str) {
            self.bodies
                .lock()
                .unwrap()
                .insert(gist_id.to_string(), body.to_string());
        }

        pub fn fail_content_for(&self, gist_id: &str) {
            self.failing_content
                .lock()
                .unwrap()
                .insert(gist_id.to_string());
        }

        pub fn set_docs(&self, docs: Vec<GistDoc>) {
            *self.docs.lock().unwrap() = docs;
        }
    }

    #[async_trait]
    impl GistHost for FakeGistHost {
        async fn content(&self, gist_id: &str) -> Result<Option<String>> {
            if self.failing_content.lock().unwrap().contains(gist_id) {
                anyhow::bail!("content fetch failed for {}", gist_id);
            }
            Ok(self.bodies.lock().unwrap().get(gist_id).cloned())
        }

        async fn flush_content(&self, gist_id: &str) -> Result<()> {
            self.flushed.lock().unwrap().push(gist_id.to_string());
            Ok(())
        }

        async fn list_docs(&self, _remote_uid: &str, _token: &str) -> Result<Vec<GistDoc>> {
            if *self.fail_listing.lock().unwrap() {
                anyhow::bail!("gist host unreachable");
            }
            Ok(self.docs.lock().unwrap().clone())
        }

        async fn create_doc(&self, _token: &str, gist: &NewGist) -> Result<String> {
            self.created.lock().unwrap().push(gist.clone());
            Ok(self.next_gist_id.lock().unwrap().clone())
        }

        async fn fork_doc(&self, _token: &str, gist_id: &str) -> Result<Option<GistDoc>> {
            Ok(self.forks.lock().unwrap().get(gist_id).cloned())
        }

        async fn delete_doc(&self, _token: &str, gist_id: &str) -> Result<()> {
            self.deleted.lock().unwrap().push(gist_id.to_string());
            Ok(())
        }
    }
}
