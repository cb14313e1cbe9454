//! Configuration management
//!
//! Configuration is loaded from a `config.yml` file with environment
//! variable overrides. Missing optional values are filled with defaults, and
//! a missing file yields the default configuration.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Gist host configuration
    #[serde(default)]
    pub github: GithubConfig,
    /// Background job configuration
    #[serde(default)]
    pub jobs: JobsConfig,
    /// Site presentation configuration
    #[serde(default)]
    pub site: SiteConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/gistpress.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache driver (memory or redis)
    #[serde(default)]
    pub driver: CacheDriver,
    /// Redis connection URL (optional)
    #[serde(default)]
    pub redis_url: Option<String>,
    /// Cache TTL in seconds
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            driver: CacheDriver::default(),
            redis_url: None,
            ttl_seconds: default_cache_ttl(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    3600
}

/// Cache driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheDriver {
    /// In-memory cache (default)
    #[default]
    Memory,
    /// Redis cache
    Redis,
}

/// Gist host configuration
///
/// Article bodies are stored as gists on the remote host. Each gist created
/// by gistpress carries a JSON manifest file next to the markdown body; the
/// file names below identify them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// Base URL of the gist API
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
    /// Name of the manifest file inside each article gist
    #[serde(default = "default_manifest_file")]
    pub manifest_file: String,
    /// Name of the markdown body file inside each article gist
    #[serde(default = "default_markdown_file")]
    pub markdown_file: String,
    /// Where to send users who have not linked a gist-host account yet.
    /// The OAuth handshake itself is handled outside this service.
    #[serde(default = "default_connect_url")]
    pub connect_url: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api_url(),
            manifest_file: default_manifest_file(),
            markdown_file: default_markdown_file(),
            connect_url: default_connect_url(),
        }
    }
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_manifest_file() -> String {
    "article.json".to_string()
}

fn default_markdown_file() -> String {
    "article.md".to_string()
}

fn default_connect_url() -> String {
    "/account/connect/github".to_string()
}

/// Background job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Secret key for signing job capability tokens
    #[serde(default = "default_job_secret")]
    pub secret: String,
    /// Lifetime of a job capability token in seconds
    #[serde(default = "default_job_token_ttl")]
    pub token_ttl_seconds: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            secret: default_job_secret(),
            token_ttl_seconds: default_job_token_ttl(),
        }
    }
}

fn default_job_secret() -> String {
    // Overridden in any real deployment via GISTPRESS_JOBS_SECRET
    "insecure-dev-secret".to_string()
}

fn default_job_token_ttl() -> u64 {
    900
}

/// Site presentation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site name used in page titles and the feed
    #[serde(default = "default_site_name")]
    pub name: String,
    /// Fallback avatar URL for users without one
    #[serde(default = "default_avatar_url")]
    pub default_avatar_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: default_site_name(),
            default_avatar_url: default_avatar_url(),
        }
    }
}

fn default_site_name() -> String {
    "Gistpress".to_string()
}

fn default_avatar_url() -> String {
    "https://www.gravatar.com/avatar/?d=mm".to_string()
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file exists but could not be read
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file could not be parsed as YAML
    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: String, message: String },
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// A missing or empty file yields the default configuration.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides.
    ///
    /// Environment variables follow the pattern:
    /// - GISTPRESS_SERVER_HOST
    /// - GISTPRESS_SERVER_PORT
    /// - GISTPRESS_DATABASE_DRIVER
    /// - GISTPRESS_DATABASE_URL
    /// - GISTPRESS_CACHE_DRIVER
    /// - GISTPRESS_CACHE_REDIS_URL
    /// - GISTPRESS_GITHUB_API_URL
    /// - GISTPRESS_JOBS_SECRET
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("GISTPRESS_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("GISTPRESS_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(driver) = std::env::var("GISTPRESS_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                other => tracing::warn!("Unknown database driver override: {}", other),
            }
        }
        if let Ok(url) = std::env::var("GISTPRESS_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(driver) = std::env::var("GISTPRESS_CACHE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "memory" => self.cache.driver = CacheDriver::Memory,
                "redis" => self.cache.driver = CacheDriver::Redis,
                other => tracing::warn!("Unknown cache driver override: {}", other),
            }
        }
        if let Ok(url) = std::env::var("GISTPRESS_CACHE_REDIS_URL") {
            self.cache.redis_url = Some(url);
        }
        if let Ok(url) = std::env::var("GISTPRESS_GITHUB_API_URL") {
            self.github.api_url = url;
        }
        if let Ok(secret) = std::env::var("GISTPRESS_JOBS_SECRET") {
            self.jobs.secret = secret;
        }
    }
}
