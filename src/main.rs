//! Gistpress - a blog engine whose article bodies live in GitHub Gists

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gistpress::{
    api::{self, AppState},
    cache::create_cache,
    config::Config,
    db::{
        self,
        repositories::{SqlxArticleRepository, SqlxSessionRepository, SqlxUserRepository},
    },
    gist::GithubGists,
    jobs::{JobQueue, JobRunner},
    push::PushBroker,
    render::Templates,
    services::{ArticleService, EntryAssembler, JobTokenSigner, SyncService},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gistpress=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting gistpress...");

    // Load configuration
    let config = Arc::new(Config::load_with_env(Path::new("config.yml"))?);
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Initialize cache and the gist host client
    let cache = create_cache(&config.cache).await?;
    let host = Arc::new(GithubGists::new(
        &config.github,
        cache,
        Duration::from_secs(config.cache.ttl_seconds),
    )?);
    tracing::info!("Gist host client ready: {}", config.github.api_url);

    // Load embedded templates
    let templates = Arc::new(Templates::new()?);
    tracing::info!("Templates loaded");

    // Create repositories
    let articles = SqlxArticleRepository::shared(pool.clone());
    let users = SqlxUserRepository::shared(pool.clone());
    let sessions = SqlxSessionRepository::shared(pool.clone());

    // Wire up services
    let push = PushBroker::new();
    let job_tokens = JobTokenSigner::new(
        &config.jobs.secret,
        Duration::from_secs(config.jobs.token_ttl_seconds),
    );
    let assembler = Arc::new(EntryAssembler::new(host.clone(), users.clone()));
    let article_service = Arc::new(ArticleService::new(
        articles.clone(),
        users.clone(),
        host.clone(),
        templates.clone(),
        config.github.clone(),
        config.site.name.clone(),
    ));
    let sync = Arc::new(SyncService::new(
        host,
        articles.clone(),
        users.clone(),
        push.clone(),
    ));

    // Start the job runner
    let (jobs, job_rx) = JobQueue::new();
    JobRunner::new(job_rx, sync, job_tokens.clone()).spawn();
    tracing::info!("Job runner started");

    // Build application state
    let state = AppState {
        config: config.clone(),
        articles,
        users,
        sessions,
        assembler,
        article_service,
        templates,
        push,
        jobs,
        job_tokens,
    };

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
