//! API layer - HTTP handlers and routing
//!
//! Public pages (blog, guides, feed, article detail, profile), the
//! authenticated article-management surface, the token-guarded job endpoint
//! and the SSE push stream.

pub mod articles;
pub mod blog;
pub mod events;
pub mod jobs;
pub mod middleware;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(cors_origin.parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    // Session-guarded management surface
    let protected = Router::new()
        .route("/articles", get(articles::list_own))
        .route(
            "/articles/new",
            get(articles::create_form).post(articles::create),
        )
        .route("/articles/{id}", delete(articles::delete))
        .route("/articles/{id}/fork", post(articles::fork))
        .route("/articles/{id}/draft", put(articles::set_draft))
        .route("/articles/{id}/flush", post(articles::flush_cache))
        .route("/blog/refresh", post(articles::refresh))
        .route("/blog/events", get(events::events_stream))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .route("/", get(blog::home))
        .route("/blog/", get(blog::blog_index))
        .route("/guides/", get(blog::guides_index))
        .route("/blog/feed.xml", get(blog::feed))
        .route(
            "/blog/buildlist",
            get(jobs::build_articles).post(jobs::build_articles),
        )
        .merge(protected)
        // Username captures come last; static segments win over them
        .route("/{username}", get(blog::profile))
        .route("/{username}/{kind}/{slug}", get(blog::article_detail))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::repositories::{
        ArticleRepository, SessionRepository, SqlxArticleRepository, SqlxSessionRepository,
        SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations, DatabasePool, DynDatabasePool};
    use crate::gist::testing::FakeGistHost;
    use crate::gist::GistDoc;
    use crate::jobs::{JobQueue, JobRunner};
    use crate::models::{ArticleKind, CreateArticleInput};
    use crate::push::PushBroker;
    use crate::render::Templates;
    use crate::services::{ArticleService, EntryAssembler, JobTokenSigner, SyncService};
    use axum_test::TestServer;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use std::time::Duration;

    struct TestApp {
        server: TestServer,
        pool: DynDatabasePool,
        host: Arc<FakeGistHost>,
        state: AppState,
    }

    async fn spawn_app() -> TestApp {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        pool.execute(
            "INSERT INTO users (username, email, name, last_name, bio) VALUES \
             ('alice', 'alice@example.com', 'Alice', 'Smith', 'Writes things')",
        )
        .await
        .unwrap();
        pool.execute(
            "INSERT INTO social_identities (user_id, provider, remote_uid, access_token) \
             VALUES (1, 'github', 'alice-gh', 'tok')",
        )
        .await
        .unwrap();

        let config = Arc::new(Config::default());
        let host = Arc::new(FakeGistHost::new());
        let articles = SqlxArticleRepository::shared(pool.clone());
        let users = SqlxUserRepository::shared(pool.clone());
        let sessions = SqlxSessionRepository::shared(pool.clone());
        let templates = Arc::new(Templates::new().unwrap());
        let push = PushBroker::new();
        let job_tokens = JobTokenSigner::new(&config.jobs.secret, Duration::from_secs(900));

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
            host.clone(),
            articles.clone(),
            users.clone(),
            push.clone(),
        ));

        let (jobs, rx) = JobQueue::new();
        JobRunner::new(rx, sync, job_tokens.clone()).spawn();

        let state = AppState {
            config,
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

        let server = TestServer::new(build_router(state.clone(), "http://localhost:3000")).unwrap();
        TestApp {
            server,
            pool,
            host,
            state,
        }
    }

    async fn seed_article(
        app: &TestApp,
        gist_id: &str,
        kind: ArticleKind,
        public: bool,
        draft: bool,
    ) -> i64 {
        let repo = SqlxArticleRepository::new(app.pool.clone());
        let article = repo
            .create(&CreateArticleInput {
                owner_id: 1,
                gist_id: gist_id.to_string(),
                title: format!("Title {}", gist_id),
                summary: "Summary".to_string(),
                slug: format!("title-{}", gist_id),
                kind,
                public,
                draft,
                created_at: Utc.timestamp_opt(1_500_000_000, 0).unwrap(),
            })
            .await
            .unwrap();
        app.host.insert_body(gist_id, "# Body");
        article.id
    }

    async fn login(app: &TestApp) -> String {
        let session = SqlxSessionRepository::new(app.pool.clone())
            .create(1, chrono::Duration::hours(1))
            .await
            .unwrap();
        format!("session={}", session.id)
    }

    #[tokio::test]
    async fn test_blog_index_shows_only_public_published_posts() {
        let app = spawn_app().await;
        seed_article(&app, "visible", ArticleKind::Post, true, false).await;
        seed_article(&app, "draft", ArticleKind::Post, true, true).await;
        seed_article(&app, "private", ArticleKind::Post, false, false).await;
        seed_article(&app, "guide", ArticleKind::Guide, true, false).await;

        let response = app.server.get("/blog/").await;
        response.assert_status_ok();
        let body = response.text();
        assert!(body.contains("Title visible"));
        assert!(!body.contains("Title draft"));
        assert!(!body.contains("Title private"));
        assert!(!body.contains("Title guide"));
    }

    #[tokio::test]
    async fn test_feed_is_xml_and_excludes_drafts() {
        let app = spawn_app().await;
        seed_article(&app, "pub", ArticleKind::Post, true, false).await;
        seed_article(&app, "unlisted", ArticleKind::Post, false, false).await;
        seed_article(&app, "draft", ArticleKind::Post, true, true).await;

        let response = app.server.get("/blog/feed.xml").await;
        response.assert_status_ok();
        let content_type = response.header(header::CONTENT_TYPE);
        assert!(content_type.to_str().unwrap().starts_with("application/xml"));

        let body = response.text();
        // The feed ignores the public flag but never carries drafts
        assert!(body.contains("Title pub"));
        assert!(body.contains("Title unlisted"));
        assert!(!body.contains("Title draft"));
    }

    #[tokio::test]
    async fn test_feed_caps_at_ten_entries() {
        let app = spawn_app().await;
        for i in 0..12 {
            seed_article(&app, &format!("g{}", i), ArticleKind::Post, true, false).await;
        }

        let response = app.server.get("/blog/feed.xml").await;
        response.assert_status_ok();
        let body = response.text();
        assert_eq!(body.matches("<item>").count(), 10);
    }

    #[tokio::test]
    async fn test_empty_feed_falls_back_to_current_time() {
        let app = spawn_app().await;

        let response = app.server.get("/blog/feed.xml").await;
        response.assert_status_ok();
        let body = response.text();
        assert!(!body.contains("<item>"));
        // lastBuildDate is still populated
        assert!(body.contains("<lastBuildDate>"));
        assert!(body.contains("GMT</lastBuildDate>"));
    }

    #[tokio::test]
    async fn test_article_detail_and_error_page() {
        let app = spawn_app().await;
        seed_article(&app, "g1", ArticleKind::Post, true, false).await;

        let response = app.server.get("/alice/blog/title-g1").await;
        response.assert_status_ok();
        assert!(response.text().contains("Title g1"));

        let missing = app.server.get("/alice/blog/nope").await;
        missing.assert_status(axum::http::StatusCode::NOT_FOUND);
        assert!(missing.text().contains("Something went wrong"));
    }

    #[tokio::test]
    async fn test_unknown_profile_redirects_home() {
        let app = spawn_app().await;
        let response = app.server.get("/nobody").await;
        response.assert_status(axum::http::StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn test_profile_buckets_unknown_kind_separately() {
        let app = spawn_app().await;
        seed_article(&app, "p", ArticleKind::Post, true, false).await;
        seed_article(&app, "u", ArticleKind::Unknown, true, false).await;

        let response = app.server.get("/alice").await;
        response.assert_status_ok();
        let body = response.text();
        assert!(body.contains("Title p"));
        assert!(body.contains("Title u"));
        assert!(body.contains("<h2>Other</h2>"));
    }

    #[tokio::test]
    async fn test_management_routes_require_a_session() {
        let app = spawn_app().await;
        let response = app.server.get("/articles").await;
        response.assert_status(axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_job_endpoint_drops_requests_without_valid_token() {
        let app = spawn_app().await;
        app.host.set_docs(vec![GistDoc {
            gist_id: "g1".to_string(),
            title: "Remote".to_string(),
            summary: String::new(),
            kind: ArticleKind::Post,
            published: Utc.timestamp_opt(1_500_000_000, 0).unwrap(),
        }]);

        let missing = app.server.get("/blog/buildlist").await;
        missing.assert_status(axum::http::StatusCode::NO_CONTENT);
        assert!(missing.text().is_empty());

        let forged = app
            .server
            .get("/blog/buildlist")
            .add_query_param("job_token", "forged")
            .await;
        forged.assert_status(axum::http::StatusCode::NO_CONTENT);

        // Let any (wrongly) scheduled work drain before asserting
        tokio::time::sleep(Duration::from_millis(50)).await;
        let repo = SqlxArticleRepository::new(app.pool.clone());
        assert!(repo.list_by_owner(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_job_endpoint_runs_refresh_with_valid_token() {
        let app = spawn_app().await;
        app.host.set_docs(vec![GistDoc {
            gist_id: "g1".to_string(),
            title: "Remote".to_string(),
            summary: String::new(),
            kind: ArticleKind::Post,
            published: Utc.timestamp_opt(1_500_000_000, 0).unwrap(),
        }]);

        let token = app.state.job_tokens.sign(1, "chan");
        let response = app
            .server
            .get("/blog/buildlist")
            .add_query_param("job_token", token)
            .await;
        response.assert_status(axum::http::StatusCode::ACCEPTED);

        // The runner works off-request; poll briefly for the write
        let repo = SqlxArticleRepository::new(app.pool.clone());
        let mut found = false;
        for _ in 0..100 {
            if repo.get_by_owner_and_gist(1, "g1").await.unwrap().is_some() {
                found = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(found, "refresh job should have created the article");
    }

    #[tokio::test]
    async fn test_refresh_trigger_schedules_job() {
        let app = spawn_app().await;
        app.host.set_docs(vec![GistDoc {
            gist_id: "g9".to_string(),
            title: "Remote".to_string(),
            summary: String::new(),
            kind: ArticleKind::Post,
            published: Utc.timestamp_opt(1_500_000_000, 0).unwrap(),
        }]);
        let cookie = login(&app).await;

        let response = app
            .server
            .post("/blog/refresh")
            .add_query_param("channel_token", "chan-1")
            .add_header(header::COOKIE, HeaderValue::from_str(&cookie).unwrap())
            .await;
        response.assert_status(axum::http::StatusCode::ACCEPTED);

        let repo = SqlxArticleRepository::new(app.pool.clone());
        let mut found = false;
        for _ in 0..100 {
            if repo.get_by_owner_and_gist(1, "g9").await.unwrap().is_some() {
                found = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(found, "triggered refresh should have run");
    }

    #[tokio::test]
    async fn test_delete_action_and_ownership() {
        let app = spawn_app().await;
        let article_id = seed_article(&app, "doomed", ArticleKind::Post, true, false).await;
        let cookie = login(&app).await;

        let response = app
            .server
            .delete(&format!("/articles/{}", article_id))
            .add_header(header::COOKIE, HeaderValue::from_str(&cookie).unwrap())
            .await;
        response.assert_status_ok();
        assert!(response.text().contains("successfully deleted"));

        let repo = SqlxArticleRepository::new(app.pool.clone());
        assert!(repo.get_by_id(article_id).await.unwrap().is_none());
        assert_eq!(*app.host.deleted.lock().unwrap(), vec!["doomed".to_string()]);

        // Deleting an unknown article reports a warning, not an error
        let response = app
            .server
            .delete("/articles/9999")
            .add_header(header::COOKIE, HeaderValue::from_str(&cookie).unwrap())
            .await;
        response.assert_status_ok();
        assert!(response.text().contains("was not deleted"));
    }

    #[tokio::test]
    async fn test_draft_toggle_via_api() {
        let app = spawn_app().await;
        let article_id = seed_article(&app, "g1", ArticleKind::Post, true, true).await;
        let cookie = login(&app).await;

        let response = app
            .server
            .put(&format!("/articles/{}/draft", article_id))
            .add_header(header::COOKIE, HeaderValue::from_str(&cookie).unwrap())
            .form(&[("draft", "false")])
            .await;
        response.assert_status_ok();

        let repo = SqlxArticleRepository::new(app.pool.clone());
        assert!(!repo.get_by_id(article_id).await.unwrap().unwrap().draft);
    }
}
