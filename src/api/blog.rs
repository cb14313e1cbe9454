//! Public blog pages
//!
//! Listing, feed, article detail and profile handlers. Every page is
//! assembled from store metadata joined with gist bodies; an article whose
//! body cannot be fetched simply drops out of the page.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use tracing::error;

use crate::api::middleware::AppState;
use crate::models::{ArticleKind, IdentityProvider};
use crate::services::{EntryFilter, ViewEntry};

/// Feed entry cap
const FEED_LIMIT: usize = 10;

/// Fallback bio shown for users who have not written one
const DEFAULT_BIO: &str = "User has not completed their bio.";

/// Render a template into an HTML response, mapping render failures to the
/// generic error page.
pub fn page(state: &AppState, template: &str, context: &mut tera::Context) -> Response {
    context.insert("site_name", &state.config.site.name);
    match state.templates.render(template, context) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(template, error = %e, "Template rendering failed");
            error_page(state, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// The generic error page; never leaks the underlying error to the browser.
pub fn error_page(state: &AppState, status: StatusCode) -> Response {
    let mut context = tera::Context::new();
    context.insert("site_name", &state.config.site.name);
    match state.templates.render("error.html", &context) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!(error = %e, "Error page rendering failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong").into_response()
        }
    }
}

/// GET /blog/ - public post listing
pub async fn blog_index(State(state): State<AppState>) -> Response {
    let articles = match state.articles.list_all().await {
        Ok(articles) => articles,
        Err(e) => {
            error!(error = %e, "Article listing failed");
            return error_page(&state, StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    match state.assembler.assemble(&articles, EntryFilter::PublicPosts).await {
        Ok(entries) => {
            let mut context = tera::Context::new();
            context.insert("entries", &entries);
            page(&state, "blog.html", &mut context)
        }
        Err(e) => {
            error!(error = %e, "Blog assembly failed");
            error_page(&state, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /guides/ - public guide listing
pub async fn guides_index(State(state): State<AppState>) -> Response {
    let articles = match state.articles.list_all().await {
        Ok(articles) => articles,
        Err(e) => {
            error!(error = %e, "Article listing failed");
            return error_page(&state, StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    match state.assembler.assemble(&articles, EntryFilter::PublicGuides).await {
        Ok(entries) => {
            let mut context = tera::Context::new();
            context.insert("entries", &entries);
            page(&state, "guides.html", &mut context)
        }
        Err(e) => {
            error!(error = %e, "Guide assembly failed");
            error_page(&state, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /blog/feed.xml - RSS feed, at most ten published entries
pub async fn feed(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let articles = match state.articles.list_all().await {
        Ok(articles) => articles,
        Err(e) => {
            error!(error = %e, "Article listing failed");
            return error_page(&state, StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let entries: Vec<ViewEntry> = match state.assembler.assemble(&articles, EntryFilter::Feed).await
    {
        Ok(entries) => entries.into_iter().take(FEED_LIMIT).collect(),
        Err(e) => {
            error!(error = %e, "Feed assembly failed");
            return error_page(&state, StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let date_format = "%a, %d %b %Y %H:%M:%S GMT";
    let last_updated = entries
        .iter()
        .map(|entry| entry.updated_at)
        .max()
        .unwrap_or_else(chrono::Utc::now)
        .format(date_format)
        .to_string();

    let site_host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");

    let mut context = tera::Context::new();
    context.insert("blog_title", &format!("The {} Blog", state.config.site.name));
    context.insert("site_host", site_host);
    context.insert("last_updated", &last_updated);
    context.insert("entries", &entries);

    match state.templates.render("feed.xml", &context) {
        Ok(xml) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/xml")],
            xml,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Feed rendering failed");
            error_page(&state, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /{username}/{kind}/{slug} - article detail page
///
/// The `kind` path segment only drives navigation highlighting; lookup is by
/// owner and slug, and drafts render so preview links keep working.
pub async fn article_detail(
    State(state): State<AppState>,
    Path((username, kind_segment, slug)): Path<(String, String, String)>,
) -> Response {
    let owner = match state.users.get_by_username(&username).await {
        Ok(Some(owner)) => owner,
        Ok(None) => return error_page(&state, StatusCode::NOT_FOUND),
        Err(e) => {
            error!(error = %e, "User lookup failed");
            return error_page(&state, StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let article = match state.articles.get_by_owner_and_slug(owner.id, &slug).await {
        Ok(Some(article)) => article,
        Ok(None) => return error_page(&state, StatusCode::NOT_FOUND),
        Err(e) => {
            error!(error = %e, "Article lookup failed");
            return error_page(&state, StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let entry = match state.assembler.assemble_one(&article).await {
        Ok(Some(entry)) => entry,
        // No body on the gist host means no page to show
        Ok(None) => return error_page(&state, StatusCode::NOT_FOUND),
        Err(e) => {
            error!(error = %e, "Article assembly failed");
            return error_page(&state, StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let github_identity = state
        .users
        .identity(owner.id, IdentityProvider::Github)
        .await
        .unwrap_or_default();
    let twitter_identity = state
        .users
        .identity(owner.id, IdentityProvider::Twitter)
        .await
        .unwrap_or_default();

    let menu_choice = if kind_segment.contains("guide") {
        "guides"
    } else {
        "blog"
    };

    let mut context = tera::Context::new();
    context.insert("entry", &entry);
    context.insert("owner_name", &owner.display_name());
    context.insert(
        "owner_github_username",
        &github_identity.map(|identity| identity.remote_uid),
    );
    context.insert(
        "twitter_username",
        &twitter_identity
            .as_ref()
            .and_then(|identity| identity.screen_name.clone()),
    );
    context.insert("twitter_widget_id", &owner.microblog_widget_id);
    context.insert("menu_choice", menu_choice);
    page(&state, "article.html", &mut context)
}

/// GET /{username} - profile page with post, guide and other buckets
pub async fn profile(State(state): State<AppState>, Path(username): Path<String>) -> Response {
    let owner = match state.users.get_by_username(&username).await {
        Ok(Some(owner)) => owner,
        // Unknown users bounce to a safe default location
        Ok(None) => return Redirect::to("/blog/").into_response(),
        Err(e) => {
            error!(error = %e, "User lookup failed");
            return error_page(&state, StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let articles = match state.articles.list_by_owner(owner.id).await {
        Ok(articles) => articles,
        Err(e) => {
            error!(error = %e, "Article listing failed");
            return error_page(&state, StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let entries = match state.assembler.assemble(&articles, EntryFilter::Profile).await {
        Ok(entries) => entries,
        Err(e) => {
            error!(error = %e, "Profile assembly failed");
            return error_page(&state, StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let mut posts = Vec::new();
    let mut guides = Vec::new();
    let mut other = Vec::new();
    for entry in entries {
        match entry.kind {
            ArticleKind::Post => posts.push(entry),
            ArticleKind::Guide => guides.push(entry),
            ArticleKind::Unknown => other.push(entry),
        }
    }

    let github_identity = state
        .users
        .identity(owner.id, IdentityProvider::Github)
        .await
        .unwrap_or_default();
    let twitter_identity = state
        .users
        .identity(owner.id, IdentityProvider::Twitter)
        .await
        .unwrap_or_default();

    let bio = match owner.bio.as_deref() {
        Some(bio) if !bio.is_empty() => bio,
        _ => DEFAULT_BIO,
    };
    let gravatar_url = owner
        .gravatar_url
        .clone()
        .unwrap_or_else(|| state.config.site.default_avatar_url.clone());

    let mut context = tera::Context::new();
    context.insert("username", &owner.username);
    context.insert("owner_name", &owner.display_name());
    context.insert("bio", bio);
    context.insert("gravatar_url", &gravatar_url);
    context.insert(
        "owner_github_username",
        &github_identity.map(|identity| identity.remote_uid),
    );
    context.insert(
        "twitter_username",
        &twitter_identity
            .as_ref()
            .and_then(|identity| identity.screen_name.clone()),
    );
    context.insert("twitter_widget_id", &owner.microblog_widget_id);
    context.insert("posts", &posts);
    context.insert("guides", &guides);
    context.insert("other", &other);
    page(&state, "profile.html", &mut context)
}

/// GET / - the blog is the landing page
pub async fn home() -> Redirect {
    Redirect::to("/blog/")
}
