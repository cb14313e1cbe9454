//! Authenticated article management
//!
//! Own-article listing, the create form, and the fork / delete / publish /
//! cache-flush / refresh actions. All handlers run behind the session
//! middleware; ownership checks live in the article service.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::api::blog::{error_page, page};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::jobs::Job;
use crate::models::ArticleKind;
use crate::push::RELOAD;
use crate::services::{ArticleServiceError, NewArticleForm};

/// JSON message returned by action endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ActionMessage {
    pub status: String,
    pub message: String,
}

impl ActionMessage {
    fn success(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            status: "success".to_string(),
            message: message.into(),
        })
    }

    fn warning(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            status: "warning".to_string(),
            message: message.into(),
        })
    }
}

/// Optional push channel attached to an action
#[derive(Debug, Deserialize)]
pub struct ChannelQuery {
    pub channel_token: Option<String>,
}

/// Create form fields
#[derive(Debug, Deserialize)]
pub struct CreateArticleRequest {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub kind: String,
}

/// Draft toggle body
#[derive(Debug, Deserialize)]
pub struct DraftRequest {
    pub draft: bool,
}

/// GET /articles - own-article management page
pub async fn list_own(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Response {
    let articles = match state.articles.list_by_owner(user.id).await {
        Ok(articles) => articles,
        Err(e) => {
            error!(error = %e, "Article listing failed");
            return error_page(&state, StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    // Nothing to manage yet: straight to the create form
    if articles.is_empty() {
        return Redirect::to("/articles/new").into_response();
    }

    let channel_token = uuid::Uuid::new_v4().simple().to_string();
    let mut context = tera::Context::new();
    context.insert("articles", &articles);
    context.insert("channel_token", &channel_token);
    context.insert("username", &user.username);
    page(&state, "article_list.html", &mut context)
}

/// GET /articles/new - create form
pub async fn create_form(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Response {
    match state.article_service.gist_credential(&user).await {
        // Without a linked account there is nowhere to put the body;
        // the account-linking flow lives outside this service.
        Ok(None) => Redirect::to(&state.config.github.connect_url).into_response(),
        Ok(Some(_)) => {
            let mut context = tera::Context::new();
            page(&state, "article_create.html", &mut context)
        }
        Err(e) => {
            error!(error = %e, "Credential lookup failed");
            error_page(&state, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// POST /articles/new - create an article
pub async fn create(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Form(request): Form<CreateArticleRequest>,
) -> Response {
    let form = NewArticleForm {
        title: request.title.clone(),
        summary: request.summary.clone(),
        kind: ArticleKind::parse(&request.kind),
    };

    match state.article_service.create(&user, &form).await {
        Ok(article) => {
            info!(article_id = article.id, "Article created");
            Redirect::to("/articles").into_response()
        }
        Err(ArticleServiceError::NotLinked) => {
            Redirect::to(&state.config.github.connect_url).into_response()
        }
        Err(e @ (ArticleServiceError::Duplicate(_) | ArticleServiceError::Validation(_))) => {
            // Warn and re-render the form with the submitted values
            let message = match e {
                ArticleServiceError::Validation(reason) => reason,
                _ => "Article was not created. Something went horribly wrong somewhere!"
                    .to_string(),
            };
            let mut context = tera::Context::new();
            context.insert("message", &message);
            context.insert("message_level", "warning");
            context.insert("title", &request.title);
            context.insert("summary", &request.summary);
            page(&state, "article_create.html", &mut context)
        }
        Err(e) => {
            error!(error = %e, "Article creation failed");
            error_page(&state, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// POST /articles/{id}/fork - fork another user's article
pub async fn fork(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(article_id): Path<i64>,
) -> Result<Json<ActionMessage>, ApiError> {
    match state.article_service.fork(&user, article_id).await {
        Ok(Some(article)) => {
            info!(article_id = article.id, "Article forked");
            Ok(ActionMessage::success("Article forked into your gists!"))
        }
        Ok(None) => Ok(ActionMessage::warning(
            "Article was not forked. Something went horribly wrong somewhere!",
        )),
        Err(ArticleServiceError::NotLinked) => {
            Err(ApiError::forbidden("No linked gist-host account"))
        }
        Err(ArticleServiceError::Duplicate(_)) => Ok(ActionMessage::warning(
            "You already have an article for that gist.",
        )),
        Err(e) => Err(ApiError::internal_error(e.to_string())),
    }
}

/// DELETE /articles/{id} - delete an owned article and its gist
pub async fn delete(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(article_id): Path<i64>,
    Query(query): Query<ChannelQuery>,
) -> Result<Json<ActionMessage>, ApiError> {
    let result = state.article_service.delete(&user, article_id).await;

    // The management page reloads either way
    if let Some(channel) = query.channel_token.as_deref() {
        state.push.send(channel, RELOAD);
    }

    match result {
        Ok(()) => Ok(ActionMessage::success("Article successfully deleted!")),
        Err(ArticleServiceError::NotFound(_) | ArticleServiceError::NotOwned(_)) => Ok(
            ActionMessage::warning(
                "Article was not deleted. Something went horribly wrong somewhere!",
            ),
        ),
        Err(e) => Err(ApiError::internal_error(e.to_string())),
    }
}

/// PUT /articles/{id}/draft - publish/draft toggle
pub async fn set_draft(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(article_id): Path<i64>,
    Form(request): Form<DraftRequest>,
) -> Result<Json<ActionMessage>, ApiError> {
    match state
        .article_service
        .set_draft(&user, article_id, request.draft)
        .await
    {
        Ok(()) => Ok(ActionMessage::success(if request.draft {
            "Article moved back to drafts."
        } else {
            "Article published!"
        })),
        Err(ArticleServiceError::NotFound(_)) => Err(ApiError::not_found("Unknown article")),
        Err(ArticleServiceError::NotOwned(_)) => Err(ApiError::forbidden("Not your article")),
        Err(e) => Err(ApiError::internal_error(e.to_string())),
    }
}

/// POST /articles/{id}/flush - drop the cached body for one article
pub async fn flush_cache(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(article_id): Path<i64>,
) -> Result<Json<ActionMessage>, ApiError> {
    match state.article_service.flush_cache(&user, article_id).await {
        Ok(()) => Ok(ActionMessage::success("Article was flushed from cache.")),
        Err(ArticleServiceError::NotFound(_) | ArticleServiceError::NotOwned(_)) => Ok(
            ActionMessage::warning("Something went wrong flushing from cache!"),
        ),
        Err(e) => Err(ApiError::internal_error(e.to_string())),
    }
}

/// POST /blog/refresh - schedule a refresh of the caller's articles
///
/// Returns immediately; the job runner does the work and the browser is
/// nudged over the push channel when it finishes.
pub async fn refresh(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Query(query): Query<ChannelQuery>,
) -> Result<(StatusCode, Json<ActionMessage>), ApiError> {
    let channel = query.channel_token.unwrap_or_default();
    let token = state.job_tokens.sign(user.id, &channel);
    state.jobs.enqueue(Job::RefreshArticles { token });

    Ok((
        StatusCode::ACCEPTED,
        ActionMessage::success("Refresh scheduled."),
    ))
}
