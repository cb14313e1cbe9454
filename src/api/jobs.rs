//! Job endpoint
//!
//! The out-of-band entry point an external task scheduler calls to run a
//! queued refresh. There is no user session on these requests; the only
//! authorization is the signed capability token in the query string. A
//! request with a missing, invalid or expired token is logged and dropped
//! with an empty response, and performs no store writes.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::warn;

use crate::api::middleware::AppState;
use crate::jobs::Job;

/// Job endpoint query parameters
#[derive(Debug, Deserialize)]
pub struct BuildListParams {
    #[serde(default)]
    pub job_token: Option<String>,
}

/// GET|POST /blog/buildlist - execute a scheduled article refresh
pub async fn build_articles(
    State(state): State<AppState>,
    Query(params): Query<BuildListParams>,
) -> Response {
    let Some(token) = params.job_token else {
        warn!("Job request without capability token");
        return StatusCode::NO_CONTENT.into_response();
    };

    if let Err(e) = state.job_tokens.verify(&token) {
        warn!(error = %e, "Rejected job request with bad capability token");
        return StatusCode::NO_CONTENT.into_response();
    }

    state.jobs.enqueue(Job::RefreshArticles { token });
    StatusCode::ACCEPTED.into_response()
}
