//! Server-Sent Events endpoint
//!
//! Streams push messages to the browser. A page subscribes with the channel
//! token it was handed at render time and only sees messages addressed to
//! that token. The only payload in use is the "reload" hint sent when a
//! refresh job finishes.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::api::middleware::AppState;

/// Keepalive interval for idle streams
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// SSE subscription parameters
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Channel token handed out with the page
    pub channel: String,
}

/// GET /blog/events - subscribe to push messages for one channel
pub async fn events_stream(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!(channel = %query.channel, "SSE subscriber connected");

    let receiver = state.push.subscribe();
    let channel = query.channel;

    let stream = BroadcastStream::new(receiver).filter_map(move |result| {
        let channel = channel.clone();
        async move {
            match result {
                Ok(message) if message.channel == channel => {
                    Some(Ok(Event::default().data(message.payload)))
                }
                Ok(_) => None,
                Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(count)) => {
                    warn!(count, "SSE stream lagged, messages dropped");
                    None
                }
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEPALIVE_INTERVAL)
            .text("heartbeat"),
    )
}
