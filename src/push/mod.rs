//! Browser push channel
//!
//! A broadcast fan-out used to hint "reload now" at browsers after
//! out-of-band work finishes. Each interested page subscribes with an opaque
//! channel token; delivery is fire-and-forget with no acknowledgment and no
//! ordering guarantee relative to store writes.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Broadcast channel capacity; slow subscribers lag and drop
const CHANNEL_CAPACITY: usize = 256;

/// Payload instructing the page to reload
pub const RELOAD: &str = "reload";

/// A message addressed to one channel token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushMessage {
    /// Channel token the subscriber registered with
    pub channel: String,
    /// Message payload
    pub payload: String,
}

/// Fan-out broker for push messages
#[derive(Clone)]
pub struct PushBroker {
    tx: broadcast::Sender<PushMessage>,
}

impl PushBroker {
    /// Create a broker
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Send a payload to a channel. Fire-and-forget: having no subscribers
    /// is not an error.
    pub fn send(&self, channel: &str, payload: &str) {
        let message = PushMessage {
            channel: channel.to_string(),
            payload: payload.to_string(),
        };
        match self.tx.send(message) {
            Ok(receivers) => debug!(channel, receivers, "Push message delivered"),
            Err(_) => debug!(channel, "Push message dropped, no subscribers"),
        }
    }

    /// Subscribe to the raw message stream. Callers filter by channel.
    pub fn subscribe(&self) -> broadcast::Receiver<PushMessage> {
        self.tx.subscribe()
    }
}

impl Default for PushBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_message() {
        let broker = PushBroker::new();
        let mut rx = broker.subscribe();

        broker.send("chan-1", RELOAD);

        let message = rx.recv().await.unwrap();
        assert_eq!(message.channel, "chan-1");
        assert_eq!(message.payload, "reload");
    }

    #[tokio::test]
    async fn test_send_without_subscribers_is_fine() {
        let broker = PushBroker::new();
        broker.send("nobody-listening", RELOAD);
    }

    #[tokio::test]
    async fn test_all_subscribers_see_all_channels() {
        // Filtering happens at the SSE endpoint, not in the broker
        let broker = PushBroker::new();
        let mut rx = broker.subscribe();

        broker.send("a", RELOAD);
        broker.send("b", RELOAD);

        assert_eq!(rx.recv().await.unwrap().channel, "a");
        assert_eq!(rx.recv().await.unwrap().channel, "b");
    }
}
