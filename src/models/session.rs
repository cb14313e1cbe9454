//! Session model
//!
//! Sessions are created by the external login/OAuth surface; this service
//! only validates them when authenticating requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An authentication session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session token (primary key)
    pub id: String,
    /// Owning user ID
    pub user_id: i64,
    /// Expiry timestamp
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session has expired as of `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
