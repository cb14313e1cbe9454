//! User and social identity models
//!
//! Account creation, login and the OAuth handshake with the gist host all
//! live outside this service; these types only describe what the blog needs
//! to render pages and call the gist API on a user's behalf.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique, used in profile URLs)
    pub username: String,
    /// Email address (feed author field)
    pub email: String,
    /// Given name
    pub name: Option<String>,
    /// Family name
    pub last_name: Option<String>,
    /// Profile bio
    pub bio: Option<String>,
    /// Avatar URL
    pub gravatar_url: Option<String>,
    /// Embedded microblog timeline widget id, if the user configured one
    pub microblog_widget_id: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Display name: "name last_name", falling back to the username.
    pub fn display_name(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => match self.last_name.as_deref() {
                Some(last) if !last.is_empty() => format!("{} {}", name, last),
                _ => name.to_string(),
            },
            _ => self.username.clone(),
        }
    }
}

/// A linked external account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialIdentity {
    /// Unique identifier
    pub id: i64,
    /// Owning user ID
    pub user_id: i64,
    /// External provider
    pub provider: IdentityProvider,
    /// Username on the remote service
    pub remote_uid: String,
    /// OAuth access token, when the provider issued one
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    /// Display handle on the remote service, when distinct from the uid
    pub screen_name: Option<String>,
}

/// External identity providers a user can link.
///
/// `Github` is the gist host and carries the credential used for all remote
/// content operations; `Twitter` only decorates article and profile pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityProvider {
    /// The gist host
    Github,
    /// Microblog used for profile widgets
    Twitter,
}

impl IdentityProvider {
    /// Database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityProvider::Github => "github",
            IdentityProvider::Twitter => "twitter",
        }
    }

    /// Parse a provider from its database string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "github" => Some(IdentityProvider::Github),
            "twitter" => Some(IdentityProvider::Twitter),
            _ => None,
        }
    }
}

impl std::fmt::Display for IdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
