//! Job capability tokens
//!
//! The job endpoint runs without a user session, so each scheduled run
//! carries a short-lived capability token binding the user, the push
//! channel and an expiry under HMAC-SHA256. Requests with a missing,
//! tampered or expired token are dropped.
//!
//! Token layout: `base64url(user_id:expiry:channel) . base64url(hmac)`.

use chrono::{DateTime, Duration, TimeZone, Utc};
use data_encoding::BASE64URL_NOPAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verification failures
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum JobTokenError {
    /// Token structure could not be decoded
    #[error("Malformed job token")]
    Malformed,

    /// Signature does not match
    #[error("Job token signature mismatch")]
    BadSignature,

    /// Token is past its expiry
    #[error("Job token expired")]
    Expired,
}

/// Claims carried by a verified token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobClaims {
    /// User whose articles the job refreshes
    pub user_id: i64,
    /// Push channel to signal on completion
    pub channel: String,
    /// Expiry timestamp
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies job capability tokens
#[derive(Clone)]
pub struct JobTokenSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl JobTokenSigner {
    /// Create a signer from the configured secret and token lifetime
    pub fn new(secret: &str, ttl: std::time::Duration) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            ttl: Duration::seconds(ttl.as_secs() as i64),
        }
    }

    /// Sign a token for a user and channel, valid for the configured TTL
    pub fn sign(&self, user_id: i64, channel: &str) -> String {
        self.sign_at(user_id, channel, Utc::now())
    }

    fn sign_at(&self, user_id: i64, channel: &str, now: DateTime<Utc>) -> String {
        let expires = (now + self.ttl).timestamp();
        let payload = format!("{}:{}:{}", user_id, expires, channel);
        let signature = self.mac(payload.as_bytes());

        format!(
            "{}.{}",
            BASE64URL_NOPAD.encode(payload.as_bytes()),
            BASE64URL_NOPAD.encode(&signature)
        )
    }

    /// Verify a token and return its claims
    pub fn verify(&self, token: &str) -> Result<JobClaims, JobTokenError> {
        self.verify_at(token, Utc::now())
    }

    fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<JobClaims, JobTokenError> {
        let (payload_part, signature_part) =
            token.split_once('.').ok_or(JobTokenError::Malformed)?;

        let payload = BASE64URL_NOPAD
            .decode(payload_part.as_bytes())
            .map_err(|_| JobTokenError::Malformed)?;
        let signature = BASE64URL_NOPAD
            .decode(signature_part.as_bytes())
            .map_err(|_| JobTokenError::Malformed)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key size");
        mac.update(&payload);
        mac.verify_slice(&signature)
            .map_err(|_| JobTokenError::BadSignature)?;

        let payload = String::from_utf8(payload).map_err(|_| JobTokenError::Malformed)?;
        let mut parts = payload.splitn(3, ':');
        let user_id = parts
            .next()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or(JobTokenError::Malformed)?;
        let expires = parts
            .next()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or(JobTokenError::Malformed)?;
        let channel = parts.next().ok_or(JobTokenError::Malformed)?.to_string();

        let expires_at = Utc
            .timestamp_opt(expires, 0)
            .single()
            .ok_or(JobTokenError::Malformed)?;
        if expires_at <= now {
            return Err(JobTokenError::Expired);
        }

        Ok(JobClaims {
            user_id,
            channel,
            expires_at,
        })
    }

    fn mac(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key size");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}
