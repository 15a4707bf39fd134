use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// OAuth-style credential pair of one connection.
///
/// `generation` increases on every successful refresh; concurrent callers
/// compare generations rather than token strings to decide whether a
/// refresh already happened.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenState {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub refresh_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub generation: u64,
}

impl TokenState {
    /// True when the access token expires within `buffer` of `now`.
    ///
    /// Tokens without an expiry never need a proactive refresh.
    pub fn needs_refresh(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        if self.access_token.is_empty() {
            return true;
        }
        self.expires_at.is_some_and(|expiry| now + buffer > expiry)
    }
}

impl std::fmt::Debug for TokenState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenState")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Tokens returned by a refresh endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub refresh_expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for RefreshedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshedToken")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
