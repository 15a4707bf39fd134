use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::errors::{CollectorError, CollectorResult};
use crate::domain::models::RefreshedToken;
use crate::domain::ports::TokenRefresher;
use crate::infrastructure::logging::SecretScrubber;

const ERROR_BODY_LIMIT: usize = 512;

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    expires_in: i64,
    #[serde(default)]
    refresh_token_expires_in: i64,
}

/// OAuth refresh-token grant against a provider's token endpoint
pub struct OAuthTokenRefresher {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl OAuthTokenRefresher {
    pub fn new(
        http: reqwest::Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

fn expiry(seconds: i64) -> Option<chrono::DateTime<Utc>> {
    (seconds > 0).then(|| Utc::now() + Duration::seconds(seconds))
}

#[async_trait]
impl TokenRefresher for OAuthTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> CollectorResult<RefreshedToken> {
        debug!(url = %self.token_url, "requesting token refresh");
        let response = self
            .http
            .post(&self.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&RefreshRequest {
                refresh_token,
                grant_type: "refresh_token",
                client_id: &self.client_id,
                client_secret: &self.client_secret,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let failure = || CollectorError::TokenRefresh {
            status: status.as_u16(),
            body: SecretScrubber::scrub_truncated(&body, ERROR_BODY_LIMIT),
        };

        if !status.is_success() {
            return Err(failure());
        }

        let parsed: RefreshResponse = serde_json::from_str(&body).map_err(|_| failure())?;
        if parsed.access_token.is_empty() {
            return Err(failure());
        }

        Ok(RefreshedToken {
            access_token: parsed.access_token,
            refresh_token: parsed.refresh_token,
            expires_at: expiry(parsed.expires_in),
            refresh_expires_at: expiry(parsed.refresh_token_expires_in),
        })
    }
}
