use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::rate_limiter::{RateLimitCalculator, RequestThrottle};
use super::response::ApiResponse;
use super::retry::RetryPolicy;
use super::token_provider::{AccessToken, TokenProvider};
use crate::domain::errors::CollectorResult;
use crate::domain::models::Config;
use crate::infrastructure::logging::SecretScrubber;

/// Static tokens used round-robin, one per request
#[derive(Debug)]
pub struct StaticTokens {
    tokens: Vec<String>,
    next: AtomicUsize,
}

impl StaticTokens {
    pub fn new(tokens: Vec<String>) -> Self {
        Self {
            tokens: tokens
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            next: AtomicUsize::new(0),
        }
    }

    /// Split a comma-separated token list as stored on a connection
    pub fn parse(tokens: &str) -> Self {
        Self::new(tokens.split(',').map(str::to_string).collect())
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn next_token(&self) -> Option<&str> {
        if self.tokens.is_empty() {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.tokens.len();
        Some(&self.tokens[index])
    }
}

/// Where request credentials come from
pub enum Credentials {
    None,
    Static(StaticTokens),
    Refreshing(Arc<TokenProvider>),
}

impl Credentials {
    /// Number of distinct credentials; multiplies the per-credential quota
    pub fn count(&self) -> usize {
        match self {
            Self::Static(tokens) => tokens.len().max(1),
            Self::None | Self::Refreshing(_) => 1,
        }
    }
}

enum Authorization {
    Anonymous,
    Static(String),
    Refreshing(AccessToken),
}

/// HTTP client for one connection: credentials, shared throttle and retries
pub struct ApiClient {
    http: reqwest::Client,
    endpoint: String,
    credentials: Credentials,
    throttle: Arc<RequestThrottle>,
    calculator: RateLimitCalculator,
    retry: RetryPolicy,
    calibrated: AtomicBool,
}

impl ApiClient {
    pub fn new(
        endpoint: impl Into<String>,
        credentials: Credentials,
        config: &Config,
    ) -> CollectorResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .user_agent(concat!("silt/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let calculator = RateLimitCalculator::new(&config.rate_limit, credentials.count());
        let throttle = Arc::new(RequestThrottle::new(calculator.default_budget()));

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            credentials,
            throttle,
            calculator,
            retry: RetryPolicy::from_config(&config.http),
            calibrated: AtomicBool::new(false),
        })
    }

    /// Share a throttle with other clients of the same connection
    #[must_use]
    pub fn with_throttle(mut self, throttle: Arc<RequestThrottle>) -> Self {
        self.throttle = throttle;
        self
    }

    pub const fn throttle(&self) -> &Arc<RequestThrottle> {
        &self.throttle
    }

    pub fn credential_count(&self) -> usize {
        self.credentials.count()
    }

    /// Absolute URL for `path`; absolute inputs are used as is
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.endpoint.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        }
    }

    /// Throttled GET with transient-failure retries.
    ///
    /// A 401 under refreshing credentials triggers one refresh and one
    /// resend per call, across retries; any later 401 is handed back to the
    /// caller.
    /// 429 and 5xx are retried and become errors once retries run out.
    /// Other statuses are returned for the caller to classify.
    #[instrument(skip(self, path, query, headers), fields(url = %SecretScrubber::scrub(path)))]
    pub async fn get(
        &self,
        path: &str,
        query: &[(String, String)],
        headers: &HeaderMap,
    ) -> CollectorResult<ApiResponse> {
        let url = self.url(path);
        let refreshed = AtomicBool::new(false);
        let response = self
            .retry
            .execute(|| self.send_once(&url, query, headers, &refreshed))
            .await?;
        self.calibrate(&response);
        Ok(response)
    }

    async fn send_once(
        &self,
        url: &str,
        query: &[(String, String)],
        headers: &HeaderMap,
        refreshed: &AtomicBool,
    ) -> CollectorResult<ApiResponse> {
        let authorization = self.authorize().await?;
        let mut response = self.send(url, query, headers, &authorization).await?;

        if response.status == StatusCode::UNAUTHORIZED {
            if let (Authorization::Refreshing(rejected), Credentials::Refreshing(provider)) =
                (&authorization, &self.credentials)
            {
                if refreshed.swap(true, Ordering::SeqCst) {
                    return Ok(response);
                }
                warn!(
                    generation = rejected.generation,
                    "request unauthorized, refreshing token and retrying once"
                );
                let fresh = provider.force_refresh(rejected.generation).await?;
                response = self
                    .send(url, query, headers, &Authorization::Refreshing(fresh))
                    .await?;
            }
        }

        if response.status == StatusCode::TOO_MANY_REQUESTS || response.status.is_server_error() {
            return Err(response.status_error());
        }
        Ok(response)
    }

    async fn authorize(&self) -> CollectorResult<Authorization> {
        Ok(match &self.credentials {
            Credentials::None => Authorization::Anonymous,
            Credentials::Static(tokens) => tokens
                .next_token()
                .map_or(Authorization::Anonymous, |t| Authorization::Static(t.to_string())),
            Credentials::Refreshing(provider) => {
                Authorization::Refreshing(provider.get_token().await?)
            }
        })
    }

    async fn send(
        &self,
        url: &str,
        query: &[(String, String)],
        headers: &HeaderMap,
        authorization: &Authorization,
    ) -> CollectorResult<ApiResponse> {
        self.throttle.acquire().await;

        let mut request = self.http.get(url).query(query).headers(headers.clone());
        request = match authorization {
            Authorization::Anonymous => request,
            Authorization::Static(token) => request.bearer_auth(token),
            Authorization::Refreshing(token) => request.bearer_auth(&token.value),
        };

        let response = ApiResponse::from_reqwest(request.send().await?).await?;
        debug!(status = response.status.as_u16(), bytes = response.body.len(), "response received");
        Ok(response)
    }

    fn calibrate(&self, response: &ApiResponse) {
        if self.calibrated.swap(true, Ordering::SeqCst) {
            return;
        }
        match self.calculator.calculate(Some(&response.headers)) {
            Ok(budget) => self.throttle.reset(budget),
            Err(e) => warn!(error = %e, "keeping default request budget"),
        }
    }
}
