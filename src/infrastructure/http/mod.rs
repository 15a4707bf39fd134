//! HTTP plumbing for collectors
//!
//! - `ApiClient`: throttled, retrying GET with bearer credentials
//! - `RequestThrottle` / `RateLimitCalculator`: shared request budget
//! - `TokenProvider` / `OAuthTokenRefresher`: refreshing credentials
//! - `url_template`: `{a.b}` URL placeholders

pub mod client;
pub mod oauth;
pub mod rate_limiter;
pub mod response;
pub mod retry;
pub mod token_provider;
pub mod url_template;

pub use client::{ApiClient, Credentials, StaticTokens};
pub use oauth::OAuthTokenRefresher;
pub use rate_limiter::{MinTickGuard, RateBudget, RateLimitCalculator, RequestThrottle};
pub use response::ApiResponse;
pub use retry::RetryPolicy;
pub use token_provider::{AccessToken, TokenProvider};
