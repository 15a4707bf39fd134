//! Domain errors for the silt collection engine.

use thiserror::Error;

use super::models::CollectionParams;
use super::ports::errors::DatabaseError;

/// Errors raised while collecting data from a third-party API.
///
/// Record-level [`CollectorError::IgnoreAndContinue`] is swallowed by the
/// fetch executor; everything else aborts the run and is reported wrapped in
/// [`CollectorError::Run`] with the params of the failed collection.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Credential rejected by the provider, after at most one refresh-and-retry
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Malformed task options or collector arguments
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Non-success HTTP status that no hook classified
    #[error("HTTP {status} calling {url}: {body}")]
    HttpStatus {
        status: u16,
        url: String,
        body: String,
    },

    /// Network-level failure (connect, timeout, body read)
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Token refresh endpoint rejected the request
    #[error("Token refresh failed with HTTP {status}: {body}")]
    TokenRefresh { status: u16, body: String },

    /// URL template could not be rendered
    #[error("Template error: {0}")]
    Template(String),

    /// Persistence failure
    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),

    /// The caller cancelled the run
    #[error("Collection cancelled")]
    Cancelled,

    /// Record-level sentinel: skip this item and keep going
    #[error("ignore and continue")]
    IgnoreAndContinue,

    /// A run-level failure annotated with the collection it belongs to
    #[error("collection {params} failed: {source}")]
    Run {
        params: CollectionParams,
        #[source]
        source: Box<CollectorError>,
    },
}

impl CollectorError {
    /// Wrap this error with the params of the collection it aborted.
    ///
    /// Already-wrapped errors are returned unchanged.
    #[must_use]
    pub fn in_collection(self, params: &CollectionParams) -> Self {
        match self {
            Self::Run { .. } => self,
            other => Self::Run {
                params: params.clone(),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, looking through [`CollectorError::Run`].
    pub fn root(&self) -> &Self {
        match self {
            Self::Run { source, .. } => source.root(),
            other => other,
        }
    }

    /// True when the provider rejected the credential.
    pub fn is_auth(&self) -> bool {
        matches!(self.root(), Self::Auth(_))
    }

    /// True when the run was cancelled by the caller.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), Self::Cancelled)
    }

    /// True for failures worth retrying: transport errors, 429 and 5xx.
    pub fn is_transient(&self) -> bool {
        match self.root() {
            Self::Transport(_) => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for CollectorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<sqlx::Error> for CollectorError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(DatabaseError::QueryFailed(err))
    }
}

pub type CollectorResult<T> = Result<T, CollectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> CollectionParams {
        CollectionParams::new(1, "12345", "github_api_runs")
    }

    #[test]
    fn test_transient_classification() {
        let rate_limited = CollectorError::HttpStatus {
            status: 429,
            url: "u".into(),
            body: String::new(),
        };
        let not_found = CollectorError::HttpStatus {
            status: 404,
            url: "u".into(),
            body: String::new(),
        };
        assert!(rate_limited.is_transient());
        assert!(!not_found.is_transient());
        assert!(!CollectorError::Auth("bad".into()).is_transient());
    }

    #[test]
    fn test_run_wrapping_keeps_classification() {
        let err = CollectorError::Auth("expired".into()).in_collection(&params());
        assert!(err.is_auth());
        assert!(err.to_string().contains("github_api_runs"));

        let cancelled = CollectorError::Cancelled.in_collection(&params());
        assert!(cancelled.is_cancelled());
        assert!(!cancelled.is_auth());
    }

    #[test]
    fn test_wrapping_is_not_nested_twice() {
        let err = CollectorError::Cancelled
            .in_collection(&params())
            .in_collection(&CollectionParams::new(2, "other", "t"));
        match err {
            CollectorError::Run { params, source } => {
                assert_eq!(params.connection_id, 1);
                assert!(matches!(*source, CollectorError::Cancelled));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
