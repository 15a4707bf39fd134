use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::domain::errors::{CollectorError, CollectorResult};
use crate::infrastructure::logging::SecretScrubber;

const ERROR_BODY_LIMIT: usize = 512;

/// A fully buffered HTTP response, handed to collector hooks
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub url: String,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub async fn from_reqwest(response: reqwest::Response) -> CollectorResult<Self> {
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().to_string();
        let body = response.bytes().await?.to_vec();
        Ok(Self {
            status,
            headers,
            url,
            body,
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json<T: DeserializeOwned>(&self) -> CollectorResult<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            CollectorError::Parse(format!(
                "{} from {}: {e}",
                std::any::type_name::<T>(),
                SecretScrubber::scrub(&self.url)
            ))
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Error for a status no hook classified; body scrubbed and truncated
    pub fn status_error(&self) -> CollectorError {
        CollectorError::HttpStatus {
            status: self.status.as_u16(),
            url: SecretScrubber::scrub(&self.url),
            body: SecretScrubber::scrub_truncated(&self.text(), ERROR_BODY_LIMIT),
        }
    }
}
