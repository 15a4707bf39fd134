use chrono::{DateTime, Utc};
use serde_json::value::RawValue;

use super::CollectionParams;

/// Verbatim JSON of one logical record, as returned by the provider.
pub type RawMessage = Box<RawValue>;

/// An unprocessed payload captured from a source API.
///
/// `input` keeps the record that drove a detail fetch (for example the
/// list-phase JSON of an issue) so extractors can recover context without
/// querying again.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub id: Option<i64>,
    pub params: CollectionParams,
    pub data: Vec<u8>,
    pub url: String,
    pub input: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
}

impl RawRecord {
    pub fn new(
        params: CollectionParams,
        data: &RawValue,
        url: impl Into<String>,
        input: Option<&[u8]>,
    ) -> Self {
        Self {
            id: None,
            params,
            data: data.get().as_bytes().to_vec(),
            url: url.into(),
            input: input.map(<[u8]>::to_vec),
            created_at: Utc::now(),
        }
    }

    /// Decode the payload into a concrete type.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.data)
    }
}

/// How a batch of raw rows is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Append rows; list pages never overwrite earlier rows
    Append,
    /// Replace rows with the same params and url; used when re-polling details
    ReplaceByUrl,
}
