use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::CollectorError;

/// Immutable key identifying one collection run: connection, scope and raw table.
///
/// Used as the partition key of raw rows and as the key of the persisted
/// [`SyncState`](super::SyncState).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionParams {
    pub connection_id: u64,
    pub scope_id: String,
    /// Raw table name without the `_raw_` prefix, e.g. `github_api_runs`
    pub table: String,
}

impl CollectionParams {
    pub fn new(connection_id: u64, scope_id: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            connection_id,
            scope_id: scope_id.into(),
            table: table.into(),
        }
    }

    /// Canonical JSON string stored in the `params` column.
    ///
    /// The table is excluded since it is already the row's table.
    pub fn key(&self) -> String {
        format!(
            r#"{{"connectionId":{},"scopeId":{}}}"#,
            self.connection_id,
            serde_json::Value::String(self.scope_id.clone())
        )
    }

    /// Physical table holding raw rows for these params.
    pub fn raw_table(&self) -> String {
        format!("_raw_{}", self.table)
    }

    /// Reject params that cannot identify a collection.
    pub fn validate(&self) -> Result<(), CollectorError> {
        if self.connection_id == 0 {
            return Err(CollectorError::Validation(
                "connection id is required".to_string(),
            ));
        }
        if self.scope_id.trim().is_empty() {
            return Err(CollectorError::Validation(
                "scope id is required".to_string(),
            ));
        }
        if self.table.is_empty()
            || !self
                .table
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(CollectorError::Validation(format!(
                "invalid raw table name '{}': use lowercase letters, digits and underscores",
                self.table
            )));
        }
        Ok(())
    }
}

impl fmt::Display for CollectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.table, self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_stable_json() {
        let params = CollectionParams::new(1, "12345", "github_api_runs");
        assert_eq!(params.key(), r#"{"connectionId":1,"scopeId":"12345"}"#);
        let parsed: serde_json::Value = serde_json::from_str(&params.key()).unwrap();
        assert_eq!(parsed["scopeId"], "12345");
    }

    #[test]
    fn test_key_escapes_scope_names() {
        let params = CollectionParams::new(3, r#"org/"quoted""#, "t");
        let parsed: serde_json::Value = serde_json::from_str(&params.key()).unwrap();
        assert_eq!(parsed["scopeId"], r#"org/"quoted""#);
    }

    #[test]
    fn test_validate() {
        assert!(CollectionParams::new(1, "a", "github_api_runs").validate().is_ok());
        assert!(CollectionParams::new(0, "a", "t").validate().is_err());
        assert!(CollectionParams::new(1, " ", "t").validate().is_err());
        assert!(CollectionParams::new(1, "a", "drop table;").validate().is_err());
        assert!(CollectionParams::new(1, "a", "").validate().is_err());
    }

    #[test]
    fn test_raw_table_prefix() {
        let params = CollectionParams::new(1, "a", "pagerduty_incidents");
        assert_eq!(params.raw_table(), "_raw_pagerduty_incidents");
    }
}
