use serde_json::Value;

use crate::domain::errors::{CollectorError, CollectorResult};
use crate::domain::models::CollectOptions;

/// Decode and validate the options of a collection task.
///
/// Runs before any network I/O so malformed options fail fast.
pub fn decode_task_options(options: Value) -> CollectorResult<CollectOptions> {
    let options: CollectOptions = serde_json::from_value(options)
        .map_err(|e| CollectorError::Validation(format!("invalid task options: {e}")))?;

    if options.connection_id == 0 {
        return Err(CollectorError::Validation(
            "connectionId is required".to_string(),
        ));
    }
    if options.scope_id.trim().is_empty() {
        return Err(CollectorError::Validation("scopeId is required".to_string()));
    }
    Ok(options)
}
