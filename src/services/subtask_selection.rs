use std::collections::HashSet;

use crate::domain::errors::{CollectorError, CollectorResult};
use crate::domain::models::{domain_type, SubtaskMeta};

/// Names of the subtasks to run for a scope requesting `entities`.
///
/// Only subtasks enabled by default whose domain types intersect the
/// requested ones are selected, in catalog order. No requested entities
/// means every domain type.
pub fn select_subtasks(catalog: &[SubtaskMeta], entities: &[String]) -> CollectorResult<Vec<String>> {
    let requested: HashSet<&str> = if entities.is_empty() {
        domain_type::ALL.into_iter().collect()
    } else {
        let mut requested = HashSet::new();
        for entity in entities {
            let entity = entity.trim();
            if !domain_type::ALL.contains(&entity) {
                return Err(CollectorError::Validation(format!(
                    "unknown domain type '{entity}', expected one of {}",
                    domain_type::ALL.join(", ")
                )));
            }
            requested.insert(entity);
        }
        requested
    };

    Ok(catalog
        .iter()
        .filter(|meta| meta.enabled_by_default)
        .filter(|meta| meta.domain_types.iter().any(|t| requested.contains(t.as_str())))
        .map(|meta| meta.name.clone())
        .collect())
}
