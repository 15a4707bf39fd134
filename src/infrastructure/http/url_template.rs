use serde_json::Value;

use crate::domain::errors::{CollectorError, CollectorResult};

/// Render `{a.b.c}` placeholders from a JSON context.
///
/// Strings are inserted verbatim, numbers and booleans via `Display`.
/// A missing or null value is an error rather than an empty segment.
pub fn render(template: &str, context: &Value) -> CollectorResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| {
            CollectorError::Template(format!("unclosed placeholder in '{template}'"))
        })?;
        let path = after[..close].trim();
        out.push_str(&lookup(path, context, template)?);
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn lookup(path: &str, context: &Value, template: &str) -> CollectorResult<String> {
    if path.is_empty() {
        return Err(CollectorError::Template(format!(
            "empty placeholder in '{template}'"
        )));
    }
    let value = path
        .split('.')
        .try_fold(context, |value, key| match value {
            Value::Object(map) => map.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        });

    match value {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(Value::Null) | None => Err(CollectorError::Template(format!(
            "no value for '{{{path}}}' in '{template}'"
        ))),
        Some(other) => Err(CollectorError::Template(format!(
            "'{{{path}}}' is not a scalar: {other}"
        ))),
    }
}
