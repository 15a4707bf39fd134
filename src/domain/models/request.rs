use serde::Serialize;
use serde_json::Value;

/// Pagination of one request: 1-based page, page size and row offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pager {
    pub page: usize,
    pub size: usize,
    pub skip: usize,
}

impl Pager {
    pub const fn first(size: usize) -> Self {
        Self {
            page: 1,
            size,
            skip: 0,
        }
    }

    pub const fn nth(page: usize, size: usize) -> Self {
        Self {
            page,
            size,
            skip: size * page.saturating_sub(1),
        }
    }

    /// Advance by `step` pages.
    #[must_use]
    pub const fn advance(self, step: usize) -> Self {
        Self::nth(self.page + step, self.size)
    }
}

/// Everything a URL template, query builder or header builder may read.
#[derive(Debug, Clone, Serialize)]
pub struct RequestData {
    pub pager: Pager,
    /// Collection params as JSON (`connectionId`, `scopeId`, plus extras)
    pub params: Value,
    /// Driving record of a detail fetch
    pub input: Option<Value>,
    /// Cursor returned by the previous page for sequential pagination
    pub custom_data: Option<Value>,
}

impl RequestData {
    pub fn new(pager: Pager, params: Value, input: Option<Value>) -> Self {
        Self {
            pager,
            params,
            input,
            custom_data: None,
        }
    }

    /// Same request for another page.
    #[must_use]
    pub fn for_page(&self, page: usize) -> Self {
        Self {
            pager: Pager::nth(page, self.pager.size),
            ..self.clone()
        }
    }

    /// Serialized input stored alongside raw rows.
    pub fn input_json(&self) -> Option<Vec<u8>> {
        self.input
            .as_ref()
            .and_then(|input| serde_json::to_vec(input).ok())
    }

    /// Template context: `{params.*}`, `{input.*}`, `{pager.*}`, `{custom.*}`.
    pub fn template_context(&self) -> Value {
        serde_json::json!({
            "params": self.params,
            "input": self.input,
            "pager": self.pager,
            "custom": self.custom_data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pager_offsets() {
        let pager = Pager::first(30);
        assert_eq!(pager.skip, 0);
        let third = pager.advance(2);
        assert_eq!(third.page, 3);
        assert_eq!(third.skip, 60);
        assert_eq!(Pager::nth(1, 50).skip, 0);
    }

    #[test]
    fn test_template_context_shape() {
        let data = RequestData::new(
            Pager::first(10),
            serde_json::json!({"name": "org/repo"}),
            Some(serde_json::json!({"id": 42})),
        );
        let ctx = data.template_context();
        assert_eq!(ctx["params"]["name"], "org/repo");
        assert_eq!(ctx["input"]["id"], 42);
        assert_eq!(ctx["pager"]["page"], 1);
        assert_eq!(data.input_json().unwrap(), br#"{"id":42}"#);
    }
}
