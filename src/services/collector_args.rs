//! Arguments of one API collection: URL template, pagination strategy and
//! the hooks that build requests and classify responses.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::value::RawValue;
use serde_json::{Map, Value};

use crate::domain::errors::{CollectorError, CollectorResult};
use crate::domain::models::{CollectionParams, RawMessage, RequestData, RunPlan, WriteMode};
use crate::infrastructure::http::ApiResponse;

/// Reads the last page number from the first response.
pub type TotalPagesFn = Arc<dyn Fn(&ApiResponse, usize) -> CollectorResult<usize> + Send + Sync>;
/// Computes the cursor of the next page, `None` when there is none.
pub type NextPageFn =
    Arc<dyn Fn(&RequestData, &ApiResponse) -> CollectorResult<Option<Value>> + Send + Sync>;
pub type QueryFn =
    Arc<dyn Fn(&RequestData, &RunPlan) -> CollectorResult<Vec<(String, String)>> + Send + Sync>;
pub type HeaderFn = Arc<dyn Fn(&RequestData) -> CollectorResult<HeaderMap> + Send + Sync>;
pub type ParserFn = Arc<dyn Fn(&ApiResponse) -> CollectorResult<ParsedPage> + Send + Sync>;
/// Classifies a response before parsing; `IgnoreAndContinue` skips it.
pub type AfterResponseFn = Arc<dyn Fn(&ApiResponse) -> CollectorResult<()> + Send + Sync>;

/// Logical records split out of one response.
#[derive(Debug, Default)]
pub struct ParsedPage {
    pub items: Vec<RawMessage>,
    /// No further page should be requested
    pub finished: bool,
}

impl ParsedPage {
    pub const fn new(items: Vec<RawMessage>) -> Self {
        Self {
            items,
            finished: false,
        }
    }

    /// Body is a JSON array of records.
    pub fn from_array(response: &ApiResponse) -> CollectorResult<Self> {
        Ok(Self::new(response.json::<Vec<RawMessage>>()?))
    }

    /// Body is an object whose `field` holds the array of records.
    pub fn from_field(response: &ApiResponse, field: &str) -> CollectorResult<Self> {
        let mut object: HashMap<String, RawMessage> = response.json()?;
        let Some(items) = object.remove(field) else {
            return Err(CollectorError::Parse(format!(
                "response has no '{field}' field"
            )));
        };
        Ok(Self::new(serde_json::from_str(items.get())?))
    }

    /// Body is one record.
    pub fn single(response: &ApiResponse) -> CollectorResult<Self> {
        let item: RawMessage = response.json()?;
        Ok(Self::new(vec![item]))
    }
}

/// How pages of one input are discovered.
#[derive(Clone)]
pub enum Pagination {
    /// One request per input
    Single,
    /// First page, then pages `2..=total` concurrently
    Determined { total_pages: TotalPagesFn },
    /// Pages `1, 2, …` in order with up to `concurrency` in flight, until a
    /// short or finished page
    Undetermined,
    /// Each page carries the cursor of the next one
    Sequential { next_page: NextPageFn },
}

impl std::fmt::Debug for Pagination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Single => "Single",
            Self::Determined { .. } => "Determined",
            Self::Undetermined => "Undetermined",
            Self::Sequential { .. } => "Sequential",
        })
    }
}

/// Everything the fetch executor needs to collect one raw table.
#[derive(Clone)]
pub struct ApiCollectorArgs {
    pub params: CollectionParams,
    /// Extra `{params.*}` template values besides `connectionId`/`scopeId`
    pub template_params: Map<String, Value>,
    pub url_template: String,
    pub page_size: usize,
    pub pagination: Pagination,
    pub query: Option<QueryFn>,
    pub headers: Option<HeaderFn>,
    pub parser: ParserFn,
    pub after_response: AfterResponseFn,
    /// Slow the shared throttle down to at least this interval for the run
    pub min_tick_interval: Option<Duration>,
    /// Pages in flight per input
    pub concurrency: usize,
    pub write_mode: WriteMode,
    /// JSON pointer to the record's author login, checked against the
    /// configured exclude list
    pub author_field: Option<String>,
}

impl ApiCollectorArgs {
    pub fn new(
        params: CollectionParams,
        url_template: impl Into<String>,
        parser: impl Fn(&ApiResponse) -> CollectorResult<ParsedPage> + Send + Sync + 'static,
    ) -> Self {
        Self {
            params,
            template_params: Map::new(),
            url_template: url_template.into(),
            page_size: 100,
            pagination: Pagination::Single,
            query: None,
            headers: None,
            parser: Arc::new(parser),
            after_response: Arc::new(default_after_response),
            min_tick_interval: None,
            concurrency: 1,
            write_mode: WriteMode::Append,
            author_field: None,
        }
    }

    pub fn template_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.template_params.insert(key.into(), value.into());
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    pub fn pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn determined(
        self,
        total_pages: impl Fn(&ApiResponse, usize) -> CollectorResult<usize> + Send + Sync + 'static,
    ) -> Self {
        self.pagination(Pagination::Determined {
            total_pages: Arc::new(total_pages),
        })
    }

    pub fn undetermined(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self.pagination(Pagination::Undetermined)
    }

    pub fn sequential(
        self,
        next_page: impl Fn(&RequestData, &ApiResponse) -> CollectorResult<Option<Value>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.pagination(Pagination::Sequential {
            next_page: Arc::new(next_page),
        })
    }

    pub fn query(
        mut self,
        query: impl Fn(&RequestData, &RunPlan) -> CollectorResult<Vec<(String, String)>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.query = Some(Arc::new(query));
        self
    }

    pub fn headers(
        mut self,
        headers: impl Fn(&RequestData) -> CollectorResult<HeaderMap> + Send + Sync + 'static,
    ) -> Self {
        self.headers = Some(Arc::new(headers));
        self
    }

    pub fn after_response(
        mut self,
        hook: impl Fn(&ApiResponse) -> CollectorResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.after_response = Arc::new(hook);
        self
    }

    pub fn min_tick_interval(mut self, interval: Duration) -> Self {
        self.min_tick_interval = Some(interval);
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }

    /// Drop records whose author (at JSON `pointer`, e.g. `/user/login`)
    /// is an excluded username.
    pub fn skip_excluded_authors(mut self, pointer: impl Into<String>) -> Self {
        self.author_field = Some(pointer.into());
        self
    }

    /// `{params.*}` values: connection and scope ids plus the extras.
    pub fn template_context_params(&self) -> Value {
        let mut params = self.template_params.clone();
        params.insert("connectionId".into(), self.params.connection_id.into());
        params.insert("scopeId".into(), self.params.scope_id.clone().into());
        Value::Object(params)
    }

    pub fn validate(&self) -> CollectorResult<()> {
        self.params.validate()?;
        if self.url_template.trim().is_empty() {
            return Err(CollectorError::Validation(
                "url template is required".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(CollectorError::Validation(
                "page size must be positive".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(CollectorError::Validation(
                "concurrency must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ApiCollectorArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCollectorArgs")
            .field("params", &self.params)
            .field("url_template", &self.url_template)
            .field("page_size", &self.page_size)
            .field("pagination", &self.pagination)
            .field("concurrency", &self.concurrency)
            .field("write_mode", &self.write_mode)
            .finish_non_exhaustive()
    }
}

/// 401 is an auth failure, any other error status fails the run.
pub fn default_after_response(response: &ApiResponse) -> CollectorResult<()> {
    if response.status == StatusCode::UNAUTHORIZED {
        return Err(CollectorError::Auth(format!(
            "credential rejected by {}",
            response.url
        )));
    }
    if response.status.is_client_error() || response.status.is_server_error() {
        return Err(response.status_error());
    }
    Ok(())
}

/// Hook for best-effort endpoints: the listed statuses skip the item.
pub fn ignore_status(
    statuses: &'static [u16],
) -> impl Fn(&ApiResponse) -> CollectorResult<()> + Send + Sync + 'static {
    move |response: &ApiResponse| {
        if statuses.contains(&response.status.as_u16()) {
            return Err(CollectorError::IgnoreAndContinue);
        }
        default_after_response(response)
    }
}

static LAST_PAGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<[^>]*[?&]page=(\d+)[^>]*>;\s*rel="last""#).expect("link header pattern")
});

/// Last page from a `Link` header, 1 when the header has no `rel="last"`.
pub fn parse_link_last_page(response: &ApiResponse) -> CollectorResult<usize> {
    let Some(link) = response.header("link") else {
        return Ok(1);
    };
    LAST_PAGE_PATTERN
        .captures(link)
        .map_or(Ok(1), |captures| {
            captures[1]
                .parse()
                .map_err(|e| CollectorError::Parse(format!("bad last page in Link header: {e}")))
        })
}

/// Pages needed for `total` records of `page_size`.
pub const fn total_pages_from_count(total: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size)
}

/// Top-level `field` of a raw record, `None` when absent.
pub fn raw_field(record: &RawValue, field: &str) -> CollectorResult<Option<Value>> {
    let mut object: Map<String, Value> = serde_json::from_str(record.get())?;
    Ok(object.remove(field))
}
