//! Async fetch executor.
//!
//! Drives one [`ApiCollectorArgs`] to completion: renders requests for every
//! input and page, sends them through the shared [`ApiClient`] (throttle,
//! credentials, retries), classifies and parses each response and persists
//! the records as raw rows. A bounded semaphore caps requests in flight
//! across all inputs and pages of the run.
//!
//! Ordering: records of one page are stored in response order, pages of one
//! input are stored in page order. Nothing is guaranteed across inputs.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::header::HeaderMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::collector_args::{ApiCollectorArgs, Pagination, ParsedPage};
use crate::domain::errors::{CollectorError, CollectorResult};
use crate::domain::models::{CollectorConfig, Pager, RawMessage, RawRecord, RequestData, RunPlan};
use crate::domain::ports::{InputIterator, RawDataStore};
use crate::infrastructure::http::{url_template, ApiClient, ApiResponse};

/// Counters of one executor run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectSummary {
    /// Requests that produced a response handed to hooks
    pub requests: usize,
    /// Pages parsed and stored
    pub pages: usize,
    /// Raw rows written
    pub records: usize,
    /// Responses skipped through `IgnoreAndContinue`
    pub ignored: usize,
    /// Records dropped because their author is on the exclude list
    pub excluded: usize,
}

impl CollectSummary {
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            requests: self.requests + other.requests,
            pages: self.pages + other.pages,
            records: self.records + other.records,
            ignored: self.ignored + other.ignored,
            excluded: self.excluded + other.excluded,
        }
    }
}

struct FetchedPage {
    data: RequestData,
    url: String,
    response: ApiResponse,
    page: ParsedPage,
}

enum Fetched {
    Page(FetchedPage),
    Ignored,
}

impl Fetched {
    fn finished(&self) -> bool {
        match self {
            Self::Page(fetched) => fetched.page.finished,
            Self::Ignored => false,
        }
    }

    /// True when no page after this one can hold records.
    fn exhausts(&self, page_size: usize) -> bool {
        match self {
            Self::Page(fetched) => fetched.page.finished || fetched.page.items.len() < page_size,
            Self::Ignored => true,
        }
    }
}

/// Bounded pool of concurrent requests writing into raw storage.
pub struct FetchExecutor {
    client: Arc<ApiClient>,
    store: Arc<dyn RawDataStore>,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    cancel: CancellationToken,
    users: CollectorConfig,
}

impl FetchExecutor {
    pub fn new(
        client: Arc<ApiClient>,
        store: Arc<dyn RawDataStore>,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            client,
            store,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            cancel,
            users: CollectorConfig::default(),
        }
    }

    /// Exclude list applied to records of args with an author field
    #[must_use]
    pub fn with_user_filter(mut self, users: CollectorConfig) -> Self {
        self.users = users;
        self
    }

    pub const fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub fn store(&self) -> &Arc<dyn RawDataStore> {
        &self.store
    }

    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Collect every input (or a single input-less request chain).
    ///
    /// The first error that is not `IgnoreAndContinue` aborts the run and
    /// drops all outstanding requests. Cancellation surfaces as
    /// [`CollectorError::Cancelled`].
    #[instrument(
        skip_all,
        fields(
            connection_id = args.params.connection_id,
            scope_id = %args.params.scope_id,
            table = %args.params.table,
            pagination = ?args.pagination,
        )
    )]
    pub async fn run(
        &self,
        args: &ApiCollectorArgs,
        plan: &RunPlan,
        inputs: Option<Box<dyn InputIterator>>,
    ) -> CollectorResult<CollectSummary> {
        args.validate()?;
        if self.cancel.is_cancelled() {
            return Err(CollectorError::Cancelled);
        }
        let _min_tick = args
            .min_tick_interval
            .map(|tick| self.client.throttle().slow_down(tick));

        let summary = tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(CollectorError::Cancelled),
            result = self.execute(args, plan, inputs) => result,
        }?;

        info!(
            requests = summary.requests,
            pages = summary.pages,
            records = summary.records,
            ignored = summary.ignored,
            excluded = summary.excluded,
            "fetch finished"
        );
        Ok(summary)
    }

    async fn execute(
        &self,
        args: &ApiCollectorArgs,
        plan: &RunPlan,
        inputs: Option<Box<dyn InputIterator>>,
    ) -> CollectorResult<CollectSummary> {
        let Some(inputs) = inputs else {
            return self.collect_input(args, plan, None).await;
        };

        let inputs = stream::unfold(Some(inputs), |iterator| async move {
            let mut iterator = iterator?;
            match iterator.next().await {
                Ok(Some(input)) => Some((Ok(input), Some(iterator))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        });

        inputs
            .map(|input: CollectorResult<Value>| async move {
                self.collect_input(args, plan, Some(input?)).await
            })
            .buffer_unordered(self.concurrency)
            .try_fold(CollectSummary::default(), |total, summary| async move {
                Ok(total.merge(summary))
            })
            .await
    }

    async fn collect_input(
        &self,
        args: &ApiCollectorArgs,
        plan: &RunPlan,
        input: Option<Value>,
    ) -> CollectorResult<CollectSummary> {
        let mut summary = CollectSummary::default();
        let base = RequestData::new(
            Pager::first(args.page_size),
            args.template_context_params(),
            input,
        );

        match &args.pagination {
            Pagination::Single => {
                let fetched = self.fetch(args, plan, base).await?;
                self.store_page(args, fetched, &mut summary).await?;
            }
            Pagination::Determined { total_pages } => {
                let first = self.fetch(args, plan, base.clone()).await?;
                let total = match &first {
                    Fetched::Page(fetched) => total_pages(&fetched.response, args.page_size)?,
                    Fetched::Ignored => 0,
                };
                let finished = first.finished();
                self.store_page(args, first, &mut summary).await?;
                debug!(total_pages = total, "page count determined");

                if !finished && total > 1 {
                    let mut pages = stream::iter(2..=total)
                        .map(|page| self.fetch(args, plan, base.for_page(page)))
                        .buffered(args.concurrency);
                    while let Some(fetched) = pages.try_next().await? {
                        let finished = fetched.finished();
                        self.store_page(args, fetched, &mut summary).await?;
                        if finished {
                            break;
                        }
                    }
                }
            }
            Pagination::Undetermined => {
                // Pages are consumed in order; once a page exhausts the listing
                // no further request starts, so at most `concurrency - 1`
                // pages beyond it were issued.
                let mut pages = stream::iter(1..)
                    .map(|page| self.fetch(args, plan, base.for_page(page)))
                    .buffered(args.concurrency);
                while let Some(fetched) = pages.try_next().await? {
                    let exhausted = fetched.exhausts(args.page_size);
                    self.store_page(args, fetched, &mut summary).await?;
                    if exhausted {
                        break;
                    }
                }
            }
            Pagination::Sequential { next_page } => {
                let mut data = base;
                loop {
                    let fetched = self.fetch(args, plan, data.clone()).await?;
                    let cursor = match &fetched {
                        Fetched::Page(page) if !page.page.finished => {
                            next_page(&page.data, &page.response)?
                        }
                        _ => None,
                    };
                    self.store_page(args, fetched, &mut summary).await?;
                    let Some(cursor) = cursor else { break };
                    data.pager = data.pager.advance(1);
                    data.custom_data = Some(cursor);
                }
            }
        }
        Ok(summary)
    }

    async fn fetch(
        &self,
        args: &ApiCollectorArgs,
        plan: &RunPlan,
        data: RequestData,
    ) -> CollectorResult<Fetched> {
        let path = url_template::render(&args.url_template, &data.template_context())?;
        let query = match &args.query {
            Some(build) => build(&data, plan)?,
            None => Vec::new(),
        };
        let headers = match &args.headers {
            Some(build) => build(&data)?,
            None => HeaderMap::new(),
        };

        let response = {
            let _permit = self
                .semaphore
                .acquire()
                .await
                .map_err(|_| CollectorError::Cancelled)?;
            self.client.get(&path, &query, &headers).await?
        };

        match (args.after_response)(&response) {
            Ok(()) => {}
            Err(CollectorError::IgnoreAndContinue) => {
                debug!(
                    status = response.status.as_u16(),
                    page = data.pager.page,
                    "response ignored"
                );
                return Ok(Fetched::Ignored);
            }
            Err(e) => return Err(e),
        }

        let page = (args.parser)(&response)?;
        Ok(Fetched::Page(FetchedPage {
            url: self.client.url(&path),
            data,
            response,
            page,
        }))
    }

    async fn store_page(
        &self,
        args: &ApiCollectorArgs,
        fetched: Fetched,
        summary: &mut CollectSummary,
    ) -> CollectorResult<()> {
        summary.requests += 1;
        let FetchedPage { data, url, page, .. } = match fetched {
            Fetched::Page(fetched) => fetched,
            Fetched::Ignored => {
                summary.ignored += 1;
                return Ok(());
            }
        };
        summary.pages += 1;
        if page.items.is_empty() {
            return Ok(());
        }

        let input = data.input_json();
        let mut records = Vec::with_capacity(page.items.len());
        for item in &page.items {
            if self.is_excluded(args, item)? {
                summary.excluded += 1;
                continue;
            }
            records.push(RawRecord::new(
                args.params.clone(),
                item,
                url.as_str(),
                input.as_deref(),
            ));
        }
        if records.is_empty() {
            return Ok(());
        }
        summary.records += self
            .store
            .save(&args.params, &records, args.write_mode)
            .await?;
        debug!(page = data.pager.page, records = records.len(), "page stored");
        Ok(())
    }

    fn is_excluded(&self, args: &ApiCollectorArgs, item: &RawMessage) -> CollectorResult<bool> {
        let Some(pointer) = &args.author_field else {
            return Ok(false);
        };
        if self.users.excluded_usernames.is_empty() {
            return Ok(false);
        }
        let record: Value = serde_json::from_str(item.get())?;
        Ok(record
            .pointer(pointer)
            .and_then(Value::as_str)
            .is_some_and(|author| self.users.is_excluded_user(author)))
    }
}
