//! Input iterators driving detail collection.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

use crate::domain::errors::CollectorResult;
use crate::domain::models::CollectionParams;
use crate::domain::ports::{InputIterator, RawDataStore};

const DEFAULT_BATCH_SIZE: u32 = 500;

/// Fixed list of inputs.
#[derive(Debug, Default)]
pub struct VecInputIterator {
    inputs: VecDeque<Value>,
}

impl VecInputIterator {
    pub fn new(inputs: impl IntoIterator<Item = Value>) -> Self {
        Self {
            inputs: inputs.into_iter().collect(),
        }
    }
}

#[async_trait]
impl InputIterator for VecInputIterator {
    async fn next(&mut self) -> CollectorResult<Option<Value>> {
        Ok(self.inputs.pop_front())
    }
}

type Predicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;
type KeyFn<T> = Box<dyn Fn(&T) -> String + Send + Sync>;

/// Stored records of one collection whose state may still change.
///
/// On the first call the iterator snapshots the raw table by id cursor, so
/// rows written while it is consumed (detail refetches into the same table)
/// are not read back. Rows are decoded into `T` and grouped by `key`; only
/// the newest row per key is judged by `is_finalized`. List rows and detail
/// rows share one table, so a record whose latest copy is finalized is no
/// longer yielded even if older copies are still open.
pub struct UnfinalizedRecordIterator<T> {
    store: Arc<dyn RawDataStore>,
    params: CollectionParams,
    batch_size: u32,
    key: KeyFn<T>,
    is_finalized: Predicate<T>,
    pending: Option<VecDeque<Value>>,
    _record: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> UnfinalizedRecordIterator<T> {
    pub fn new(
        store: Arc<dyn RawDataStore>,
        params: CollectionParams,
        key: impl Fn(&T) -> String + Send + Sync + 'static,
        is_finalized: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            store,
            params,
            batch_size: DEFAULT_BATCH_SIZE,
            key: Box::new(key),
            is_finalized: Box::new(is_finalized),
            pending: None,
            _record: PhantomData,
        }
    }

    #[must_use]
    pub fn batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    async fn snapshot(&self) -> CollectorResult<VecDeque<Value>> {
        let mut cursor = 0;
        let mut order: Vec<(i64, String)> = Vec::new();
        let mut latest: HashMap<String, (i64, Value, bool)> = HashMap::new();
        let mut scanned = 0usize;

        loop {
            let batch = self
                .store
                .list_after(&self.params, cursor, self.batch_size)
                .await?;
            let fetched = batch.len();
            for record in batch {
                let row_id = record.id.unwrap_or(cursor);
                cursor = cursor.max(row_id);
                scanned += 1;

                let decoded: T = record.decode()?;
                let value: Value = record.decode()?;
                let finalized = (self.is_finalized)(&decoded);
                let key = (self.key)(&decoded);
                if !latest.contains_key(&key) {
                    order.push((row_id, key.clone()));
                }
                latest.insert(key, (row_id, value, finalized));
            }
            if fetched < self.batch_size as usize {
                break;
            }
        }

        let mut open: Vec<(i64, Value)> = order
            .into_iter()
            .filter_map(|(_, key)| latest.remove(&key))
            .filter(|(_, _, finalized)| !finalized)
            .map(|(row_id, value, _)| (row_id, value))
            .collect();
        open.sort_by_key(|(row_id, _)| *row_id);

        debug!(
            params = %self.params,
            scanned,
            unfinalized = open.len(),
            "unfinalized records loaded"
        );
        Ok(open.into_iter().map(|(_, value)| value).collect())
    }
}

#[async_trait]
impl<T: DeserializeOwned> InputIterator for UnfinalizedRecordIterator<T> {
    async fn next(&mut self) -> CollectorResult<Option<Value>> {
        if self.pending.is_none() {
            self.pending = Some(self.snapshot().await?);
        }
        Ok(self.pending.as_mut().and_then(VecDeque::pop_front))
    }
}
