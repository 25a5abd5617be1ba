use std::{collections::HashMap, sync::Arc};

use itertools::Itertools;
use serde_json::json;
use tracing::{debug, warn};

use crate::{
    store::{BulkResponse, StoreClient},
    AccountRecord, Address, Error,
};

/// Upper bound of documents per bulk request.
pub const WRITE_BATCH_SIZE: usize = 2000;

// failures kept in the report for inspection; the count is always complete
const MAX_REPORTED_FAILURES: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub id: Option<String>,
    pub kind: String,
    pub reason: String,
}

/// Outcome of writing records whose bulk requests all went through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub batches: usize,
    pub indexed: usize,
    pub failed: usize,
    pub failures: Vec<ItemFailure>,
}

impl BulkReport {
    pub fn total(&self) -> usize {
        self.indexed + self.failed
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    fn record_failure(&mut self, id: Option<String>, kind: String, reason: String) {
        self.failed += 1;

        if self.failures.len() < MAX_REPORTED_FAILURES {
            self.failures.push(ItemFailure { id, kind, reason });
        }
    }

    /// Folds the response of a bulk request carrying `sent` documents.
    ///
    /// An item fails when it carries a typed error or a non-success status.
    /// Documents the response has no item for are failures as well.
    fn absorb(&mut self, sent: usize, response: BulkResponse) {
        let before = self.failed;
        let mut answered = 0;

        for status in response.items.iter().flat_map(|item| item.values()) {
            answered += 1;

            if let Some(error) = status.failure() {
                self.record_failure(status.id.clone(), error.kind.clone(), error.reason.clone());
            } else if status.status >= 300 {
                self.record_failure(
                    status.id.clone(),
                    format!("status_{}", status.status),
                    format!("item answered {}", status.status),
                );
            }
        }

        let missing = sent.saturating_sub(answered);

        if missing > 0 {
            warn!(sent, answered, "bulk response is missing items");
        }

        for _ in 0..missing {
            self.record_failure(None, "missing_item".into(), "no item in bulk response".into());
        }

        let failed = self.failed - before;

        if response.errors && failed == 0 {
            warn!("bulk response flagged errors without failed items");
        }

        self.batches += 1;
        self.indexed += sent.saturating_sub(failed);
    }

    /// Adds up the outcome of another write.
    pub fn extend(&mut self, other: BulkReport) {
        self.batches += other.batches;
        self.indexed += other.indexed;
        self.failed += other.failed;

        let room = MAX_REPORTED_FAILURES.saturating_sub(self.failures.len());
        self.failures.extend(other.failures.into_iter().take(room));
    }
}

/// Encodes one action line and one document line per record.
pub fn encode_bulk<'a>(
    records: impl IntoIterator<Item = (&'a Address, &'a AccountRecord)>,
) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();

    for (address, record) in records {
        serde_json::to_writer(&mut buf, &json!({ "index": { "_id": address } }))?;
        buf.push(b'\n');
        serde_json::to_writer(&mut buf, record)?;
        buf.push(b'\n');
    }

    Ok(buf)
}

/// Writes account records into an index with bulk requests.
pub struct BulkIndexer<S> {
    store: Arc<S>,
    batch_size: usize,
}

impl<S: StoreClient> BulkIndexer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            batch_size: WRITE_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Writes every record into `index`.
    ///
    /// A failing request aborts the write with an error. Items the store
    /// rejected inside a successful request are counted in the report.
    pub async fn index_accounts(
        &self,
        records: &HashMap<Address, AccountRecord>,
        index: &str,
    ) -> Result<BulkReport, Error> {
        let mut report = BulkReport::default();

        let sorted: Vec<_> = records.iter().sorted_by(|a, b| a.0.cmp(b.0)).collect();

        for batch in sorted.chunks(self.batch_size) {
            let payload = encode_bulk(batch.iter().copied())?;

            let body = self.store.bulk_write(payload, index).await?;
            let response: BulkResponse = serde_json::from_slice(&body)?;

            report.absorb(batch.len(), response);

            debug!(batch = report.batches, size = batch.len(), failed = report.failed, "wrote batch");
        }

        if !report.is_clean() {
            warn!(
                failed = report.failed,
                total = report.total(),
                first = ?report.failures.first(),
                "bulk write reported item failures"
            );
        }

        Ok(report)
    }
}
