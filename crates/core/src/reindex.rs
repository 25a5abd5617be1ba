//! Copies an accounts index into another store, refreshing the stake block
//! of every document on the way.
//!
//! The source index is read page by page through a scroll. Each page is
//! merged with the computed stake and bulk written into the destination
//! before the next page is requested. Accounts with stake that the source
//! never had are written once the scroll is exhausted.

use std::{collections::HashMap, sync::Arc};

use tracing::{debug, info, instrument, warn};

use crate::{
    indexer::{BulkIndexer, BulkReport, WRITE_BATCH_SIZE},
    merge::merge,
    store::{ScrollResponse, SearchHit, StoreClient},
    AccountRecord, Address, CancelToken, Error, StakeAttributes, StakeField, StakeMap,
};

/// Documents fetched per scroll page.
pub const SCROLL_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReindexReport {
    /// Non-empty scroll pages read from the source.
    pub pages: usize,

    /// Documents read from the source.
    pub scanned: usize,

    /// Accounts with stake but no document in the source.
    pub created: usize,

    pub bulk: BulkReport,
}

/// Records to write for one page of source documents.
///
/// Documents of accounts with computed stake are merged with it, which takes
/// the account out of `computed`. The others keep their fields minus any
/// stake keys, so stake that disappeared upstream is dropped.
pub fn refresh_page(hits: Vec<SearchHit>, computed: &mut StakeMap) -> HashMap<Address, AccountRecord> {
    let mut records = HashMap::with_capacity(hits.len());
    let mut stored = HashMap::new();
    let mut stake = StakeMap::new();

    for hit in hits {
        let mut fields = hit.source.unwrap_or_default();

        match computed.remove(&hit.id) {
            Some(attributes) => {
                stake.insert(hit.id.clone(), attributes);
                stored.insert(hit.id, fields);
            }
            None => {
                fields.retain(|key, _| !StakeField::owns_key(key));
                records.insert(hit.id, AccountRecord::new(fields, StakeAttributes::new()));
            }
        }
    }

    records.extend(merge(stored, stake));
    records
}

pub struct Reindexer<S, D> {
    source: Arc<S>,
    destination: Arc<D>,
    page_size: usize,
    write_batch_size: usize,
}

impl<S: StoreClient, D: StoreClient> Reindexer<S, D> {
    pub fn new(source: Arc<S>, destination: Arc<D>) -> Self {
        Self {
            source,
            destination,
            page_size: SCROLL_PAGE_SIZE,
            write_batch_size: WRITE_BATCH_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_write_batch_size(mut self, batch_size: usize) -> Self {
        self.write_batch_size = batch_size.max(1);
        self
    }

    async fn write(
        &self,
        records: &HashMap<Address, AccountRecord>,
        index: &str,
    ) -> Result<BulkReport, Error> {
        BulkIndexer::new(self.destination.clone())
            .with_batch_size(self.write_batch_size)
            .index_accounts(records, index)
            .await
    }

    async fn copy_pages<C: CancelToken>(
        &self,
        source_index: &str,
        destination_index: &str,
        computed: &mut StakeMap,
        cursor: &mut Option<String>,
        report: &mut ReindexReport,
        cancel: &C,
    ) -> Result<(), Error> {
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let body = self
                .source
                .scroll(source_index, cursor.as_deref(), self.page_size)
                .await?;

            let page: ScrollResponse = serde_json::from_slice(&body)?;

            if let Some(next) = page.scroll_id {
                *cursor = Some(next);
            }

            if page.hits.hits.is_empty() {
                return Ok(());
            }

            report.pages += 1;
            report.scanned += page.hits.hits.len();

            let records = refresh_page(page.hits.hits, computed);
            let bulk = self.write(&records, destination_index).await?;

            debug!(page = report.pages, docs = records.len(), failed = bulk.failed, "copied page");

            report.bulk.extend(bulk);
        }
    }

    /// Copies every document of `source_index` into `destination_index`
    /// with its stake replaced by the `computed` one.
    ///
    /// Cancellation is checked between pages. The scroll is cleared whether
    /// the copy succeeded or not.
    #[instrument(skip(self, computed, cancel))]
    pub async fn reindex_accounts<C: CancelToken>(
        &self,
        source_index: &str,
        destination_index: &str,
        mut computed: StakeMap,
        cancel: &C,
    ) -> Result<ReindexReport, Error> {
        let mut report = ReindexReport::default();
        let mut cursor = None;

        let copied = self
            .copy_pages(
                source_index,
                destination_index,
                &mut computed,
                &mut cursor,
                &mut report,
                cancel,
            )
            .await;

        if let Some(cursor) = &cursor {
            if let Err(err) = self.source.clear_scroll(cursor).await {
                warn!(%err, "failed to clear scroll");
            }
        }

        copied?;

        if !computed.is_empty() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            report.created = computed.len();

            let records = merge(HashMap::new(), computed);
            report.bulk.extend(self.write(&records, destination_index).await?);
        }

        info!(
            pages = report.pages,
            scanned = report.scanned,
            created = report.created,
            indexed = report.bulk.indexed,
            failed = report.bulk.failed,
            "reindex completed"
        );

        Ok(report)
    }
}
