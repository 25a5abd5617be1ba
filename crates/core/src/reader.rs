use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    store::{MultiGetResponse, StoreClient},
    Address, Error, PersistedFields,
};

/// Upper bound of ids per multi-get request accepted by the store.
pub const READ_BATCH_SIZE: usize = 2000;

/// How a failed batch of reads is handled.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchErrorPolicy {
    /// Fail the whole fetch with the batch error.
    #[default]
    Abort,

    /// Log the batch and continue. Accounts in the batch are then written
    /// without their stored fields.
    Skip,
}

/// Reads the stored documents of a set of accounts, in bounded batches.
pub struct AccountReader<S> {
    store: Arc<S>,
    index: String,
    batch_size: usize,
    policy: BatchErrorPolicy,
}

impl<S: StoreClient> AccountReader<S> {
    pub fn new(store: Arc<S>, index: impl Into<String>) -> Self {
        Self {
            store,
            index: index.into(),
            batch_size: READ_BATCH_SIZE,
            policy: BatchErrorPolicy::default(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_policy(mut self, policy: BatchErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn fetch_batch(&self, batch: &[Address]) -> Result<Vec<(Address, PersistedFields)>, Error> {
        let body = self.store.multi_get(batch, &self.index).await?;
        let response: MultiGetResponse = serde_json::from_slice(&body)?;

        let found = response
            .docs
            .into_iter()
            .filter(|doc| doc.found)
            .filter_map(|doc| doc.source.map(|source| (doc.id, source)))
            .collect();

        Ok(found)
    }

    pub async fn fetch_existing(
        &self,
        addresses: &[Address],
    ) -> Result<HashMap<Address, PersistedFields>, Error> {
        let mut out = HashMap::with_capacity(addresses.len());

        for (idx, batch) in addresses.chunks(self.batch_size).enumerate() {
            match self.fetch_batch(batch).await {
                Ok(found) => {
                    debug!(batch = idx, requested = batch.len(), found = found.len(), "read batch");
                    out.extend(found);
                }
                Err(err) if self.policy == BatchErrorPolicy::Skip => {
                    warn!(batch = idx, size = batch.len(), %err, "skipping unreadable batch");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(out)
    }
}
