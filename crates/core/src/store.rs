//! Search store interface used by the reader, cloner, bulk indexer and
//! reindexer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{Address, Error, PersistedFields, StakeField};

/// The primitives the reindexing pipeline needs from the search store.
///
/// Implementations report non-success responses as errors; response bodies
/// that need inspection (multi-get, bulk, scroll) are returned raw.
#[trait_variant::make(Send)]
pub trait StoreClient: Send + Sync + 'static {
    /// Sends a newline-delimited bulk payload, returning the response body.
    async fn bulk_write(&self, payload: Vec<u8>, index: &str) -> Result<Vec<u8>, Error>;

    /// Fetches documents by id, returning the response body.
    async fn multi_get(&self, ids: &[Address], index: &str) -> Result<Vec<u8>, Error>;

    /// Creates `target` as a copy of `source`. Returns whether the store
    /// acknowledged the operation.
    async fn clone_index(&self, source: &str, target: &str) -> Result<bool, Error>;

    async fn put_settings(&self, read_only: bool, index: &str) -> Result<(), Error>;

    async fn put_mapping(&self, index: &str, schema: &Value) -> Result<(), Error>;

    /// Waits until the cluster is able to serve writes.
    async fn health_wait(&self) -> Result<(), Error>;

    /// Fetches the next page of every document in `index`.
    ///
    /// Without a cursor a new scroll is opened. The body carries the cursor
    /// of the following page next to the hits; an empty page ends the scroll.
    async fn scroll(
        &self,
        index: &str,
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<Vec<u8>, Error>;

    /// Releases the resources held by an open scroll.
    async fn clear_scroll(&self, cursor: &str) -> Result<(), Error>;
}

#[derive(Debug, Deserialize)]
pub struct MultiGetResponse {
    #[serde(default)]
    pub docs: Vec<MultiGetDoc>,
}

#[derive(Debug, Deserialize)]
pub struct MultiGetDoc {
    #[serde(rename = "_id")]
    pub id: Address,

    #[serde(default)]
    pub found: bool,

    #[serde(rename = "_source", default)]
    pub source: Option<PersistedFields>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScrollResponse {
    #[serde(rename = "_scroll_id", default)]
    pub scroll_id: Option<String>,

    #[serde(default)]
    pub hits: ScrollHits,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScrollHits {
    #[serde(default)]
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_id")]
    pub id: Address,

    #[serde(rename = "_source", default)]
    pub source: Option<PersistedFields>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub errors: bool,

    #[serde(default)]
    pub items: Vec<BTreeMap<String, BulkItemStatus>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkItemStatus {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,

    #[serde(default)]
    pub status: u16,

    #[serde(default)]
    pub error: Option<BulkItemError>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkItemError {
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub reason: String,
}

impl BulkItemStatus {
    pub fn failure(&self) -> Option<&BulkItemError> {
        self.error.as_ref().filter(|e| !e.kind.is_empty())
    }
}

/// Mapping applied to every new generation so stake fields are typed
/// explicitly instead of inferred from the first document written.
pub fn default_stake_mapping() -> Value {
    let mut properties = serde_json::Map::new();

    for field in StakeField::ALL {
        properties.insert(field.key().into(), json!({ "type": "keyword" }));
        properties.insert(field.num_key().into(), json!({ "type": "double" }));
    }

    json!({ "properties": properties })
}
