use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use serde_json::{json, Value};

use stakeidx_core::{
    reader::READ_BATCH_SIZE,
    store::{BulkItemError, BulkItemStatus, BulkResponse, StoreClient},
    Address, Error,
};

use crate::TestFault;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreCall {
    Health,
    MultiGet { index: String, ids: usize },
    Bulk { index: String, docs: usize },
    Clone { source: String, target: String },
    PutSettings { index: String, read_only: bool },
    PutMapping { index: String },
    Scroll { index: String, hits: usize },
    ClearScroll { cursor: String },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct IndexState {
    pub docs: BTreeMap<Address, Value>,
    pub read_only: bool,
    pub mapping: Option<Value>,
}

#[derive(Default)]
struct State {
    indexes: BTreeMap<String, IndexState>,
    calls: Vec<StoreCall>,
    multi_gets: usize,
    bulks: usize,
    scrolls: usize,
}

/// An in-memory search store.
///
/// Documents are kept as plain JSON, bulk writes replace whole documents and
/// a clone copies documents and mapping. Like the real thing, cloning
/// requires a write-blocked source and a target that doesn't exist yet.
/// Scroll cursors have the form `<index>@<offset>` and walk documents in id
/// order.
#[derive(Clone, Default)]
pub struct FakeStore {
    state: Arc<Mutex<State>>,
    faults: Arc<Vec<TestFault>>,
    rejected: Arc<BTreeSet<Address>>,
    clone_delay: Option<Duration>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fault(mut self, fault: TestFault) -> Self {
        Arc::make_mut(&mut self.faults).push(fault);
        self
    }

    /// Makes bulk writes reject the document with this id.
    pub fn with_rejected(mut self, id: impl Into<Address>) -> Self {
        Arc::make_mut(&mut self.rejected).insert(id.into());
        self
    }

    /// Makes the clone request take `delay` before it is applied.
    pub fn with_clone_delay(mut self, delay: Duration) -> Self {
        self.clone_delay = Some(delay);
        self
    }

    pub fn with_doc(self, index: &str, id: impl Into<Address>, doc: Value) -> Self {
        self.state
            .lock()
            .unwrap()
            .indexes
            .entry(index.to_owned())
            .or_default()
            .docs
            .insert(id.into(), doc);
        self
    }

    pub fn with_index(self, index: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .indexes
            .entry(index.to_owned())
            .or_default();
        self
    }

    pub fn index(&self, index: &str) -> Option<IndexState> {
        self.state.lock().unwrap().indexes.get(index).cloned()
    }

    pub fn doc(&self, index: &str, id: &str) -> Option<Value> {
        self.index(index).and_then(|x| x.docs.get(id).cloned())
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Sizes of the multi-get requests, in order.
    pub fn multi_get_sizes(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::MultiGet { ids, .. } => Some(ids),
                _ => None,
            })
            .collect()
    }

    /// Sizes of the bulk requests, in order.
    pub fn bulk_sizes(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Bulk { docs, .. } => Some(docs),
                _ => None,
            })
            .collect()
    }

    /// Write block changes, in order.
    pub fn settings_calls(&self) -> Vec<(String, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::PutSettings { index, read_only } => Some((index, read_only)),
                _ => None,
            })
            .collect()
    }

    fn has_fault(&self, fault: TestFault) -> bool {
        self.faults.contains(&fault)
    }

    fn check(&self, fault: TestFault) -> Result<(), Error> {
        match self.has_fault(fault) {
            true => Err(fault.error()),
            false => Ok(()),
        }
    }
}

fn parse_cursor(cursor: &str) -> Result<(&str, usize), Error> {
    let (index, offset) = cursor
        .rsplit_once('@')
        .ok_or_else(|| Error::store(format!("search_context_missing: {cursor}")))?;

    let offset = offset
        .parse()
        .map_err(|_| Error::store(format!("search_context_missing: {cursor}")))?;

    Ok((index, offset))
}

fn parse_bulk(payload: &[u8]) -> Result<Vec<(Address, Value)>, Error> {
    let text = std::str::from_utf8(payload).map_err(Error::store)?;

    if !text.is_empty() && !text.ends_with('\n') {
        return Err(Error::store("bulk payload must end with a newline"));
    }

    let mut lines = text.lines();
    let mut out = vec![];

    while let Some(action) = lines.next() {
        let action: Value = serde_json::from_str(action).map_err(Error::store)?;

        let id = action["index"]["_id"]
            .as_str()
            .ok_or_else(|| Error::store("bulk action without index id"))?
            .to_owned();

        let doc = lines
            .next()
            .ok_or_else(|| Error::store("bulk action without document"))?;
        let doc: Value = serde_json::from_str(doc).map_err(Error::store)?;

        out.push((id, doc));
    }

    Ok(out)
}

impl StoreClient for FakeStore {
    async fn bulk_write(&self, payload: Vec<u8>, index: &str) -> Result<Vec<u8>, Error> {
        let docs = parse_bulk(&payload)?;

        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::Bulk {
            index: index.to_owned(),
            docs: docs.len(),
        });

        let nth = state.bulks;
        state.bulks += 1;

        if self.has_fault(TestFault::BulkRequest(nth)) {
            return Err(TestFault::BulkRequest(nth).error());
        }

        let target = state.indexes.entry(index.to_owned()).or_default();
        let mut response = BulkResponse::default();

        for (id, doc) in docs {
            let error = if target.read_only {
                Some(("cluster_block_exception", "index has read-only-allow-delete block"))
            } else if self.rejected.contains(&id) {
                Some(("mapper_parsing_exception", "failed to parse document"))
            } else {
                None
            };

            let status = match error {
                Some((kind, reason)) => BulkItemStatus {
                    id: Some(id),
                    status: 400,
                    error: Some(BulkItemError {
                        kind: kind.into(),
                        reason: reason.into(),
                    }),
                },
                None => {
                    target.docs.insert(id.clone(), doc);
                    BulkItemStatus {
                        id: Some(id),
                        status: 201,
                        error: None,
                    }
                }
            };

            response.errors |= status.error.is_some();
            response.items.push(BTreeMap::from([("index".to_owned(), status)]));
        }

        serde_json::to_vec(&response).map_err(Error::store)
    }

    async fn multi_get(&self, ids: &[Address], index: &str) -> Result<Vec<u8>, Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::MultiGet {
            index: index.to_owned(),
            ids: ids.len(),
        });

        let nth = state.multi_gets;
        state.multi_gets += 1;

        if self.has_fault(TestFault::MultiGetBatch(nth)) {
            return Err(TestFault::MultiGetBatch(nth).error());
        }

        if ids.len() > READ_BATCH_SIZE {
            return Err(Error::store(format!("too many ids in one request: {}", ids.len())));
        }

        let stored = state
            .indexes
            .get(index)
            .ok_or_else(|| Error::store(format!("index_not_found: {index}")))?;

        let docs: Vec<_> = ids
            .iter()
            .map(|id| match stored.docs.get(id) {
                Some(doc) => json!({ "_index": index, "_id": id, "found": true, "_source": doc }),
                None => json!({ "_index": index, "_id": id, "found": false }),
            })
            .collect();

        serde_json::to_vec(&json!({ "docs": docs })).map_err(Error::store)
    }

    async fn clone_index(&self, source: &str, target: &str) -> Result<bool, Error> {
        if let Some(delay) = self.clone_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::Clone {
            source: source.to_owned(),
            target: target.to_owned(),
        });

        self.check(TestFault::CloneFails)?;

        if self.has_fault(TestFault::CloneNotAcknowledged) {
            return Ok(false);
        }

        let copy = match state.indexes.get(source) {
            Some(x) if x.read_only => IndexState {
                read_only: false,
                ..x.clone()
            },
            Some(_) => return Err(Error::store(format!("{source} must be read-only to clone"))),
            None => return Err(Error::store(format!("index_not_found: {source}"))),
        };

        if state.indexes.contains_key(target) {
            return Err(Error::store(format!("resource_already_exists: {target}")));
        }

        state.indexes.insert(target.to_owned(), copy);

        Ok(true)
    }

    async fn put_settings(&self, read_only: bool, index: &str) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::PutSettings {
            index: index.to_owned(),
            read_only,
        });

        match read_only {
            true => self.check(TestFault::SetReadOnlyFails)?,
            false => self.check(TestFault::UnsetReadOnlyFails)?,
        }

        let stored = state
            .indexes
            .get_mut(index)
            .ok_or_else(|| Error::store(format!("index_not_found: {index}")))?;

        stored.read_only = read_only;

        Ok(())
    }

    async fn put_mapping(&self, index: &str, schema: &Value) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::PutMapping {
            index: index.to_owned(),
        });

        self.check(TestFault::MappingFails)?;

        let stored = state
            .indexes
            .get_mut(index)
            .ok_or_else(|| Error::store(format!("index_not_found: {index}")))?;

        stored.mapping = Some(schema.clone());

        Ok(())
    }

    async fn health_wait(&self) -> Result<(), Error> {
        self.state.lock().unwrap().calls.push(StoreCall::Health);
        self.check(TestFault::StoreUnhealthy)
    }

    async fn scroll(
        &self,
        index: &str,
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<Vec<u8>, Error> {
        let (index, offset) = match cursor {
            Some(cursor) => parse_cursor(cursor)?,
            None => (index, 0),
        };

        let mut state = self.state.lock().unwrap();

        let nth = state.scrolls;
        state.scrolls += 1;

        if self.has_fault(TestFault::ScrollPage(nth)) {
            return Err(TestFault::ScrollPage(nth).error());
        }

        let stored = state
            .indexes
            .get(index)
            .ok_or_else(|| Error::store(format!("index_not_found: {index}")))?;

        let hits: Vec<_> = stored
            .docs
            .iter()
            .skip(offset)
            .take(page_size)
            .map(|(id, doc)| json!({ "_index": index, "_id": id, "_source": doc }))
            .collect();

        state.calls.push(StoreCall::Scroll {
            index: index.to_owned(),
            hits: hits.len(),
        });

        let next = format!("{index}@{}", offset + hits.len());

        serde_json::to_vec(&json!({ "_scroll_id": next, "hits": { "hits": hits } }))
            .map_err(Error::store)
    }

    async fn clear_scroll(&self, cursor: &str) -> Result<(), Error> {
        parse_cursor(cursor)?;

        self.state.lock().unwrap().calls.push(StoreCall::ClearScroll {
            cursor: cursor.to_owned(),
        });

        Ok(())
    }
}
