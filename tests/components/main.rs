use serde_json::json;

use stakeidx_core::Address;
use stakeidx_testing::{FakeStore, TestAccount};

mod cloner;
mod indexer;
mod reader;
mod reindex;
mod sources;

pub const LIVE: &str = "accounts";

pub fn numbered(n: u32) -> Vec<Address> {
    let mut out: Vec<_> = (0..n).map(|i| TestAccount::Numbered(i).address()).collect();
    out.sort();
    out
}

/// A store whose live index holds a document for every other address.
pub fn seeded_store(addresses: &[Address]) -> FakeStore {
    addresses
        .iter()
        .step_by(2)
        .fold(FakeStore::new().with_index(LIVE), |store, address| {
            store.with_doc(LIVE, address.clone(), json!({ "balance": "1", "nonce": 1 }))
        })
}
