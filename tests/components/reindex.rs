use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use stakeidx_core::{
    reindex::Reindexer, Balance, Error, NeverCancel, StakeAttributes, StakeField, StakeMap,
};
use stakeidx_testing::{FakeStore, StoreCall, TestFault};

use crate::{numbered, seeded_store, LIVE};

const DESTINATION: &str = "accounts-copy";

fn scroll_sizes(store: &FakeStore) -> Vec<usize> {
    store
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            StoreCall::Scroll { hits, .. } => Some(hits),
            _ => None,
        })
        .collect()
}

fn cleared(store: &FakeStore) -> Vec<String> {
    store
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            StoreCall::ClearScroll { cursor } => Some(cursor),
            _ => None,
        })
        .collect()
}

fn delegation(value: u64) -> StakeAttributes {
    StakeAttributes::new().with(StakeField::Delegation, Balance::from(value))
}

#[tokio::test]
async fn copies_every_document_with_fresh_stake() {
    let addresses = numbered(10);

    // stored: 0, 2, 4, 6, 8; computed: 0 and 1
    let source = Arc::new(seeded_store(&addresses).with_doc(
        LIVE,
        addresses[2].clone(),
        json!({ "balance": "1", "delegation": "7", "delegationNum": 7e-18 }),
    ));
    let destination = Arc::new(FakeStore::new());

    let computed = StakeMap::from([
        (addresses[0].clone(), delegation(4)),
        (addresses[1].clone(), delegation(2)),
    ]);

    let report = Reindexer::new(source.clone(), destination.clone())
        .with_page_size(2)
        .reindex_accounts(LIVE, DESTINATION, computed, &NeverCancel)
        .await
        .unwrap();

    assert_eq!(scroll_sizes(&source), vec![2, 2, 1, 0]);
    assert_eq!(cleared(&source), vec![format!("{LIVE}@5")]);

    assert_eq!(report.pages, 3);
    assert_eq!(report.scanned, 5);
    assert_eq!(report.created, 1);
    assert_eq!(report.bulk.indexed, 6);
    assert!(report.bulk.is_clean());

    assert_eq!(destination.bulk_sizes(), vec![2, 2, 1, 1]);
    assert_eq!(destination.index(DESTINATION).unwrap().docs.len(), 6);

    let staked = destination.doc(DESTINATION, &addresses[0]).unwrap();
    assert_eq!(staked["nonce"], 1);
    assert_eq!(staked["delegation"], "4");
    assert_eq!(staked["totalBalanceWithStake"], "5");

    let stale = destination.doc(DESTINATION, &addresses[2]).unwrap();
    assert_eq!(stale, json!({ "balance": "1" }));

    let created = destination.doc(DESTINATION, &addresses[1]).unwrap();
    assert_eq!(created["delegation"], "2");

    // the source is only read
    assert_eq!(source.index(LIVE).unwrap().docs.len(), 5);
    assert!(source.bulk_sizes().is_empty());
}

#[tokio::test]
async fn failing_page_still_clears_the_scroll() {
    let addresses = numbered(10);
    let source = Arc::new(seeded_store(&addresses).with_fault(TestFault::ScrollPage(1)));
    let destination = Arc::new(FakeStore::new());

    let computed = StakeMap::from([(addresses[1].clone(), delegation(2))]);

    let err = Reindexer::new(source.clone(), destination.clone())
        .with_page_size(2)
        .reindex_accounts(LIVE, DESTINATION, computed, &NeverCancel)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Store(_)), "{err}");
    assert_eq!(cleared(&source), vec![format!("{LIVE}@2")]);

    // the first page made it, accounts only in the computed stake did not
    assert_eq!(destination.bulk_sizes(), vec![2]);
    assert!(destination.doc(DESTINATION, &addresses[1]).is_none());
}

#[tokio::test]
async fn cancelled_reindex_reads_nothing() {
    let source = Arc::new(seeded_store(&numbered(4)));
    let destination = Arc::new(FakeStore::new());

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = Reindexer::new(source.clone(), destination.clone())
        .reindex_accounts(LIVE, DESTINATION, StakeMap::new(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert!(source.calls().is_empty());
    assert!(destination.calls().is_empty());
}

#[tokio::test]
async fn rejected_documents_are_counted() {
    let addresses = numbered(6);
    let source = Arc::new(seeded_store(&addresses));
    let destination = Arc::new(FakeStore::new().with_rejected(addresses[2].clone()));

    let report = Reindexer::new(source, destination)
        .reindex_accounts(LIVE, DESTINATION, StakeMap::new(), &NeverCancel)
        .await
        .unwrap();

    assert_eq!(report.pages, 1);
    assert_eq!(report.bulk.failed, 1);
    assert_eq!(report.bulk.indexed, 2);
    assert_eq!(report.bulk.failures[0].id.as_deref(), Some(addresses[2].as_str()));
}

#[tokio::test]
async fn missing_source_index_is_an_error() {
    let source = Arc::new(FakeStore::new());
    let destination = Arc::new(FakeStore::new());

    let err = Reindexer::new(source.clone(), destination)
        .reindex_accounts("nowhere", DESTINATION, StakeMap::new(), &NeverCancel)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("index_not_found"), "{err}");
    assert!(cleared(&source).is_empty());
}
