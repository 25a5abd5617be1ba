use std::sync::Arc;

use serde_json::json;

use stakeidx_core::reader::{AccountReader, BatchErrorPolicy};
use stakeidx_testing::{FakeStore, TestFault};

use crate::{numbered, seeded_store, LIVE};

#[tokio::test]
async fn reads_in_bounded_batches() {
    let addresses = numbered(4500);
    let store = Arc::new(seeded_store(&addresses));

    let found = AccountReader::new(store.clone(), LIVE)
        .fetch_existing(&addresses)
        .await
        .unwrap();

    assert_eq!(store.multi_get_sizes(), vec![2000, 2000, 500]);
    assert_eq!(found.len(), 2250);
}

#[tokio::test]
async fn only_found_documents_are_returned() {
    let addresses = numbered(3);
    let store = Arc::new(
        FakeStore::new().with_doc(LIVE, addresses[1].clone(), json!({ "balance": "10", "nonce": 2 })),
    );

    let found = AccountReader::new(store, LIVE)
        .fetch_existing(&addresses)
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[&addresses[1]]["nonce"].get(), "2");
}

#[tokio::test]
async fn abort_policy_fails_the_fetch() {
    let addresses = numbered(50);
    let store = Arc::new(seeded_store(&addresses).with_fault(TestFault::MultiGetBatch(1)));

    let result = AccountReader::new(store.clone(), LIVE)
        .with_batch_size(20)
        .fetch_existing(&addresses)
        .await;

    assert!(result.is_err());
    assert_eq!(store.multi_get_sizes(), vec![20, 20]);
}

#[tokio::test]
async fn skip_policy_continues_past_failed_batches() {
    let addresses = numbered(50);
    let store = Arc::new(seeded_store(&addresses).with_fault(TestFault::MultiGetBatch(1)));

    let found = AccountReader::new(store.clone(), LIVE)
        .with_batch_size(20)
        .with_policy(BatchErrorPolicy::Skip)
        .fetch_existing(&addresses)
        .await
        .unwrap();

    assert_eq!(store.multi_get_sizes(), vec![20, 20, 10]);

    // every other address is stored; the second batch is lost
    assert_eq!(found.len(), 15);
    assert!(found.contains_key(&addresses[0]));
    assert!(!found.contains_key(&addresses[20]));
    assert!(found.contains_key(&addresses[40]));
}
