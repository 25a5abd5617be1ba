use std::{collections::HashMap, sync::Arc};

use stakeidx_core::{
    indexer::BulkIndexer, AccountRecord, Address, Balance, Error, PersistedFields,
    StakeAttributes, StakeField,
};
use stakeidx_testing::{FakeStore, TestFault};

use crate::numbered;

const TARGET: &str = "accounts-gen";

fn records(addresses: &[Address]) -> HashMap<Address, AccountRecord> {
    addresses
        .iter()
        .enumerate()
        .map(|(i, address)| {
            let stake =
                StakeAttributes::new().with(StakeField::Delegation, Balance::from(i as u64 + 1));
            (address.clone(), AccountRecord::new(PersistedFields::new(), stake))
        })
        .collect()
}

#[tokio::test]
async fn writes_in_bounded_batches() {
    let addresses = numbered(4500);
    let store = Arc::new(FakeStore::new().with_index(TARGET));

    let report = BulkIndexer::new(store.clone())
        .index_accounts(&records(&addresses), TARGET)
        .await
        .unwrap();

    assert_eq!(store.bulk_sizes(), vec![2000, 2000, 500]);
    assert_eq!(report.batches, 3);
    assert_eq!(report.indexed, 4500);
    assert!(report.is_clean());
    assert_eq!(store.index(TARGET).unwrap().docs.len(), 4500);
}

#[tokio::test]
async fn reports_rejected_items() {
    let addresses = numbered(10);
    let store = Arc::new(
        FakeStore::new()
            .with_index(TARGET)
            .with_rejected(addresses[3].clone())
            .with_rejected(addresses[7].clone()),
    );

    let report = BulkIndexer::new(store.clone())
        .index_accounts(&records(&addresses), TARGET)
        .await
        .unwrap();

    assert_eq!(report.failed, 2);
    assert_eq!(report.indexed, 8);
    assert_eq!(report.total(), 10);
    assert!(!report.is_clean());

    let mut ids: Vec<_> = report.failures.iter().filter_map(|x| x.id.clone()).collect();
    ids.sort();
    assert_eq!(ids, vec![addresses[3].clone(), addresses[7].clone()]);
    assert!(report.failures.iter().all(|x| x.kind == "mapper_parsing_exception"));
}

#[tokio::test]
async fn written_documents_carry_both_representations() {
    let addresses = numbered(1);
    let store = Arc::new(FakeStore::new().with_index(TARGET));

    BulkIndexer::new(store.clone())
        .index_accounts(&records(&addresses), TARGET)
        .await
        .unwrap();

    let doc = store.doc(TARGET, &addresses[0]).unwrap();
    assert_eq!(doc["delegation"], "1");
    assert_eq!(doc["delegationNum"], 1e-18);
}

#[tokio::test]
async fn failed_request_aborts_the_write() {
    let addresses = numbered(30);
    let store = Arc::new(
        FakeStore::new()
            .with_index(TARGET)
            .with_fault(TestFault::BulkRequest(1)),
    );

    let err = BulkIndexer::new(store.clone())
        .with_batch_size(10)
        .index_accounts(&records(&addresses), TARGET)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Store(_)), "{err}");
    assert_eq!(store.bulk_sizes(), vec![10, 10]);
}
