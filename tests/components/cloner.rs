use std::sync::Arc;

use serde_json::json;

use stakeidx_core::{cloner::IndexCloner, store::default_stake_mapping, CloneError, Error};
use stakeidx_testing::{FakeStore, StoreCall, TestFault};

use crate::LIVE;

const TARGET: &str = "accounts-20240101000000";

fn live_store() -> FakeStore {
    FakeStore::new().with_doc(LIVE, "erd1alice", json!({ "balance": "5" }))
}

#[tokio::test]
async fn clone_blocks_and_restores_writes() {
    let store = Arc::new(live_store());

    IndexCloner::new(store.clone())
        .clone_index(LIVE, TARGET)
        .await
        .unwrap();

    assert_eq!(
        store.settings_calls(),
        vec![(LIVE.to_owned(), true), (LIVE.to_owned(), false)]
    );

    assert!(!store.index(LIVE).unwrap().read_only);

    let target = store.index(TARGET).unwrap();
    assert!(!target.read_only);
    assert_eq!(target.docs["erd1alice"], json!({ "balance": "5" }));
}

#[tokio::test]
async fn failed_clone_still_restores_writes_once() {
    let store = Arc::new(live_store().with_fault(TestFault::CloneFails));

    let err = IndexCloner::new(store.clone())
        .clone_index(LIVE, TARGET)
        .await
        .unwrap_err();

    assert!(matches!(err, CloneError::Clone { .. }), "{err}");
    assert_eq!(
        store.settings_calls(),
        vec![(LIVE.to_owned(), true), (LIVE.to_owned(), false)]
    );
    assert!(!store.index(LIVE).unwrap().read_only);
    assert!(store.index(TARGET).is_none());
}

#[tokio::test]
async fn unacknowledged_clone_is_an_error() {
    let store = Arc::new(live_store().with_fault(TestFault::CloneNotAcknowledged));

    let err = IndexCloner::new(store.clone())
        .clone_index(LIVE, TARGET)
        .await
        .unwrap_err();

    assert!(matches!(err, CloneError::NotAcknowledged { .. }), "{err}");
    assert_eq!(store.settings_calls().len(), 2);
}

#[tokio::test]
async fn both_failures_are_reported() {
    let store = Arc::new(
        live_store()
            .with_fault(TestFault::CloneFails)
            .with_fault(TestFault::UnsetReadOnlyFails),
    );

    let err = IndexCloner::new(store.clone())
        .clone_index(LIVE, TARGET)
        .await
        .unwrap_err();

    let CloneError::CloneAndUnset { clone, unset } = &err else {
        panic!("unexpected {err:?}");
    };

    assert!(matches!(**clone, CloneError::Clone { .. }));
    assert!(matches!(**unset, CloneError::UnsetReadOnly { .. }));

    let msg = err.to_string();
    assert!(msg.contains("CloneFails"), "{msg}");
    assert!(msg.contains("UnsetReadOnlyFails"), "{msg}");

    let unsets = store
        .settings_calls()
        .into_iter()
        .filter(|(_, read_only)| !read_only)
        .count();
    assert_eq!(unsets, 1);
}

#[tokio::test]
async fn successful_clone_with_stuck_block_is_an_error() {
    let store = Arc::new(live_store().with_fault(TestFault::UnsetReadOnlyFails));

    let err = IndexCloner::new(store.clone())
        .clone_index(LIVE, TARGET)
        .await
        .unwrap_err();

    assert!(matches!(err, CloneError::UnsetReadOnly { .. }), "{err}");
    assert!(store.index(TARGET).is_some());
}

#[tokio::test]
async fn failed_write_block_skips_the_clone() {
    let store = Arc::new(live_store().with_fault(TestFault::SetReadOnlyFails));

    let err = IndexCloner::new(store.clone())
        .clone_index(LIVE, TARGET)
        .await
        .unwrap_err();

    assert!(matches!(err, CloneError::SetReadOnly { .. }), "{err}");
    assert!(!store
        .calls()
        .iter()
        .any(|call| matches!(call, StoreCall::Clone { .. })));
}

#[tokio::test]
async fn generation_gets_the_stake_mapping() {
    let store = Arc::new(live_store());
    let schema = default_stake_mapping();

    IndexCloner::new(store.clone())
        .prepare_generation(LIVE, TARGET, &schema)
        .await
        .unwrap();

    assert_eq!(store.index(TARGET).unwrap().mapping, Some(schema));
    assert!(store.index(LIVE).unwrap().mapping.is_none());
}

#[tokio::test]
async fn mapping_failure_is_a_clone_protocol_error() {
    let store = Arc::new(live_store().with_fault(TestFault::MappingFails));

    let err = IndexCloner::new(store)
        .prepare_generation(LIVE, TARGET, &default_stake_mapping())
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::CloneProtocol(CloneError::PutMapping { .. })),
        "{err}"
    );
}
