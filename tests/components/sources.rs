use std::sync::Arc;

use stakeidx_core::{
    config::PipelineConfig,
    pipeline::Pipeline,
    rest::ApiEnvelope,
    sources::{
        delegators::PATH_DELEGATED_INFO,
        legacy::{FUNC_ACTIVE_LIST, FUNC_WAITING_LIST},
        lkmex::FUNC_SNAPSHOT,
        validators::PATH_DIRECT_STAKED_INFO,
        DelegatorsSource, LegacyDelegationSource, LkMexSource, StakeSource, ValidatorsSource,
    },
    Error, StakeField,
};
use stakeidx_testing::{
    balance_records, delegated_info, stake_sources, staked_info, upstream, FakeGateway,
    FakeStore, GatewayCall, TestAccount, TestFault, LEGACY_CONTRACT, LKMEX_CONTRACT, TOKEN,
};

fn legacy(gateway: FakeGateway) -> LegacyDelegationSource<FakeGateway> {
    LegacyDelegationSource::new(upstream(Arc::new(gateway)), LEGACY_CONTRACT.into())
}

#[tokio::test]
async fn legacy_sums_duplicate_entries() {
    let active = balance_records(
        &[
            (TestAccount::Alice, TOKEN),
            (TestAccount::Bob, 5),
            (TestAccount::Alice, 2 * TOKEN),
        ],
        2,
    );
    let waiting = balance_records(&[(TestAccount::Alice, 7), (TestAccount::Carol, 9)], 3);

    let gateway = FakeGateway::new()
        .with_view(LEGACY_CONTRACT, FUNC_ACTIVE_LIST, &active)
        .with_view(LEGACY_CONTRACT, FUNC_WAITING_LIST, &waiting);

    let accounts = legacy(gateway).fetch().await.unwrap();

    let alice = &accounts[&TestAccount::Alice.address()];
    let active = alice.get(StakeField::DelegationLegacyActive).unwrap();
    assert_eq!(active.exact(), "3000000000000000000");
    assert_eq!(active.approx(), 3.0);
    assert_eq!(alice.get(StakeField::DelegationLegacyWaiting).unwrap().exact(), "7");

    let carol = &accounts[&TestAccount::Carol.address()];
    assert!(carol.get(StakeField::DelegationLegacyActive).is_none());
    assert_eq!(carol.get(StakeField::DelegationLegacyWaiting).unwrap().exact(), "9");

    assert_eq!(accounts.len(), 3);
}

#[tokio::test]
async fn legacy_rejects_truncated_records() {
    let mut active = balance_records(&[(TestAccount::Alice, 1)], 2);
    active.push(TestAccount::Bob.pubkey());

    let gateway = FakeGateway::new()
        .with_view(LEGACY_CONTRACT, FUNC_ACTIVE_LIST, &active)
        .with_view(LEGACY_CONTRACT, FUNC_WAITING_LIST, &[]);

    let err = legacy(gateway).fetch().await.unwrap_err();
    assert!(matches!(err, Error::Decode(_)), "{err}");
}

#[tokio::test]
async fn legacy_rejects_malformed_addresses() {
    let active = vec![vec![0x01; 20], vec![0x05]];

    let gateway = FakeGateway::new()
        .with_view(LEGACY_CONTRACT, FUNC_ACTIVE_LIST, &active)
        .with_view(LEGACY_CONTRACT, FUNC_WAITING_LIST, &[]);

    let err = legacy(gateway).fetch().await.unwrap_err();
    assert!(matches!(err, Error::Decode(_)), "{err}");
}

#[tokio::test]
async fn legacy_propagates_vm_errors() {
    let gateway = FakeGateway::new().with_view_envelope(
        LEGACY_CONTRACT,
        FUNC_ACTIVE_LIST,
        ApiEnvelope::failed("contract not found"),
    );

    let err = legacy(gateway).fetch().await.unwrap_err();
    assert!(matches!(err, Error::Upstream(_)), "{err}");
}

#[tokio::test]
async fn disabled_lkmex_makes_no_calls() {
    let gateway = Arc::new(FakeGateway::new());
    let source = LkMexSource::new(upstream(gateway.clone()), String::new());

    let accounts = source.fetch().await.unwrap();

    assert!(accounts.is_empty());
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn lkmex_reads_snapshot() {
    let snapshot = balance_records(&[(TestAccount::Dave, 42 * TOKEN)], 2);
    let gateway = Arc::new(FakeGateway::new().with_view(LKMEX_CONTRACT, FUNC_SNAPSHOT, &snapshot));
    let source = LkMexSource::new(upstream(gateway.clone()), LKMEX_CONTRACT.into());

    let accounts = source.fetch().await.unwrap();

    let dave = &accounts[&TestAccount::Dave.address()];
    assert_eq!(dave.get(StakeField::LkMexStake).unwrap().approx(), 42.0);
    assert_eq!(
        gateway.calls(),
        vec![GatewayCall::View {
            contract: LKMEX_CONTRACT.into(),
            func_name: FUNC_SNAPSHOT.into(),
        }]
    );
}

#[tokio::test]
async fn validators_envelope_error_is_upstream() {
    let gateway = Arc::new(
        FakeGateway::new().with_get(PATH_DIRECT_STAKED_INFO, ApiEnvelope::failed("boom")),
    );
    let source = ValidatorsSource::new(upstream(gateway));

    let err = source.fetch().await.unwrap_err();

    match err {
        Error::Upstream(msg) => assert!(msg.contains("boom"), "{msg}"),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn validators_skip_empty_and_bad_entries() {
    let data = staked_info(&[
        (TestAccount::Alice, "2500000000000000000000", "100"),
        (TestAccount::Bob, "", ""),
        (TestAccount::Carol, "12abc", "1"),
        (TestAccount::Dave, "", "7"),
    ]);

    let gateway = Arc::new(FakeGateway::new().with_get_data(PATH_DIRECT_STAKED_INFO, data));
    let source = ValidatorsSource::new(upstream(gateway.clone()));

    let accounts = source.fetch().await.unwrap();

    let alice = &accounts[&TestAccount::Alice.address()];
    assert_eq!(alice.get(StakeField::ValidatorsActive).unwrap().approx(), 2500.0);
    assert_eq!(alice.get(StakeField::ValidatorsTopUp).unwrap().exact(), "100");

    let dave = &accounts[&TestAccount::Dave.address()];
    assert!(dave.get(StakeField::ValidatorsActive).is_none());
    assert_eq!(dave.get(StakeField::ValidatorsTopUp).unwrap().exact(), "7");

    assert!(!accounts.contains_key(&TestAccount::Bob.address()));
    assert!(!accounts.contains_key(&TestAccount::Carol.address()));

    assert_eq!(
        gateway.calls(),
        vec![GatewayCall::Get {
            path: PATH_DIRECT_STAKED_INFO.into(),
            authenticated: true,
        }]
    );
}

#[tokio::test]
async fn delegators_prefix_upstream_errors() {
    let gateway = Arc::new(
        FakeGateway::new().with_get(PATH_DELEGATED_INFO, ApiEnvelope::failed("not ready")),
    );
    let source = DelegatorsSource::new(upstream(gateway));

    match source.fetch().await {
        Err(Error::Upstream(msg)) => assert!(msg.starts_with("cannot get delegators: "), "{msg}"),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn delegators_populate_delegation() {
    let data = delegated_info(&[(TestAccount::Eve, "3000000000000000000"), (TestAccount::Bob, "")]);
    let gateway = Arc::new(FakeGateway::new().with_get_data(PATH_DELEGATED_INFO, data));
    let source = DelegatorsSource::new(upstream(gateway));

    let accounts = source.fetch().await.unwrap();

    assert_eq!(accounts.len(), 1);
    let eve = &accounts[&TestAccount::Eve.address()];
    assert_eq!(eve.get(StakeField::Delegation).unwrap().approx(), 3.0);
    assert_eq!(eve.len(), 1);
}

#[tokio::test]
async fn failing_source_does_not_stop_the_others() {
    let gateway = Arc::new(
        FakeGateway::new()
            .with_view(LEGACY_CONTRACT, FUNC_ACTIVE_LIST, &[])
            .with_view(LEGACY_CONTRACT, FUNC_WAITING_LIST, &[])
            .with_get_data(PATH_DIRECT_STAKED_INFO, staked_info(&[])),
    );
    let sources = stake_sources(gateway, false);

    let results = sources.fetch_all().await;

    let failed: Vec<_> = results
        .iter()
        .filter(|(_, result)| result.is_err())
        .map(|(name, _)| *name)
        .collect();

    assert_eq!(results.len(), 4);
    assert_eq!(failed, vec!["delegation-manager"]);
}

#[tokio::test]
async fn unreachable_gateway_is_reported_per_source() {
    let gateway = Arc::new(FakeGateway::new().with_fault(TestFault::GatewayDown));
    let store = Arc::new(FakeStore::new());

    let pipeline = Pipeline::new(
        stake_sources(gateway.clone(), false),
        store.clone(),
        crate::LIVE,
        PipelineConfig::default(),
    );

    let err = pipeline.fetch_stake().await.unwrap_err();

    let Error::Source { name, error } = &err else {
        panic!("unexpected {err:?}");
    };

    assert_eq!(*name, "legacy-delegation");
    assert!(matches!(**error, Error::Transport(_)), "{error}");
    assert!(err.to_string().starts_with("legacy-delegation source: "));

    assert!(gateway.call_count() > 0);
    assert!(store.calls().is_empty());
}
