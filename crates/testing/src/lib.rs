use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use num_bigint::BigUint;
use serde_json::{json, Value};

use stakeidx_core::{
    codec::{AddressCodec, Bech32Codec},
    config::{Credentials, SourcesConfig},
    sources::{StakeSources, Upstream},
    Address,
};

pub mod faults;
pub mod gateway;
pub mod store;

pub use faults::TestFault;
pub use gateway::{FakeGateway, GatewayCall};
pub use store::{FakeStore, IndexState, StoreCall};

pub const TEST_HRP: &str = "erd";
pub const LEGACY_CONTRACT: &str = "erd1qqqqqqqqqqqqqpgqxwakt2g7u9atsnr03gqcgmhcv38pt7mkd94q6shuwt";
pub const LKMEX_CONTRACT: &str = "erd1qqqqqqqqqqqqqpgq7qhsw8kffad85jtt79t9ym0a4ycvan9a2jps0zkpen";

/// One whole token in the smallest denomination.
pub const TOKEN: u128 = 1_000_000_000_000_000_000;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TestAccount {
    Alice,
    Bob,
    Carol,
    Dave,
    Eve,
    Numbered(u32),
}

impl TestAccount {
    /// The 32-byte public key of the account.
    pub fn pubkey(&self) -> Vec<u8> {
        let mut key = [0u8; 32];

        match self {
            TestAccount::Alice => key[31] = 1,
            TestAccount::Bob => key[31] = 2,
            TestAccount::Carol => key[31] = 3,
            TestAccount::Dave => key[31] = 4,
            TestAccount::Eve => key[31] = 5,
            TestAccount::Numbered(n) => {
                key[0] = 0xff;
                key[28..].copy_from_slice(&n.to_be_bytes());
            }
        }

        key.to_vec()
    }

    pub fn address(&self) -> Address {
        test_codec().encode(&self.pubkey()).unwrap()
    }
}

pub fn test_codec() -> Arc<dyn AddressCodec> {
    Arc::new(Bech32Codec::new(TEST_HRP, 32).unwrap())
}

/// Minimal big-endian encoding of an amount, as found in contract return data.
pub fn amount_bytes(amount: u128) -> Vec<u8> {
    if amount == 0 {
        return vec![];
    }

    BigUint::from(amount).to_bytes_be()
}

/// Builds the `data` payload of a view call returning `slots`.
pub fn return_data(slots: &[Vec<u8>]) -> Value {
    let encoded: Vec<_> = slots.iter().map(|slot| STANDARD.encode(slot)).collect();
    json!({ "data": { "returnData": encoded } })
}

/// Flattens `(account, amount, extra slots...)` records into return data slots.
pub fn balance_records(records: &[(TestAccount, u128)], stride: usize) -> Vec<Vec<u8>> {
    let mut slots = Vec::with_capacity(records.len() * stride);

    for (account, amount) in records {
        slots.push(account.pubkey());
        slots.push(amount_bytes(*amount));

        for _ in 2..stride {
            slots.push(vec![0x01]);
        }
    }

    slots
}

/// Builds the `data` payload of the direct staked info endpoint.
pub fn staked_info(entries: &[(TestAccount, &str, &str)]) -> Value {
    let list: Vec<_> = entries
        .iter()
        .map(|(account, staked, top_up)| {
            json!({ "address": account.address(), "staked": staked, "topUp": top_up })
        })
        .collect();

    json!({ "list": list })
}

/// Builds the `data` payload of the delegated info endpoint.
pub fn delegated_info(entries: &[(TestAccount, &str)]) -> Value {
    let list: Vec<_> = entries
        .iter()
        .map(|(account, total)| {
            json!({
                "delegatorAddress": account.address(),
                "delegatedTo": [],
                "total": total,
            })
        })
        .collect();

    json!({ "list": list })
}

pub fn sources_config(lkmex: bool) -> SourcesConfig {
    SourcesConfig {
        delegation_legacy_contract: LEGACY_CONTRACT.into(),
        lkmex_contract: if lkmex {
            LKMEX_CONTRACT.into()
        } else {
            String::new()
        },
    }
}

pub fn upstream(gateway: Arc<FakeGateway>) -> Upstream<FakeGateway> {
    Upstream::new(gateway, test_codec(), Credentials::new("user", "secret"))
}

pub fn stake_sources(gateway: Arc<FakeGateway>, lkmex: bool) -> StakeSources<FakeGateway> {
    StakeSources::new(upstream(gateway), &sources_config(lkmex))
}
