use serde::Deserialize;
use tracing::warn;

use crate::{rest::RestClient, Address, Error, StakeAttributes, StakeField, StakeMap};

use super::{optional_balance, ListData, StakeSource, Upstream};

pub const PATH_DELEGATED_INFO: &str = "/network/delegated-info";

// the per-contract breakdown in `delegatedTo` is not kept
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DelegatorStake {
    delegator_address: Address,
    #[serde(default)]
    total: String,
}

/// Stake delegated through the delegation manager contracts.
pub struct DelegatorsSource<R> {
    upstream: Upstream<R>,
}

impl<R: RestClient> DelegatorsSource<R> {
    pub fn new(upstream: Upstream<R>) -> Self {
        Self { upstream }
    }
}

impl<R: RestClient> StakeSource for DelegatorsSource<R> {
    fn name(&self) -> &'static str {
        "delegation-manager"
    }

    async fn fetch(&self) -> Result<StakeMap, Error> {
        let data = self
            .upstream
            .client
            .get_json(PATH_DELEGATED_INFO, &self.upstream.credentials)
            .await?
            .into_data()
            .map_err(|err| match err {
                Error::Upstream(msg) => Error::Upstream(format!("cannot get delegators: {msg}")),
                other => other,
            })?;

        let data: ListData<DelegatorStake> = serde_json::from_value(data)
            .map_err(|err| Error::Decode(format!("delegated info: {err}")))?;

        let mut accounts = StakeMap::with_capacity(data.list.len());

        for entry in data.list {
            match optional_balance(&entry.total) {
                Ok(Some(total)) => {
                    let attributes = StakeAttributes::new().with(StakeField::Delegation, total);
                    accounts.insert(entry.delegator_address, attributes);
                }
                Ok(None) => (),
                Err(err) => warn!(address = %entry.delegator_address, %err, "skipping delegator entry"),
            }
        }

        Ok(accounts)
    }
}
