use serde::Deserialize;
use tracing::warn;

use crate::{rest::RestClient, Address, Error, StakeAttributes, StakeField, StakeMap};

use super::{optional_balance, ListData, StakeSource, Upstream};

pub const PATH_DIRECT_STAKED_INFO: &str = "/network/direct-staked-info";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StakedInfo {
    address: Address,
    #[serde(default)]
    staked: String,
    #[serde(default)]
    top_up: String,
}

impl StakedInfo {
    fn attributes(&self) -> Result<StakeAttributes, Error> {
        let mut attributes = StakeAttributes::new();

        if let Some(staked) = optional_balance(&self.staked)? {
            attributes.set(StakeField::ValidatorsActive, staked);
        }

        if let Some(top_up) = optional_balance(&self.top_up)? {
            attributes.set(StakeField::ValidatorsTopUp, top_up);
        }

        Ok(attributes)
    }
}

/// Stake locked directly by validator owners, with their top-up.
pub struct ValidatorsSource<R> {
    upstream: Upstream<R>,
}

impl<R: RestClient> ValidatorsSource<R> {
    pub fn new(upstream: Upstream<R>) -> Self {
        Self { upstream }
    }
}

impl<R: RestClient> StakeSource for ValidatorsSource<R> {
    fn name(&self) -> &'static str {
        "validators"
    }

    async fn fetch(&self) -> Result<StakeMap, Error> {
        let data = self
            .upstream
            .client
            .get_json(PATH_DIRECT_STAKED_INFO, &self.upstream.credentials)
            .await?
            .into_data()?;

        let data: ListData<StakedInfo> = serde_json::from_value(data)
            .map_err(|err| Error::Decode(format!("direct staked info: {err}")))?;

        let mut accounts = StakeMap::with_capacity(data.list.len());

        for entry in data.list {
            match entry.attributes() {
                Ok(attributes) if attributes.is_empty() => (),
                Ok(attributes) => {
                    accounts.insert(entry.address, attributes);
                }
                Err(err) => warn!(address = %entry.address, %err, "skipping validator entry"),
            }
        }

        Ok(accounts)
    }
}
