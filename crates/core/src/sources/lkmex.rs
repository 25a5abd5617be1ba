use crate::{rest::RestClient, Error, StakeAttributes, StakeField, StakeMap};

use super::{StakeSource, Upstream};

pub const FUNC_SNAPSHOT: &str = "getSnapshot";

const SNAPSHOT_STRIDE: usize = 2;

/// Locked secondary tokens staked in the token staking contract.
///
/// The source is optional: with no contract configured it yields an empty map
/// without contacting the gateway.
pub struct LkMexSource<R> {
    upstream: Upstream<R>,
    contract: String,
}

impl<R: RestClient> LkMexSource<R> {
    pub fn new(upstream: Upstream<R>, contract: String) -> Self {
        Self { upstream, contract }
    }

    pub fn is_enabled(&self) -> bool {
        !self.contract.is_empty()
    }
}

impl<R: RestClient> StakeSource for LkMexSource<R> {
    fn name(&self) -> &'static str {
        "lkmex-staking"
    }

    async fn fetch(&self) -> Result<StakeMap, Error> {
        if !self.is_enabled() {
            return Ok(StakeMap::new());
        }

        let entries = self
            .upstream
            .account_balances(&self.contract, FUNC_SNAPSHOT, SNAPSHOT_STRIDE)
            .await?;

        let accounts = entries
            .into_iter()
            .map(|(address, balance)| {
                let attributes = StakeAttributes::new().with(StakeField::LkMexStake, balance);
                (address, attributes)
            })
            .collect();

        Ok(accounts)
    }
}
