use crate::{rest::RestClient, Error, StakeAttributes, StakeField, StakeMap};

use super::{StakeSource, Upstream};

pub const FUNC_ACTIVE_LIST: &str = "getFullActiveList";
pub const FUNC_WAITING_LIST: &str = "getFullWaitingList";

const ACTIVE_STRIDE: usize = 2;

// the third slot of a waiting entry is not a balance
const WAITING_STRIDE: usize = 3;

/// Active and waiting stake held in the legacy delegation contract.
pub struct LegacyDelegationSource<R> {
    upstream: Upstream<R>,
    contract: String,
}

impl<R: RestClient> LegacyDelegationSource<R> {
    pub fn new(upstream: Upstream<R>, contract: String) -> Self {
        Self { upstream, contract }
    }

    async fn collect_list(
        &self,
        func_name: &str,
        stride: usize,
        field: StakeField,
        into: &mut StakeMap,
    ) -> Result<(), Error> {
        let entries = self
            .upstream
            .account_balances(&self.contract, func_name, stride)
            .await?;

        // an address may show up more than once in a listing
        for (address, balance) in entries {
            into.entry(address)
                .or_insert_with(StakeAttributes::new)
                .add(field, balance);
        }

        Ok(())
    }
}

impl<R: RestClient> StakeSource for LegacyDelegationSource<R> {
    fn name(&self) -> &'static str {
        "legacy-delegation"
    }

    async fn fetch(&self) -> Result<StakeMap, Error> {
        let mut accounts = StakeMap::new();

        self.collect_list(
            FUNC_ACTIVE_LIST,
            ACTIVE_STRIDE,
            StakeField::DelegationLegacyActive,
            &mut accounts,
        )
        .await?;

        self.collect_list(
            FUNC_WAITING_LIST,
            WAITING_STRIDE,
            StakeField::DelegationLegacyWaiting,
            &mut accounts,
        )
        .await?;

        Ok(accounts)
    }
}
