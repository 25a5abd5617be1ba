//! Upstream feeds of stake attributes.
//!
//! Each source builds a fresh [`StakeMap`] on every fetch and populates its
//! own attribute names only, so results can be fetched concurrently and
//! combined afterwards by the aggregator.

use std::{sync::Arc, time::Instant};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    codec::AddressCodec,
    config::{Credentials, SourcesConfig},
    rest::{vm_query, RestClient, VmQueryRequest},
    Address, Balance, Error, StakeMap,
};

pub mod delegators;
pub mod legacy;
pub mod lkmex;
pub mod validators;

pub use delegators::DelegatorsSource;
pub use legacy::LegacyDelegationSource;
pub use lkmex::LkMexSource;
pub use validators::ValidatorsSource;

#[trait_variant::make(Send)]
pub trait StakeSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self) -> Result<StakeMap, Error>;
}

/// Shared handles every source needs to talk to the gateway.
pub struct Upstream<R> {
    pub client: Arc<R>,
    pub codec: Arc<dyn AddressCodec>,
    pub credentials: Credentials,
}

impl<R> Clone for Upstream<R> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            codec: self.codec.clone(),
            credentials: self.credentials.clone(),
        }
    }
}

impl<R: RestClient> Upstream<R> {
    pub fn new(client: Arc<R>, codec: Arc<dyn AddressCodec>, credentials: Credentials) -> Self {
        Self {
            client,
            codec,
            credentials,
        }
    }

    /// Runs a view call whose return data is a flat list of
    /// `(address, balance, ...)` records `stride` slots wide. Only the first
    /// two slots of each record are read.
    pub async fn account_balances(
        &self,
        contract: &str,
        func_name: &str,
        stride: usize,
    ) -> Result<Vec<(Address, Balance)>, Error> {
        debug_assert!(stride >= 2);

        let request = VmQueryRequest::view(contract, func_name);
        let slots = vm_query(self.client.as_ref(), &request).await?;

        let mut out = Vec::with_capacity(slots.len() / stride + 1);

        for record in slots.chunks(stride) {
            let [address, balance, ..] = record else {
                return Err(Error::Decode(format!(
                    "{func_name}: truncated record of {} slots",
                    record.len()
                )));
            };

            let address = self.codec.encode(address)?;
            out.push((address, Balance::from_be_bytes(balance)));
        }

        Ok(out)
    }
}

/// The `data` payload of the network info endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct ListData<T> {
    pub list: Vec<T>,
}

/// Parses an optional balance from a JSON feed entry: empty means no value.
pub(crate) fn optional_balance(raw: &str) -> Result<Option<Balance>, Error> {
    match raw {
        "" => Ok(None),
        raw => Balance::parse(raw).map(Some),
    }
}

fn log_outcome(name: &str, start: Instant, result: &Result<StakeMap, Error>) {
    let duration_secs = start.elapsed().as_secs_f64();

    match result {
        Ok(map) => info!(source = name, accounts = map.len(), duration_secs, "fetched stake source"),
        Err(err) => warn!(source = name, %err, duration_secs, "stake source failed"),
    }
}

async fn timed<S: StakeSource>(source: &S) -> (&'static str, Result<StakeMap, Error>) {
    let start = Instant::now();
    let result = source.fetch().await;
    log_outcome(source.name(), start, &result);
    (source.name(), result)
}

/// The four stake sources feeding one run.
pub struct StakeSources<R> {
    pub legacy: LegacyDelegationSource<R>,
    pub validators: ValidatorsSource<R>,
    pub delegators: DelegatorsSource<R>,
    pub lkmex: LkMexSource<R>,
}

impl<R: RestClient> StakeSources<R> {
    pub fn new(upstream: Upstream<R>, config: &SourcesConfig) -> Self {
        Self {
            legacy: LegacyDelegationSource::new(
                upstream.clone(),
                config.delegation_legacy_contract.clone(),
            ),
            validators: ValidatorsSource::new(upstream.clone()),
            delegators: DelegatorsSource::new(upstream.clone()),
            lkmex: LkMexSource::new(upstream, config.lkmex_contract.clone()),
        }
    }

    /// Fetches every source concurrently. Each result stands on its own; one
    /// failing source doesn't stop the others from completing.
    pub async fn fetch_all(&self) -> Vec<(&'static str, Result<StakeMap, Error>)> {
        let (legacy, validators, delegators, lkmex) = tokio::join!(
            timed(&self.legacy),
            timed(&self.validators),
            timed(&self.delegators),
            timed(&self.lkmex),
        );

        vec![legacy, validators, delegators, lkmex]
    }
}
