use std::sync::Arc;

use miette::{Context as _, IntoDiagnostic};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::{filter::Targets, prelude::*};

use stakeidx::adapters::{ElasticClient, GatewayClient};
use stakeidx_core::{
    codec,
    config::{LoggingConfig, StoreConfig},
    pipeline::Pipeline,
    sources::{StakeSources, Upstream},
    store::default_stake_mapping,
};

use crate::Config;

pub fn setup_tracing(config: &LoggingConfig) -> miette::Result<()> {
    let level = config.max_level;

    let mut filter = Targets::new()
        .with_target("stakeidx", level)
        .with_target("stakeidx_core", level);

    if config.include_http {
        filter = filter
            .with_target("reqwest", level)
            .with_target("hyper", level);
    }

    tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level)
        .finish()
        .with(filter)
        .init();

    Ok(())
}

pub fn hook_exit_token() -> CancellationToken {
    let cancel = CancellationToken::new();

    let cancel2 = cancel.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "can't listen for exit signal");
            return;
        }

        warn!("exit signal detected");
        debug!("notifying exit");
        cancel2.cancel();
    });

    cancel
}

pub fn build_sources(config: &Config) -> miette::Result<StakeSources<GatewayClient>> {
    let client = GatewayClient::new(&config.upstream)
        .into_diagnostic()
        .context("building gateway client")?;

    let codec = codec::from_config(&config.address)
        .into_diagnostic()
        .context("building address codec")?;

    let upstream = Upstream::new(
        Arc::new(client),
        Arc::from(codec),
        config.upstream.credentials.clone(),
    );

    Ok(StakeSources::new(upstream, &config.sources))
}

pub fn build_store(config: &Config) -> miette::Result<Arc<ElasticClient>> {
    let client = ElasticClient::new(&config.store)
        .into_diagnostic()
        .context("building store client")?;

    Ok(Arc::new(client))
}

pub fn load_schema(config: &StoreConfig) -> miette::Result<Value> {
    let Some(path) = &config.mapping_path else {
        return Ok(default_stake_mapping());
    };

    let raw = std::fs::read(path)
        .into_diagnostic()
        .with_context(|| format!("reading mapping file {}", path.display()))?;

    serde_json::from_slice(&raw)
        .into_diagnostic()
        .context("parsing mapping file")
}

pub fn build_pipeline(config: &Config) -> miette::Result<Pipeline<GatewayClient, ElasticClient>> {
    let pipeline = Pipeline::new(
        build_sources(config)?,
        build_store(config)?,
        config.store.accounts_index.clone(),
        config.pipeline.clone(),
    )
    .with_schema(load_schema(&config.store)?);

    Ok(pipeline)
}
