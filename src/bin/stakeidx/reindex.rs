use std::sync::Arc;

use miette::{Context as _, IntoDiagnostic};
use tracing::info;

use stakeidx::{adapters::ElasticClient, prelude::Error};
use stakeidx_core::{pipeline::Pipeline, reindex::Reindexer, store::StoreClient};

use crate::common;

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Index to write in the destination store. Defaults to the
    /// destination's accounts index.
    #[arg(long)]
    destination_index: Option<String>,
}

pub async fn run(config: &crate::Config, args: &Args) -> miette::Result<()> {
    let Some(reindex) = &config.reindex else {
        return Err(Error::config("missing [reindex] section").into());
    };

    let source = common::build_store(config)?;

    let destination = ElasticClient::new(&reindex.destination)
        .into_diagnostic()
        .context("building destination store client")?;
    let destination = Arc::new(destination);

    let destination_index = match &args.destination_index {
        Some(x) => x.clone(),
        None => reindex.destination.accounts_index.clone(),
    };

    let exit = common::hook_exit_token();

    let pipeline = Pipeline::new(
        common::build_sources(config)?,
        source.clone(),
        config.store.accounts_index.clone(),
        config.pipeline.clone(),
    );

    let computed = pipeline
        .fetch_stake()
        .await
        .into_diagnostic()
        .context("fetching stake")?;

    source
        .health_wait()
        .await
        .into_diagnostic()
        .context("waiting for source store")?;

    destination
        .health_wait()
        .await
        .into_diagnostic()
        .context("waiting for destination store")?;

    info!(
        source = pipeline.live_index(),
        destination = %destination_index,
        accounts = computed.len(),
        "starting reindex"
    );

    let report = Reindexer::new(source, destination)
        .with_page_size(reindex.page_size)
        .with_write_batch_size(config.pipeline.write_batch_size)
        .reindex_accounts(pipeline.live_index(), &destination_index, computed, &exit)
        .await
        .into_diagnostic()
        .context("reindexing accounts")?;

    println!("destination: {destination_index}");
    println!("documents copied: {} in {} pages", report.scanned, report.pages);
    println!("accounts created: {}", report.created);
    println!(
        "indexed: {} in {} batches, failed: {}",
        report.bulk.indexed, report.bulk.batches, report.bulk.failed
    );

    for failure in &report.bulk.failures {
        println!(
            "  {} {}: {}",
            failure.id.as_deref().unwrap_or("?"),
            failure.kind,
            failure.reason
        );
    }

    if !report.bulk.is_clean() && !config.pipeline.allow_partial_writes {
        miette::bail!(
            "{} of {} documents were rejected by the destination",
            report.bulk.failed,
            report.bulk.total()
        );
    }

    Ok(())
}
