use std::collections::BTreeMap;

use miette::{Context as _, IntoDiagnostic};

use stakeidx_core::pipeline::Pipeline;

use crate::common;

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Only print the number of accounts with stake
    #[arg(long)]
    count: bool,
}

pub async fn run(config: &crate::Config, args: &Args) -> miette::Result<()> {
    let pipeline = Pipeline::new(
        common::build_sources(config)?,
        common::build_store(config)?,
        config.store.accounts_index.clone(),
        config.pipeline.clone(),
    );

    let accounts = pipeline
        .fetch_stake()
        .await
        .into_diagnostic()
        .context("fetching stake")?;

    if args.count {
        println!("{}", accounts.len());
        return Ok(());
    }

    let sorted: BTreeMap<_, _> = accounts.iter().collect();

    let json = serde_json::to_string_pretty(&sorted).into_diagnostic()?;
    println!("{json}");

    Ok(())
}
