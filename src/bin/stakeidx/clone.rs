use miette::{Context as _, IntoDiagnostic};

use stakeidx_core::{cloner::IndexCloner, store::StoreClient};

use crate::common;

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Name of the new generation
    #[arg(long)]
    target: String,

    /// Skip applying the stake mapping to the new generation
    #[arg(long)]
    no_mapping: bool,
}

pub async fn run(config: &crate::Config, args: &Args) -> miette::Result<()> {
    let store = common::build_store(config)?;

    store
        .health_wait()
        .await
        .into_diagnostic()
        .context("waiting for store")?;

    let source = &config.store.accounts_index;
    let cloner = IndexCloner::new(store);

    if args.no_mapping {
        cloner
            .clone_index(source, &args.target)
            .await
            .into_diagnostic()
            .context("cloning index")?;
    } else {
        let schema = common::load_schema(&config.store)?;

        cloner
            .prepare_generation(source, &args.target, &schema)
            .await
            .into_diagnostic()
            .context("preparing generation")?;
    }

    println!("{} cloned into {}", source, args.target);

    Ok(())
}
