use clap::{Parser, Subcommand};
use miette::{Context as _, IntoDiagnostic, Result};
use std::path::PathBuf;

use stakeidx_core::config::RootConfig;

mod clone;
mod common;
mod reindex;
mod run;
mod stake;

#[derive(Debug, Subcommand)]
enum Command {
    /// Reindex stake into a new generation of the accounts index
    Run(run::Args),

    /// Fetch and aggregate stake without touching the store
    Stake(stake::Args),

    /// Clone the live accounts index into a new generation
    Clone(clone::Args),

    /// Copy the live accounts index into another store with fresh stake
    Reindex(reindex::Args),
}

#[derive(Debug, Parser)]
#[clap(name = "stakeidx")]
#[clap(bin_name = "stakeidx")]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long)]
    config: Option<PathBuf>,
}

pub type Config = RootConfig;

pub fn load_config(explicit_file: &Option<PathBuf>) -> Result<Config, config::ConfigError> {
    let mut s = config::Config::builder();

    // our base config will always be in /etc/stakeidx
    s = s.add_source(config::File::with_name("/etc/stakeidx/config.toml").required(false));

    // but we can override it by having a file in the working dir
    s = s.add_source(config::File::with_name("stakeidx.toml").required(false));

    // if an explicit file was passed, then we load it as mandatory
    if let Some(explicit) = explicit_file.as_ref().and_then(|x| x.to_str()) {
        s = s.add_source(config::File::with_name(explicit).required(true));
    }

    // finally, we use env vars to make some last-step overrides
    s = s.add_source(
        config::Environment::with_prefix("STAKEIDX")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    s.build()?.try_deserialize()
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let config = load_config(&args.config)
        .into_diagnostic()
        .context("loading config")?;

    common::setup_tracing(&config.logging)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;

    rt.block_on(async {
        match args.command {
            Command::Run(x) => run::run(&config, &x).await,
            Command::Stake(x) => stake::run(&config, &x).await,
            Command::Clone(x) => clone::run(&config, &x).await,
            Command::Reindex(x) => reindex::run(&config, &x).await,
        }
    })
}
