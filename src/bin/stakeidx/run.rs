use miette::{Context as _, IntoDiagnostic};
use tracing::info;

use crate::common;

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Name of the generation to write. Derived from the live index when
    /// omitted.
    #[arg(long)]
    target: Option<String>,
}

pub async fn run(config: &crate::Config, args: &Args) -> miette::Result<()> {
    let pipeline = common::build_pipeline(config)?;
    let exit = common::hook_exit_token();

    let target = match &args.target {
        Some(x) => x.clone(),
        None => pipeline.next_generation(),
    };

    info!(source = pipeline.live_index(), %target, "starting reindex run");

    let report = pipeline
        .run(&target, &exit)
        .await
        .into_diagnostic()
        .context("reindex run")?;

    println!("generation: {}", report.target_index);
    println!("accounts with stake: {}", report.accounts);
    println!("previously stored: {}", report.existing);
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

    for timing in &report.timings {
        println!("  {:<15} {:.3}s", timing.phase.to_string(), timing.duration.as_secs_f64());
    }

    Ok(())
}
