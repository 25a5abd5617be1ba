//! One reindexing run, from the stake sources to a populated generation.
//!
//! The phases are:
//!
//! 1. wait for the store to be healthy
//! 2. fetch the stake sources
//! 3. aggregate their maps into one view per account
//! 4. read the stored documents of those accounts from the live index
//! 5. merge stored fields with computed stake
//! 6. clone the live index into a new generation and apply the mapping
//! 7. bulk write the merged records into the new generation
//!
//! Phase 6 only depends on the live index so it may run alongside phases 2
//! to 5. Any failing phase ends the run; the new generation is never
//! promoted here, that's left to whoever consumes the [`RunReport`].

use std::{
    fmt::Display,
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::Utc;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::{
    aggregate::{addresses, aggregate},
    cloner::{generation_name, IndexCloner},
    config::PipelineConfig,
    indexer::{BulkIndexer, BulkReport},
    merge::merge,
    reader::AccountReader,
    rest::RestClient,
    sources::StakeSources,
    store::{default_stake_mapping, StoreClient},
    CancelToken, Error, StakeMap,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Health,
    Sources,
    Aggregate,
    FetchExisting,
    Merge,
    Clone,
    Index,
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Health => "health",
            Phase::Sources => "sources",
            Phase::Aggregate => "aggregate",
            Phase::FetchExisting => "fetch-existing",
            Phase::Merge => "merge",
            Phase::Clone => "clone",
            Phase::Index => "index",
        };

        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{phase} phase failed: {error}")]
pub struct PipelineError {
    pub phase: Phase,
    pub error: Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTiming {
    pub phase: Phase,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    /// The generation that was written.
    pub target_index: String,

    /// Accounts with stake from at least one source.
    pub accounts: usize,

    /// Of those, accounts that already had a stored document.
    pub existing: usize,

    pub bulk: BulkReport,
    pub timings: Vec<PhaseTiming>,
}

impl RunReport {
    pub fn timing(&self, phase: Phase) -> Option<Duration> {
        self.timings
            .iter()
            .find(|x| x.phase == phase)
            .map(|x| x.duration)
    }
}

async fn timed_phase<T, F>(phase: Phase, work: F) -> (Result<T, PipelineError>, PhaseTiming)
where
    F: Future<Output = Result<T, Error>>,
{
    let start = Instant::now();
    let result = work.await;

    let timing = PhaseTiming {
        phase,
        duration: start.elapsed(),
    };

    match &result {
        Ok(_) => info!(%phase, duration_secs = timing.duration.as_secs_f64(), "phase completed"),
        Err(err) => warn!(%phase, %err, duration_secs = timing.duration.as_secs_f64(), "phase failed"),
    }

    (result.map_err(|error| PipelineError { phase, error }), timing)
}

/// Like [`timed_phase`], but `work` is dropped as soon as `cancel` fires.
async fn run_phase<T, F, C>(phase: Phase, cancel: &C, work: F) -> (Result<T, PipelineError>, PhaseTiming)
where
    F: Future<Output = Result<T, Error>>,
    C: CancelToken,
{
    let work = async {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = work => result,
        }
    };

    timed_phase(phase, work).await
}

pub struct Pipeline<R, S> {
    sources: StakeSources<R>,
    store: Arc<S>,
    live_index: String,
    schema: Value,
    config: PipelineConfig,
}

impl<R: RestClient, S: StoreClient> Pipeline<R, S> {
    pub fn new(
        sources: StakeSources<R>,
        store: Arc<S>,
        live_index: impl Into<String>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            sources,
            store,
            live_index: live_index.into(),
            schema: default_stake_mapping(),
            config,
        }
    }

    /// Replaces the mapping applied to new generations.
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }

    pub fn live_index(&self) -> &str {
        &self.live_index
    }

    /// Name for a generation produced now.
    pub fn next_generation(&self) -> String {
        generation_name(&self.live_index, Utc::now())
    }

    /// Fetches every source, failing if any of them failed.
    pub async fn fetch_sources(&self) -> Result<Vec<StakeMap>, Error> {
        let mut maps = Vec::with_capacity(4);
        let mut failure = None;

        for (name, result) in self.sources.fetch_all().await {
            match result {
                Ok(map) => maps.push(map),
                Err(error) if failure.is_none() => {
                    failure = Some(Error::Source {
                        name,
                        error: Box::new(error),
                    });
                }
                Err(_) => (),
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(maps),
        }
    }

    /// Stake per account from all sources, without touching the store.
    pub async fn fetch_stake(&self) -> Result<StakeMap, Error> {
        let maps = self.fetch_sources().await?;
        Ok(aggregate(maps))
    }

    /// Clones the live index into `target`, then applies the schema.
    ///
    /// Cancellation is only observed before and after the clone. Once the
    /// live index is write-blocked the clone runs to completion in its own
    /// task, so the block is always lifted again.
    async fn prepare<C: CancelToken>(&self, target: &str, cancel: &C) -> Result<(), Error> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let cloner = IndexCloner::new(self.store.clone());
        let source = self.live_index.clone();
        let generation = target.to_owned();

        tokio::spawn(async move { cloner.clone_index(&source, &generation).await })
            .await
            .map_err(|err| Error::store(format!("clone task failed: {err}")))??;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        IndexCloner::new(self.store.clone())
            .apply_mapping(target, &self.schema)
            .await
    }

    /// Runs every phase, writing into the `target` generation.
    #[instrument(skip_all, fields(source = %self.live_index, generation = %target))]
    pub async fn run<C: CancelToken>(
        &self,
        target: &str,
        cancel: &C,
    ) -> Result<RunReport, PipelineError> {
        let mut timings = Vec::with_capacity(7);

        let (health, timing) = run_phase(Phase::Health, cancel, self.store.health_wait()).await;
        timings.push(timing);
        health?;

        let (maps, prepared) = if self.config.concurrent_clone {
            let ((maps, t1), (prepared, t2)) = tokio::join!(
                run_phase(Phase::Sources, cancel, self.fetch_sources()),
                timed_phase(Phase::Clone, self.prepare(target, cancel)),
            );
            timings.extend([t1, t2]);
            (maps, Some(prepared))
        } else {
            let (maps, timing) = run_phase(Phase::Sources, cancel, self.fetch_sources()).await;
            timings.push(timing);
            (maps, None)
        };

        let maps = maps?;

        if let Some(prepared) = prepared {
            prepared?;
        }

        let (computed, timing) =
            run_phase(Phase::Aggregate, cancel, async { Ok(aggregate(maps)) }).await;
        timings.push(timing);
        let computed = computed?;

        let accounts = addresses(&computed);

        let reader = AccountReader::new(self.store.clone(), self.live_index.clone())
            .with_batch_size(self.config.read_batch_size)
            .with_policy(self.config.on_batch_error);

        let (existing, timing) =
            run_phase(Phase::FetchExisting, cancel, reader.fetch_existing(&accounts)).await;
        timings.push(timing);
        let existing = existing?;
        let existing_count = existing.len();

        let (records, timing) =
            run_phase(Phase::Merge, cancel, async { Ok(merge(existing, computed)) }).await;
        timings.push(timing);
        let records = records?;

        if !self.config.concurrent_clone {
            let (prepared, timing) = timed_phase(Phase::Clone, self.prepare(target, cancel)).await;
            timings.push(timing);
            prepared?;
        }

        let indexer = BulkIndexer::new(self.store.clone()).with_batch_size(self.config.write_batch_size);

        let (bulk, timing) =
            run_phase(Phase::Index, cancel, indexer.index_accounts(&records, target)).await;
        timings.push(timing);
        let bulk = bulk?;

        if !bulk.is_clean() && !self.config.allow_partial_writes {
            return Err(PipelineError {
                phase: Phase::Index,
                error: Error::StoreWrite {
                    failed: bulk.failed,
                    total: bulk.total(),
                },
            });
        }

        let report = RunReport {
            target_index: target.to_owned(),
            accounts: accounts.len(),
            existing: existing_count,
            bulk,
            timings,
        };

        info!(
            accounts = report.accounts,
            existing = report.existing,
            indexed = report.bulk.indexed,
            failed = report.bulk.failed,
            "reindex run completed"
        );

        Ok(report)
    }
}
