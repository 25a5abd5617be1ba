//! Production of new index generations.
//!
//! A generation is cloned from the live index, which has to be write-blocked
//! for the duration of the clone. Write access is always restored
//! afterwards, whatever the outcome of the clone itself.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::{store::StoreClient, CloneError, Error};

const GENERATION_FORMAT: &str = "%Y%m%d%H%M%S";

/// Strips a trailing generation suffix (`-` followed by digits) from an index
/// name.
pub fn base_name(index: &str) -> &str {
    match index.rsplit_once('-') {
        Some((base, suffix))
            if !base.is_empty()
                && !suffix.is_empty()
                && suffix.bytes().all(|b| b.is_ascii_digit()) =>
        {
            base
        }
        _ => index,
    }
}

/// Derives the name of the generation cloned from `source` at `now`.
///
/// The name is the base of `source` with the run timestamp appended. When
/// that would collide with `source` itself, a counter is appended instead of
/// reusing the live name.
pub fn generation_name(source: &str, now: DateTime<Utc>) -> String {
    let base = base_name(source);
    let candidate = format!("{base}-{}", now.format(GENERATION_FORMAT));

    if candidate != source {
        return candidate;
    }

    format!("{candidate}1")
}

pub struct IndexCloner<S> {
    store: Arc<S>,
}

impl<S: StoreClient> IndexCloner<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn restore_writes(&self, index: &str) -> Result<(), CloneError> {
        self.store
            .put_settings(false, index)
            .await
            .map_err(|error| CloneError::UnsetReadOnly {
                index: index.to_owned(),
                error: Box::new(error),
            })
    }

    async fn do_clone(&self, source: &str, target: &str) -> Result<(), CloneError> {
        match self.store.clone_index(source, target).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(CloneError::NotAcknowledged {
                source_index: source.to_owned(),
                target: target.to_owned(),
            }),
            Err(error) => Err(CloneError::Clone {
                source_index: source.to_owned(),
                target: target.to_owned(),
                error: Box::new(error),
            }),
        }
    }

    /// Clones `source` into `target`: block writes on the source, clone,
    /// then unblock writes.
    ///
    /// The unblock step runs even when the clone fails, exactly once. If
    /// both fail the returned error carries both failures.
    #[instrument(skip(self))]
    pub async fn clone_index(&self, source: &str, target: &str) -> Result<(), CloneError> {
        self.store
            .put_settings(true, source)
            .await
            .map_err(|error| CloneError::SetReadOnly {
                index: source.to_owned(),
                error: Box::new(error),
            })?;

        let cloned = self.do_clone(source, target).await;
        let restored = self.restore_writes(source).await;

        match (cloned, restored) {
            (Ok(()), Ok(())) => {
                info!("index cloned");
                Ok(())
            }
            (Err(clone), Ok(())) => Err(clone),
            (Ok(()), Err(unset)) => {
                warn!(%unset, "index cloned but the source is still write-blocked");
                Err(unset)
            }
            (Err(clone), Err(unset)) => Err(CloneError::CloneAndUnset {
                clone: Box::new(clone),
                unset: Box::new(unset),
            }),
        }
    }

    /// Produces a writable generation: clone, then apply `schema` to it.
    pub async fn prepare_generation(
        &self,
        source: &str,
        target: &str,
        schema: &Value,
    ) -> Result<(), Error> {
        self.clone_index(source, target).await?;
        self.apply_mapping(target, schema).await
    }

    pub async fn apply_mapping(&self, target: &str, schema: &Value) -> Result<(), Error> {
        self.store
            .put_mapping(target, schema)
            .await
            .map_err(|error| CloneError::PutMapping {
                index: target.to_owned(),
                error: Box::new(error),
            })?;

        info!(target, "mapping applied to new generation");

        Ok(())
    }
}
