use std::fmt::Display;

use thiserror::Error;

pub mod aggregate;
pub mod balance;
pub mod cloner;
pub mod codec;
pub mod config;
pub mod indexer;
pub mod merge;
pub mod model;
pub mod pipeline;
pub mod reader;
pub mod reindex;
pub mod rest;
pub mod sources;
pub mod store;

pub use balance::Balance;
pub use model::*;

#[derive(Debug, Error)]
pub enum CloneError {
    #[error("setting {index} read-only: {error}")]
    SetReadOnly { index: String, error: Box<Error> },

    #[error("cloning {source_index} into {target}: {error}")]
    Clone {
        source_index: String,
        target: String,
        error: Box<Error>,
    },

    #[error("clone of {source_index} into {target} was not acknowledged")]
    NotAcknowledged { source_index: String, target: String },

    #[error("restoring write access on {index}: {error}")]
    UnsetReadOnly { index: String, error: Box<Error> },

    #[error("{clone}; then restoring write access failed too: {unset}")]
    CloneAndUnset {
        clone: Box<CloneError>,
        unset: Box<CloneError>,
    },

    #[error("applying mapping to {index}: {error}")]
    PutMapping { index: String, error: Box<Error> },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("invalid balance format: {0:?}")]
    InvalidBalanceFormat(String),

    #[error("{name} source: {error}")]
    Source { name: &'static str, error: Box<Error> },

    #[error("store error: {0}")]
    Store(String),

    #[error("{failed} of {total} documents failed to index")]
    StoreWrite { failed: usize, total: usize },

    #[error("clone protocol error: {0}")]
    CloneProtocol(#[from] CloneError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("run cancelled")]
    Cancelled,
}

impl Error {
    pub fn transport(error: impl Display) -> Error {
        Error::Transport(error.to_string())
    }

    pub fn upstream(error: impl Display) -> Error {
        Error::Upstream(error.to_string())
    }

    pub fn decode(error: impl Display) -> Error {
        Error::Decode(error.to_string())
    }

    pub fn store(error: impl Display) -> Error {
        Error::Store(error.to_string())
    }

    pub fn config(text: impl Display) -> Error {
        Error::Config(text.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::decode(value)
    }
}

#[trait_variant::make(Send)]
pub trait CancelToken: Send + Sync + 'static + Clone {
    async fn cancelled(&self);

    fn is_cancelled(&self) -> bool;
}

impl CancelToken for tokio_util::sync::CancellationToken {
    async fn cancelled(&self) {
        tokio_util::sync::CancellationToken::cancelled(self).await
    }

    fn is_cancelled(&self) -> bool {
        tokio_util::sync::CancellationToken::is_cancelled(self)
    }
}

/// A token that never fires, for callers that rely on transport timeouts alone.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverCancel;

impl CancelToken for NeverCancel {
    async fn cancelled(&self) {
        std::future::pending::<()>().await
    }

    fn is_cancelled(&self) -> bool {
        false
    }
}
