use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

use crate::{
    indexer::WRITE_BATCH_SIZE,
    reader::{BatchErrorPolicy, READ_BATCH_SIZE},
    reindex::SCROLL_PAGE_SIZE,
};

/// Basic auth credentials. Both parts must be set for them to be used.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,
}

impl Credentials {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn is_basic(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

/// The gateway exposing network and contract view endpoints.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UpstreamConfig {
    pub url: String,

    #[serde(flatten)]
    pub credentials: Credentials,

    /// Request timeout in seconds.
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// The search store holding the account index.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StoreConfig {
    pub url: String,

    #[serde(flatten)]
    pub credentials: Credentials,

    /// Name of the live accounts index to clone from.
    #[serde(default = "default_accounts_index")]
    pub accounts_index: String,

    /// JSON file with the mapping applied to each new generation. The
    /// built-in stake mapping is used when unset.
    #[serde(default)]
    pub mapping_path: Option<PathBuf>,

    #[serde(default)]
    pub timeout: Option<u64>,
}

fn default_accounts_index() -> String {
    "accounts".into()
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SourcesConfig {
    pub delegation_legacy_contract: String,

    /// Secondary token staking contract; the source is disabled when empty.
    #[serde(default)]
    pub lkmex_contract: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AddressCodecConfig {
    Bech32 {
        hrp: String,
        #[serde(default = "default_address_length")]
        length: usize,
    },
    Hex {
        #[serde(default = "default_address_length")]
        length: usize,
    },
}

fn default_address_length() -> usize {
    32
}

impl Default for AddressCodecConfig {
    fn default() -> Self {
        Self::Bech32 {
            hrp: "erd".into(),
            length: default_address_length(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PipelineConfig {
    #[serde(default = "default_read_batch_size")]
    pub read_batch_size: usize,

    #[serde(default = "default_write_batch_size")]
    pub write_batch_size: usize,

    /// What to do when a batch of existing records can't be read.
    #[serde(default)]
    pub on_batch_error: BatchErrorPolicy,

    /// Accept a run whose bulk writes reported item failures.
    #[serde(default)]
    pub allow_partial_writes: bool,

    /// Prepare the new generation while the sources are being fetched.
    #[serde(default = "default_concurrent_clone")]
    pub concurrent_clone: bool,
}

fn default_read_batch_size() -> usize {
    READ_BATCH_SIZE
}

fn default_write_batch_size() -> usize {
    WRITE_BATCH_SIZE
}

fn default_concurrent_clone() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            read_batch_size: READ_BATCH_SIZE,
            write_batch_size: WRITE_BATCH_SIZE,
            on_batch_error: BatchErrorPolicy::default(),
            allow_partial_writes: false,
            concurrent_clone: true,
        }
    }
}

/// Copying the live accounts index into a store of its own.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ReindexConfig {
    /// Store receiving the copy. Its `accounts_index` is the default
    /// destination index.
    pub destination: StoreConfig,

    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    SCROLL_PAGE_SIZE
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug)]
pub struct LoggingConfig {
    #[serde_as(as = "DisplayFromStr")]
    pub max_level: tracing::Level,

    #[serde(default)]
    pub include_http: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            max_level: tracing::Level::INFO,
            include_http: Default::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RootConfig {
    pub upstream: UpstreamConfig,
    pub store: StoreConfig,
    pub sources: SourcesConfig,

    #[serde(default)]
    pub address: AddressCodecConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub reindex: Option<ReindexConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}
