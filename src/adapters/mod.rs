//! HTTP implementations of the collaborator traits defined in core.

use std::time::Duration;

use crate::prelude::Error;

pub mod elastic;
pub mod gateway;

pub use elastic::ElasticClient;
pub use gateway::GatewayClient;

const USER_AGENT: &str = concat!("stakeidx/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT_SECS: u64 = 60;

fn build_http(timeout: Option<u64>) -> Result<reqwest::Client, Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout.unwrap_or(DEFAULT_TIMEOUT_SECS)))
        .build()
        .map_err(Error::client)
}

fn base_url(url: &str) -> Result<String, Error> {
    let parsed = reqwest::Url::parse(url).map_err(Error::config)?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::config(format!("unsupported url scheme: {url}")));
    }

    Ok(url.trim_end_matches('/').to_owned())
}
