use reqwest::{header::CONTENT_TYPE, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use stakeidx_core::{
    config::{Credentials, StoreConfig},
    store::StoreClient,
    Address, Error,
};

use super::{base_url, build_http};

const NDJSON: &str = "application/x-ndjson";
const HEALTH_PATH: &str = "/_cluster/health?wait_for_status=yellow&timeout=30s";
const SCROLL_PATH: &str = "/_search/scroll";

// how long the store keeps a scroll context alive between pages
const SCROLL_KEEP_ALIVE: &str = "1m";

fn open_scroll_body(page_size: usize) -> Value {
    json!({
        "size": page_size,
        "query": { "match_all": {} },
        "sort": ["_doc"],
    })
}

#[derive(Debug, Deserialize)]
struct Acknowledged {
    #[serde(default)]
    acknowledged: bool,
}

#[derive(Debug, Deserialize)]
struct ClusterHealth {
    status: String,

    #[serde(default)]
    timed_out: bool,
}

/// A search store reached over its HTTP API.
pub struct ElasticClient {
    http: reqwest::Client,
    base: String,
    credentials: Credentials,
}

impl ElasticClient {
    pub fn new(config: &StoreConfig) -> Result<Self, crate::prelude::Error> {
        Ok(Self {
            http: build_http(config.timeout)?,
            base: base_url(&config.url)?,
            credentials: config.credentials.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.http.request(method, format!("{}{path}", self.base));

        match self.credentials.is_basic() {
            true => req.basic_auth(&self.credentials.username, Some(&self.credentials.password)),
            false => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Vec<u8>, Error> {
        let res = req.send().await.map_err(Error::transport)?;
        let status = res.status();
        let body = res.bytes().await.map_err(Error::transport)?;

        if !status.is_success() {
            return Err(Error::Store(format!(
                "{status}: {}",
                String::from_utf8_lossy(&body)
            )));
        }

        Ok(body.to_vec())
    }

    async fn send_json(&self, method: Method, path: &str, body: &Value) -> Result<Vec<u8>, Error> {
        self.send(self.request(method, path).json(body)).await
    }
}

impl StoreClient for ElasticClient {
    async fn bulk_write(&self, payload: Vec<u8>, index: &str) -> Result<Vec<u8>, Error> {
        debug!(index, bytes = payload.len(), "sending bulk request");

        let req = self
            .request(Method::POST, &format!("/{index}/_bulk"))
            .header(CONTENT_TYPE, NDJSON)
            .body(payload);

        self.send(req).await
    }

    async fn multi_get(&self, ids: &[Address], index: &str) -> Result<Vec<u8>, Error> {
        self.send_json(Method::POST, &format!("/{index}/_mget"), &json!({ "ids": ids }))
            .await
    }

    async fn clone_index(&self, source: &str, target: &str) -> Result<bool, Error> {
        // the clone inherits the write block of its source unless overridden
        let body = json!({ "settings": { "index.blocks.write": false } });

        let res = self
            .send_json(Method::POST, &format!("/{source}/_clone/{target}"), &body)
            .await?;

        let ack: Acknowledged = serde_json::from_slice(&res)?;

        Ok(ack.acknowledged)
    }

    async fn put_settings(&self, read_only: bool, index: &str) -> Result<(), Error> {
        let body = json!({ "index": { "blocks": { "write": read_only } } });

        self.send_json(Method::PUT, &format!("/{index}/_settings"), &body)
            .await?;

        Ok(())
    }

    async fn put_mapping(&self, index: &str, schema: &Value) -> Result<(), Error> {
        self.send_json(Method::PUT, &format!("/{index}/_mapping"), schema)
            .await?;

        Ok(())
    }

    async fn health_wait(&self) -> Result<(), Error> {
        let res = self.send(self.request(Method::GET, HEALTH_PATH)).await?;
        let health: ClusterHealth = serde_json::from_slice(&res)?;

        if health.timed_out || health.status == "red" {
            return Err(Error::Store(format!("cluster is not ready: {}", health.status)));
        }

        Ok(())
    }

    async fn scroll(
        &self,
        index: &str,
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<Vec<u8>, Error> {
        match cursor {
            None => {
                let path = format!("/{index}/_search?scroll={SCROLL_KEEP_ALIVE}");
                self.send_json(Method::POST, &path, &open_scroll_body(page_size))
                    .await
            }
            Some(cursor) => {
                let body = json!({ "scroll": SCROLL_KEEP_ALIVE, "scroll_id": cursor });
                self.send_json(Method::POST, SCROLL_PATH, &body).await
            }
        }
    }

    async fn clear_scroll(&self, cursor: &str) -> Result<(), Error> {
        self.send_json(Method::DELETE, SCROLL_PATH, &json!({ "scroll_id": cursor }))
            .await?;

        Ok(())
    }
}
