use reqwest::{header::ACCEPT, Method, RequestBuilder, StatusCode};
use serde_json::Value;

use stakeidx_core::{
    config::{Credentials, UpstreamConfig},
    rest::{ApiEnvelope, RestClient},
    Error,
};

use super::{base_url, build_http};

/// The network gateway reached over HTTP.
pub struct GatewayClient {
    http: reqwest::Client,
    base: String,
}

impl GatewayClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, crate::prelude::Error> {
        Ok(Self {
            http: build_http(config.timeout)?,
            base: base_url(&config.url)?,
        })
    }

    fn request(&self, method: Method, path: &str, credentials: &Credentials) -> RequestBuilder {
        let req = self
            .http
            .request(method, format!("{}{path}", self.base))
            .header(ACCEPT, "application/json");

        match credentials.is_basic() {
            true => req.basic_auth(&credentials.username, Some(&credentials.password)),
            false => req,
        }
    }
}

fn decode_envelope(body: &[u8]) -> Result<ApiEnvelope, Error> {
    serde_json::from_slice(body).map_err(|err| Error::Decode(format!("gateway response: {err}")))
}

/// Error for a response that didn't come back with a success status.
///
/// The envelope's own error wins when the body carries one.
fn status_error(path: &str, status: StatusCode, body: &[u8]) -> Error {
    match decode_envelope(body) {
        Ok(envelope) if !envelope.error.is_empty() => Error::Upstream(envelope.error),
        _ => Error::Upstream(format!("{path} answered {status}")),
    }
}

impl RestClient for GatewayClient {
    async fn get_json(&self, path: &str, credentials: &Credentials) -> Result<ApiEnvelope, Error> {
        let res = self
            .request(Method::GET, path, credentials)
            .send()
            .await
            .map_err(Error::transport)?;

        let status = res.status();
        let body = res.bytes().await.map_err(Error::transport)?;

        if !status.is_success() {
            return Err(status_error(path, status, &body));
        }

        decode_envelope(&body)
    }

    async fn post_json(
        &self,
        path: &str,
        body: &Value,
        credentials: &Credentials,
    ) -> Result<ApiEnvelope, Error> {
        let res = self
            .request(Method::POST, path, credentials)
            .json(body)
            .send()
            .await
            .map_err(Error::transport)?;

        let status = res.status();
        let body = res.bytes().await.map_err(Error::transport)?;

        if status == StatusCode::OK {
            return decode_envelope(&body);
        }

        Err(status_error(path, status, &body))
    }
}
