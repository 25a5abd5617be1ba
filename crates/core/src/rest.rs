//! Gateway REST interface consumed by the stake sources.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{config::Credentials, Error};

pub const PATH_VM_QUERY: &str = "/vm-values/query";

/// The envelope wrapping every gateway response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ApiEnvelope {
    #[serde(default)]
    pub data: Value,

    #[serde(default)]
    pub error: String,

    #[serde(default)]
    pub code: String,
}

impl ApiEnvelope {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            error: String::new(),
            code: "successful".into(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            data: Value::Null,
            error: error.into(),
            code: "internal_issue".into(),
        }
    }

    /// Unwraps the payload, turning a reported error into [`Error::Upstream`].
    pub fn into_data(self) -> Result<Value, Error> {
        if !self.error.is_empty() {
            return Err(Error::Upstream(match self.code.as_str() {
                "" => self.error,
                code => format!("{} (code: {code})", self.error),
            }));
        }

        Ok(self.data)
    }
}

#[trait_variant::make(Send)]
pub trait RestClient: Send + Sync + 'static {
    async fn get_json(&self, path: &str, credentials: &Credentials) -> Result<ApiEnvelope, Error>;

    async fn post_json(
        &self,
        path: &str,
        body: &Value,
        credentials: &Credentials,
    ) -> Result<ApiEnvelope, Error>;
}

/// A read-only contract view call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VmQueryRequest {
    pub sc_address: String,
    pub func_name: String,
    pub caller: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl VmQueryRequest {
    /// A call made by the contract on itself, with no value and no arguments.
    pub fn view(contract: &str, func_name: &str) -> Self {
        Self {
            sc_address: contract.to_owned(),
            func_name: func_name.to_owned(),
            caller: contract.to_owned(),
            value: String::new(),
            args: vec![],
        }
    }
}

#[derive(Debug, Deserialize)]
struct VmQueryData {
    data: VmOutput,
}

#[derive(Debug, Deserialize)]
struct VmOutput {
    #[serde(rename = "returnData", default)]
    return_data: Option<Vec<Option<String>>>,
}

/// Runs a view call and returns the decoded return data slots.
pub async fn vm_query<R: RestClient>(
    client: &R,
    request: &VmQueryRequest,
) -> Result<Vec<Vec<u8>>, Error> {
    let body = serde_json::to_value(request)?;

    let data = client
        .post_json(PATH_VM_QUERY, &body, &Credentials::none())
        .await?
        .into_data()?;

    let data: VmQueryData = serde_json::from_value(data)
        .map_err(|err| Error::Decode(format!("{}: {err}", request.func_name)))?;

    data.data
        .return_data
        .unwrap_or_default()
        .into_iter()
        .map(|slot| match slot {
            Some(encoded) => STANDARD.decode(encoded).map_err(Error::decode),
            None => Ok(vec![]),
        })
        .collect()
}
