use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use serde_json::Value;

use stakeidx_core::{
    config::Credentials,
    rest::{ApiEnvelope, RestClient, PATH_VM_QUERY},
    Error,
};

use crate::{return_data, TestFault};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayCall {
    Get { path: String, authenticated: bool },
    View { contract: String, func_name: String },
}

#[derive(Default)]
struct Script {
    gets: HashMap<String, ApiEnvelope>,
    views: HashMap<(String, String), ApiEnvelope>,
}

/// A scripted gateway. Requests without a scripted response fail with a
/// transport error.
#[derive(Clone, Default)]
pub struct FakeGateway {
    script: Arc<Mutex<Script>>,
    calls: Arc<Mutex<Vec<GatewayCall>>>,
    fault: Option<TestFault>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fault(mut self, fault: TestFault) -> Self {
        self.fault = Some(fault);
        self
    }

    pub fn with_get(self, path: &str, envelope: ApiEnvelope) -> Self {
        self.script
            .lock()
            .unwrap()
            .gets
            .insert(path.to_owned(), envelope);
        self
    }

    pub fn with_get_data(self, path: &str, data: Value) -> Self {
        self.with_get(path, ApiEnvelope::ok(data))
    }

    pub fn with_view_envelope(self, contract: &str, func_name: &str, envelope: ApiEnvelope) -> Self {
        self.script
            .lock()
            .unwrap()
            .views
            .insert((contract.to_owned(), func_name.to_owned()), envelope);
        self
    }

    pub fn with_view(self, contract: &str, func_name: &str, slots: &[Vec<u8>]) -> Self {
        self.with_view_envelope(contract, func_name, ApiEnvelope::ok(return_data(slots)))
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl RestClient for FakeGateway {
    async fn get_json(&self, path: &str, credentials: &Credentials) -> Result<ApiEnvelope, Error> {
        self.record(GatewayCall::Get {
            path: path.to_owned(),
            authenticated: credentials.is_basic(),
        });

        if let Some(fault) = self.fault {
            return Err(fault.error());
        }

        self.script
            .lock()
            .unwrap()
            .gets
            .get(path)
            .cloned()
            .ok_or_else(|| Error::transport(format!("no scripted response for GET {path}")))
    }

    async fn post_json(
        &self,
        path: &str,
        body: &Value,
        _credentials: &Credentials,
    ) -> Result<ApiEnvelope, Error> {
        if path != PATH_VM_QUERY {
            return Err(Error::transport(format!("unexpected POST {path}")));
        }

        let contract = body["scAddress"].as_str().unwrap_or_default().to_owned();
        let func_name = body["funcName"].as_str().unwrap_or_default().to_owned();

        self.record(GatewayCall::View {
            contract: contract.clone(),
            func_name: func_name.clone(),
        });

        if let Some(fault) = self.fault {
            return Err(fault.error());
        }

        self.script
            .lock()
            .unwrap()
            .views
            .get(&(contract, func_name.clone()))
            .cloned()
            .ok_or_else(|| Error::transport(format!("no scripted response for {func_name}")))
    }
}
