//! In-memory transport for unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::{ApiTransport, Params};
use crate::error::ApiError;

type Handler = dyn Fn(&str, &Params) -> Result<Value, ApiError> + Send + Sync;

pub struct ScriptedTransport {
    handler: Box<Handler>,
    calls: Mutex<Vec<(String, Params)>>,
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, &Params) -> Result<Value, ApiError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, Params)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<Params> {
        self.calls()
            .into_iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p)
            .collect()
    }
}

pub fn param<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.as_str())
}

pub fn api_error(code: i64, message: &str) -> ApiError {
    ApiError::Api {
        code,
        message: message.to_string(),
    }
}

#[async_trait]
impl ApiTransport for ScriptedTransport {
    async fn call(&self, method: &str, params: Params) -> Result<Value, ApiError> {
        let result = (self.handler)(method, &params);
        self.calls.lock().unwrap().push((method.to_string(), params));
        result
    }
}
