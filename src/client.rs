use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::ApiError;

pub const DEFAULT_API_BASE: &str = "https://api.vk.com/method";
pub const DEFAULT_API_VERSION: &str = "5.131";

/// Query parameters of one API call, in request order.
pub type Params = Vec<(&'static str, String)>;

/// One GET against a named API method, yielding the `response` payload.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn call(&self, method: &str, params: Params) -> Result<Value, ApiError>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    response: Option<Value>,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    error_msg: String,
}

/// Splits a decoded body into its payload or the reported error.
pub fn parse_envelope(body: Value) -> Result<Value, ApiError> {
    let envelope: Envelope = serde_json::from_value(body)?;
    match (envelope.error, envelope.response) {
        (Some(err), _) => Err(ApiError::Api {
            code: err.error_code,
            message: err.error_msg,
        }),
        (None, Some(payload)) => Ok(payload),
        (None, None) => Err(ApiError::Envelope),
    }
}

// ====== HTTP CLIENT ======
#[derive(Debug, Clone)]
pub struct VkClient {
    http: Client,
    api_base: String,
    access_token: String,
    version: String,
}

impl VkClient {
    pub fn new(
        api_base: &str,
        access_token: &str,
        version: &str,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
            version: version.to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }
}

#[async_trait]
impl ApiTransport for VkClient {
    async fn call(&self, method: &str, mut params: Params) -> Result<Value, ApiError> {
        params.push(("access_token", self.access_token.clone()));
        params.push(("v", self.version.clone()));

        debug!("GET {}", method);
        let response = self
            .http
            .get(self.method_url(method))
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        let body: Value = serde_json::from_slice(&bytes)?;
        parse_envelope(body)
    }
}
