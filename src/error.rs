use thiserror::Error;

/// Failures of a single API call.
///
/// Every fetcher treats these as "no data for this request" and logs them;
/// none of them abort a harvest run.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("VK API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("response carries neither `response` nor `error`")]
    Envelope,

    #[error("payload has no `{0}` field")]
    MissingField(&'static str),
}

impl ApiError {
    /// True when the remote API itself reported the failure.
    pub fn is_api_reported(&self) -> bool {
        matches!(self, ApiError::Api { .. })
    }
}
