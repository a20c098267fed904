use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use super::error::ReasoningError;
use super::types::GenerateRequest;
use crate::config::ReasoningConfig;

/// Raw HTTP outcome. Non-2xx statuses are data here, not errors; the client
/// decides what to retry.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
    /// `Retry-After` header in milliseconds, when the server sent one.
    pub retry_after_ms: Option<u64>,
}

impl TransportResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            retry_after_ms: None,
        }
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            retry_after_ms: None,
        }
    }
}

/// One request, one response. Transport failures (connect, timeout) are errors.
pub trait ReasoningTransport: Send + Sync {
    fn send(&self, request: &GenerateRequest) -> Result<TransportResponse, ReasoningError>;
}

/// Blocking HTTP transport for the hosted `generateContent` endpoint.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    timeout_secs: u64,
}

impl HttpTransport {
    pub fn new(config: &ReasoningConfig) -> Result<Self, ReasoningError> {
        let api_key = config.require_api_key()?.to_string();
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ReasoningError::Http(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/v1beta/models/{}:generateContent",
                config.base_url.trim_end_matches('/'),
                config.model_id
            ),
            api_key,
            timeout_secs: config.request_timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ReasoningTransport for HttpTransport {
    fn send(&self, request: &GenerateRequest) -> Result<TransportResponse, ReasoningError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    ReasoningError::Http(format!("Request timed out after {}s", self.timeout_secs))
                } else {
                    ReasoningError::Http(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let retry_after_ms = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|secs| secs.saturating_mul(1000));
        let body = response
            .text()
            .map_err(|e| ReasoningError::Http(format!("Failed to read response body: {e}")))?;

        Ok(TransportResponse {
            status,
            body,
            retry_after_ms,
        })
    }
}

/// Transport that replays queued responses and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<TransportResponse>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<TransportResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl ReasoningTransport for ScriptedTransport {
    fn send(&self, request: &GenerateRequest) -> Result<TransportResponse, ReasoningError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .ok_or_else(|| ReasoningError::Http("scripted transport exhausted".into()))
    }
}
