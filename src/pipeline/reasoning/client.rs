use std::collections::VecDeque;
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::ReasoningError;
use super::repair::repair_json;
use super::retry::{parse_retry_hint, RetryPolicy, Sleeper, ThreadSleeper};
use super::transport::{HttpTransport, ReasoningTransport};
use super::types::{GenerateRequest, GenerateResponse, Part};
use crate::config::ReasoningConfig;

/// Anything that turns a prompt into parsed JSON. Stages depend on this
/// trait so they can run against a scripted service in tests.
pub trait ReasoningService: Send + Sync {
    /// Send arbitrary parts (text and inline binary) in one request.
    fn invoke_parts(&self, parts: Vec<Part>, label: &str) -> Result<Value, ReasoningError>;

    /// Send a system prompt followed by a JSON payload.
    fn invoke(&self, system_prompt: &str, payload: &Value, label: &str) -> Result<Value, ReasoningError> {
        let payload_text = serde_json::to_string(payload)
            .map_err(|e| ReasoningError::ResponseParsing(format!("payload encode: {e}")))?;
        self.invoke_parts(vec![Part::text(system_prompt), Part::text(payload_text)], label)
    }
}

/// Deserialize a parsed response into its typed schema.
pub fn decode<T: DeserializeOwned>(value: Value, label: &str) -> Result<T, ReasoningError> {
    serde_json::from_value(value)
        .map_err(|e| ReasoningError::SchemaMismatch(format!("{label}: {e}")))
}

/// `invoke` followed by `decode`.
pub fn invoke_typed<T: DeserializeOwned>(
    service: &dyn ReasoningService,
    system_prompt: &str,
    payload: &Value,
    label: &str,
) -> Result<T, ReasoningError> {
    let value = service.invoke(system_prompt, payload, label)?;
    decode(value, label)
}

/// Client for the hosted reasoning service with rate-limit backoff.
pub struct ReasoningClient {
    transport: Box<dyn ReasoningTransport>,
    sleeper: Box<dyn Sleeper>,
    policy: RetryPolicy,
    max_output_tokens: u32,
}

impl ReasoningClient {
    pub fn new(
        transport: Box<dyn ReasoningTransport>,
        sleeper: Box<dyn Sleeper>,
        policy: RetryPolicy,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            transport,
            sleeper,
            policy,
            max_output_tokens,
        }
    }

    /// HTTP client built from configuration. Fails if no API key is set.
    pub fn from_config(config: &ReasoningConfig) -> Result<Self, ReasoningError> {
        Ok(Self::new(
            Box::new(HttpTransport::new(config)?),
            Box::new(ThreadSleeper),
            RetryPolicy::from_config(config),
            config.max_output_tokens,
        ))
    }

    fn parse_success(&self, body: &str, label: &str) -> Result<Value, ReasoningError> {
        let response: GenerateResponse = serde_json::from_str(body)
            .map_err(|e| ReasoningError::ResponseParsing(format!("{label}: envelope: {e}")))?;
        let text = response.first_text().ok_or(ReasoningError::EmptyCandidate)?;
        repair_json(text)
    }
}

impl ReasoningService for ReasoningClient {
    fn invoke_parts(&self, parts: Vec<Part>, label: &str) -> Result<Value, ReasoningError> {
        let _span = tracing::info_span!("reasoning_call", label).entered();
        let request = GenerateRequest::new(parts, self.max_output_tokens);
        let mut last_status = 0;

        for attempt in 1..=self.policy.max_attempts {
            let response = self.transport.send(&request)?;
            tracing::debug!(attempt, status = response.status, "Reasoning service responded");

            match response.status {
                200..=299 => return self.parse_success(&response.body, label),
                status if self.policy.is_retryable(status) => {
                    last_status = status;
                    if attempt == self.policy.max_attempts {
                        break;
                    }
                    let hint = response
                        .retry_after_ms
                        .or_else(|| parse_retry_hint(&response.body));
                    let wait_ms = self.policy.delay_for(attempt, hint);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        status,
                        wait_ms,
                        hinted = hint.is_some(),
                        "Reasoning service busy, backing off"
                    );
                    self.sleeper.sleep_ms(wait_ms);
                }
                status => {
                    tracing::error!(status, body = %response.body, "Reasoning service rejected request");
                    return Err(ReasoningError::Service {
                        status,
                        body: response.body,
                    });
                }
            }
        }

        tracing::error!(attempts = self.policy.max_attempts, last_status, "Reasoning retries exhausted");
        Err(ReasoningError::RetriesExhausted {
            attempts: self.policy.max_attempts,
            last_status,
        })
    }
}

/// A recorded call to [`ScriptedService`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub label: String,
    /// Text parts joined by newlines.
    pub text: String,
    pub inline_parts: usize,
}

/// Reasoning service that replays queued results in order.
#[derive(Default)]
pub struct ScriptedService {
    responses: Mutex<VecDeque<Result<Value, ReasoningError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, value: Value) -> Self {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Ok(value));
        }
        self
    }

    pub fn with_error(self, error: ReasoningError) -> Self {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Err(error));
        }
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl ReasoningService for ScriptedService {
    fn invoke_parts(&self, parts: Vec<Part>, label: &str) -> Result<Value, ReasoningError> {
        let text = parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");
        let inline_parts = parts.iter().filter(|p| p.inline_data.is_some()).count();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                label: label.to_string(),
                text,
                inline_parts,
            });
        }
        self.responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or_else(|| Err(ReasoningError::Http("scripted service exhausted".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::reasoning::retry::RecordingSleeper;
    use crate::pipeline::reasoning::transport::{ScriptedTransport, TransportResponse};
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;

    const RATE_LIMITED_3S: &str = r#"{"error":{"code":429,"details":[
        {"@type":"type.googleapis.com/google.rpc.RetryInfo","retryDelay":"3s"}]}}"#;

    fn candidate(text: &str) -> String {
        json!({"candidates": [{"content": {"parts": [{"text": text}]}}]}).to_string()
    }

    struct SharedTransport(Arc<ScriptedTransport>);

    impl ReasoningTransport for SharedTransport {
        fn send(&self, request: &GenerateRequest) -> Result<TransportResponse, ReasoningError> {
            self.0.send(request)
        }
    }

    struct SharedSleeper(Arc<RecordingSleeper>);

    impl Sleeper for SharedSleeper {
        fn sleep_ms(&self, ms: u64) {
            self.0.sleep_ms(ms)
        }
    }

    fn client(
        responses: Vec<TransportResponse>,
    ) -> (ReasoningClient, Arc<ScriptedTransport>, Arc<RecordingSleeper>) {
        let transport = Arc::new(ScriptedTransport::new(responses));
        let sleeper = Arc::new(RecordingSleeper::new());
        let client = ReasoningClient::new(
            Box::new(SharedTransport(transport.clone())),
            Box::new(SharedSleeper(sleeper.clone())),
            RetryPolicy::default(),
            65536,
        );
        (client, transport, sleeper)
    }

    #[test]
    fn success_returns_repaired_json() {
        let (client, transport, sleeper) =
            client(vec![TransportResponse::ok(candidate("Sure! {\"a\": [1,],}"))]);
        let value = client.invoke("prompt", &json!({"x": 1}), "test").unwrap();
        assert_eq!(value, json!({"a": [1]}));
        assert_eq!(transport.call_count(), 1);
        assert!(sleeper.waits().is_empty());

        let sent = &transport.requests()[0];
        assert_eq!(sent.text(), "prompt\n{\"x\":1}");
    }

    #[test]
    fn rate_limit_with_hint_waits_hint_plus_buffer() {
        let (client, transport, sleeper) = client(vec![
            TransportResponse::status(429, RATE_LIMITED_3S),
            TransportResponse::ok(candidate("{\"ok\": true}")),
        ]);
        let value = client.invoke("p", &json!({}), "hinted").unwrap();
        assert_eq!(value, json!({"ok": true}));
        assert_eq!(transport.call_count(), 2);
        assert!(sleeper.total_ms() >= 5000);
        assert_eq!(sleeper.waits(), vec![5000]);
    }

    #[test]
    fn retry_after_header_takes_precedence() {
        let mut busy = TransportResponse::status(503, RATE_LIMITED_3S);
        busy.retry_after_ms = Some(1000);
        let (client, _, sleeper) =
            client(vec![busy, TransportResponse::ok(candidate("{}"))]);
        client.invoke("p", &json!({}), "header").unwrap();
        assert_eq!(sleeper.waits(), vec![3000]);
    }

    #[test]
    fn three_rate_limits_exhaust_without_fourth_call() {
        let (client, transport, sleeper) = client(vec![
            TransportResponse::status(429, "busy"),
            TransportResponse::status(503, "busy"),
            TransportResponse::status(429, "busy"),
            TransportResponse::ok(candidate("{}")),
        ]);
        let err = client.invoke("p", &json!({}), "exhaust").unwrap_err();
        assert!(matches!(
            err,
            ReasoningError::RetriesExhausted {
                attempts: 3,
                last_status: 429
            }
        ));
        assert_eq!(transport.call_count(), 3);
        assert_eq!(sleeper.waits(), vec![5000, 10000]);
    }

    #[test]
    fn client_error_fails_immediately() {
        let (client, transport, sleeper) = client(vec![
            TransportResponse::status(400, "bad request"),
            TransportResponse::ok(candidate("{}")),
        ]);
        let err = client.invoke("p", &json!({}), "bad").unwrap_err();
        assert!(matches!(err, ReasoningError::Service { status: 400, .. }));
        assert_eq!(transport.call_count(), 1);
        assert!(sleeper.waits().is_empty());
    }

    #[test]
    fn empty_candidate_is_error() {
        let (client, _, _) = client(vec![TransportResponse::ok(r#"{"candidates":[]}"#)]);
        let err = client.invoke("p", &json!({}), "empty").unwrap_err();
        assert!(matches!(err, ReasoningError::EmptyCandidate));
    }

    #[test]
    fn unparseable_text_is_parse_error() {
        let (client, _, _) = client(vec![TransportResponse::ok(candidate("no json here"))]);
        let err = client.invoke("p", &json!({}), "prose").unwrap_err();
        assert!(matches!(err, ReasoningError::ResponseParsing(_)));
    }

    #[derive(Debug, Deserialize)]
    struct Shape {
        count: u32,
    }

    #[test]
    fn typed_invoke_reports_schema_mismatch() {
        let service = ScriptedService::new()
            .with_response(json!({"count": 3}))
            .with_response(json!({"count": "many"}));

        let ok: Shape = invoke_typed(&service, "p", &json!({}), "typed").unwrap();
        assert_eq!(ok.count, 3);

        let err = invoke_typed::<Shape>(&service, "p", &json!({}), "typed").unwrap_err();
        assert!(matches!(err, ReasoningError::SchemaMismatch(_)));
        assert_eq!(service.calls().len(), 2);
    }
}
