use std::sync::{LazyLock, Mutex};
use std::time::Duration;

use regex::Regex;

use crate::config::ReasoningConfig;

/// Retry-delay value in the service's error details, e.g. "3s" or "1.5s".
static RETRY_DELAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)s\s*$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Added on top of a server-provided delay.
    pub hint_buffer_ms: u64,
    /// Multiplied by the attempt number when there is no hint.
    pub fallback_backoff_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &ReasoningConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            hint_buffer_ms: config.retry_hint_buffer_ms,
            fallback_backoff_ms: config.fallback_backoff_ms,
        }
    }

    /// Rate limiting and temporary unavailability are the only retryable statuses.
    pub fn is_retryable(&self, status: u16) -> bool {
        status == 429 || status == 503
    }

    /// Wait before the next attempt, after `attempt` (1-based) failed.
    pub fn delay_for(&self, attempt: u32, hint_ms: Option<u64>) -> u64 {
        match hint_ms {
            Some(hint) => hint.saturating_add(self.hint_buffer_ms),
            None => self.fallback_backoff_ms.saturating_mul(u64::from(attempt)),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ReasoningConfig::default())
    }
}

/// Read the service's retry hint from an error body.
///
/// Looks for an `error.details[]` entry whose `@type` mentions `RetryInfo`
/// and converts its `retryDelay` to milliseconds.
pub fn parse_retry_hint(body: &str) -> Option<u64> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let details = value.get("error")?.get("details")?.as_array()?;
    let delay = details
        .iter()
        .find(|d| {
            d.get("@type")
                .and_then(|t| t.as_str())
                .is_some_and(|t| t.contains("RetryInfo"))
        })?
        .get("retryDelay")?
        .as_str()?;
    let seconds: f64 = RETRY_DELAY.captures(delay)?.get(1)?.as_str().parse().ok()?;
    Some((seconds * 1000.0).round() as u64)
}

/// Blocking wait, injected so backoff can be tested without sleeping.
pub trait Sleeper: Send + Sync {
    fn sleep_ms(&self, ms: u64);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep_ms(&self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

/// Records requested waits instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<u64>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waits(&self) -> Vec<u64> {
        self.waits.lock().map(|w| w.clone()).unwrap_or_default()
    }

    pub fn total_ms(&self) -> u64 {
        self.waits().iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep_ms(&self, ms: u64) {
        if let Ok(mut waits) = self.waits.lock() {
            waits.push(ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE_LIMITED: &str = r#"{
        "error": {
            "code": 429,
            "status": "RESOURCE_EXHAUSTED",
            "details": [
                {"@type": "type.googleapis.com/google.rpc.QuotaFailure"},
                {"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "3s"}
            ]
        }
    }"#;

    #[test]
    fn hint_parsed_from_retry_info() {
        assert_eq!(parse_retry_hint(RATE_LIMITED), Some(3000));
    }

    #[test]
    fn fractional_hint() {
        let body = r#"{"error":{"details":[{"@type":"x.RetryInfo","retryDelay":"1.5s"}]}}"#;
        assert_eq!(parse_retry_hint(body), Some(1500));
    }

    #[test]
    fn missing_or_malformed_hint_is_none() {
        assert_eq!(parse_retry_hint("Service Unavailable"), None);
        assert_eq!(parse_retry_hint(r#"{"error":{"details":[]}}"#), None);
        let odd = r#"{"error":{"details":[{"@type":"x.RetryInfo","retryDelay":"soon"}]}}"#;
        assert_eq!(parse_retry_hint(odd), None);
    }

    #[test]
    fn hinted_delay_adds_buffer() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1, Some(3000)), 5000);
    }

    #[test]
    fn fallback_delay_grows_with_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1, None), 5000);
        assert_eq!(policy.delay_for(2, None), 10000);
    }

    #[test]
    fn only_429_and_503_retry() {
        let policy = RetryPolicy::default();
        assert!(policy.is_retryable(429));
        assert!(policy.is_retryable(503));
        assert!(!policy.is_retryable(400));
        assert!(!policy.is_retryable(500));
    }

    #[test]
    fn recording_sleeper_accumulates() {
        let sleeper = RecordingSleeper::new();
        sleeper.sleep_ms(5000);
        sleeper.sleep_ms(10000);
        assert_eq!(sleeper.waits(), vec![5000, 10000]);
        assert_eq!(sleeper.total_ms(), 15000);
    }
}
