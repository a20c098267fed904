//! Client for the hosted reasoning service: request wire types, rate-limit
//! backoff, JSON repair and a scriptable service trait for tests.

pub mod client;
pub mod error;
pub mod repair;
pub mod retry;
pub mod transport;
pub mod types;

pub use client::{decode, invoke_typed, ReasoningClient, ReasoningService, RecordedCall, ScriptedService};
pub use error::ReasoningError;
pub use repair::{get_case_insensitive, repair_json};
pub use retry::{RecordingSleeper, RetryPolicy, Sleeper, ThreadSleeper};
pub use transport::{HttpTransport, ReasoningTransport, ScriptedTransport, TransportResponse};
pub use types::{GenerateRequest, Part, PDF_MIME_TYPE};
