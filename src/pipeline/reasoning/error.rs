use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum ReasoningError {
    #[error("Reasoning service error ({status}): {body}")]
    Service { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Reasoning service returned no candidate text")]
    EmptyCandidate,

    #[error("Reasoning service still unavailable after {attempts} attempts (last status {last_status})")]
    RetriesExhausted { attempts: u32, last_status: u16 },

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Response does not match expected schema: {0}")]
    SchemaMismatch(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
