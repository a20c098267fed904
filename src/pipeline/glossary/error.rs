use thiserror::Error;

use crate::db::DatabaseError;
use crate::models::enums::GlossaryDimension;
use crate::pipeline::reasoning::ReasoningError;

#[derive(Error, Debug)]
pub enum GlossaryError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Reasoning error: {0}")]
    Reasoning(#[from] ReasoningError),

    #[error("{dimension} glossary looks incomplete: {entities} entities for {inputs} distinct inputs")]
    Incomplete {
        dimension: GlossaryDimension,
        inputs: usize,
        entities: usize,
    },

    #[error("{dimension} glossary has invalid ids: {reason}")]
    InvalidIds {
        dimension: GlossaryDimension,
        reason: String,
    },
}
