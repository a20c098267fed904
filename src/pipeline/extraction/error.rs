use thiserror::Error;

use crate::db::DatabaseError;
use crate::models::enums::RenditionFormat;
use crate::pipeline::reasoning::ReasoningError;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Reasoning error: {0}")]
    Reasoning(#[from] ReasoningError),

    #[error("Record {id} has no {format} rendition")]
    MissingRendition { id: String, format: RenditionFormat },

    #[error("Could not read document {reference}: {reason}")]
    Document { reference: String, reason: String },

    #[error("Extraction for {0} carries no invoice id")]
    MissingIdentity(String),
}
