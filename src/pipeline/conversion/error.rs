use thiserror::Error;

use crate::db::DatabaseError;
use crate::models::enums::RenditionFormat;

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Source catalog error: {0}")]
    Catalog(String),

    #[error("{format} conversion of {name} failed: {reason}")]
    Converter {
        name: String,
        format: RenditionFormat,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
