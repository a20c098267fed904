pub mod adapters;
pub mod batch;
pub mod conversion;
pub mod export;
pub mod extraction;
pub mod glossary;
pub mod reasoning;
pub mod reconcile;

use thiserror::Error;

use crate::config::ConfigError;
use crate::db::DatabaseError;

use self::batch::LockError;
use self::conversion::ConversionError;
use self::extraction::ExtractionError;
use self::glossary::GlossaryError;
use self::reasoning::ReasoningError;
use self::reconcile::ReconcileError;

/// Top-level error reported by a stage trigger.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Stage {stage} is already running (holder {holder_id})")]
    StageBusy { stage: String, holder_id: String },

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Glossary error: {0}")]
    Glossary(#[from] GlossaryError),

    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Reasoning error: {0}")]
    Reasoning(#[from] ReasoningError),
}

impl From<LockError> for PipelineError {
    fn from(e: LockError) -> Self {
        match e {
            LockError::Held {
                stage, holder_id, ..
            } => Self::StageBusy { stage, holder_id },
            LockError::Database(db) => Self::Database(db),
        }
    }
}
