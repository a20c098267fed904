use thiserror::Error;

use crate::db::DatabaseError;
use crate::pipeline::reasoning::ReasoningError;

/// Why a single chunk could not be reconciled.
#[derive(Error, Debug)]
pub enum ChunkFault {
    #[error("reasoning call failed: {0}")]
    Reasoning(#[from] ReasoningError),

    #[error("winner for base id {0} is not part of the chunk")]
    UnknownBaseId(String),

    #[error("ledger write failed: {0}")]
    Write(#[from] DatabaseError),
}

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Chunk {chunk_index} failed ({} base ids): {source}", .base_ids.len())]
    ChunkFailed {
        chunk_index: usize,
        base_ids: Vec<String>,
        #[source]
        source: ChunkFault,
    },
}
