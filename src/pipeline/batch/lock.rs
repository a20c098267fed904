//! Advisory per-stage lease stored in `stage_locks`.
//!
//! Acquisition protocol:
//! 1. Read the current lease for the stage inside an immediate transaction
//! 2. If none exists, or the lease has expired, write ours
//! 3. Otherwise report the live holder
//!
//! The guard deletes its own lease on drop. A crashed holder's lease is
//! taken over once its TTL has passed.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum LockError {
    #[error("Stage {stage} is held by {holder_id} until {expires_at}")]
    Held {
        stage: String,
        holder_id: String,
        expires_at: DateTime<Utc>,
    },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<rusqlite::Error> for LockError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(e))
    }
}

/// Current lease on a stage.
#[derive(Debug, Clone, PartialEq)]
pub struct LockInfo {
    pub stage: String,
    pub holder_id: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LockInfo {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Held lease. Released when dropped.
#[derive(Debug)]
pub struct StageLock<'c> {
    conn: &'c Connection,
    stage: String,
    holder_id: String,
}

impl<'c> StageLock<'c> {
    pub fn acquire(conn: &'c Connection, stage: &str, ttl_secs: u64) -> Result<Self, LockError> {
        Self::acquire_at(conn, stage, ttl_secs, Utc::now())
    }

    /// Acquire as if the current time were `now`.
    pub fn acquire_at(
        conn: &'c Connection,
        stage: &str,
        ttl_secs: u64,
        now: DateTime<Utc>,
    ) -> Result<Self, LockError> {
        let holder_id = Uuid::new_v4().to_string();
        let expires_at = now + Duration::seconds(ttl_secs.min(i64::MAX as u64) as i64);

        let tx = rusqlite::Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        if let Some(existing) = read_lock(&tx, stage)? {
            if !existing.is_expired_at(now) {
                return Err(LockError::Held {
                    stage: existing.stage,
                    holder_id: existing.holder_id,
                    expires_at: existing.expires_at,
                });
            }
            tracing::warn!(
                stage,
                previous_holder = %existing.holder_id,
                expired_at = %existing.expires_at,
                "Taking over expired stage lock"
            );
        }
        tx.execute(
            "INSERT OR REPLACE INTO stage_locks (stage, holder_id, acquired_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![stage, holder_id, now.to_rfc3339(), expires_at.to_rfc3339()],
        )?;
        tx.commit()?;

        tracing::debug!(stage, holder_id = %holder_id, "Stage lock acquired");
        Ok(Self {
            conn,
            stage: stage.to_string(),
            holder_id,
        })
    }

    pub fn holder_id(&self) -> &str {
        &self.holder_id
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }
}

impl Drop for StageLock<'_> {
    fn drop(&mut self) {
        let result = self.conn.execute(
            "DELETE FROM stage_locks WHERE stage = ?1 AND holder_id = ?2",
            params![self.stage, self.holder_id],
        );
        if let Err(e) = result {
            tracing::warn!(stage = %self.stage, error = %e, "Failed to release stage lock");
        }
    }
}

/// Read the lease on a stage, if any.
pub fn read_lock(conn: &Connection, stage: &str) -> Result<Option<LockInfo>, LockError> {
    let row = conn
        .query_row(
            "SELECT stage, holder_id, acquired_at, expires_at FROM stage_locks WHERE stage = ?1",
            params![stage],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    let Some((stage, holder_id, acquired_at, expires_at)) = row else {
        return Ok(None);
    };
    Ok(Some(LockInfo {
        stage,
        holder_id,
        acquired_at: parse_timestamp(&acquired_at)?,
        expires_at: parse_timestamp(&expires_at)?,
    }))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, LockError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Corrupt(format!("stage_locks timestamp '{value}': {e}")).into())
}
