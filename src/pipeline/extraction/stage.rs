//! Batch extraction over the registry.
//!
//! Eligible records: conversion SUCCEEDED and extraction not yet SUCCEEDED.
//! FAILED records are retried on the next invocation. The item cap counts
//! successes only, so records that keep failing do not starve the rest.
//!
//! A record's raw rows and its SUCCEEDED status commit in one transaction.

use rusqlite::Connection;

use crate::config::ExtractionConfig;
use crate::db::repository::{clear_raw_rows, insert_raw_rows, scan, set_status};
use crate::db::DatabaseError;
use crate::models::enums::{ProcessingStatus, RegistryField};
use crate::models::{RawExtractionRow, SourceRecord};
use crate::pipeline::batch::{run_until, BatchOutcome, Clock, Deadline, ItemLimit, ItemOutcome};
use crate::pipeline::reasoning::Sleeper;

use super::error::ExtractionError;
use super::extractor::{flatten_rows, SingleRecordExtractor};

pub fn is_pending_extraction(record: &SourceRecord) -> bool {
    record.conversion_status == ProcessingStatus::Succeeded
        && record.extraction_status != ProcessingStatus::Succeeded
}

/// Extract eligible records until the budget or item cap is reached.
///
/// A failing record is marked FAILED and the batch continues. Only database
/// errors abort the invocation.
pub fn run_batch_extraction(
    conn: &Connection,
    extractor: &SingleRecordExtractor<'_>,
    config: &ExtractionConfig,
    clock: &dyn Clock,
    sleeper: &dyn Sleeper,
) -> Result<BatchOutcome, ExtractionError> {
    let deadline = Deadline::start(clock, config.budget_ms);
    tracing::info!(
        budget_ms = config.budget_ms,
        max_items = config.max_items,
        "Batch extraction starting"
    );

    let outcome = run_until(
        clock,
        &deadline,
        Some(ItemLimit::Succeeded(config.max_items)),
        scan(conn, is_pending_extraction),
        |item| -> Result<ItemOutcome, ExtractionError> {
            let record = item?;
            let _span = tracing::info_span!("extract_record", record_id = %record.id, file = %record.name)
                .entered();
            set_status(conn, &record.id, RegistryField::ExtractionStatus, ProcessingStatus::Started)?;

            match extract_rows(extractor, &record) {
                Ok(rows) => {
                    let rows = commit_extraction(conn, &record, &rows)?;
                    tracing::info!(rows, "Record extracted");
                    if config.pause_between_items_ms > 0 {
                        sleeper.sleep_ms(config.pause_between_items_ms);
                    }
                    Ok(ItemOutcome::Succeeded)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Extraction failed");
                    set_status(
                        conn,
                        &record.id,
                        RegistryField::ExtractionStatus,
                        ProcessingStatus::Failed,
                    )?;
                    Ok(ItemOutcome::Failed)
                }
            }
        },
    )?;

    tracing::info!(
        processed = outcome.processed,
        succeeded = outcome.succeeded,
        failed = outcome.failed,
        stop = ?outcome.stop,
        "Batch extraction complete"
    );
    Ok(outcome)
}

fn extract_rows(
    extractor: &SingleRecordExtractor<'_>,
    record: &SourceRecord,
) -> Result<Vec<RawExtractionRow>, ExtractionError> {
    let extraction = extractor.extract(record)?;
    let rows = flatten_rows(record, &extraction);
    if rows.is_empty() {
        tracing::warn!(
            invoice_id = %extraction.invoice_identity.invoice_id_full,
            "Extraction returned no line items"
        );
    }
    Ok(rows)
}

/// Append the record's rows and mark it SUCCEEDED, or do neither.
fn commit_extraction(
    conn: &Connection,
    record: &SourceRecord,
    rows: &[RawExtractionRow],
) -> Result<usize, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let appended = insert_raw_rows(&tx, rows)?;
    set_status(
        &tx,
        &record.id,
        RegistryField::ExtractionStatus,
        ProcessingStatus::Succeeded,
    )?;
    tx.commit()?;
    Ok(appended)
}

/// Reset entry point: empty the raw extraction table.
pub fn setup_extraction_table(conn: &Connection) -> Result<usize, ExtractionError> {
    let removed = clear_raw_rows(conn)?;
    tracing::info!(removed, "Raw extraction table reset");
    Ok(removed)
}
