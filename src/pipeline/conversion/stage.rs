//! Registry build and batch conversion.
//!
//! Conversion is idempotent: a record whose status is SUCCEEDED and which
//! has a reference for every enabled format receives no writes at all.

use rusqlite::Connection;

use crate::config::ConversionConfig;
use crate::db::repository::{replace_registry, scan, set_status, upsert_status};
use crate::models::enums::{ProcessingStatus, RegistryField, RenditionFormat};
use crate::models::SourceRecord;
use crate::pipeline::batch::{run_until, BatchOutcome, Clock, Deadline, ItemLimit, ItemOutcome};

use super::error::ConversionError;
use super::traits::{ConversionRequest, DocumentConverter, SourceCatalog};

/// Rebuild the registry from the catalog's Word documents, newest first.
///
/// An empty source leaves the existing registry untouched.
pub fn build_registry(conn: &Connection, catalog: &dyn SourceCatalog) -> Result<usize, ConversionError> {
    let documents: Vec<_> = catalog
        .list_documents()?
        .into_iter()
        .filter(|d| d.is_word_document())
        .collect();

    if documents.is_empty() {
        tracing::warn!("No Word documents found in source, registry left unchanged");
        return Ok(0);
    }

    let indexed = replace_registry(conn, &documents)?;
    tracing::info!(indexed, "Registry rebuilt");
    Ok(indexed)
}

fn enabled_formats(config: &ConversionConfig) -> Vec<RenditionFormat> {
    let mut formats = Vec::new();
    if config.enable_structured {
        formats.push(RenditionFormat::Structured);
    }
    if config.enable_markup {
        formats.push(RenditionFormat::Markup);
    }
    if config.enable_visual {
        formats.push(RenditionFormat::Visual);
    }
    formats
}

pub fn is_conversion_complete(record: &SourceRecord, config: &ConversionConfig) -> bool {
    record.conversion_status == ProcessingStatus::Succeeded
        && enabled_formats(config)
            .into_iter()
            .all(|format| record.rendition_ref(format).is_some())
}

/// Convert incomplete records until the budget or item cap is reached.
pub fn run_batch_conversion(
    conn: &Connection,
    converter: &dyn DocumentConverter,
    config: &ConversionConfig,
    clock: &dyn Clock,
) -> Result<BatchOutcome, ConversionError> {
    let deadline = Deadline::start(clock, config.budget_ms);
    tracing::info!(
        budget_ms = config.budget_ms,
        max_items = config.max_items,
        "Batch conversion starting"
    );

    let outcome = run_until(
        clock,
        &deadline,
        Some(ItemLimit::Processed(config.max_items)),
        scan(conn, |r| !is_conversion_complete(r, config)),
        |item| -> Result<ItemOutcome, ConversionError> {
            let record = item?;
            let _span = tracing::info_span!("convert_record", record_id = %record.id, file = %record.name)
                .entered();
            set_status(conn, &record.id, RegistryField::ConversionStatus, ProcessingStatus::Started)?;

            let result = convert_missing(conn, converter, config, &record);
            let status = match &result {
                Ok(()) => ProcessingStatus::Succeeded,
                Err(e) => {
                    tracing::error!(error = %e, "Conversion failed");
                    ProcessingStatus::Failed
                }
            };
            set_status(conn, &record.id, RegistryField::ConversionStatus, status)?;
            Ok(match status {
                ProcessingStatus::Succeeded => ItemOutcome::Succeeded,
                _ => ItemOutcome::Failed,
            })
        },
    )?;

    tracing::info!(
        processed = outcome.processed,
        succeeded = outcome.succeeded,
        failed = outcome.failed,
        stop = ?outcome.stop,
        "Batch conversion complete"
    );
    Ok(outcome)
}

/// Produce only the missing renditions. The structured copy comes first
/// whenever any format is enabled. Each reference is written as soon as it
/// exists, so a later failure keeps earlier work.
fn convert_missing(
    conn: &Connection,
    converter: &dyn DocumentConverter,
    config: &ConversionConfig,
    record: &SourceRecord,
) -> Result<(), ConversionError> {
    let enabled = enabled_formats(config);
    if enabled.is_empty() {
        return Ok(());
    }

    let mut structured_ref = record.rendition_ref(RenditionFormat::Structured).map(str::to_string);
    if structured_ref.is_none() {
        let reference = converter.convert(&ConversionRequest {
            source_ref: &record.id,
            name: &record.name,
            format: RenditionFormat::Structured,
            structured_ref: None,
        })?;
        upsert_status(conn, &record.id, RegistryField::StructuredRef, &reference)?;
        tracing::info!(reference = %reference, "Structured copy created");
        structured_ref = Some(reference);
    }

    for format in enabled {
        if format == RenditionFormat::Structured || record.rendition_ref(format).is_some() {
            continue;
        }
        let reference = converter.convert(&ConversionRequest {
            source_ref: &record.id,
            name: &record.name,
            format,
            structured_ref: structured_ref.as_deref(),
        })?;
        upsert_status(conn, &record.id, RegistryField::for_rendition(format), &reference)?;
        tracing::info!(format = %format, reference = %reference, "Rendition exported");
    }
    Ok(())
}
