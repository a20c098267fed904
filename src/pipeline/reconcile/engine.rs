//! Batch reconciliation: raw rows in, one canonical invoice per base id out.
//!
//! Each chunk is reconciled and committed on its own. A chunk that fails
//! aborts the invocation; earlier chunks stay committed and their base ids
//! are skipped on the next run.

use std::collections::HashMap;

use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;

use crate::config::ReconcileConfig;
use crate::db::repository::{append_ledger_batch, load_glossaries, processed_base_ids};
use crate::models::{Glossaries, LedgerBatch, RawExtractionRow};
use crate::pipeline::batch::{run_until, Clock, Deadline, ItemOutcome, StopReason};
use crate::pipeline::reasoning::{decode, get_case_insensitive, ReasoningError, ReasoningService};

use super::collapse::{collapse_winners, CollapseKind};
use super::error::{ChunkFault, ReconcileError};
use super::grouping::{group_pending, parse_invoice_date, FilterStats, InvoiceGroup};
use super::prompt::RECONCILIATION_PROMPT;
use super::resolve::append_winner;
use super::types::{ReconciliationResponse, WinningInvoice};

/// Summary of one reconciliation invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub filtered: FilterStats,
    pub pending_base_ids: usize,
    pub chunks_committed: usize,
    pub invoices_written: usize,
    pub replaced: usize,
    pub merged: usize,
    /// Base ids the service returned no winner for. Left for the next run.
    pub under_merged: Vec<String>,
    pub stop: StopReason,
}

#[derive(Serialize)]
struct ChunkPayload<'a> {
    glossary_context: &'a Glossaries,
    invoice_log_segment: Vec<&'a RawExtractionRow>,
}

/// Outcome of one committed chunk.
#[derive(Debug, Default)]
struct ChunkResult {
    written: usize,
    replaced: usize,
    merged: usize,
    under_merged: Vec<String>,
}

/// Reconcile pending base ids chunk by chunk until done or out of budget.
pub fn run_batch_reconciliation(
    conn: &Connection,
    service: &dyn ReasoningService,
    rows: &[RawExtractionRow],
    config: &ReconcileConfig,
    clock: &dyn Clock,
) -> Result<ReconcileReport, ReconcileError> {
    let deadline = Deadline::start(clock, config.budget_ms);
    let processed = processed_base_ids(conn)?;
    let (groups, filtered) = group_pending(rows, &processed, config.cutoff_date);

    let mut report = ReconcileReport {
        filtered,
        pending_base_ids: groups.len(),
        chunks_committed: 0,
        invoices_written: 0,
        replaced: 0,
        merged: 0,
        under_merged: Vec::new(),
        stop: StopReason::Exhausted,
    };
    tracing::info!(
        pending = groups.len(),
        already_processed = filtered.already_processed,
        before_cutoff = filtered.before_cutoff,
        undated = filtered.undated,
        "Batch reconciliation starting"
    );
    if groups.is_empty() {
        return Ok(report);
    }

    let glossaries = load_glossaries(conn)?;
    if glossaries.is_empty() {
        tracing::warn!("Glossaries are empty, every reference will resolve to a marker");
    }
    let chunk_size = config.chunk_size.max(1);

    let outcome = run_until(
        clock,
        &deadline,
        None,
        groups.chunks(chunk_size).enumerate(),
        |(chunk_index, chunk)| -> Result<ItemOutcome, ReconcileError> {
            let base_ids: Vec<String> = chunk.iter().map(|g| g.base_id.clone()).collect();
            let _span = tracing::info_span!("reconcile_chunk", chunk_index, size = chunk.len()).entered();

            let result = reconcile_chunk(conn, service, &glossaries, chunk).map_err(|source| {
                tracing::error!(error = %source, base_ids = ?base_ids, "Chunk reconciliation failed");
                ReconcileError::ChunkFailed {
                    chunk_index,
                    base_ids: base_ids.clone(),
                    source,
                }
            })?;

            tracing::info!(
                written = result.written,
                replaced = result.replaced,
                merged = result.merged,
                under_merged = result.under_merged.len(),
                "Chunk committed"
            );
            report.chunks_committed += 1;
            report.invoices_written += result.written;
            report.replaced += result.replaced;
            report.merged += result.merged;
            report.under_merged.extend(result.under_merged);
            Ok(ItemOutcome::Succeeded)
        },
    )?;

    report.stop = outcome.stop;
    tracing::info!(
        chunks = report.chunks_committed,
        invoices = report.invoices_written,
        under_merged = report.under_merged.len(),
        stop = ?report.stop,
        "Batch reconciliation complete"
    );
    Ok(report)
}

fn reconcile_chunk(
    conn: &Connection,
    service: &dyn ReasoningService,
    glossaries: &Glossaries,
    chunk: &[InvoiceGroup<'_>],
) -> Result<ChunkResult, ChunkFault> {
    let payload = ChunkPayload {
        glossary_context: glossaries,
        invoice_log_segment: chunk.iter().flat_map(|g| g.rows.iter().copied()).collect(),
    };
    let payload = serde_json::to_value(&payload)
        .map_err(|e| ReasoningError::ResponseParsing(format!("payload encode: {e}")))?;
    let label = format!("Batch: {} IDs", chunk.len());

    let response = parse_response(service.invoke(RECONCILIATION_PROMPT, &payload, &label)?, &label)?;
    if !response.architect_insights.trim().is_empty() {
        tracing::debug!(insights = %response.architect_insights, "Architect insights");
    }

    let mut by_base: HashMap<&str, Vec<WinningInvoice>> = HashMap::new();
    for winner in response.winning_invoices {
        let base = winner.invoice_id_base.trim().to_string();
        let Some(group) = chunk.iter().find(|g| g.base_id == base) else {
            return Err(ChunkFault::UnknownBaseId(base));
        };
        by_base.entry(group.base_id.as_str()).or_default().push(winner);
    }

    let mut result = ChunkResult::default();
    let mut batch = LedgerBatch::default();
    for group in chunk {
        let Some((winner, kind)) = by_base
            .remove(group.base_id.as_str())
            .and_then(collapse_winners)
        else {
            tracing::warn!(base_id = %group.base_id, "No winner returned, base id left for the next run");
            result.under_merged.push(group.base_id.clone());
            continue;
        };

        match &kind {
            CollapseKind::Single => {}
            CollapseKind::Replaced(dropped) => {
                tracing::info!(base_id = %group.base_id, kept = %winner.invoice_id_full, dropped = ?dropped, "Collapsed replacement versions");
                result.replaced += 1;
            }
            CollapseKind::Merged(sources) => {
                tracing::warn!(base_id = %group.base_id, sources = ?sources, "Fused supplements into one invoice");
                result.merged += 1;
            }
        }

        append_winner(&mut batch, &winner, &group.base_id, &latest_row_date(group), glossaries);
    }

    result.written = append_ledger_batch(conn, &batch)?;
    Ok(result)
}

/// Accept the documented key in any letter case, then decode strictly.
fn parse_response(value: Value, label: &str) -> Result<ReconciliationResponse, ReasoningError> {
    let winners = get_case_insensitive(&value, "winning_invoices")
        .cloned()
        .ok_or_else(|| ReasoningError::SchemaMismatch(format!("{label}: missing winning_invoices")))?;
    let insights = get_case_insensitive(&value, "architect_insights")
        .cloned()
        .unwrap_or(Value::Null);
    decode(
        serde_json::json!({"winning_invoices": winners, "architect_insights": insights}),
        label,
    )
}

/// ISO date of the newest raw row in a group, or "" if none parse.
fn latest_row_date(group: &InvoiceGroup<'_>) -> String {
    group
        .rows
        .iter()
        .filter_map(|r| parse_invoice_date(&r.date))
        .max()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}
