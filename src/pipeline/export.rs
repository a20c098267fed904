//! Reconciliation orchestrator.
//!
//! Runs the enabled sub-passes over the raw extraction rows in a fixed
//! order: SETUP, MASTER_ORIGINS, MASTER_CUSTOMERS, MASTER_PRODUCTS,
//! INVOICE_BATCHES. Each pass can be toggled off in configuration so a
//! failed later pass can be re-run without rebuilding the glossaries.
//! SETUP is off by default: repeated runs resume after the base ids
//! already written.

use rusqlite::Connection;
use uuid::Uuid;

use crate::config::ReconcileConfig;
use crate::db::repository::{clear_glossaries, clear_output_tables, load_raw_rows};
use crate::models::enums::ExportStage;
use crate::pipeline::batch::Clock;
use crate::pipeline::glossary::{
    build_master_customers, build_master_origins, build_master_products, GlossaryPass,
};
use crate::pipeline::reasoning::ReasoningService;
use crate::pipeline::reconcile::{run_batch_reconciliation, ReconcileReport};

use super::PipelineError;

#[derive(Debug, Clone)]
pub struct ExportReport {
    pub run_id: Uuid,
    pub raw_rows: usize,
    pub dry_run: bool,
    pub stages_run: Vec<ExportStage>,
    pub glossary_passes: Vec<GlossaryPass>,
    pub reconcile: Option<ReconcileReport>,
}

pub fn run_full_export(
    conn: &Connection,
    service: &dyn ReasoningService,
    config: &ReconcileConfig,
    clock: &dyn Clock,
) -> Result<ExportReport, PipelineError> {
    let run_id = Uuid::new_v4();
    let _span = tracing::info_span!("full_export", run_id = %run_id).entered();
    let started_ms = clock.now_ms();

    let mut rows = load_raw_rows(conn)?;
    let mut report = ExportReport {
        run_id,
        raw_rows: rows.len(),
        dry_run: config.dry_run_rows.is_some(),
        stages_run: Vec::new(),
        glossary_passes: Vec::new(),
        reconcile: None,
    };
    if rows.is_empty() {
        tracing::warn!("No raw extraction rows, nothing to reconcile");
        return Ok(report);
    }
    if let Some(limit) = config.dry_run_rows {
        rows.truncate(limit);
        report.raw_rows = rows.len();
        tracing::info!(rows = rows.len(), "Dry run, processing a slice of the raw rows");
    }

    for &stage in ExportStage::all() {
        if !config.is_enabled(stage) {
            tracing::debug!(stage = %stage, "Stage disabled, skipping");
            continue;
        }
        tracing::info!(stage = %stage, "Export stage starting");
        match stage {
            ExportStage::Setup => {
                clear_output_tables(conn)?;
                clear_glossaries(conn)?;
            }
            ExportStage::MasterOrigins => report.glossary_passes.push(build_master_origins(
                conn,
                service,
                &rows,
                config.glossary_override,
            )?),
            ExportStage::MasterCustomers => report.glossary_passes.push(build_master_customers(
                conn,
                service,
                &rows,
                config.glossary_override,
            )?),
            ExportStage::MasterProducts => report.glossary_passes.push(build_master_products(
                conn,
                service,
                &rows,
                config.glossary_override,
            )?),
            ExportStage::InvoiceBatches => {
                report.reconcile = Some(run_batch_reconciliation(conn, service, &rows, config, clock)?);
            }
        }
        report.stages_run.push(stage);
    }

    tracing::info!(
        stages = report.stages_run.len(),
        duration_ms = clock.now_ms().saturating_sub(started_ms),
        "Export complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{append_raw_rows, load_glossaries, load_invoices};
    use crate::db::sqlite::open_memory_database;
    use crate::models::RawExtractionRow;
    use crate::pipeline::batch::ManualClock;
    use crate::pipeline::reasoning::ScriptedService;
    use serde_json::json;

    fn raw(base: &str, full: &str, item: &str) -> RawExtractionRow {
        RawExtractionRow {
            source_file: format!("{full}.doc"),
            invoice_id_base: base.into(),
            invoice_id_full: full.into(),
            date: "2023-04-01".into(),
            origin_address: "4051 E. La Palma Ave".into(),
            sold_to: "Acme Inc".into(),
            qty: 1.0,
            item_no: item.into(),
            description: "Generator".into(),
            extended_total: Some(900.0),
            ..Default::default()
        }
    }

    fn scripted_full_run() -> ScriptedService {
        ScriptedService::new()
            .with_response(json!({"origins": [{"origin_id": "O1", "standardized_address": "4051 E. La Palma Ave"}]}))
            .with_response(json!({"customers": [{"cust_id": "C1", "canonical_name": "Acme"}]}))
            .with_response(json!({"products": [{"prod_id": "P1", "canonical_item_no": "GH-100", "raw_description": "Generator"}]}))
            .with_response(json!({"winning_invoices": [{
                "invoice_id_full": "6001", "invoice_id_base": "6001", "iso_date": "2023-04-01",
                "origin_id": "O1", "cust_id": "C1",
                "financials": {"total": 900},
                "line_items": [{"qty": 1, "prod_id": "P1", "extended_total": 900}]
            }]}))
    }

    #[test]
    fn empty_raw_table_is_a_no_op() {
        let conn = open_memory_database().unwrap();
        let service = ScriptedService::new();
        let report =
            run_full_export(&conn, &service, &ReconcileConfig::default(), &ManualClock::new(0)).unwrap();
        assert_eq!(report.raw_rows, 0);
        assert!(report.stages_run.is_empty());
        assert!(service.calls().is_empty());
    }

    #[test]
    fn full_run_executes_passes_in_order() {
        let conn = open_memory_database().unwrap();
        append_raw_rows(&conn, &[raw("6001", "6001", "GH-100")]).unwrap();
        let service = scripted_full_run();

        let report =
            run_full_export(&conn, &service, &ReconcileConfig::default(), &ManualClock::new(0)).unwrap();
        assert_eq!(report.stages_run, ExportStage::resumable());
        assert_eq!(report.glossary_passes.len(), 3);
        assert_eq!(report.reconcile.as_ref().unwrap().invoices_written, 1);

        let labels: Vec<String> = service.calls().into_iter().map(|c| c.label).collect();
        assert_eq!(
            labels,
            vec!["Unique Origins: 1", "Unique Customers: 1", "Unique Items: 1", "Batch: 1 IDs"]
        );
        let invoice = &load_invoices(&conn).unwrap()[0];
        assert_eq!(invoice.origin_address, "4051 E. La Palma Ave");
        assert_eq!(invoice.customer_name, "Acme");
    }

    #[test]
    fn default_runs_resume_after_reconciled_ids() {
        let conn = open_memory_database().unwrap();
        append_raw_rows(&conn, &[raw("6001", "6001", "GH-100")]).unwrap();
        let config = ReconcileConfig::default();
        run_full_export(&conn, &scripted_full_run(), &config, &ManualClock::new(0)).unwrap();

        let service = ScriptedService::new()
            .with_response(json!({"origins": [{"origin_id": "O1", "standardized_address": "4051 E. La Palma Ave"}]}))
            .with_response(json!({"customers": [{"cust_id": "C1", "canonical_name": "Acme"}]}))
            .with_response(json!({"products": [{"prod_id": "P1", "canonical_item_no": "GH-100", "raw_description": "Generator"}]}));
        let report = run_full_export(&conn, &service, &config, &ManualClock::new(0)).unwrap();

        let reconcile = report.reconcile.unwrap();
        assert_eq!(reconcile.filtered.already_processed, 1);
        assert_eq!(reconcile.chunks_committed, 0);
        assert!(service.calls().iter().all(|c| !c.label.starts_with("Batch")));
        assert_eq!(load_invoices(&conn).unwrap().len(), 1);
    }

    #[test]
    fn explicit_setup_starts_over() {
        let conn = open_memory_database().unwrap();
        append_raw_rows(&conn, &[raw("6001", "6001", "GH-100")]).unwrap();
        run_full_export(&conn, &scripted_full_run(), &ReconcileConfig::default(), &ManualClock::new(0))
            .unwrap();

        let config = ReconcileConfig {
            stages: ExportStage::all().to_vec(),
            ..Default::default()
        };
        let report = run_full_export(&conn, &scripted_full_run(), &config, &ManualClock::new(0)).unwrap();
        assert_eq!(report.stages_run[0], ExportStage::Setup);
        assert_eq!(report.reconcile.unwrap().invoices_written, 1);
        assert_eq!(load_invoices(&conn).unwrap().len(), 1);
    }

    #[test]
    fn batches_only_reuse_stored_glossaries() {
        let conn = open_memory_database().unwrap();
        append_raw_rows(&conn, &[raw("6001", "6001", "GH-100")]).unwrap();
        run_full_export(&conn, &scripted_full_run(), &ReconcileConfig::default(), &ManualClock::new(0))
            .unwrap();

        append_raw_rows(&conn, &[raw("6002", "6002", "GH-100")]).unwrap();
        let config = ReconcileConfig {
            stages: vec![ExportStage::InvoiceBatches],
            ..Default::default()
        };
        let service = ScriptedService::new().with_response(json!({"winning_invoices": [{
            "invoice_id_full": "6002", "invoice_id_base": "6002", "cust_id": "C1", "line_items": []
        }]}));
        let report = run_full_export(&conn, &service, &config, &ManualClock::new(0)).unwrap();

        assert_eq!(report.stages_run, vec![ExportStage::InvoiceBatches]);
        assert_eq!(service.calls().len(), 1);
        assert_eq!(load_glossaries(&conn).unwrap().customers.len(), 1);
        assert_eq!(load_invoices(&conn).unwrap().len(), 2);
    }

    #[test]
    fn dry_run_slices_raw_rows() {
        let conn = open_memory_database().unwrap();
        let rows: Vec<RawExtractionRow> = (0..15)
            .map(|i| raw(&format!("{}", 7000 + i), &format!("{}", 7000 + i), "GH-100"))
            .collect();
        append_raw_rows(&conn, &rows).unwrap();
        let config = ReconcileConfig {
            dry_run_rows: Some(10),
            stages: vec![ExportStage::Setup],
            ..Default::default()
        };
        let report = run_full_export(&conn, &ScriptedService::new(), &config, &ManualClock::new(0)).unwrap();
        assert!(report.dry_run);
        assert_eq!(report.raw_rows, 10);
    }

    #[test]
    fn glossary_failure_stops_later_passes() {
        let conn = open_memory_database().unwrap();
        append_raw_rows(&conn, &[raw("6001", "6001", "GH-100")]).unwrap();
        let service = ScriptedService::new().with_response(json!({"origins": []}));
        let err =
            run_full_export(&conn, &service, &ReconcileConfig::default(), &ManualClock::new(0)).unwrap_err();
        assert!(matches!(err, PipelineError::Glossary(_)));
        assert_eq!(service.calls().len(), 1);
    }
}
