pub mod config;
pub mod db;
pub mod models;
pub mod pipeline;

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

use config::{ConfigError, PipelineConfig};
use db::open_database;
use pipeline::adapters::{
    CommandConverter, HtmlDocumentReader, LocalFolderCatalog, LocalRenditionFetcher,
};
use pipeline::batch::{BatchOutcome, StageLock, SystemClock};
use pipeline::conversion::{build_registry, run_batch_conversion};
use pipeline::export::{run_full_export, ExportReport};
use pipeline::extraction::{run_batch_extraction, setup_extraction_table, SingleRecordExtractor};
use pipeline::reasoning::{ReasoningClient, ThreadSleeper};
use pipeline::PipelineError;

/// Install the global tracing subscriber. `RUST_LOG` wins over the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Separately triggerable entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Registry,
    Conversion,
    ExtractionReset,
    Extraction,
    Reconciliation,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registry => "registry",
            Self::Conversion => "conversion",
            Self::ExtractionReset => "extraction-reset",
            Self::Extraction => "extraction",
            Self::Reconciliation => "reconciliation",
        }
    }

    pub fn all() -> &'static [Stage] {
        &[
            Self::Registry,
            Self::Conversion,
            Self::ExtractionReset,
            Self::Extraction,
            Self::Reconciliation,
        ]
    }

    /// Name of the advisory lock. The reset shares the extraction lock so
    /// it cannot run while extraction appends rows.
    fn lock_name(&self) -> &'static str {
        match self {
            Self::ExtractionReset => Self::Extraction.as_str(),
            other => other.as_str(),
        }
    }
}

impl FromStr for Stage {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|stage| stage.as_str() == wanted)
            .ok_or_else(|| ConfigError::Invalid {
                key: "stage".into(),
                value: s.into(),
            })
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a stage invocation did.
#[derive(Debug)]
pub enum StageReport {
    Registry { indexed: usize },
    Conversion(BatchOutcome),
    ExtractionReset { removed: usize },
    Extraction(BatchOutcome),
    Reconciliation(ExportReport),
}

/// Run one stage against the configured database, holding the stage lock
/// for the whole invocation.
pub fn run_stage(stage: Stage, config: &PipelineConfig) -> Result<StageReport, PipelineError> {
    let _span = tracing::info_span!("stage", stage = %stage).entered();
    tracing::info!(version = config::APP_VERSION, db = %config.database_path.display(), "Stage starting");

    let conn = open_database(&config.database_path)?;
    let _lock = StageLock::acquire(&conn, stage.lock_name(), config.lock_ttl_secs)?;
    let clock = SystemClock::default();

    let report = match stage {
        Stage::Registry => {
            let folder = config.source_folder.as_ref().ok_or_else(|| {
                PipelineError::Precondition("INVOICE_LEDGER_SOURCE_FOLDER is not set".into())
            })?;
            let indexed = build_registry(&conn, &LocalFolderCatalog::new(folder))?;
            StageReport::Registry { indexed }
        }
        Stage::Conversion => {
            let command = config.converter_command.as_deref().ok_or_else(|| {
                PipelineError::Precondition("INVOICE_LEDGER_CONVERTER_COMMAND is not set".into())
            })?;
            let converter = CommandConverter::new(command, &config.renditions_folder)?;
            StageReport::Conversion(run_batch_conversion(
                &conn,
                &converter,
                &config.conversion,
                &clock,
            )?)
        }
        Stage::ExtractionReset => StageReport::ExtractionReset {
            removed: setup_extraction_table(&conn)?,
        },
        Stage::Extraction => {
            let client = ReasoningClient::from_config(&config.reasoning)?;
            let extractor =
                SingleRecordExtractor::new(&HtmlDocumentReader, &LocalRenditionFetcher, &client);
            StageReport::Extraction(run_batch_extraction(
                &conn,
                &extractor,
                &config.extraction,
                &clock,
                &ThreadSleeper,
            )?)
        }
        Stage::Reconciliation => {
            let client = ReasoningClient::from_config(&config.reasoning)?;
            StageReport::Reconciliation(run_full_export(&conn, &client, &config.reconcile, &clock)?)
        }
    };

    tracing::info!(report = ?report, "Stage finished");
    Ok(report)
}
