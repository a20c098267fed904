//! Pipeline configuration.
//!
//! One `PipelineConfig` is built at process start (`from_env`) and passed by
//! reference into every stage. Nothing here is global or mutable after start.

use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::enums::ExportStage;

/// Application-level constants
pub const APP_NAME: &str = "InvoiceLedger";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable prefix for every setting except the API key.
const ENV_PREFIX: &str = "INVOICE_LEDGER_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(String),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: String, value: String },
}

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info,invoice_ledger=debug,reqwest=warn"
}

/// Get the application data directory (~/InvoiceLedger/).
///
/// Falls back to the working directory when no home directory is known.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default location of the ledger database.
pub fn default_database_path() -> PathBuf {
    app_data_dir().join("ledger.db")
}

/// Settings for the external reasoning service.
#[derive(Debug, Clone)]
pub struct ReasoningConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model_id: String,
    pub max_output_tokens: u32,
    pub request_timeout_secs: u64,
    /// Total attempts, including the first call.
    pub max_attempts: u32,
    /// Added on top of a server-provided retry delay.
    pub retry_hint_buffer_ms: u64,
    /// Fallback wait is `attempt * fallback_backoff_ms` when no hint is given.
    pub fallback_backoff_ms: u64,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com".into(),
            model_id: "gemini-3-flash-preview".into(),
            max_output_tokens: 65_536,
            request_timeout_secs: 300,
            max_attempts: 3,
            retry_hint_buffer_ms: 2_000,
            fallback_backoff_ms: 5_000,
        }
    }
}

impl ReasoningConfig {
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing("GEMINI_API_KEY".into()))
    }
}

/// Stage 1: rendition conversion.
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    pub budget_ms: u64,
    pub max_items: usize,
    pub enable_structured: bool,
    pub enable_markup: bool,
    pub enable_visual: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            budget_ms: 255_000,
            max_items: 50,
            enable_structured: true,
            enable_markup: true,
            enable_visual: true,
        }
    }
}

/// Stage 2: single-record extraction.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    pub budget_ms: u64,
    /// Successful records per invocation. Failures do not count.
    pub max_items: usize,
    /// Pause after each successful record to stay under the service rate limit.
    pub pause_between_items_ms: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            budget_ms: 255_000,
            max_items: 20,
            pause_between_items_ms: 1_000,
        }
    }
}

/// Stage 3: glossary building and batch reconciliation.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub budget_ms: u64,
    pub chunk_size: usize,
    pub cutoff_date: NaiveDate,
    /// When set, only the first N raw rows are processed.
    pub dry_run_rows: Option<usize>,
    /// Defaults to every pass except SETUP.
    pub stages: Vec<ExportStage>,
    /// Accept a glossary whose entity count diverges from its input count.
    pub glossary_override: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            budget_ms: 330_000,
            chunk_size: 25,
            cutoff_date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap_or_default(),
            dry_run_rows: None,
            stages: ExportStage::resumable(),
            glossary_override: false,
        }
    }
}

impl ReconcileConfig {
    pub fn is_enabled(&self, stage: ExportStage) -> bool {
        self.stages.contains(&stage)
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub database_path: PathBuf,
    pub lock_ttl_secs: u64,
    pub reasoning: ReasoningConfig,
    pub conversion: ConversionConfig,
    pub extraction: ExtractionConfig,
    pub reconcile: ReconcileConfig,
    /// Folder scanned by the local source catalog.
    pub source_folder: Option<PathBuf>,
    /// Folder the local converter writes renditions into.
    pub renditions_folder: PathBuf,
    /// Converter command template with `{input}`, `{output}`, `{outdir}` and `{format}` placeholders.
    pub converter_command: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            lock_ttl_secs: 600,
            reasoning: ReasoningConfig::default(),
            conversion: ConversionConfig::default(),
            extraction: ExtractionConfig::default(),
            reconcile: ReconcileConfig::default(),
            source_folder: None,
            renditions_folder: app_data_dir().join("renditions"),
            converter_command: None,
        }
    }
}

impl PipelineConfig {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut config = Self::default();

        if let Some(path) = get("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Some(v) = get("LOCK_TTL_SECS") {
            config.lock_ttl_secs = parse_number("LOCK_TTL_SECS", &v)?;
        }

        config.reasoning.api_key = lookup("GEMINI_API_KEY");
        if let Some(v) = get("MODEL_ID") {
            config.reasoning.model_id = v;
        }
        if let Some(v) = get("REASONING_BASE_URL") {
            config.reasoning.base_url = v;
        }
        if let Some(v) = get("MAX_ATTEMPTS") {
            config.reasoning.max_attempts = parse_number("MAX_ATTEMPTS", &v)?;
        }

        if let Some(v) = get("CONVERSION_MAX_ITEMS") {
            config.conversion.max_items = parse_number("CONVERSION_MAX_ITEMS", &v)?;
        }
        if let Some(v) = get("EXTRACTION_MAX_ITEMS") {
            config.extraction.max_items = parse_number("EXTRACTION_MAX_ITEMS", &v)?;
        }
        if let Some(v) = get("CHUNK_SIZE") {
            let size: usize = parse_number("CHUNK_SIZE", &v)?;
            if size == 0 {
                return Err(ConfigError::Invalid {
                    key: "CHUNK_SIZE".into(),
                    value: v,
                });
            }
            config.reconcile.chunk_size = size;
        }
        if let Some(v) = get("CUTOFF_DATE") {
            config.reconcile.cutoff_date = NaiveDate::parse_from_str(&v, "%Y-%m-%d")
                .map_err(|_| ConfigError::Invalid {
                    key: "CUTOFF_DATE".into(),
                    value: v.clone(),
                })?;
        }
        if let Some(v) = get("DRY_RUN_ROWS") {
            config.reconcile.dry_run_rows = Some(parse_number("DRY_RUN_ROWS", &v)?);
        }
        if let Some(v) = get("EXPORT_STAGES") {
            config.reconcile.stages = parse_stages(&v)?;
        }
        if let Some(v) = get("GLOSSARY_OVERRIDE") {
            config.reconcile.glossary_override = matches!(v.as_str(), "1" | "true" | "yes");
        }

        config.source_folder = get("SOURCE_FOLDER").map(PathBuf::from);
        if let Some(v) = get("RENDITIONS_FOLDER") {
            config.renditions_folder = PathBuf::from(v);
        }
        config.converter_command = get("CONVERTER_COMMAND");

        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key: key.into(),
        value: value.into(),
    })
}

fn parse_stages(value: &str) -> Result<Vec<ExportStage>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<ExportStage>().map_err(|_| ConfigError::Invalid {
                key: "EXPORT_STAGES".into(),
                value: s.into(),
            })
        })
        .collect()
}
