use std::process::ExitCode;

use invoice_ledger::config::PipelineConfig;
use invoice_ledger::{init_tracing, run_stage, Stage};

fn main() -> ExitCode {
    init_tracing();

    let Some(name) = std::env::args().nth(1) else {
        let names: Vec<_> = Stage::all().iter().map(Stage::as_str).collect();
        tracing::error!(stages = %names.join(", "), "No stage given");
        return ExitCode::from(2);
    };

    let stage: Stage = match name.parse() {
        Ok(stage) => stage,
        Err(e) => {
            tracing::error!(error = %e, "Unknown stage");
            return ExitCode::from(2);
        }
    };

    let config = match PipelineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::from(2);
        }
    };

    match run_stage(stage, &config) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(stage = %stage, error = %e, "Stage failed");
            ExitCode::FAILURE
        }
    }
}
