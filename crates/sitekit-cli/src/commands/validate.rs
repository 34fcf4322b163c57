//! `sitekit validate <plugin>` — build a plugin and run its checks.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use sitekit_core::config::AppConfig;
use sitekit_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Arguments for the validate command
#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Plugin name (directory name)
    pub plugin: String,
}

/// Validation check row for table output
#[derive(Debug, Serialize, Tabled)]
struct CheckRow {
    /// What was checked
    check: String,
    /// Outcome
    result: String,
}

/// Execute the validate command
pub async fn execute(args: &ValidateArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let manager = super::build_manager(config);
    let report = manager.validate_candidate(&args.plugin).await?;

    match format {
        OutputFormat::Json => output::print_item(&report, format),
        OutputFormat::Table => {
            let rows: Vec<CheckRow> = report
                .checks
                .iter()
                .map(|c| CheckRow {
                    check: c.check.clone(),
                    result: if c.passed { "ok" } else { "FAILED" }.to_string(),
                })
                .collect();
            output::print_list(&rows, format);
        }
    }

    if report.is_valid() {
        output::print_success(&format!("Plugin '{}' is valid", args.plugin));
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "Plugin '{}' failed: {}",
            args.plugin,
            report.failures().join(", ")
        )))
    }
}
