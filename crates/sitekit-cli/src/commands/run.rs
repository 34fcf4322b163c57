//! `sitekit run <plugin> <command> [args...]`.

use clap::Args;

use sitekit_core::config::AppConfig;
use sitekit_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Arguments for the run command
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Plugin name
    pub plugin: String,

    /// Command provided by the plugin
    pub command: String,

    /// Arguments passed to the command
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Execute the run command
pub async fn execute(args: &RunArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let (manager, _) = super::start_manager(config).await;

    let result = manager
        .run_command(&args.plugin, &args.command, &args.args)
        .await;
    manager.cleanup().await;

    output::print_item(&result?, format);
    Ok(())
}
