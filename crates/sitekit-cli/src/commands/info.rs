//! `sitekit info <plugin>`.

use clap::Args;

use sitekit_core::config::AppConfig;
use sitekit_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Arguments for the info command
#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Plugin name
    pub plugin: String,
}

/// Execute the info command
pub async fn execute(args: &InfoArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let (manager, _) = super::start_manager(config).await;

    let info = manager.get_plugin_info(&args.plugin).await;
    manager.cleanup().await;

    let info = info.ok_or_else(|| super::plugin_not_found(&args.plugin))?;
    output::print_item(&info, format);
    Ok(())
}
