//! `sitekit list` — discovered plugins and their state.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use sitekit_core::config::AppConfig;
use sitekit_core::error::AppError;
use sitekit_plugin::PluginInfo;

use crate::output::{self, OutputFormat};

/// Arguments for the list command
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only show plugins in this state (loaded, active, disabled, failed)
    #[arg(short, long)]
    pub state: Option<String>,
}

/// Plugin display row for table output
#[derive(Debug, Serialize, Tabled)]
pub struct PluginRow {
    /// Plugin name
    pub name: String,
    /// Version
    pub version: String,
    /// Lifecycle state
    pub state: String,
    /// Hook handlers registered
    pub hooks: usize,
    /// Optional capabilities
    pub capabilities: String,
    /// Plugin directory
    pub path: String,
}

impl From<&PluginInfo> for PluginRow {
    fn from(info: &PluginInfo) -> Self {
        Self {
            name: info.name.clone(),
            version: info.version.clone(),
            state: info.state.to_string(),
            hooks: info.hooks,
            capabilities: if info.capabilities.is_empty() {
                "-".to_string()
            } else {
                info.capabilities.join(", ")
            },
            path: info.path.clone(),
        }
    }
}

/// Execute the list command
pub async fn execute(args: &ListArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let (manager, _) = super::start_manager(config).await;

    let rows: Vec<PluginRow> = manager
        .get_all_plugin_info()
        .await
        .iter()
        .filter(|info| {
            args.state
                .as_deref()
                .is_none_or(|state| info.state.to_string() == state)
        })
        .map(PluginRow::from)
        .collect();

    output::print_list(&rows, format);
    manager.cleanup().await;
    Ok(())
}
