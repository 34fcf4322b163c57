//! CLI command definitions and dispatch.

pub mod create;
pub mod info;
pub mod lifecycle;
pub mod list;
pub mod run;
pub mod toggle;
pub mod validate;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use sitekit_core::config::AppConfig;
use sitekit_core::error::AppError;
use sitekit_plugin::{InitOptions, InitSummary, PluginManager};

use crate::output::OutputFormat;

/// SiteKit — plugin management for SiteKit sites
#[derive(Debug, Parser)]
#[command(name = "sitekit", version, about, long_about = None)]
pub struct Cli {
    /// Configuration directory
    #[arg(short, long, default_value = "config")]
    pub config: String,

    /// Configuration environment overlay (`<config>/<env>.toml`)
    #[arg(short, long, default_value = "development")]
    pub env: String,

    /// Plugin directory, overriding the configured one
    #[arg(long)]
    pub plugins_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List discovered plugins
    List(list::ListArgs),
    /// Show details of one plugin
    Info(info::InfoArgs),
    /// Enable a plugin in the plugin configuration file
    Enable(toggle::ToggleArgs),
    /// Disable a plugin in the plugin configuration file
    Disable(toggle::ToggleArgs),
    /// Reload a plugin from its directory
    Reload(lifecycle::ReloadArgs),
    /// Run a command provided by a plugin
    Run(run::RunArgs),
    /// Scaffold a new plugin directory
    Create(create::CreateArgs),
    /// Validate a plugin without registering it
    Validate(validate::ValidateArgs),
    /// Discover and initialize all plugins
    Init,
    /// Initialize, then clean up every plugin
    Cleanup,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let config = self.load_config()?;

        match &self.command {
            Commands::List(args) => list::execute(args, &config, self.format).await,
            Commands::Info(args) => info::execute(args, &config, self.format).await,
            Commands::Enable(args) => toggle::execute(args, &config, true),
            Commands::Disable(args) => toggle::execute(args, &config, false),
            Commands::Reload(args) => lifecycle::reload(args, &config, self.format).await,
            Commands::Run(args) => run::execute(args, &config, self.format).await,
            Commands::Create(args) => create::execute(args, &config).await,
            Commands::Validate(args) => validate::execute(args, &config, self.format).await,
            Commands::Init => lifecycle::init(&config, self.format).await,
            Commands::Cleanup => lifecycle::cleanup(&config).await,
        }
    }

    /// Loads the layered configuration and applies command-line overrides.
    pub fn load_config(&self) -> Result<AppConfig, AppError> {
        let mut config = AppConfig::load_from(&self.config, &self.env)?;
        if let Some(dir) = &self.plugins_dir {
            config.plugins.directory = dir.display().to_string();
        }
        Ok(config)
    }
}

/// Helper: plugin manager over the built-in catalog
pub fn build_manager(config: &AppConfig) -> PluginManager {
    PluginManager::new(config.plugins.clone(), sitekit_plugins::catalog())
}

/// Helper: plugin manager with every plugin discovered and initialized
pub async fn start_manager(config: &AppConfig) -> (PluginManager, InitSummary) {
    let manager = build_manager(config);
    let summary = manager.initialize(InitOptions::default()).await;
    (manager, summary)
}

/// Helper: error for a plugin that is not loaded
pub fn plugin_not_found(name: &str) -> AppError {
    AppError::not_found(format!("Plugin '{name}' is not loaded"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_trailing_args() {
        let cli = Cli::try_parse_from([
            "sitekit", "--format", "json", "run", "site-stats", "summary", "--top", "5",
        ])
        .expect("parses");

        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.plugin, "site-stats");
                assert_eq!(args.command, "summary");
                assert_eq!(args.args, vec!["--top", "5"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_plugins_dir_override() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cli = Cli::try_parse_from([
            "sitekit",
            "--config",
            dir.path().to_str().expect("utf8"),
            "--plugins-dir",
            "/srv/site/plugins",
            "list",
        ])
        .expect("parses");

        let config = cli.load_config().expect("config");
        assert_eq!(config.plugins.directory, "/srv/site/plugins");
    }
}
