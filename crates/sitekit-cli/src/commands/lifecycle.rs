//! `sitekit init`, `sitekit reload <plugin>` and `sitekit cleanup`.

use clap::Args;
use serde::Serialize;

use sitekit_core::config::AppConfig;
use sitekit_core::error::AppError;
use sitekit_plugin::PluginEvent;

use super::list::PluginRow;
use crate::output::{self, OutputFormat};

/// Arguments for the reload command
#[derive(Debug, Args)]
pub struct ReloadArgs {
    /// Plugin name
    pub plugin: String,
}

#[derive(Debug, Serialize)]
struct ReloadOutcome {
    plugin: String,
    version: String,
    previous_load_id: String,
    load_id: String,
    state: String,
}

/// Execute the init command
pub async fn init(config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let manager = super::build_manager(config);
    let mut events = manager.subscribe();
    let summary = manager.initialize(Default::default()).await;

    let mut rejected = Vec::new();
    while let Ok(timed) = events.try_recv() {
        match timed.event {
            PluginEvent::Rejected { plugin, reason } => rejected.push((plugin, reason)),
            PluginEvent::InitializationFailed { plugin, error } => rejected.push((plugin, error)),
            _ => {}
        }
    }

    match format {
        OutputFormat::Json => output::print_item(&summary, format),
        OutputFormat::Table => {
            let rows: Vec<PluginRow> = manager
                .get_all_plugin_info()
                .await
                .iter()
                .map(PluginRow::from)
                .collect();
            output::print_list(&rows, format);
            output::print_kv("loaded", &summary.loaded.to_string());
            output::print_kv("active", &summary.active.to_string());
            output::print_kv("failed", &summary.failed.to_string());
            for (plugin, reason) in &rejected {
                output::print_warning(&format!("{plugin}: {reason}"));
            }
        }
    }

    manager.cleanup().await;
    Ok(())
}

/// Execute the reload command
pub async fn reload(args: &ReloadArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let (manager, _) = super::start_manager(config).await;

    let Some(before) = manager.get_plugin_info(&args.plugin).await else {
        manager.cleanup().await;
        return Err(super::plugin_not_found(&args.plugin));
    };

    let reloaded = manager.reload_plugin(&args.plugin).await;
    let after = manager.get_plugin_info(&args.plugin).await;
    manager.cleanup().await;

    if !reloaded {
        return Err(AppError::plugin(format!(
            "Plugin '{}' could not be reloaded",
            args.plugin
        )));
    }
    let after = after.ok_or_else(|| super::plugin_not_found(&args.plugin))?;

    output::print_item(
        &ReloadOutcome {
            plugin: after.name,
            version: after.version,
            previous_load_id: before.load_id.to_string(),
            load_id: after.load_id.to_string(),
            state: after.state.to_string(),
        },
        format,
    );
    Ok(())
}

/// Execute the cleanup command
pub async fn cleanup(config: &AppConfig) -> Result<(), AppError> {
    let (manager, summary) = super::start_manager(config).await;
    manager.cleanup().await;
    output::print_success(&format!("Cleaned up {} plugin(s)", summary.loaded));
    Ok(())
}

#[cfg(test)]
mod tests {
    use sitekit_core::ErrorKind;

    use super::*;

    fn site(root: &std::path::Path) -> AppConfig {
        let plugin_dir = root.join("plugins").join("site-stats");
        std::fs::create_dir_all(&plugin_dir).expect("mkdir");
        std::fs::write(plugin_dir.join("plugin.toml"), "").expect("write manifest");

        let mut config = AppConfig::default();
        config.plugins.directory = root.join("plugins").display().to_string();
        config.plugins.config_file = root.join("plugins.toml").display().to_string();
        config
    }

    #[tokio::test]
    async fn test_reload_known_plugin() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = site(dir.path());

        let args = ReloadArgs {
            plugin: "site-stats".to_string(),
        };
        reload(&args, &config, OutputFormat::Json)
            .await
            .expect("reloaded");
    }

    #[tokio::test]
    async fn test_reload_unknown_plugin_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = site(dir.path());

        let args = ReloadArgs {
            plugin: "ghost".to_string(),
        };
        let err = reload(&args, &config, OutputFormat::Json)
            .await
            .expect_err("unknown plugin");
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
