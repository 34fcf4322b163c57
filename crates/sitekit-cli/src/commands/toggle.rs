//! `sitekit enable|disable <plugin>` — persisted to the plugin configuration file.

use std::path::Path;

use clap::Args;

use sitekit_core::config::{AppConfig, PluginConfigFile};
use sitekit_core::error::AppError;

use crate::output;

/// Arguments for the enable and disable commands
#[derive(Debug, Args)]
pub struct ToggleArgs {
    /// Plugin name
    pub plugin: String,

    /// Write the entry even if no such plugin directory exists
    #[arg(long)]
    pub force: bool,
}

/// Execute the enable or disable command
pub fn execute(args: &ToggleArgs, config: &AppConfig, enabled: bool) -> Result<(), AppError> {
    let entry = Path::new(&config.plugins.directory)
        .join(&args.plugin)
        .join(&config.plugins.entry_point);
    if !args.force && !entry.exists() {
        return Err(AppError::not_found(format!(
            "No plugin '{}' (missing {})",
            args.plugin,
            entry.display()
        )));
    }

    let path = Path::new(&config.plugins.config_file);
    let changed = set_enabled(path, &args.plugin, enabled)?;

    let verb = if enabled { "enabled" } else { "disabled" };
    if changed {
        output::print_success(&format!("Plugin '{}' {verb}", args.plugin));
    } else {
        output::print_warning(&format!("Plugin '{}' was already {verb}", args.plugin));
    }
    Ok(())
}

/// Sets the flag in the file at `path`. Returns whether anything changed.
pub fn set_enabled(path: &Path, plugin: &str, enabled: bool) -> Result<bool, AppError> {
    let mut file = PluginConfigFile::load(path)?;
    if file.get(plugin).is_some_and(|s| s.enabled == enabled) {
        return Ok(false);
    }
    file.set_enabled(plugin, enabled);
    file.save(path)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_enabled_keeps_options() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config/plugins.toml");
        std::fs::create_dir_all(dir.path().join("config")).expect("mkdir");
        std::fs::write(&path, "[asset-stamp]\nstamp = \"v3\"\n").expect("write");

        assert!(set_enabled(&path, "asset-stamp", false).expect("saved"));
        assert!(!set_enabled(&path, "asset-stamp", false).expect("unchanged"));

        let file = PluginConfigFile::load(&path).expect("reload");
        let settings = file.get("asset-stamp").expect("entry");
        assert!(!settings.enabled);
        assert_eq!(settings.get_str("stamp"), Some("v3"));
    }

    #[test]
    fn test_set_enabled_creates_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/plugins.toml");

        assert!(set_enabled(&path, "site-stats", false).expect("saved"));
        assert!(PluginConfigFile::load(&path).expect("load").is_disabled("site-stats"));
    }
}
