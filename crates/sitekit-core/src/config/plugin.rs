//! Plugin system configuration and the per-plugin configuration file.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::AppError;

/// Plugin runtime configuration (the `[plugins]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginSystemConfig {
    /// The single directory scanned for plugins.
    #[serde(default = "default_plugin_directory")]
    pub directory: String,
    /// File name of a plugin's entry point inside its directory.
    #[serde(default = "default_entry_point")]
    pub entry_point: String,
    /// Path to the per-plugin configuration file.
    #[serde(default = "default_config_file")]
    pub config_file: String,
    /// Whether the server discovers plugins on startup.
    #[serde(default = "default_true")]
    pub auto_load: bool,
    /// Time budget for a single hook callback, in milliseconds.
    #[serde(default = "default_hook_timeout")]
    pub hook_timeout_ms: u64,
    /// Time budget for a plugin's `initialize`/`cleanup`, in milliseconds.
    #[serde(default = "default_lifecycle_timeout")]
    pub lifecycle_timeout_ms: u64,
}

impl Default for PluginSystemConfig {
    fn default() -> Self {
        Self {
            directory: default_plugin_directory(),
            entry_point: default_entry_point(),
            config_file: default_config_file(),
            auto_load: true,
            hook_timeout_ms: default_hook_timeout(),
            lifecycle_timeout_ms: default_lifecycle_timeout(),
        }
    }
}

/// Configuration record of a single plugin.
///
/// `enabled` is always present; every other key is plugin specific.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginSettings {
    /// Whether the plugin is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Plugin-specific options.
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            options: Map::new(),
        }
    }
}

impl PluginSettings {
    /// Merges `defaults` under `overrides`: keys in `overrides` win.
    pub fn merged(defaults: &Map<String, Value>, overrides: &PluginSettings) -> Self {
        let mut options = defaults.clone();
        for (key, value) in &overrides.options {
            options.insert(key.clone(), value.clone());
        }
        Self {
            enabled: overrides.enabled,
            options,
        }
    }

    /// Returns an option value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// Returns a string option.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(|v| v.as_str())
    }

    /// Returns a boolean option.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.options.get(key).and_then(|v| v.as_bool())
    }
}

/// The plugin configuration file: plugin name → settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginConfigFile {
    entries: BTreeMap<String, PluginSettings>,
}

impl PluginConfigFile {
    /// Reads the file at `path`. A missing file yields an empty map.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            debug!(path = %path.display(), "Plugin config file absent, using empty map");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let file: Self = toml::from_str(&raw)?;
        Ok(file)
    }

    /// Writes the file back to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let raw = toml::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Settings for a plugin, if the file mentions it.
    pub fn get(&self, name: &str) -> Option<&PluginSettings> {
        self.entries.get(name)
    }

    /// Settings for a plugin, defaulting to enabled with no options.
    pub fn settings_for(&self, name: &str) -> PluginSettings {
        self.entries.get(name).cloned().unwrap_or_default()
    }

    /// Whether the file explicitly disables a plugin.
    pub fn is_disabled(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(|s| !s.enabled)
    }

    /// Sets the `enabled` flag of a plugin, adding an entry if needed.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) {
        self.entries.entry(name.to_string()).or_default().enabled = enabled;
    }

    /// Number of configured plugins.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no plugin is configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn default_plugin_directory() -> String {
    "./plugins".to_string()
}

fn default_entry_point() -> String {
    "plugin.toml".to_string()
}

fn default_config_file() -> String {
    "config/plugins.toml".to_string()
}

fn default_hook_timeout() -> u64 {
    5_000
}

fn default_lifecycle_timeout() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_file_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = PluginConfigFile::load(&dir.path().join("plugins.toml")).expect("load");
        assert!(file.is_empty());
        assert!(file.settings_for("anything").enabled);
    }

    #[test]
    fn test_parse_enabled_and_options() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("plugins.toml");
        std::fs::write(
            &path,
            "[asset-stamp]\nenabled = false\n\n[request-logger]\nlevel = \"debug\"\n",
        )
        .expect("write");

        let file = PluginConfigFile::load(&path).expect("load");
        assert_eq!(file.len(), 2);
        assert!(file.is_disabled("asset-stamp"));
        assert!(!file.is_disabled("request-logger"));
        assert_eq!(
            file.settings_for("request-logger").get_str("level"),
            Some("debug")
        );
    }

    #[test]
    fn test_set_enabled_persists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("plugins.toml");

        let mut file = PluginConfigFile::default();
        file.set_enabled("site-stats", false);
        file.save(&path).expect("save");

        let reloaded = PluginConfigFile::load(&path).expect("load");
        assert!(reloaded.is_disabled("site-stats"));
    }

    #[test]
    fn test_merged_overrides_win() {
        let mut defaults = Map::new();
        defaults.insert("suffix".into(), Value::from("-min"));
        defaults.insert("verbose".into(), Value::from(false));

        let mut overrides = PluginSettings::default();
        overrides.options.insert("verbose".into(), Value::from(true));
        overrides.enabled = false;

        let merged = PluginSettings::merged(&defaults, &overrides);
        assert!(!merged.enabled);
        assert_eq!(merged.get_str("suffix"), Some("-min"));
        assert_eq!(merged.get_bool("verbose"), Some(true));
    }
}
