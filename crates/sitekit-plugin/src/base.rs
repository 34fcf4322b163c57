//! Reusable configuration and logging scaffolding for plugins.
//!
//! A plugin embeds a [`BasePlugin`] and delegates the boilerplate parts of
//! the [`Plugin`](crate::traits::Plugin) trait to it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use serde_json::{Map, Value};
use tracing::{Span, info, info_span};

use sitekit_core::config::PluginSettings;
use sitekit_core::result::AppResult;

/// Identity and per-instance configuration of a plugin.
#[derive(Debug)]
pub struct BasePlugin {
    name: String,
    version: String,
    description: Option<String>,
    author: Option<String>,
    enabled: AtomicBool,
    options: RwLock<Map<String, Value>>,
}

impl BasePlugin {
    /// Creates the scaffolding, merging `settings` over `defaults`.
    pub fn new(
        name: &str,
        version: &str,
        defaults: &Map<String, Value>,
        settings: &PluginSettings,
    ) -> Self {
        let merged = PluginSettings::merged(defaults, settings);
        Self {
            name: name.to_string(),
            version: version.to_string(),
            description: None,
            author: None,
            enabled: AtomicBool::new(merged.enabled),
            options: RwLock::new(merged.options),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Sets the author.
    pub fn with_author(mut self, author: &str) -> Self {
        self.author = Some(author.to_string());
        self
    }

    /// Plugin name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Plugin version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Plugin description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Plugin author.
    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    /// Whether the plugin is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Enables the plugin.
    pub fn enable(&self) {
        self.set_enabled(true);
    }

    /// Disables the plugin.
    pub fn disable(&self) {
        self.set_enabled(false);
    }

    /// Sets the enabled flag.
    pub fn set_enabled(&self, enabled: bool) {
        let previous = self.enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            info!(plugin = %self.name, enabled = enabled, "Plugin toggled");
        }
    }

    /// Returns an option value.
    pub fn option(&self, key: &str) -> Option<Value> {
        let options = self.options.read().unwrap_or_else(PoisonError::into_inner);
        options.get(key).cloned()
    }

    /// Returns a string option, or `default` when absent.
    pub fn option_str(&self, key: &str, default: &str) -> String {
        self.option(key)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| default.to_string())
    }

    /// Returns a boolean option, or `default` when absent.
    pub fn option_bool(&self, key: &str, default: bool) -> bool {
        self.option(key).and_then(|v| v.as_bool()).unwrap_or(default)
    }

    /// Merges runtime overrides into the options. `enabled` toggles the flag.
    pub fn configure(&self, overrides: &Map<String, Value>) -> AppResult<()> {
        let mut options = self.options.write().unwrap_or_else(PoisonError::into_inner);
        for (key, value) in overrides {
            if key == "enabled" {
                if let Some(enabled) = value.as_bool() {
                    self.enabled.store(enabled, Ordering::SeqCst);
                }
                continue;
            }
            options.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> PluginSettings {
        let options = self.options.read().unwrap_or_else(PoisonError::into_inner);
        PluginSettings {
            enabled: self.is_enabled(),
            options: options.clone(),
        }
    }

    /// A tracing span scoped to this plugin.
    pub fn span(&self) -> Span {
        info_span!("plugin", plugin = %self.name, version = %self.version)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn defaults() -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("suffix".into(), json!("-min"));
        map.insert("verbose".into(), json!(false));
        map
    }

    #[test]
    fn test_overrides_merge_over_defaults() {
        let mut settings = PluginSettings::default();
        settings.options.insert("verbose".into(), json!(true));

        let base = BasePlugin::new("p", "1.0.0", &defaults(), &settings);
        assert!(base.is_enabled());
        assert_eq!(base.option_str("suffix", "?"), "-min");
        assert!(base.option_bool("verbose", false));
    }

    #[test]
    fn test_enable_disable() {
        let base = BasePlugin::new("p", "1.0.0", &Map::new(), &PluginSettings::default());
        base.disable();
        assert!(!base.is_enabled());
        base.enable();
        assert!(base.is_enabled());
    }

    #[test]
    fn test_instances_do_not_share_state() {
        let a = BasePlugin::new("a", "1.0.0", &defaults(), &PluginSettings::default());
        let b = BasePlugin::new("b", "1.0.0", &defaults(), &PluginSettings::default());

        let mut overrides = Map::new();
        overrides.insert("suffix".into(), json!(".x"));
        overrides.insert("enabled".into(), json!(false));
        a.configure(&overrides).expect("configure");

        assert_eq!(a.option_str("suffix", "?"), ".x");
        assert!(!a.is_enabled());
        assert_eq!(b.option_str("suffix", "?"), "-min");
        assert!(b.is_enabled());
    }
}
