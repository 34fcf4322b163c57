//! Application configuration schemas.
//!
//! Configuration is layered with the `config` crate: `config/default.toml`,
//! an environment overlay `config/{env}.toml`, then `SITEKIT__*` variables.

pub mod logging;
pub mod plugin;

use serde::{Deserialize, Serialize};

pub use self::logging::LoggingConfig;
pub use self::plugin::{PluginConfigFile, PluginSettings, PluginSystemConfig};

use crate::error::AppError;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Plugin runtime settings.
    #[serde(default)]
    pub plugins: PluginSystemConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from the `config/` directory.
    ///
    /// Every file is optional; missing sections fall back to their defaults.
    pub fn load(env: &str) -> Result<Self, AppError> {
        Self::load_from("config", env)
    }

    /// Load configuration from an explicit configuration directory.
    pub fn load_from(dir: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(&format!("{dir}/default")).required(false))
            .add_source(config::File::with_name(&format!("{dir}/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("SITEKIT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_files_use_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AppConfig::load_from(dir.path().to_str().expect("utf8"), "test")
            .expect("defaults");
        assert_eq!(config.plugins.directory, "./plugins");
        assert_eq!(config.plugins.entry_point, "plugin.toml");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_overlay_overrides_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("default.toml"),
            "[plugins]\ndirectory = \"./site-plugins\"\nhook_timeout_ms = 500\n",
        )
        .expect("write default");
        std::fs::write(
            dir.path().join("staging.toml"),
            "[plugins]\nhook_timeout_ms = 250\n[logging]\nformat = \"pretty\"\n",
        )
        .expect("write overlay");

        let config = AppConfig::load_from(dir.path().to_str().expect("utf8"), "staging")
            .expect("config");
        assert_eq!(config.plugins.directory, "./site-plugins");
        assert_eq!(config.plugins.hook_timeout_ms, 250);
        assert_eq!(config.logging.format, "pretty");
    }
}
