//! Plugin registry — stores loaded plugin instances and their records.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use sitekit_core::config::PluginSettings;
use sitekit_core::error::AppError;
use sitekit_core::result::AppResult;

use crate::loader::PluginManifest;
use crate::traits::{Plugin, capability_names};

/// Lifecycle state of a registered plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginState {
    /// Validated and registered, not yet initialized.
    Loaded,
    /// Initialized and enabled.
    Active,
    /// Initialized but switched off.
    Disabled,
    /// `initialize` failed; kept so the failure can be inspected.
    Failed,
}

impl std::fmt::Display for PluginState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Loaded => "loaded",
            Self::Active => "active",
            Self::Disabled => "disabled",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// A registered plugin.
#[derive(Debug, Clone)]
pub struct PluginRecord {
    /// Unique plugin name.
    pub name: String,
    /// The plugin instance.
    pub instance: Arc<dyn Plugin>,
    /// Directory the plugin was discovered in.
    pub path: PathBuf,
    /// Catalog factory the instance was built with.
    pub factory: String,
    /// Entry-point manifest the plugin was loaded from.
    pub manifest: PluginManifest,
    /// Effective settings.
    pub settings: PluginSettings,
    /// Lifecycle state.
    pub state: PluginState,
    /// Identifier of this particular load.
    pub load_id: Uuid,
    /// When this instance was loaded.
    pub loaded_at: DateTime<Utc>,
    /// Last lifecycle error, if any.
    pub last_error: Option<String>,
    /// Registration sequence, for load-order listing.
    seq: u64,
}

impl PluginRecord {
    /// Creates a record in the `Loaded` state.
    pub fn new(
        name: &str,
        instance: Arc<dyn Plugin>,
        path: PathBuf,
        manifest: PluginManifest,
        settings: PluginSettings,
    ) -> Self {
        Self {
            name: name.to_string(),
            instance,
            path,
            factory: manifest.factory_name(name).to_string(),
            manifest,
            settings,
            state: PluginState::Loaded,
            load_id: Uuid::new_v4(),
            loaded_at: Utc::now(),
            last_error: None,
            seq: 0,
        }
    }

    /// Builds the public metadata view of this record.
    ///
    /// Description and author fall back to the manifest when the plugin
    /// does not provide them.
    pub fn info(&self, hook_count: usize) -> PluginInfo {
        let description = self
            .instance
            .description()
            .or(self.manifest.description.as_deref());
        let author = self.instance.author().or(self.manifest.author.as_deref());

        PluginInfo {
            name: self.name.clone(),
            version: self.instance.version().to_string(),
            description: description.unwrap_or_default().to_string(),
            author: author.unwrap_or_default().to_string(),
            dependencies: self.instance.dependencies(),
            capabilities: capability_names(self.instance.as_ref()),
            path: self.path.display().to_string(),
            factory: self.factory.clone(),
            enabled: self.settings.enabled,
            state: self.state,
            hooks: hook_count,
            load_id: self.load_id,
            loaded_at: self.loaded_at,
            last_error: self.last_error.clone(),
        }
    }
}

/// Metadata about a loaded plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Plugin name.
    pub name: String,
    /// Plugin version string.
    pub version: String,
    /// Plugin description.
    pub description: String,
    /// Author or maintainer.
    pub author: String,
    /// Plugins this one depends on.
    pub dependencies: Vec<String>,
    /// Optional capabilities provided.
    pub capabilities: Vec<String>,
    /// Directory the plugin was loaded from.
    pub path: String,
    /// Catalog factory used.
    pub factory: String,
    /// Whether the plugin is enabled.
    pub enabled: bool,
    /// Lifecycle state.
    pub state: PluginState,
    /// Number of hook handlers the plugin registered.
    pub hooks: usize,
    /// Identifier of this load.
    pub load_id: Uuid,
    /// When it was loaded.
    pub loaded_at: DateTime<Utc>,
    /// Last lifecycle error.
    pub last_error: Option<String>,
}

/// Registry of all loaded plugins.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    /// Plugin name → record.
    plugins: RwLock<HashMap<String, PluginRecord>>,
    /// Next registration sequence number.
    next_seq: AtomicU64,
}

impl PluginRegistry {
    /// Creates a new empty plugin registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin. Fails if the name is taken.
    pub async fn register(&self, mut record: PluginRecord) -> AppResult<()> {
        let mut plugins = self.plugins.write().await;

        if plugins.contains_key(&record.name) {
            return Err(AppError::conflict(format!(
                "Plugin '{}' is already registered",
                record.name
            )));
        }

        record.seq = self.next_seq.fetch_add(1, Ordering::SeqCst);

        info!(
            plugin = %record.name,
            version = %record.instance.version(),
            path = %record.path.display(),
            "Registering plugin"
        );

        plugins.insert(record.name.clone(), record);
        Ok(())
    }

    /// Removes a plugin, returning its record.
    pub async fn unregister(&self, name: &str) -> Option<PluginRecord> {
        let removed = self.plugins.write().await.remove(name);
        if removed.is_some() {
            info!(plugin = %name, "Plugin unregistered");
        }
        removed
    }

    /// Gets a plugin instance by name.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        let plugins = self.plugins.read().await;
        plugins.get(name).map(|r| r.instance.clone())
    }

    /// Gets a copy of a plugin's record.
    pub async fn record(&self, name: &str) -> Option<PluginRecord> {
        let plugins = self.plugins.read().await;
        plugins.get(name).cloned()
    }

    /// All records in load order.
    pub async fn list(&self) -> Vec<PluginRecord> {
        let plugins = self.plugins.read().await;
        let mut records: Vec<PluginRecord> = plugins.values().cloned().collect();
        records.sort_by_key(|r| r.seq);
        records
    }

    /// Returns plugin count.
    pub async fn count(&self) -> usize {
        self.plugins.read().await.len()
    }

    /// Checks whether a plugin is registered.
    pub async fn contains(&self, name: &str) -> bool {
        self.plugins.read().await.contains_key(name)
    }

    /// Updates the state (and error) of a plugin. Returns false if absent.
    pub async fn set_state(&self, name: &str, state: PluginState, error: Option<String>) -> bool {
        let mut plugins = self.plugins.write().await;
        match plugins.get_mut(name) {
            Some(record) => {
                record.state = state;
                record.last_error = error;
                true
            }
            None => false,
        }
    }

    /// Sets the `enabled` flag, moving `Active`/`Disabled` accordingly.
    ///
    /// Returns the updated record, or `None` if the plugin is not registered.
    pub async fn set_enabled(&self, name: &str, enabled: bool) -> Option<PluginRecord> {
        let mut plugins = self.plugins.write().await;
        let record = plugins.get_mut(name)?;
        record.settings.enabled = enabled;
        record.state = match (record.state, enabled) {
            (PluginState::Active, false) => PluginState::Disabled,
            (PluginState::Disabled, true) => PluginState::Active,
            (state, _) => state,
        };
        Some(record.clone())
    }

    /// Removes every plugin, returning the records in load order.
    pub async fn clear(&self) -> Vec<PluginRecord> {
        let mut plugins = self.plugins.write().await;
        let mut records: Vec<PluginRecord> = plugins.drain().map(|(_, r)| r).collect();
        records.sort_by_key(|r| r.seq);
        records
    }
}
