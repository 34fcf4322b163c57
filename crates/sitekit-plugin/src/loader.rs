//! Plugin discovery and entry-point manifests.
//!
//! A plugin is an immediate subdirectory of the plugin directory that holds
//! an entry-point manifest (`plugin.toml` by default). Only that one
//! directory is scanned.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use sitekit_core::error::AppError;
use sitekit_core::result::AppResult;

/// Parsed entry-point manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Catalog factory to construct; defaults to the directory name.
    #[serde(default)]
    pub factory: Option<String>,
    /// Version advertised by the manifest.
    #[serde(default)]
    pub version: Option<String>,
    /// Description advertised by the manifest.
    #[serde(default)]
    pub description: Option<String>,
    /// Author advertised by the manifest.
    #[serde(default)]
    pub author: Option<String>,
    /// Option defaults, overridden by the plugin configuration file.
    #[serde(default)]
    pub defaults: Map<String, Value>,
}

impl PluginManifest {
    /// The factory name to construct for a plugin directory named `dir_name`.
    pub fn factory_name<'a>(&'a self, dir_name: &'a str) -> &'a str {
        self.factory.as_deref().unwrap_or(dir_name)
    }

    /// A starter manifest for a new plugin.
    pub fn template(factory: &str, description: &str, author: &str) -> Self {
        Self {
            factory: Some(factory.to_string()),
            version: Some("0.1.0".to_string()),
            description: Some(description.to_string()),
            author: Some(author.to_string()),
            defaults: Map::new(),
        }
    }
}

/// A directory that looks like a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPlugin {
    /// Directory name, used as the plugin name.
    pub name: String,
    /// Plugin directory.
    pub path: PathBuf,
}

/// Finds plugin directories and reads their manifests.
#[derive(Debug)]
pub struct PluginLoader {
    /// Entry-point file name.
    entry_point: String,
    /// Plugin directory → parsed manifest.
    cache: RwLock<HashMap<PathBuf, PluginManifest>>,
}

impl PluginLoader {
    /// Creates a loader looking for `entry_point` files.
    pub fn new(entry_point: &str) -> Self {
        Self {
            entry_point: entry_point.to_string(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Path of the entry point inside a plugin directory.
    pub fn entry_point_path(&self, plugin_dir: &Path) -> PathBuf {
        plugin_dir.join(&self.entry_point)
    }

    /// Lists immediate subdirectories of `dir` that contain an entry point.
    ///
    /// A missing directory yields no plugins. Subdirectories without an
    /// entry point are skipped.
    pub async fn discover(&self, dir: &Path) -> AppResult<Vec<DiscoveredPlugin>> {
        if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
            info!(directory = %dir.display(), "Plugin directory does not exist, nothing to load");
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_dir() {
                continue;
            }

            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string)
            else {
                warn!(path = %path.display(), "Skipping plugin directory with non UTF-8 name");
                continue;
            };

            if !tokio::fs::try_exists(self.entry_point_path(&path))
                .await
                .unwrap_or(false)
            {
                debug!(plugin = %name, "No entry point, skipping directory");
                continue;
            }

            found.push(DiscoveredPlugin { name, path });
        }

        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    /// Reads the manifest of a plugin directory, using the cache.
    pub async fn read_manifest(&self, plugin_dir: &Path) -> AppResult<PluginManifest> {
        if let Some(manifest) = self.cache.read().await.get(plugin_dir) {
            return Ok(manifest.clone());
        }

        let entry = self.entry_point_path(plugin_dir);
        let raw = tokio::fs::read_to_string(&entry).await.map_err(|e| {
            AppError::with_source(
                sitekit_core::ErrorKind::NotFound,
                format!("Cannot read entry point '{}'", entry.display()),
                e,
            )
        })?;
        let manifest: PluginManifest = toml::from_str(&raw)?;

        self.cache
            .write()
            .await
            .insert(plugin_dir.to_path_buf(), manifest.clone());
        Ok(manifest)
    }

    /// Forgets the cached manifest of a plugin directory.
    pub async fn invalidate(&self, plugin_dir: &Path) {
        if self.cache.write().await.remove(plugin_dir).is_some() {
            debug!(path = %plugin_dir.display(), "Manifest cache invalidated");
        }
    }

    /// Forgets every cached manifest.
    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }

    /// Creates `<dir>/<name>/` with a manifest. Fails if it already exists.
    pub async fn scaffold(
        &self,
        dir: &Path,
        name: &str,
        manifest: &PluginManifest,
    ) -> AppResult<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(AppError::validation(format!("Invalid plugin name '{name}'")));
        }

        let plugin_dir = dir.join(name);
        if tokio::fs::try_exists(&plugin_dir).await.unwrap_or(false) {
            return Err(AppError::conflict(format!(
                "Plugin directory '{}' already exists",
                plugin_dir.display()
            )));
        }

        tokio::fs::create_dir_all(&plugin_dir).await?;
        let raw = toml::to_string_pretty(manifest)?;
        tokio::fs::write(self.entry_point_path(&plugin_dir), raw).await?;

        info!(plugin = %name, path = %plugin_dir.display(), "Plugin scaffolded");
        Ok(plugin_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_discover_skips_dirs_without_entry_point() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("with-entry")).expect("mkdir");
        std::fs::write(dir.path().join("with-entry/plugin.toml"), "").expect("write");
        std::fs::create_dir(dir.path().join("no-entry")).expect("mkdir");
        std::fs::write(dir.path().join("stray-file.toml"), "").expect("write");

        let loader = PluginLoader::new("plugin.toml");
        let found = loader.discover(dir.path()).await.expect("discover");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "with-entry");
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loader = PluginLoader::new("plugin.toml");
        let found = loader
            .discover(&dir.path().join("absent"))
            .await
            .expect("discover");
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_manifest_cache_and_invalidate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let plugin_dir = dir.path().join("stamp");
        std::fs::create_dir(&plugin_dir).expect("mkdir");
        std::fs::write(plugin_dir.join("plugin.toml"), "factory = \"one\"\n").expect("write");

        let loader = PluginLoader::new("plugin.toml");
        let first = loader.read_manifest(&plugin_dir).await.expect("manifest");
        assert_eq!(first.factory_name("stamp"), "one");

        std::fs::write(plugin_dir.join("plugin.toml"), "factory = \"two\"\n").expect("write");
        let cached = loader.read_manifest(&plugin_dir).await.expect("manifest");
        assert_eq!(cached.factory_name("stamp"), "one");

        loader.invalidate(&plugin_dir).await;
        let fresh = loader.read_manifest(&plugin_dir).await.expect("manifest");
        assert_eq!(fresh.factory_name("stamp"), "two");
    }

    #[tokio::test]
    async fn test_scaffold_writes_manifest_and_refuses_overwrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loader = PluginLoader::new("plugin.toml");
        let manifest = PluginManifest::template("asset-stamp", "Stamps assets", "me");

        let created = loader
            .scaffold(dir.path(), "my-plugin", &manifest)
            .await
            .expect("scaffold");
        let read = loader.read_manifest(&created).await.expect("manifest");
        assert_eq!(read, manifest);

        let again = loader.scaffold(dir.path(), "my-plugin", &manifest).await;
        assert!(again.is_err());
        assert!(loader.scaffold(dir.path(), "../escape", &manifest).await.is_err());
    }
}
