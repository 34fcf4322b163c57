//! Plugin catalog — the compiled-in constructors a plugin entry point can name.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use sitekit_core::config::PluginSettings;
use sitekit_core::error::AppError;
use sitekit_core::result::AppResult;

use crate::hooks::dispatcher::panic_message;
use crate::traits::Plugin;

/// Constructor of a plugin. Receives the plugin's effective settings.
pub type PluginFactory = Arc<dyn Fn(PluginSettings) -> AppResult<Arc<dyn Plugin>> + Send + Sync>;

/// Factory name → constructor.
#[derive(Clone, Default)]
pub struct PluginCatalog {
    factories: HashMap<String, PluginFactory>,
}

impl std::fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginCatalog")
            .field("factories", &self.names())
            .finish()
    }
}

impl PluginCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn(PluginSettings) -> AppResult<Arc<dyn Plugin>> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
        self
    }

    /// Whether a constructor is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered factory names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Builds a plugin. A panicking constructor is reported as an error.
    pub fn construct(&self, name: &str, settings: PluginSettings) -> AppResult<Arc<dyn Plugin>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| AppError::not_found(format!("No plugin factory named '{name}'")))?;

        std::panic::catch_unwind(AssertUnwindSafe(|| factory(settings))).unwrap_or_else(|panic| {
            Err(AppError::plugin(format!(
                "Plugin factory '{name}' panicked: {}",
                panic_message(panic.as_ref())
            )))
        })
    }
}
