//! Plugin context — what a plugin receives in `initialize`.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sitekit_core::config::PluginSettings;
use sitekit_core::result::AppResult;

use crate::hooks::definitions::{HookArgs, HookOutcome};
use crate::hooks::dispatcher::HookDispatcher;
use crate::hooks::registry::{ClosureHandler, EnabledCheck, HookHandler, HookRegistry};

/// Context passed to a plugin when it is initialized.
///
/// Hooks registered through the context are owned by the plugin and are
/// removed when it is unloaded or reloaded.
#[derive(Clone)]
pub struct PluginContext {
    /// Name of the plugin this context belongs to.
    plugin_name: String,
    /// Directory the plugin was discovered in.
    plugin_dir: PathBuf,
    /// Effective settings of the plugin.
    settings: PluginSettings,
    /// Shared hook registry.
    hooks: Arc<HookRegistry>,
    /// Shared hook dispatcher.
    dispatcher: Arc<HookDispatcher>,
    /// Gate applied to every hook registered through this context.
    enabled: Option<EnabledCheck>,
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("plugin_name", &self.plugin_name)
            .field("plugin_dir", &self.plugin_dir)
            .finish()
    }
}

impl PluginContext {
    /// Creates a context for `plugin_name`.
    pub fn new(
        plugin_name: &str,
        plugin_dir: &Path,
        settings: PluginSettings,
        dispatcher: Arc<HookDispatcher>,
    ) -> Self {
        Self {
            plugin_name: plugin_name.to_string(),
            plugin_dir: plugin_dir.to_path_buf(),
            settings,
            hooks: dispatcher.registry().clone(),
            dispatcher,
            enabled: None,
        }
    }

    /// Registered hooks run only while `check` reports the plugin enabled.
    pub fn with_enabled_check(mut self, check: EnabledCheck) -> Self {
        self.enabled = Some(check);
        self
    }

    /// Name of the plugin.
    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    /// Directory the plugin was loaded from.
    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    /// Effective settings of the plugin.
    pub fn settings(&self) -> &PluginSettings {
        &self.settings
    }

    /// Registers a handler owned by this plugin.
    pub async fn register_hook(
        &self,
        hook: impl AsRef<str>,
        handler: Arc<dyn HookHandler>,
        priority: i32,
    ) {
        match &self.enabled {
            Some(check) => {
                self.hooks
                    .register_gated(
                        hook.as_ref(),
                        handler,
                        priority,
                        &self.plugin_name,
                        check.clone(),
                    )
                    .await;
            }
            None => {
                self.hooks
                    .register(hook.as_ref(), handler, priority, Some(&self.plugin_name))
                    .await;
            }
        }
    }

    /// Registers a closure owned by this plugin.
    pub async fn register_fn<F, Fut>(&self, hook: impl AsRef<str>, priority: i32, callback: F)
    where
        F: Fn(HookArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<HookOutcome>> + Send + 'static,
    {
        let label = format!("{}:{}", self.plugin_name, hook.as_ref());
        let handler = Arc::new(ClosureHandler::new(&label, callback));
        self.register_hook(hook, handler, priority).await;
    }

    /// Runs a hook, e.g. to let other plugins react to this one.
    pub async fn execute_hook(&self, hook: impl AsRef<str>, args: HookArgs) -> HookArgs {
        self.dispatcher.execute(hook.as_ref(), args).await
    }
}
