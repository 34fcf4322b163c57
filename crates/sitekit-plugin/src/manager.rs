//! Plugin manager — discovery, lifecycle and hook dispatch for all plugins.
//!
//! The manager is an explicit object shared through `Arc`; hosts construct
//! one at startup and hand it to whatever needs it. Every failure caused by
//! plugin-supplied code is logged and contained here.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::join_all;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, error, info, warn};

use sitekit_core::config::{PluginConfigFile, PluginSettings, PluginSystemConfig};
use sitekit_core::error::AppError;
use sitekit_core::result::AppResult;

use crate::api::context::PluginContext;
use crate::api::events::{PluginEvent, TimedEvent};
use crate::catalog::PluginCatalog;
use crate::hooks::definitions::{HookArgs, HookName, HookOutcome};
use crate::hooks::dispatcher::{DispatchReport, HookDispatcher, panic_message};
use crate::hooks::registry::{ClosureHandler, HookHandler, HookRegistry};
use crate::loader::{PluginLoader, PluginManifest};
use crate::monitor::PerformanceMonitor;
use crate::registry::{PluginInfo, PluginRecord, PluginRegistry, PluginState};
use crate::traits::{BuildContext, MiddlewareFlow, Plugin, RequestContext};
use crate::validation::{ValidationReport, inspect_plugin, validate_plugin};

const EVENT_CAPACITY: usize = 256;

/// Overrides for [`PluginManager::initialize`].
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Scan this directory instead of the configured one.
    pub directory: Option<PathBuf>,
    /// Read this plugin configuration file instead of the configured one.
    pub config_file: Option<PathBuf>,
}

/// Counts after [`PluginManager::initialize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InitSummary {
    /// Registered plugins.
    pub loaded: usize,
    /// Plugins whose `initialize` succeeded.
    pub active: usize,
    /// Plugins whose `initialize` failed.
    pub failed: usize,
}

/// Manages the full lifecycle of plugins.
#[derive(Debug)]
pub struct PluginManager {
    /// Runtime configuration.
    config: PluginSystemConfig,
    /// Known plugin constructors.
    catalog: PluginCatalog,
    /// Discovery and manifest cache.
    loader: PluginLoader,
    /// Plugin registry.
    plugin_registry: Arc<PluginRegistry>,
    /// Hook registry.
    hook_registry: Arc<HookRegistry>,
    /// Hook dispatcher.
    hook_dispatcher: Arc<HookDispatcher>,
    /// Timings of lifecycle phases.
    monitor: Arc<PerformanceMonitor>,
    /// Per-plugin configuration file contents.
    plugin_config: RwLock<PluginConfigFile>,
    /// Set once discovery has run.
    initialized: AtomicBool,
    /// Lifecycle event channel.
    events: broadcast::Sender<TimedEvent>,
}

impl PluginManager {
    /// Creates a new plugin manager.
    pub fn new(config: PluginSystemConfig, catalog: PluginCatalog) -> Self {
        let hook_registry = Arc::new(HookRegistry::new());
        let hook_dispatcher = Arc::new(HookDispatcher::new(
            hook_registry.clone(),
            Duration::from_millis(config.hook_timeout_ms),
        ));
        let monitor = Arc::new(PerformanceMonitor::with_dispatcher(hook_dispatcher.clone()));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            loader: PluginLoader::new(&config.entry_point),
            config,
            catalog,
            plugin_registry: Arc::new(PluginRegistry::new()),
            hook_registry,
            hook_dispatcher,
            monitor,
            plugin_config: RwLock::new(PluginConfigFile::default()),
            initialized: AtomicBool::new(false),
            events,
        }
    }

    // ── Lifecycle ──

    /// Discovers, loads and initializes plugins. A second call is a no-op.
    pub async fn initialize(&self, options: InitOptions) -> InitSummary {
        if self.initialized.swap(true, Ordering::SeqCst) {
            debug!("Plugin manager already initialized");
            return self.summary().await;
        }

        self.load_plugin_config(options.config_file).await;

        let directory = options
            .directory
            .unwrap_or_else(|| PathBuf::from(&self.config.directory));
        info!(directory = %directory.display(), "Initializing plugin system");

        match self.loader.discover(&directory).await {
            Ok(candidates) => {
                for candidate in candidates {
                    self.load_plugin(&candidate.name, &candidate.path).await;
                }
            }
            Err(e) => {
                error!(directory = %directory.display(), error = %e, "Plugin discovery failed");
            }
        }

        self.monitor.start_timing("plugins:initialize").await;
        self.initialize_plugins().await;
        if let Ok(elapsed) = self.monitor.end_timing("plugins:initialize").await {
            debug!(elapsed_ms = elapsed.as_millis() as u64, "Plugin initialization finished");
        }

        let summary = self.summary().await;
        info!(
            loaded = summary.loaded,
            active = summary.active,
            failed = summary.failed,
            "Plugin system initialized"
        );
        summary
    }

    /// Whether [`initialize`](Self::initialize) has run.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Loads one plugin from `path` and registers it under `name`.
    ///
    /// Returns false when the plugin is disabled by configuration or cannot
    /// be loaded; neither is fatal.
    pub async fn load_plugin(&self, name: &str, path: &Path) -> bool {
        if self.plugin_config.read().await.is_disabled(name) {
            info!(plugin = %name, "Plugin disabled in configuration, skipping");
            self.emit(PluginEvent::Rejected {
                plugin: name.to_string(),
                reason: "disabled in configuration".to_string(),
            });
            return false;
        }

        let outcome = match self.build_record(name, path).await {
            Ok(record) => self.plugin_registry.register(record).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                self.emit(PluginEvent::Loaded {
                    plugin: name.to_string(),
                });
                true
            }
            Err(e) => {
                warn!(plugin = %name, path = %path.display(), error = %e, "Failed to load plugin");
                self.emit(PluginEvent::Rejected {
                    plugin: name.to_string(),
                    reason: e.to_string(),
                });
                false
            }
        }
    }

    /// Returns true when `instance` implements the required capability set.
    pub fn validate_plugin(&self, instance: &dyn Plugin) -> bool {
        validate_plugin(instance)
    }

    /// Builds the plugin in `<directory>/<name>` without registering it and
    /// reports the validation checks.
    pub async fn validate_candidate(&self, name: &str) -> AppResult<ValidationReport> {
        if !self.is_initialized() {
            self.load_plugin_config(None).await;
        }
        let path = PathBuf::from(&self.config.directory).join(name);
        let (instance, _, _) = self.construct(name, &path).await?;
        Ok(inspect_plugin(instance.as_ref()))
    }

    /// Initializes every plugin in the `Loaded` state concurrently.
    async fn initialize_plugins(&self) {
        let pending: Vec<PluginRecord> = self
            .plugin_registry
            .list()
            .await
            .into_iter()
            .filter(|r| r.state == PluginState::Loaded)
            .collect();

        join_all(pending.iter().map(|record| self.initialize_one(record))).await;
    }

    /// Runs `initialize` on one plugin. Returns whether it succeeded.
    async fn initialize_one(&self, record: &PluginRecord) -> bool {
        let instance = Arc::downgrade(&record.instance);
        let ctx = PluginContext::new(
            &record.name,
            &record.path,
            record.settings.clone(),
            self.hook_dispatcher.clone(),
        )
        .with_enabled_check(Arc::new(move || {
            instance.upgrade().is_some_and(|plugin| plugin.is_enabled())
        }));

        let result = self
            .guarded(&record.name, "initialize", record.instance.initialize(ctx))
            .await;

        match result {
            Ok(()) => {
                let state = if record.settings.enabled {
                    PluginState::Active
                } else {
                    PluginState::Disabled
                };
                self.plugin_registry.set_state(&record.name, state, None).await;
                info!(plugin = %record.name, version = %record.instance.version(), "Plugin initialized");
                self.emit(PluginEvent::Initialized {
                    plugin: record.name.clone(),
                });
                true
            }
            Err(e) => {
                error!(plugin = %record.name, error = %e, "Plugin initialization failed");
                self.hook_registry.unregister_owner(&record.name).await;
                self.plugin_registry
                    .set_state(&record.name, PluginState::Failed, Some(e.to_string()))
                    .await;
                self.emit(PluginEvent::InitializationFailed {
                    plugin: record.name.clone(),
                    error: e.to_string(),
                });
                false
            }
        }
    }

    /// Cleans up and removes a plugin. Returns false if it is not registered.
    pub async fn unload_plugin(&self, name: &str) -> bool {
        let Some(record) = self.plugin_registry.record(name).await else {
            warn!(plugin = %name, "Cannot unload unknown plugin");
            return false;
        };

        self.cleanup_one(&record).await;
        self.hook_registry.unregister_owner(name).await;
        self.plugin_registry.unregister(name).await;

        info!(plugin = %name, "Plugin unloaded");
        self.emit(PluginEvent::Unloaded {
            plugin: name.to_string(),
        });
        true
    }

    /// Unloads a plugin and loads it again from the same directory.
    pub async fn reload_plugin(&self, name: &str) -> bool {
        let Some(record) = self.plugin_registry.record(name).await else {
            warn!(plugin = %name, "Cannot reload unknown plugin");
            return false;
        };
        let path = record.path.clone();

        if !self.unload_plugin(name).await {
            return false;
        }
        self.loader.invalidate(&path).await;

        if !self.load_plugin(name, &path).await {
            error!(plugin = %name, "Plugin reload failed while loading");
            return false;
        }

        let Some(fresh) = self.plugin_registry.record(name).await else {
            return false;
        };
        if !self.initialize_one(&fresh).await {
            error!(plugin = %name, "Plugin reload failed while initializing");
            return false;
        }

        info!(plugin = %name, "Plugin reloaded");
        self.emit(PluginEvent::Reloaded {
            plugin: name.to_string(),
        });
        true
    }

    /// Cleans up every plugin concurrently and resets the manager.
    pub async fn cleanup(&self) {
        let records = self.plugin_registry.list().await;
        join_all(records.iter().map(|record| self.cleanup_one(record))).await;

        self.hook_registry.clear().await;
        self.plugin_registry.clear().await;
        self.loader.clear_cache().await;
        self.initialized.store(false, Ordering::SeqCst);

        info!(count = records.len(), "All plugins cleaned up");
        self.emit(PluginEvent::CleanedUp {
            count: records.len(),
        });
    }

    /// Enables a plugin. Returns false if it is not registered.
    pub async fn enable_plugin(&self, name: &str) -> bool {
        self.toggle(name, true).await
    }

    /// Disables a plugin. Returns false if it is not registered.
    pub async fn disable_plugin(&self, name: &str) -> bool {
        self.toggle(name, false).await
    }

    async fn toggle(&self, name: &str, enabled: bool) -> bool {
        let Some(record) = self.plugin_registry.set_enabled(name, enabled).await else {
            warn!(plugin = %name, "Cannot toggle unknown plugin");
            return false;
        };
        record.instance.set_enabled(enabled);

        let event = if enabled {
            PluginEvent::Enabled {
                plugin: name.to_string(),
            }
        } else {
            PluginEvent::Disabled {
                plugin: name.to_string(),
            }
        };
        self.emit(event);
        true
    }

    // ── Hooks ──

    /// Registers a host-owned hook callback.
    pub async fn register_hook<F, Fut>(&self, hook: impl AsRef<str>, callback: F, priority: i32)
    where
        F: Fn(HookArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<HookOutcome>> + Send + 'static,
    {
        let hook = hook.as_ref();
        let handler = Arc::new(ClosureHandler::new(&format!("host:{hook}"), callback));
        self.hook_registry.register(hook, handler, priority, None).await;
    }

    /// Registers a host-owned hook handler.
    pub async fn register_handler(
        &self,
        hook: impl AsRef<str>,
        handler: Arc<dyn HookHandler>,
        priority: i32,
    ) {
        self.hook_registry
            .register(hook.as_ref(), handler, priority, None)
            .await;
    }

    /// Threads `args` through every callback of `hook`.
    pub async fn execute_hook(&self, hook: impl AsRef<str>, args: HookArgs) -> HookArgs {
        self.hook_dispatcher.execute(hook.as_ref(), args).await
    }

    /// Like [`execute_hook`](Self::execute_hook) but reports failures too.
    pub async fn dispatch_hook(&self, hook: impl AsRef<str>, args: HookArgs) -> DispatchReport {
        self.hook_dispatcher.dispatch(hook.as_ref(), args).await
    }

    // ── Capabilities ──

    /// Runs a command provided by a plugin.
    pub async fn run_command(&self, name: &str, command: &str, args: &[String]) -> AppResult<Value> {
        let record = self
            .plugin_registry
            .record(name)
            .await
            .ok_or_else(|| AppError::not_found(format!("Plugin '{name}' not found")))?;

        if record.state != PluginState::Active || !record.instance.is_enabled() {
            return Err(AppError::plugin(format!(
                "Plugin '{name}' is not active ({})",
                record.state
            )));
        }

        let handler = record.instance.as_command_handler().ok_or_else(|| {
            AppError::not_supported(format!("Plugin '{name}' does not provide commands"))
        })?;

        if !handler.commands().iter().any(|c| c == command) {
            return Err(AppError::not_found(format!(
                "Plugin '{name}' has no command '{command}'"
            )));
        }

        let hook_args = vec![json!(name), json!(command), json!(args)];
        self.execute_hook(HookName::CliBeforeCommand, hook_args.clone())
            .await;

        let result = self
            .guarded(name, "execute_command", handler.execute_command(command, args))
            .await;

        let mut after = hook_args;
        after.push(json!(result.is_ok()));
        self.execute_hook(HookName::CliAfterCommand, after).await;

        result
    }

    /// Runs a build task on every active plugin that provides build tasks.
    ///
    /// Plugins run one after another in load order. Returns how many
    /// succeeded; failures are logged.
    pub async fn run_build_task(&self, task: &str, ctx: &mut BuildContext) -> usize {
        let mut succeeded = 0;
        for record in self.active_records().await {
            let Some(handler) = record.instance.as_build_task_handler() else {
                continue;
            };
            match self
                .guarded(&record.name, "execute_build_task", handler.execute_build_task(task, ctx))
                .await
            {
                Ok(()) => succeeded += 1,
                Err(e) => warn!(plugin = %record.name, task = %task, error = %e, "Build task failed"),
            }
        }
        succeeded
    }

    /// Runs every active plugin's middleware in load order.
    ///
    /// Stops at the first middleware that responds; a panicking or timed
    /// out middleware is skipped.
    pub async fn run_middleware(&self, request: &mut RequestContext) -> MiddlewareFlow {
        for record in self.active_records().await {
            let Some(middleware) = record.instance.as_middleware() else {
                continue;
            };
            let flow = self
                .guarded(&record.name, "middleware", async {
                    Ok(middleware.handle(request).await)
                })
                .await;
            match flow {
                Ok(MiddlewareFlow::Next) => {}
                Ok(flow @ MiddlewareFlow::Respond { .. }) => return flow,
                Err(e) => warn!(plugin = %record.name, error = %e, "Middleware failed, skipping"),
            }
        }
        MiddlewareFlow::Next
    }

    // ── Lookups ──

    /// Gets a plugin instance by name.
    pub async fn get_plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugin_registry.get(name).await
    }

    /// All plugin instances in load order.
    pub async fn get_all_plugins(&self) -> Vec<Arc<dyn Plugin>> {
        self.plugin_registry
            .list()
            .await
            .into_iter()
            .map(|r| r.instance)
            .collect()
    }

    /// Metadata of one plugin.
    pub async fn get_plugin_info(&self, name: &str) -> Option<PluginInfo> {
        let record = self.plugin_registry.record(name).await?;
        let hooks = self.hook_registry.owned_count(name).await;
        Some(record.info(hooks))
    }

    /// Metadata of every plugin in load order.
    pub async fn get_all_plugin_info(&self) -> Vec<PluginInfo> {
        let mut infos = Vec::new();
        for record in self.plugin_registry.list().await {
            let hooks = self.hook_registry.owned_count(&record.name).await;
            infos.push(record.info(hooks));
        }
        infos
    }

    /// Subscribes to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<TimedEvent> {
        self.events.subscribe()
    }

    /// Returns the hook dispatcher.
    pub fn dispatcher(&self) -> &Arc<HookDispatcher> {
        &self.hook_dispatcher
    }

    /// Returns the hook registry.
    pub fn hook_registry(&self) -> &Arc<HookRegistry> {
        &self.hook_registry
    }

    /// Returns the plugin registry.
    pub fn plugin_registry(&self) -> &Arc<PluginRegistry> {
        &self.plugin_registry
    }

    /// Returns the performance monitor.
    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }

    /// Returns the runtime configuration.
    pub fn config(&self) -> &PluginSystemConfig {
        &self.config
    }

    // ── Internals ──

    /// Reads the plugin configuration file; an unreadable file counts as empty.
    async fn load_plugin_config(&self, path: Option<PathBuf>) {
        let path = path.unwrap_or_else(|| PathBuf::from(&self.config.config_file));
        let file = match PluginConfigFile::load(&path) {
            Ok(file) => file,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Plugin configuration unreadable, using empty configuration"
                );
                PluginConfigFile::default()
            }
        };
        *self.plugin_config.write().await = file;
    }

    async fn summary(&self) -> InitSummary {
        let records = self.plugin_registry.list().await;
        InitSummary {
            loaded: records.len(),
            active: records
                .iter()
                .filter(|r| matches!(r.state, PluginState::Active | PluginState::Disabled))
                .count(),
            failed: records
                .iter()
                .filter(|r| r.state == PluginState::Failed)
                .count(),
        }
    }

    async fn active_records(&self) -> Vec<PluginRecord> {
        self.plugin_registry
            .list()
            .await
            .into_iter()
            .filter(|r| r.state == PluginState::Active && r.instance.is_enabled())
            .collect()
    }

    /// Reads the manifest, merges settings and constructs the instance.
    async fn construct(
        &self,
        name: &str,
        path: &Path,
    ) -> AppResult<(Arc<dyn Plugin>, PluginManifest, PluginSettings)> {
        let manifest = self.loader.read_manifest(path).await?;
        let overrides = self.plugin_config.read().await.settings_for(name);
        let settings = PluginSettings::merged(&manifest.defaults, &overrides);

        let instance = self
            .catalog
            .construct(manifest.factory_name(name), settings.clone())?;
        Ok((instance, manifest, settings))
    }

    async fn build_record(&self, name: &str, path: &Path) -> AppResult<PluginRecord> {
        let (instance, manifest, settings) = self.construct(name, path).await?;

        let report = inspect_plugin(instance.as_ref());
        if !report.is_valid() {
            return Err(AppError::validation(format!(
                "Plugin '{name}' failed validation: {}",
                report.failures().join(", ")
            )));
        }

        if let Some(advertised) = manifest.version.as_deref() {
            if advertised != instance.version() {
                warn!(
                    plugin = %name,
                    manifest_version = %advertised,
                    version = %instance.version(),
                    "Manifest version differs from the plugin's own"
                );
            }
        }

        Ok(PluginRecord::new(
            name,
            instance,
            path.to_path_buf(),
            manifest,
            settings,
        ))
    }

    async fn cleanup_one(&self, record: &PluginRecord) {
        if let Err(e) = self
            .guarded(&record.name, "cleanup", record.instance.cleanup())
            .await
        {
            warn!(plugin = %record.name, error = %e, "Plugin cleanup failed");
        }
    }

    /// Awaits plugin code with panic containment and the lifecycle timeout.
    async fn guarded<T, F>(&self, plugin: &str, operation: &str, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        let budget = Duration::from_millis(self.config.lifecycle_timeout_ms);
        match tokio::time::timeout(budget, AssertUnwindSafe(fut).catch_unwind()).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(AppError::plugin(format!(
                "Plugin '{plugin}' panicked in {operation}: {}",
                panic_message(panic.as_ref())
            ))),
            Err(_) => Err(AppError::timeout(format!(
                "Plugin '{plugin}' {operation} exceeded {}ms",
                budget.as_millis()
            ))),
        }
    }

    fn emit(&self, event: PluginEvent) {
        // No subscribers is fine.
        let _ = self.events.send(TimedEvent::now(event));
    }
}
