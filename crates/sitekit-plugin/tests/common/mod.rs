//! Shared fixtures: probe plugins and plugin directory helpers.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use sitekit_core::config::{PluginSettings, PluginSystemConfig};
use sitekit_core::error::AppError;
use sitekit_core::result::AppResult;
use sitekit_plugin::base::BasePlugin;
use sitekit_plugin::hooks::definitions::{HookArgs, HookOutcome};
use sitekit_plugin::traits::{
    BuildContext, BuildTaskHandler, CommandHandler, Middleware, MiddlewareFlow, RequestContext,
};
use sitekit_plugin::{
    Plugin, PluginCatalog, PluginContext, PluginEvent, PluginManager, TimedEvent,
};
use tokio::sync::broadcast;

/// Counts how often plugin code ran.
#[derive(Debug, Default)]
pub struct Probe {
    pub constructed: AtomicUsize,
    pub initialized: AtomicUsize,
    pub cleaned_up: AtomicUsize,
}

impl Probe {
    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    pub fn initialized(&self) -> usize {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn cleaned_up(&self) -> usize {
        self.cleaned_up.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Good,
    PanicOnInit,
    ErrorOnInit,
    FailingCleanup,
}

#[derive(Debug)]
pub struct ProbePlugin {
    base: BasePlugin,
    probe: Arc<Probe>,
    behavior: Behavior,
}

impl ProbePlugin {
    pub fn new(
        name: &str,
        version: &str,
        settings: &PluginSettings,
        probe: Arc<Probe>,
        behavior: Behavior,
    ) -> Self {
        probe.constructed.fetch_add(1, Ordering::SeqCst);
        Self {
            base: BasePlugin::new(name, version, &Map::new(), settings)
                .with_description("probe plugin")
                .with_author("tests"),
            probe,
            behavior,
        }
    }
}

#[async_trait]
impl Plugin for ProbePlugin {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn version(&self) -> &str {
        self.base.version()
    }

    async fn initialize(&self, ctx: PluginContext) -> AppResult<()> {
        self.probe.initialized.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::PanicOnInit => panic!("initialize exploded"),
            Behavior::ErrorOnInit => return Err(AppError::plugin("initialize refused")),
            Behavior::Good | Behavior::FailingCleanup => {}
        }

        let tag = self.base.name().to_string();
        ctx.register_fn("test:collect", 10, move |mut args: HookArgs| {
            let tag = tag.clone();
            async move {
                args.push(json!(tag));
                Ok(HookOutcome::Replace(args))
            }
        })
        .await;
        Ok(())
    }

    fn description(&self) -> Option<&str> {
        self.base.description()
    }

    fn author(&self) -> Option<&str> {
        self.base.author()
    }

    async fn cleanup(&self) -> AppResult<()> {
        self.probe.cleaned_up.fetch_add(1, Ordering::SeqCst);
        if self.behavior == Behavior::FailingCleanup {
            return Err(AppError::plugin("cleanup refused"));
        }
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.base.is_enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        self.base.set_enabled(enabled);
    }

    fn as_middleware(&self) -> Option<&dyn Middleware> {
        Some(self)
    }

    fn as_command_handler(&self) -> Option<&dyn CommandHandler> {
        Some(self)
    }

    fn as_build_task_handler(&self) -> Option<&dyn BuildTaskHandler> {
        Some(self)
    }
}

#[async_trait]
impl Middleware for ProbePlugin {
    async fn handle(&self, request: &mut RequestContext) -> MiddlewareFlow {
        let seen = request
            .locals
            .entry("seen")
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(list) = seen {
            list.push(json!(self.base.name()));
        }
        if request.path == format!("/blocked-by/{}", self.base.name()) {
            return MiddlewareFlow::Respond {
                status: 403,
                body: "blocked".to_string(),
            };
        }
        MiddlewareFlow::Next
    }
}

#[async_trait]
impl CommandHandler for ProbePlugin {
    fn commands(&self) -> Vec<String> {
        vec!["echo".to_string()]
    }

    async fn execute_command(&self, _command: &str, args: &[String]) -> AppResult<Value> {
        Ok(json!({ "plugin": self.base.name(), "args": args }))
    }
}

#[async_trait]
impl BuildTaskHandler for ProbePlugin {
    async fn execute_build_task(&self, task: &str, ctx: &mut BuildContext) -> AppResult<()> {
        ctx.artifacts.push(format!("{}/{}", self.base.name(), task));
        Ok(())
    }
}

/// Catalog with `good`, `good-2`, `panics-on-init`, `errors-on-init`,
/// `failing-cleanup`, `bad-version`, `ctor-error` and `ctor-panic`.
pub fn catalog(probe: &Arc<Probe>) -> PluginCatalog {
    let mut catalog = PluginCatalog::new();

    let add = |catalog: &mut PluginCatalog,
               factory: &str,
               name: &'static str,
               version: &'static str,
               behavior: Behavior| {
        let probe = probe.clone();
        catalog.register(factory, move |settings| {
            let plugin: Arc<dyn Plugin> = Arc::new(ProbePlugin::new(
                name,
                version,
                &settings,
                probe.clone(),
                behavior,
            ));
            Ok(plugin)
        });
    };

    add(&mut catalog, "good", "good", "1.2.0", Behavior::Good);
    add(&mut catalog, "good-2", "good-2", "0.3.1", Behavior::Good);
    add(&mut catalog, "panics-on-init", "panics-on-init", "1.0.0", Behavior::PanicOnInit);
    add(&mut catalog, "errors-on-init", "errors-on-init", "1.0.0", Behavior::ErrorOnInit);
    add(&mut catalog, "failing-cleanup", "failing-cleanup", "1.0.0", Behavior::FailingCleanup);
    add(&mut catalog, "bad-version", "bad-version", "", Behavior::Good);

    catalog.register("ctor-error", |_settings| {
        Err(AppError::plugin("constructor refused"))
    });
    catalog.register("ctor-panic", |_settings| -> AppResult<Arc<dyn Plugin>> {
        panic!("constructor exploded")
    });

    catalog
}

/// Creates `<root>/plugins/<name>/plugin.toml` pointing at `factory`.
pub fn add_plugin_dir(root: &Path, name: &str, factory: &str) {
    let dir = root.join("plugins").join(name);
    std::fs::create_dir_all(&dir).expect("create plugin dir");
    std::fs::write(dir.join("plugin.toml"), format!("factory = \"{factory}\"\n"))
        .expect("write entry point");
}

/// Writes `<root>/plugins.toml`.
pub fn write_plugin_config(root: &Path, raw: &str) {
    std::fs::write(root.join("plugins.toml"), raw).expect("write plugin config");
}

/// Drains every event published so far.
pub fn drain(rx: &mut broadcast::Receiver<TimedEvent>) -> Vec<PluginEvent> {
    let mut events = Vec::new();
    while let Ok(timed) = rx.try_recv() {
        events.push(timed.event);
    }
    events
}

/// A manager over `root` with short timeouts and no plugin config file.
pub fn manager(root: &Path, probe: &Arc<Probe>) -> PluginManager {
    let config = PluginSystemConfig {
        directory: root.join("plugins").display().to_string(),
        config_file: root.join("plugins.toml").display().to_string(),
        hook_timeout_ms: 500,
        lifecycle_timeout_ms: 500,
        ..PluginSystemConfig::default()
    };
    PluginManager::new(config, catalog(probe))
}
