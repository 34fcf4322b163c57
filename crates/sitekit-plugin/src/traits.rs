//! The plugin contract and its optional capabilities.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use sitekit_core::result::AppResult;

use crate::api::context::PluginContext;

/// Trait that all plugins must implement.
///
/// `name`, `version` and `initialize` are required. Everything else has a
/// default; optional capabilities are exposed through the `as_*` accessors
/// and are absent unless a plugin overrides them.
#[async_trait]
pub trait Plugin: Send + Sync + std::fmt::Debug {
    /// Plugin name.
    fn name(&self) -> &str;

    /// Plugin version string.
    fn version(&self) -> &str;

    /// Called once after loading. Plugins register their hooks here.
    async fn initialize(&self, ctx: PluginContext) -> AppResult<()>;

    /// Short description.
    fn description(&self) -> Option<&str> {
        None
    }

    /// Author or maintainer.
    fn author(&self) -> Option<&str> {
        None
    }

    /// Names of plugins this plugin expects to be present.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Called when the plugin is unloaded, reloaded, or the runtime shuts down.
    async fn cleanup(&self) -> AppResult<()> {
        Ok(())
    }

    /// Applies runtime option overrides.
    fn configure(&self, _options: &Map<String, Value>) -> AppResult<()> {
        Ok(())
    }

    /// Plugin-specific self check run during validation.
    fn validate(&self) -> bool {
        true
    }

    /// Whether the plugin's behavior is currently enabled.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Toggles the plugin's behavior.
    fn set_enabled(&self, _enabled: bool) {}

    /// HTTP middleware capability.
    fn as_middleware(&self) -> Option<&dyn Middleware> {
        None
    }

    /// CLI command capability.
    fn as_command_handler(&self) -> Option<&dyn CommandHandler> {
        None
    }

    /// Build pipeline capability.
    fn as_build_task_handler(&self) -> Option<&dyn BuildTaskHandler> {
        None
    }
}

/// Names of the optional capabilities a plugin provides.
pub fn capability_names(plugin: &dyn Plugin) -> Vec<String> {
    let mut names = Vec::new();
    if plugin.as_middleware().is_some() {
        names.push("middleware".to_string());
    }
    if plugin.as_command_handler().is_some() {
        names.push("commands".to_string());
    }
    if plugin.as_build_task_handler().is_some() {
        names.push("build-tasks".to_string());
    }
    names
}

/// Framework-neutral view of an incoming HTTP request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Request headers (lower-cased names).
    pub headers: BTreeMap<String, String>,
    /// Response headers set by middleware.
    pub response_headers: BTreeMap<String, String>,
    /// Values shared between middleware and the route handler.
    pub locals: Map<String, Value>,
}

impl RequestContext {
    /// Creates a request context for `method` and `path`.
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            ..Self::default()
        }
    }

    /// Adds a request header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }
}

/// What the middleware chain should do after a middleware ran.
///
/// Every exit path of a middleware yields one of these, so the continuation
/// can never be forgotten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MiddlewareFlow {
    /// Continue with the next middleware.
    Next,
    /// Stop the chain and answer directly.
    Respond {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
}

/// HTTP middleware capability.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Processes a request.
    async fn handle(&self, request: &mut RequestContext) -> MiddlewareFlow;
}

/// CLI command capability.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Names of supported commands.
    fn commands(&self) -> Vec<String>;

    /// Executes a command.
    async fn execute_command(&self, command: &str, args: &[String]) -> AppResult<Value>;
}

/// Shared state of a build run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildContext {
    /// Output directory of the build.
    pub output_dir: PathBuf,
    /// Files produced so far.
    pub artifacts: Vec<String>,
    /// Free-form metadata tasks may read and write.
    pub metadata: Map<String, Value>,
}

impl BuildContext {
    /// Creates a build context writing into `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }
}

/// Build pipeline capability.
#[async_trait]
pub trait BuildTaskHandler: Send + Sync {
    /// Executes a build task.
    async fn execute_build_task(&self, task: &str, ctx: &mut BuildContext) -> AppResult<()>;
}
