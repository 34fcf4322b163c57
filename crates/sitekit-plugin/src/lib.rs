//! # sitekit-plugin
//!
//! Plugin runtime for SiteKit. Provides:
//!
//! - Plugin discovery from a single plugin directory (`plugin.toml` entry points)
//! - Plugin lifecycle management (load, validate, initialize, enable/disable,
//!   unload, reload, cleanup)
//! - Hook registry with priority-ordered, stable registration
//! - Hook dispatcher threading an argument tuple through every handler, with
//!   per-handler fault isolation and timeouts
//! - Reusable base plugin scaffolding and optional plugin capabilities

pub mod api;
pub mod base;
pub mod catalog;
pub mod hooks;
pub mod loader;
pub mod macros;
pub mod manager;
pub mod monitor;
pub mod prelude;
pub mod registry;
pub mod traits;
pub mod validation;

pub use api::context::PluginContext;
pub use api::events::{PluginEvent, TimedEvent};
pub use base::BasePlugin;
pub use catalog::PluginCatalog;
pub use hooks::definitions::{HookArgs, HookName, HookOutcome};
pub use hooks::dispatcher::HookDispatcher;
pub use hooks::registry::HookRegistry;
pub use manager::{InitOptions, InitSummary, PluginManager};
pub use monitor::PerformanceMonitor;
pub use registry::{PluginInfo, PluginRegistry, PluginState};
pub use traits::Plugin;
