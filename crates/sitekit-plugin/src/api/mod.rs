//! Plugin API — context and events exposed to plugin code and hosts.

pub mod context;
pub mod events;

pub use context::PluginContext;
pub use events::{PluginEvent, TimedEvent};
