//! Lifecycle events published by the plugin manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A plugin lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PluginEvent {
    /// A plugin passed validation and was registered.
    Loaded {
        /// Plugin name.
        plugin: String,
    },
    /// A candidate plugin was skipped or failed to load.
    Rejected {
        /// Plugin name.
        plugin: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A plugin's `initialize` succeeded.
    Initialized {
        /// Plugin name.
        plugin: String,
    },
    /// A plugin's `initialize` failed, panicked or timed out.
    InitializationFailed {
        /// Plugin name.
        plugin: String,
        /// Failure message.
        error: String,
    },
    /// A plugin was enabled.
    Enabled {
        /// Plugin name.
        plugin: String,
    },
    /// A plugin was disabled.
    Disabled {
        /// Plugin name.
        plugin: String,
    },
    /// A plugin was unloaded.
    Unloaded {
        /// Plugin name.
        plugin: String,
    },
    /// A plugin was reloaded and is active again.
    Reloaded {
        /// Plugin name.
        plugin: String,
    },
    /// Every plugin was cleaned up and the registry was cleared.
    CleanedUp {
        /// How many plugins were cleaned up.
        count: usize,
    },
}

impl PluginEvent {
    /// The plugin this event is about, if any.
    pub fn plugin(&self) -> Option<&str> {
        match self {
            Self::Loaded { plugin }
            | Self::Rejected { plugin, .. }
            | Self::Initialized { plugin }
            | Self::InitializationFailed { plugin, .. }
            | Self::Enabled { plugin }
            | Self::Disabled { plugin }
            | Self::Unloaded { plugin }
            | Self::Reloaded { plugin } => Some(plugin.as_str()),
            Self::CleanedUp { .. } => None,
        }
    }
}

/// An event with the time it was published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedEvent {
    /// The event.
    #[serde(flatten)]
    pub event: PluginEvent,
    /// When it was published.
    pub at: DateTime<Utc>,
}

impl TimedEvent {
    /// Stamps an event with the current time.
    pub fn now(event: PluginEvent) -> Self {
        Self {
            event,
            at: Utc::now(),
        }
    }
}
