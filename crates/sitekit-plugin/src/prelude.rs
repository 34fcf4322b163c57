//! Prelude for convenient imports.

pub use async_trait::async_trait;

pub use sitekit_core::config::PluginSettings;
pub use sitekit_core::error::AppError;
pub use sitekit_core::result::AppResult;

pub use crate::api::context::PluginContext;
pub use crate::base::BasePlugin;
pub use crate::catalog::PluginCatalog;
pub use crate::hooks::definitions::{HookArgs, HookName, HookOutcome};
pub use crate::hooks::registry::{DEFAULT_PRIORITY, HookHandler};
pub use crate::traits::{
    BuildContext, BuildTaskHandler, CommandHandler, Middleware, MiddlewareFlow, Plugin,
    RequestContext,
};

pub use crate::hook_args;
