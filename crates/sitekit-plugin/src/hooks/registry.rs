//! Hook registry — callbacks registered by hook name with priority ordering.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use sitekit_core::result::AppResult;

use super::definitions::{HookArgs, HookOutcome};

/// Priority used when the caller does not pick one.
pub const DEFAULT_PRIORITY: i32 = 10;

/// Trait for hook callback implementations.
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// Handles a hook invocation with the current argument tuple.
    async fn handle(&self, args: &HookArgs) -> AppResult<HookOutcome>;

    /// Label used in logs.
    fn label(&self) -> &str {
        "anonymous"
    }
}

type HookFuture = Pin<Box<dyn Future<Output = AppResult<HookOutcome>> + Send>>;

type BoxedHookFn = dyn Fn(HookArgs) -> HookFuture + Send + Sync;

/// A closure-based hook handler.
pub struct ClosureHandler {
    /// Label for logs.
    label: String,
    /// Handler function.
    handler: Arc<BoxedHookFn>,
}

impl std::fmt::Debug for ClosureHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosureHandler")
            .field("label", &self.label)
            .field("handler", &"<closure>")
            .finish()
    }
}

impl ClosureHandler {
    /// Creates a new closure-based handler.
    pub fn new<F, Fut>(label: &str, handler: F) -> Self
    where
        F: Fn(HookArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<HookOutcome>> + Send + 'static,
    {
        Self {
            label: label.to_string(),
            handler: Arc::new(move |args| -> HookFuture { Box::pin(handler(args)) }),
        }
    }
}

#[async_trait]
impl HookHandler for ClosureHandler {
    async fn handle(&self, args: &HookArgs) -> AppResult<HookOutcome> {
        (self.handler)(args.clone()).await
    }

    fn label(&self) -> &str {
        &self.label
    }
}

/// Reports whether the owner of a handler is currently enabled.
pub type EnabledCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Entry in the hook registry.
#[derive(Clone)]
pub struct HookEntry {
    /// The handler.
    pub handler: Arc<dyn HookHandler>,
    /// Priority (lower = earlier execution).
    pub priority: i32,
    /// Plugin that registered this handler, `None` for the host.
    pub owner: Option<String>,
    /// Owner's enabled flag; `None` means always on.
    pub enabled: Option<EnabledCheck>,
}

impl HookEntry {
    /// Whether the handler should run right now.
    pub fn is_enabled(&self) -> bool {
        self.enabled.as_ref().is_none_or(|check| check())
    }
}

impl std::fmt::Debug for HookEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookEntry")
            .field("label", &self.handler.label())
            .field("priority", &self.priority)
            .field("owner", &self.owner)
            .finish()
    }
}

/// Registry of hook handlers organized by hook name.
#[derive(Debug, Default)]
pub struct HookRegistry {
    /// Hook name → handlers in non-decreasing priority order.
    handlers: RwLock<HashMap<String, Vec<HookEntry>>>,
}

impl HookRegistry {
    /// Creates a new empty hook registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for a hook name.
    ///
    /// The list stays sorted by priority; equal priorities keep their
    /// registration order.
    pub async fn register(
        &self,
        hook: &str,
        handler: Arc<dyn HookHandler>,
        priority: i32,
        owner: Option<&str>,
    ) {
        self.insert(hook, handler, priority, owner, None).await;
    }

    /// Registers a handler that only runs while `enabled` reports true.
    pub async fn register_gated(
        &self,
        hook: &str,
        handler: Arc<dyn HookHandler>,
        priority: i32,
        owner: &str,
        enabled: EnabledCheck,
    ) {
        self.insert(hook, handler, priority, Some(owner), Some(enabled))
            .await;
    }

    async fn insert(
        &self,
        hook: &str,
        handler: Arc<dyn HookHandler>,
        priority: i32,
        owner: Option<&str>,
        enabled: Option<EnabledCheck>,
    ) {
        let label = handler.label().to_string();

        let mut handlers = self.handlers.write().await;
        let entries = handlers.entry(hook.to_string()).or_default();

        entries.push(HookEntry {
            handler,
            priority,
            owner: owner.map(str::to_string),
            enabled,
        });

        // `sort_by_key` is stable
        entries.sort_by_key(|e| e.priority);

        info!(
            hook = %hook,
            handler = %label,
            owner = owner.unwrap_or("host"),
            priority = priority,
            "Hook handler registered"
        );
    }

    /// Unregisters every handler owned by `owner`. Returns how many were removed.
    pub async fn unregister_owner(&self, owner: &str) -> usize {
        let mut handlers = self.handlers.write().await;
        let mut removed = 0;

        for entries in handlers.values_mut() {
            let before = entries.len();
            entries.retain(|e| e.owner.as_deref() != Some(owner));
            removed += before - entries.len();
        }

        handlers.retain(|_, entries| !entries.is_empty());

        if removed > 0 {
            info!(plugin = %owner, removed = removed, "Hooks unregistered for plugin");
        }
        removed
    }

    /// Returns a snapshot of the entries for a hook name, in execution order.
    pub async fn entries(&self, hook: &str) -> Vec<HookEntry> {
        let handlers = self.handlers.read().await;
        handlers.get(hook).cloned().unwrap_or_default()
    }

    /// Returns whether any handlers are registered for a hook name.
    pub async fn has_handlers(&self, hook: &str) -> bool {
        let handlers = self.handlers.read().await;
        handlers.get(hook).is_some_and(|entries| !entries.is_empty())
    }

    /// Returns the number of handlers registered for a hook name.
    pub async fn handler_count(&self, hook: &str) -> usize {
        let handlers = self.handlers.read().await;
        handlers.get(hook).map(|entries| entries.len()).unwrap_or(0)
    }

    /// Returns the number of handlers owned by a plugin.
    pub async fn owned_count(&self, owner: &str) -> usize {
        let handlers = self.handlers.read().await;
        handlers
            .values()
            .flatten()
            .filter(|e| e.owner.as_deref() == Some(owner))
            .count()
    }

    /// Returns all hook names with at least one handler, sorted.
    pub async fn registered_hooks(&self) -> Vec<String> {
        let handlers = self.handlers.read().await;
        let mut hooks: Vec<String> = handlers.keys().cloned().collect();
        hooks.sort();
        hooks
    }

    /// Drops every registration.
    pub async fn clear(&self) {
        let mut handlers = self.handlers.write().await;
        handlers.clear();
        debug!("Hook table cleared");
    }
}
