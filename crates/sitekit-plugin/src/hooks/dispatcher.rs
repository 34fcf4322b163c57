//! Hook dispatcher — threads an argument tuple through every handler of a hook.
//!
//! - Handlers run sequentially in priority order; each sees the arguments
//!   produced by the previous one.
//! - `HookOutcome::Replace` swaps the running arguments, `Unchanged` keeps them.
//! - A handler that errors, panics or exceeds the timeout is logged and
//!   skipped; the chain continues with the arguments from before it ran.
//! - Handlers of a disabled plugin are not called.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, error, warn};

use super::definitions::{HookArgs, HookOutcome};
use super::registry::HookRegistry;

/// Why a handler's contribution was discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookFailureKind {
    /// The handler returned an error.
    Error(String),
    /// The handler panicked.
    Panic(String),
    /// The handler did not finish in time.
    Timeout,
}

/// A handler failure observed during dispatch.
#[derive(Debug, Clone)]
pub struct HookFailure {
    /// Handler label.
    pub handler: String,
    /// Owning plugin, if any.
    pub owner: Option<String>,
    /// What went wrong.
    pub kind: HookFailureKind,
}

/// Result of dispatching a hook.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    /// Final argument tuple.
    pub args: HookArgs,
    /// Number of handlers invoked.
    pub invoked: usize,
    /// Handlers whose contribution was discarded.
    pub failures: Vec<HookFailure>,
}

/// Dispatches hooks to all registered handlers.
#[derive(Debug)]
pub struct HookDispatcher {
    /// Hook registry.
    registry: Arc<HookRegistry>,
    /// Time budget per handler.
    timeout: Duration,
}

impl HookDispatcher {
    /// Creates a new hook dispatcher.
    pub fn new(registry: Arc<HookRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// Runs every handler of `hook` and returns the final arguments.
    pub async fn execute(&self, hook: &str, args: HookArgs) -> HookArgs {
        self.dispatch(hook, args).await.args
    }

    /// Runs every handler of `hook` and reports what happened.
    pub async fn dispatch(&self, hook: &str, args: HookArgs) -> DispatchReport {
        // Snapshot first so handlers may register hooks without deadlocking.
        let entries = self.registry.entries(hook).await;

        if entries.is_empty() {
            return DispatchReport {
                args,
                invoked: 0,
                failures: Vec::new(),
            };
        }

        debug!(hook = %hook, handler_count = entries.len(), "Dispatching hook");

        let mut current = args;
        let mut failures = Vec::new();
        let mut invoked = 0;

        for entry in &entries {
            let label = entry.handler.label().to_string();
            if !entry.is_enabled() {
                debug!(
                    hook = %hook,
                    handler = %label,
                    owner = entry.owner.as_deref().unwrap_or("host"),
                    "Owner disabled, skipping handler"
                );
                continue;
            }
            invoked += 1;
            let call = AssertUnwindSafe(entry.handler.handle(&current)).catch_unwind();
            let outcome = tokio::time::timeout(self.timeout, call).await;

            let failure = match outcome {
                Ok(Ok(Ok(HookOutcome::Replace(next)))) => {
                    debug!(hook = %hook, handler = %label, "Handler replaced arguments");
                    current = next;
                    None
                }
                Ok(Ok(Ok(HookOutcome::Unchanged))) => None,
                Ok(Ok(Err(e))) => {
                    warn!(
                        hook = %hook,
                        handler = %label,
                        owner = entry.owner.as_deref().unwrap_or("host"),
                        error = %e,
                        "Hook handler failed, continuing"
                    );
                    Some(HookFailureKind::Error(e.to_string()))
                }
                Ok(Err(panic)) => {
                    let message = panic_message(panic.as_ref());
                    error!(
                        hook = %hook,
                        handler = %label,
                        owner = entry.owner.as_deref().unwrap_or("host"),
                        panic = %message,
                        "Hook handler panicked, continuing"
                    );
                    Some(HookFailureKind::Panic(message))
                }
                Err(_) => {
                    error!(
                        hook = %hook,
                        handler = %label,
                        owner = entry.owner.as_deref().unwrap_or("host"),
                        timeout_ms = self.timeout.as_millis() as u64,
                        "Hook handler timed out, continuing"
                    );
                    Some(HookFailureKind::Timeout)
                }
            };

            if let Some(kind) = failure {
                failures.push(HookFailure {
                    handler: label,
                    owner: entry.owner.clone(),
                    kind,
                });
            }
        }

        DispatchReport {
            args: current,
            invoked,
            failures,
        }
    }

    /// Returns a reference to the hook registry.
    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }

    /// Time budget per handler.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use sitekit_core::error::AppError;

    use super::*;
    use crate::hooks::registry::ClosureHandler;

    fn dispatcher() -> HookDispatcher {
        HookDispatcher::new(Arc::new(HookRegistry::new()), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_unknown_hook_passes_args_through() {
        let d = dispatcher();
        let args = vec![json!("a"), json!(2)];
        let report = d.dispatch("nonexistent-hook", args.clone()).await;
        assert_eq!(report.args, args);
        assert_eq!(report.invoked, 0);
    }

    #[tokio::test]
    async fn test_error_keeps_previous_args() {
        let d = dispatcher();
        let registry = d.registry().clone();
        registry
            .register(
                "h",
                Arc::new(ClosureHandler::new("double", |args: HookArgs| async move {
                    let n = args[0].as_i64().unwrap_or(0);
                    Ok(HookOutcome::value(n * 2))
                })),
                1,
                None,
            )
            .await;
        registry
            .register(
                "h",
                Arc::new(ClosureHandler::new("broken", |_args| async {
                    Err(AppError::hook("nope"))
                })),
                2,
                None,
            )
            .await;
        registry
            .register(
                "h",
                Arc::new(ClosureHandler::new("inc", |args: HookArgs| async move {
                    let n = args[0].as_i64().unwrap_or(0);
                    Ok(HookOutcome::value(n + 1))
                })),
                3,
                None,
            )
            .await;

        let report = d.dispatch("h", vec![json!(5)]).await;
        assert_eq!(report.args, vec![json!(11)]);
        assert_eq!(report.invoked, 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].handler, "broken");
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let d = dispatcher();
        d.registry()
            .register(
                "h",
                Arc::new(ClosureHandler::new("panics", |args: HookArgs| async move {
                    if args.len() == 1 {
                        panic!("handler exploded");
                    }
                    Ok(HookOutcome::Unchanged)
                })),
                1,
                None,
            )
            .await;

        let report = d.dispatch("h", vec![Value::Null]).await;
        assert_eq!(report.args, vec![Value::Null]);
        assert_eq!(
            report.failures[0].kind,
            HookFailureKind::Panic("handler exploded".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_contained() {
        let d = dispatcher();
        d.registry()
            .register(
                "h",
                Arc::new(ClosureHandler::new("slow", |_args| async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(HookOutcome::value("late"))
                })),
                1,
                None,
            )
            .await;

        let report = d.dispatch("h", vec![json!("on-time")]).await;
        assert_eq!(report.args, vec![json!("on-time")]);
        assert_eq!(report.failures[0].kind, HookFailureKind::Timeout);
    }

    #[tokio::test]
    async fn test_disabled_owner_is_skipped() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let d = dispatcher();
        let enabled = Arc::new(AtomicBool::new(false));
        let check = enabled.clone();
        d.registry()
            .register_gated(
                "h",
                Arc::new(ClosureHandler::new("suffix", |args: HookArgs| async move {
                    let s = args[0].as_str().unwrap_or_default();
                    Ok(HookOutcome::value(format!("{s}!")))
                })),
                1,
                "shouty",
                Arc::new(move || check.load(Ordering::SeqCst)),
            )
            .await;

        let report = d.dispatch("h", vec![json!("hi")]).await;
        assert_eq!(report.args, vec![json!("hi")]);
        assert_eq!(report.invoked, 0);

        enabled.store(true, Ordering::SeqCst);
        let report = d.dispatch("h", vec![json!("hi")]).await;
        assert_eq!(report.args, vec![json!("hi!")]);
        assert_eq!(report.invoked, 1);
    }
}
