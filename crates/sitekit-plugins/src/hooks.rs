//! Hook handlers shared by the built-in plugins.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use sitekit_core::result::AppResult;
use sitekit_plugin::hooks::definitions::{HookArgs, HookOutcome};
use sitekit_plugin::hooks::registry::HookHandler;

/// Hook name → number of times it fired.
pub type Counters = Arc<Mutex<BTreeMap<String, u64>>>;

/// Counts every invocation of the hook it is registered on.
pub struct CounterHook {
    /// Hook being counted
    hook: String,
    /// Handler label
    label: String,
    /// Shared counters
    counters: Counters,
}

impl CounterHook {
    /// Create a counter for `hook`
    pub fn new(hook: &str, counters: Counters) -> Self {
        Self {
            hook: hook.to_string(),
            label: format!("site-stats:count:{hook}"),
            counters,
        }
    }
}

#[async_trait]
impl HookHandler for CounterHook {
    async fn handle(&self, _args: &HookArgs) -> AppResult<HookOutcome> {
        let mut counters = self.counters.lock().await;
        let count = counters.entry(self.hook.clone()).or_insert(0);
        *count += 1;
        debug!(hook = %self.hook, count = *count, "Hook counted");
        Ok(HookOutcome::Unchanged)
    }

    fn label(&self) -> &str {
        &self.label
    }
}

/// Rewrites the first argument when it names a stampable asset.
pub struct StampHook {
    /// Stamp inserted before the extension
    stamp: String,
    /// Extensions that get stamped
    extensions: Vec<String>,
}

impl StampHook {
    /// Create a stamp hook
    pub fn new(stamp: &str, extensions: Vec<String>) -> Self {
        Self {
            stamp: stamp.to_string(),
            extensions,
        }
    }
}

#[async_trait]
impl HookHandler for StampHook {
    async fn handle(&self, args: &HookArgs) -> AppResult<HookOutcome> {
        let Some(name) = args.first().and_then(|v| v.as_str()) else {
            return Ok(HookOutcome::Unchanged);
        };
        match crate::asset_stamp::stamp_name(name, &self.stamp, &self.extensions) {
            Some(stamped) => {
                let mut next = args.clone();
                next[0] = stamped.into();
                Ok(HookOutcome::Replace(next))
            }
            None => Ok(HookOutcome::Unchanged),
        }
    }

    fn label(&self) -> &str {
        "asset-stamp:stamp"
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_counter_hook_counts_per_hook() {
        let counters = Counters::default();
        let hits = CounterHook::new("cache:hit", counters.clone());
        let misses = CounterHook::new("cache:miss", counters.clone());

        hits.handle(&vec![json!("/")]).await.expect("counted");
        hits.handle(&vec![]).await.expect("counted");
        misses.handle(&vec![]).await.expect("counted");

        let counters = counters.lock().await;
        assert_eq!(counters.get("cache:hit"), Some(&2));
        assert_eq!(counters.get("cache:miss"), Some(&1));
    }

    #[tokio::test]
    async fn test_stamp_hook_keeps_other_args() {
        let hook = StampHook::new("abc123", vec!["css".to_string()]);

        let outcome = hook
            .handle(&vec![json!("site.css"), json!(512)])
            .await
            .expect("handled");
        assert_eq!(
            outcome,
            HookOutcome::Replace(vec![json!("site.abc123.css"), json!(512)])
        );

        let outcome = hook.handle(&vec![json!("logo.png")]).await.expect("handled");
        assert_eq!(outcome, HookOutcome::Unchanged);
        let outcome = hook.handle(&vec![json!(7)]).await.expect("handled");
        assert_eq!(outcome, HookOutcome::Unchanged);
    }
}
