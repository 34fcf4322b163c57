//! `site-stats` — counts cache, render and performance hooks and reports them
//! through plugin commands.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::{Instrument, info};

use sitekit_core::config::PluginSettings;
use sitekit_core::error::AppError;
use sitekit_core::result::AppResult;
use sitekit_plugin::api::context::PluginContext;
use sitekit_plugin::base::BasePlugin;
use sitekit_plugin::hooks::definitions::HookName;
use sitekit_plugin::traits::{CommandHandler, Plugin};

use crate::hooks::{CounterHook, Counters};

/// Factory name.
pub const NAME: &str = "site-stats";

/// Hooks counted by this plugin.
pub const TRACKED_HOOKS: [HookName; 6] = [
    HookName::CacheHit,
    HookName::CacheMiss,
    HookName::CacheSet,
    HookName::CacheClear,
    HookName::TemplateAfterRender,
    HookName::PerformanceMetric,
];

/// Hook counter with `summary`, `hit-rate` and `reset` commands
#[derive(Debug)]
pub struct SiteStatsPlugin {
    base: BasePlugin,
    counters: Counters,
}

impl SiteStatsPlugin {
    /// Create the plugin from its effective settings
    pub fn new(settings: &PluginSettings) -> Self {
        Self {
            base: BasePlugin::new(NAME, env!("CARGO_PKG_VERSION"), &Map::new(), settings)
                .with_description("Counts cache, render and performance events")
                .with_author("SiteKit"),
            counters: Counters::default(),
        }
    }

    async fn count(&self, hook: HookName) -> u64 {
        self.counters
            .lock()
            .await
            .get(hook.as_str())
            .copied()
            .unwrap_or(0)
    }

    async fn summary(&self) -> Value {
        let counters = self.counters.lock().await;
        let mut summary = Map::new();
        for hook in TRACKED_HOOKS {
            let count = counters.get(hook.as_str()).copied().unwrap_or(0);
            summary.insert(hook.as_str().to_string(), json!(count));
        }
        Value::Object(summary)
    }

    async fn hit_rate(&self) -> Value {
        let hits = self.count(HookName::CacheHit).await;
        let misses = self.count(HookName::CacheMiss).await;
        let lookups = hits + misses;
        if lookups == 0 {
            return json!({ "hits": 0, "misses": 0, "hit_rate": null });
        }
        json!({
            "hits": hits,
            "misses": misses,
            "hit_rate": hits as f64 / lookups as f64,
        })
    }
}

#[async_trait]
impl Plugin for SiteStatsPlugin {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn version(&self) -> &str {
        self.base.version()
    }

    fn description(&self) -> Option<&str> {
        self.base.description()
    }

    fn author(&self) -> Option<&str> {
        self.base.author()
    }

    async fn initialize(&self, ctx: PluginContext) -> AppResult<()> {
        async {
            for hook in TRACKED_HOOKS {
                ctx.register_hook(
                    hook,
                    Arc::new(CounterHook::new(hook.as_str(), self.counters.clone())),
                    100,
                )
                .await;
            }
            info!(hooks = TRACKED_HOOKS.len(), "Site statistics collecting");
        }
        .instrument(self.base.span())
        .await;

        Ok(())
    }

    async fn cleanup(&self) -> AppResult<()> {
        let summary = self.summary().await;
        info!(plugin = NAME, summary = %summary, "Site statistics final");
        self.counters.lock().await.clear();
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.base.is_enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        self.base.set_enabled(enabled);
    }

    fn as_command_handler(&self) -> Option<&dyn CommandHandler> {
        Some(self)
    }
}

#[async_trait]
impl CommandHandler for SiteStatsPlugin {
    fn commands(&self) -> Vec<String> {
        vec!["summary".into(), "hit-rate".into(), "reset".into()]
    }

    async fn execute_command(&self, command: &str, _args: &[String]) -> AppResult<Value> {
        match command {
            "summary" => Ok(self.summary().await),
            "hit-rate" => Ok(self.hit_rate().await),
            "reset" => {
                self.counters.lock().await.clear();
                Ok(json!({ "reset": true }))
            }
            other => Err(AppError::not_found(format!(
                "site-stats has no command '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn bump(plugin: &SiteStatsPlugin, hook: HookName, times: u64) {
        plugin
            .counters
            .lock()
            .await
            .insert(hook.as_str().to_string(), times);
    }

    #[tokio::test]
    async fn test_summary_lists_every_tracked_hook() {
        let plugin = SiteStatsPlugin::new(&PluginSettings::default());
        bump(&plugin, HookName::CacheHit, 3).await;

        let summary = plugin
            .execute_command("summary", &[])
            .await
            .expect("summary");
        assert_eq!(summary["cache:hit"], 3);
        assert_eq!(summary["cache:miss"], 0);
        assert_eq!(summary.as_object().map(|o| o.len()), Some(TRACKED_HOOKS.len()));
    }

    #[tokio::test]
    async fn test_hit_rate() {
        let plugin = SiteStatsPlugin::new(&PluginSettings::default());
        let empty = plugin.execute_command("hit-rate", &[]).await.expect("rate");
        assert!(empty["hit_rate"].is_null());

        bump(&plugin, HookName::CacheHit, 3).await;
        bump(&plugin, HookName::CacheMiss, 1).await;
        let rate = plugin.execute_command("hit-rate", &[]).await.expect("rate");
        assert_eq!(rate["hit_rate"], 0.75);
    }

    #[tokio::test]
    async fn test_reset_and_unknown_command() {
        let plugin = SiteStatsPlugin::new(&PluginSettings::default());
        bump(&plugin, HookName::CacheSet, 9).await;

        plugin.execute_command("reset", &[]).await.expect("reset");
        assert_eq!(plugin.count(HookName::CacheSet).await, 0);

        let err = plugin
            .execute_command("explode", &[])
            .await
            .expect_err("unknown command");
        assert_eq!(err.kind, sitekit_core::ErrorKind::NotFound);
    }
}
