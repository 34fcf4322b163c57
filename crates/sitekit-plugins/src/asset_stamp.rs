//! `asset-stamp` — cache-busting stamps for built asset file names.
//!
//! Stamps `name.ext` into `name.<stamp>.ext` for the configured extensions,
//! both for single assets flowing through `asset:after-process` and for the
//! artifact list of the `stamp` build task.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::{Instrument, debug, info};

use sitekit_core::config::PluginSettings;
use sitekit_core::result::AppResult;
use sitekit_plugin::api::context::PluginContext;
use sitekit_plugin::base::BasePlugin;
use sitekit_plugin::hooks::definitions::HookName;
use sitekit_plugin::traits::{BuildContext, BuildTaskHandler, Plugin};

use crate::hooks::StampHook;

/// Factory name.
pub const NAME: &str = "asset-stamp";

/// Build task handled by this plugin.
pub const STAMP_TASK: &str = "stamp";

/// Inserts `stamp` before the extension of `name`.
///
/// Returns `None` when the name has no stem, or its extension is not listed.
pub fn stamp_name(name: &str, stamp: &str, extensions: &[String]) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || stem.ends_with('/') || !extensions.iter().any(|e| e == ext) {
        return None;
    }
    Some(format!("{stem}.{stamp}.{ext}"))
}

/// Cache-busting asset stamper
#[derive(Debug)]
pub struct AssetStampPlugin {
    base: BasePlugin,
}

impl AssetStampPlugin {
    /// Create the plugin from its effective settings
    pub fn new(settings: &PluginSettings) -> Self {
        Self {
            base: BasePlugin::new(NAME, env!("CARGO_PKG_VERSION"), &Self::defaults(), settings)
                .with_description("Stamps built asset names for cache busting")
                .with_author("SiteKit"),
        }
    }

    fn defaults() -> Map<String, Value> {
        let mut defaults = Map::new();
        defaults.insert("stamp".into(), json!("dev"));
        defaults.insert("extensions".into(), json!(["css", "js"]));
        defaults
    }

    /// Current stamp
    pub fn stamp(&self) -> String {
        self.base.option_str("stamp", "dev")
    }

    /// Extensions that get stamped
    pub fn extensions(&self) -> Vec<String> {
        self.base
            .option("extensions")
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default()
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl Plugin for AssetStampPlugin {
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
        let stamp = self.stamp();
        let extensions = self.extensions();

        async {
            ctx.register_hook(
                HookName::AssetAfterProcess,
                Arc::new(StampHook::new(&stamp, extensions.clone())),
                50,
            )
            .await;
            info!(stamp = %stamp, extensions = ?extensions, "Asset stamping ready");
        }
        .instrument(self.base.span())
        .await;

        Ok(())
    }

    fn configure(&self, options: &Map<String, Value>) -> AppResult<()> {
        self.base.configure(options)
    }

    fn validate(&self) -> bool {
        !self.stamp().is_empty() && !self.stamp().contains(['/', '.'])
    }

    fn is_enabled(&self) -> bool {
        self.base.is_enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        self.base.set_enabled(enabled);
    }

    fn as_build_task_handler(&self) -> Option<&dyn BuildTaskHandler> {
        Some(self)
    }
}

#[async_trait]
impl BuildTaskHandler for AssetStampPlugin {
    async fn execute_build_task(&self, task: &str, ctx: &mut BuildContext) -> AppResult<()> {
        if task != STAMP_TASK {
            debug!(task = %task, "Not a stamp task, ignoring");
            return Ok(());
        }

        let stamp = self.stamp();
        let extensions = self.extensions();
        let mut stamped = 0;
        for artifact in ctx.artifacts.iter_mut() {
            if let Some(next) = stamp_name(artifact, &stamp, &extensions) {
                *artifact = next;
                stamped += 1;
            }
        }

        ctx.metadata.insert("stamp".into(), json!(stamp));
        info!(stamped = stamped, total = ctx.artifacts.len(), "Artifacts stamped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exts() -> Vec<String> {
        vec!["css".to_string(), "js".to_string()]
    }

    #[test]
    fn test_stamp_name() {
        assert_eq!(
            stamp_name("css/site.css", "v2", &exts()).as_deref(),
            Some("css/site.v2.css")
        );
        assert_eq!(stamp_name("app.min.js", "v2", &exts()).as_deref(), Some("app.min.v2.js"));
        assert_eq!(stamp_name("logo.svg", "v2", &exts()), None);
        assert_eq!(stamp_name("Makefile", "v2", &exts()), None);
        assert_eq!(stamp_name(".css", "v2", &exts()), None);
        assert_eq!(stamp_name("dist/.js", "v2", &exts()), None);
    }

    #[test]
    fn test_settings_override_defaults() {
        let mut settings = PluginSettings::default();
        settings.options.insert("stamp".into(), json!("20240101"));
        let plugin = AssetStampPlugin::new(&settings);

        assert_eq!(plugin.stamp(), "20240101");
        assert_eq!(plugin.extensions(), exts());
        assert!(plugin.validate());
    }

    #[test]
    fn test_stamp_with_separator_is_invalid() {
        let mut settings = PluginSettings::default();
        settings.options.insert("stamp".into(), json!("a/b"));
        assert!(!AssetStampPlugin::new(&settings).validate());
    }

    #[tokio::test]
    async fn test_stamp_task_rewrites_artifacts() {
        let plugin = AssetStampPlugin::new(&PluginSettings::default());
        let mut ctx = BuildContext::new("dist");
        ctx.artifacts = vec!["site.css".into(), "app.js".into(), "index.html".into()];

        plugin
            .execute_build_task(STAMP_TASK, &mut ctx)
            .await
            .expect("task runs");

        assert_eq!(ctx.artifacts, vec!["site.dev.css", "app.dev.js", "index.html"]);
        assert_eq!(ctx.metadata["stamp"], json!("dev"));
    }

    #[tokio::test]
    async fn test_other_tasks_are_ignored() {
        let plugin = AssetStampPlugin::new(&PluginSettings::default());
        let mut ctx = BuildContext::new("dist");
        ctx.artifacts = vec!["site.css".into()];

        plugin
            .execute_build_task("compress", &mut ctx)
            .await
            .expect("task runs");
        assert_eq!(ctx.artifacts, vec!["site.css"]);
    }
}
