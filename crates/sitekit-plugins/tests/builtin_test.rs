//! The built-in plugins driven through a plugin manager.

use std::path::Path;

use serde_json::json;

use sitekit_core::config::PluginSystemConfig;
use sitekit_plugin::traits::{BuildContext, RequestContext};
use sitekit_plugin::{HookName, InitOptions, PluginManager, PluginState, hook_args};

fn write_manifest(root: &Path, dir: &str, body: &str) {
    let plugin_dir = root.join("plugins").join(dir);
    std::fs::create_dir_all(&plugin_dir).expect("mkdir");
    std::fs::write(plugin_dir.join("plugin.toml"), body).expect("write manifest");
}

async fn started(root: &Path) -> PluginManager {
    write_manifest(root, "asset-stamp", "[defaults]\nstamp = \"v7\"\n");
    write_manifest(root, "request-logger", "");
    write_manifest(root, "site-stats", "factory = \"site-stats\"\n");

    let config = PluginSystemConfig {
        directory: root.join("plugins").display().to_string(),
        config_file: root.join("plugins.toml").display().to_string(),
        ..PluginSystemConfig::default()
    };
    let manager = PluginManager::new(config, sitekit_plugins::catalog());
    let summary = manager.initialize(InitOptions::default()).await;
    assert_eq!(summary.active, 3);
    manager
}

#[tokio::test]
async fn test_builtins_load_from_manifests() {
    let dir = tempfile::tempdir().expect("tempdir");
    let manager = started(dir.path()).await;

    let infos = manager.get_all_plugin_info().await;
    let names: Vec<&str> = infos.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["asset-stamp", "request-logger", "site-stats"]);
    assert!(infos.iter().all(|i| i.state == PluginState::Active));
}

#[tokio::test]
async fn test_manifest_defaults_reach_the_plugin() {
    let dir = tempfile::tempdir().expect("tempdir");
    let manager = started(dir.path()).await;

    let result = manager
        .execute_hook(HookName::AssetAfterProcess, hook_args!["site.css", 2048])
        .await;
    assert_eq!(result, hook_args!["site.v7.css", 2048]);

    let mut ctx = BuildContext::new(dir.path().join("dist"));
    ctx.artifacts = vec!["app.js".to_string(), "robots.txt".to_string()];
    assert_eq!(manager.run_build_task("stamp", &mut ctx).await, 1);
    assert_eq!(ctx.artifacts, vec!["app.v7.js", "robots.txt"]);
}

#[tokio::test]
async fn test_stats_count_hooks_and_middleware_tags_requests() {
    let dir = tempfile::tempdir().expect("tempdir");
    let manager = started(dir.path()).await;

    manager.execute_hook(HookName::CacheHit, hook_args!["/"]).await;
    manager.execute_hook(HookName::CacheHit, hook_args!["/about"]).await;
    manager.execute_hook(HookName::CacheMiss, hook_args!["/blog"]).await;

    let rate = manager
        .run_command("site-stats", "hit-rate", &[])
        .await
        .expect("command runs");
    assert_eq!(rate["hits"], 2);
    assert_eq!(rate["misses"], 1);

    let mut request = RequestContext::new("GET", "/about");
    manager.run_middleware(&mut request).await;
    assert!(request.response_headers.contains_key("x-request-id"));
    assert!(request.locals.contains_key("request_id"));

    let finished = hook_args!["GET", "/about", 200, 1.5];
    assert_eq!(
        manager
            .execute_hook(HookName::RequestEnd, finished.clone())
            .await,
        finished
    );
}

#[tokio::test]
async fn test_reload_resets_stats() {
    let dir = tempfile::tempdir().expect("tempdir");
    let manager = started(dir.path()).await;

    manager.execute_hook(HookName::CacheSet, hook_args!["/"]).await;
    assert!(manager.reload_plugin("site-stats").await);
    manager.execute_hook(HookName::CacheSet, hook_args!["/"]).await;

    let summary = manager
        .run_command("site-stats", "summary", &[])
        .await
        .expect("command runs");
    assert_eq!(summary["cache:set"], json!(1));
}

#[tokio::test]
async fn test_disabled_builtins_stop_reacting_to_hooks() {
    let dir = tempfile::tempdir().expect("tempdir");
    let manager = started(dir.path()).await;

    assert!(manager.disable_plugin("asset-stamp").await);
    assert!(manager.disable_plugin("site-stats").await);

    let result = manager
        .execute_hook(HookName::AssetAfterProcess, hook_args!["site.css"])
        .await;
    assert_eq!(result, hook_args!["site.css"]);
    manager.execute_hook(HookName::CacheHit, hook_args!["/"]).await;

    assert!(manager.enable_plugin("site-stats").await);
    let rate = manager
        .run_command("site-stats", "hit-rate", &[])
        .await
        .expect("command runs");
    assert_eq!(rate["hits"], 0);
}
