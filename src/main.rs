//! SiteKit Server — hosts the plugin runtime for a SiteKit site.
//!
//! Main entry point that wires configuration, logging and the plugin manager
//! together and drives the application lifecycle hooks.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::broadcast;
use tracing_subscriber::{EnvFilter, fmt};

use sitekit_core::config::AppConfig;
use sitekit_core::error::AppError;
use sitekit_plugin::{HookName, InitOptions, PluginEvent, PluginManager};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from the config directory and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_dir = std::env::var("SITEKIT_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    let env = std::env::var("SITEKIT_ENV").unwrap_or_else(|_| "development".to_string());

    AppConfig::load_from(&config_dir, &env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting SiteKit v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Plugin manager ───────────────────────────────────
    let manager = Arc::new(PluginManager::new(
        config.plugins.clone(),
        sitekit_plugins::catalog(),
    ));
    let event_log = spawn_event_log(&manager);

    // ── Step 2: Discover and initialize plugins ──────────────────
    if config.plugins.auto_load {
        let summary = manager.initialize(InitOptions::default()).await;
        tracing::info!(
            loaded = summary.loaded,
            active = summary.active,
            failed = summary.failed,
            "Plugins ready"
        );
    } else {
        tracing::info!("Plugin auto-load disabled");
    }

    // ── Step 3: Application start hooks ──────────────────────────
    let app = json!({
        "name": "sitekit",
        "version": env!("CARGO_PKG_VERSION"),
        "plugins_dir": config.plugins.directory,
    });
    manager
        .execute_hook(HookName::AppBeforeStart, vec![app.clone()])
        .await;
    manager
        .execute_hook(HookName::AppAfterStart, vec![app.clone()])
        .await;
    tracing::info!("SiteKit running, press Ctrl+C to stop");

    // ── Step 4: Wait for shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");

    manager
        .execute_hook(HookName::AppBeforeShutdown, vec![app.clone()])
        .await;
    if let Err(e) = manager.monitor().publish_report().await {
        tracing::warn!("Failed to publish performance report: {}", e);
    }
    manager
        .execute_hook(HookName::AppAfterShutdown, vec![app])
        .await;

    // ── Step 5: Clean up plugins ─────────────────────────────────
    manager.cleanup().await;
    event_log.abort();

    tracing::info!("SiteKit shut down gracefully");
    Ok(())
}

/// Log every plugin lifecycle event
fn spawn_event_log(manager: &Arc<PluginManager>) -> tokio::task::JoinHandle<()> {
    let mut events = manager.subscribe();
    tokio::spawn(async move {
        loop {
            let timed = match events.recv().await {
                Ok(timed) => timed,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped = skipped, "Plugin event log lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            match &timed.event {
                PluginEvent::Rejected { plugin, reason } => {
                    tracing::warn!(plugin = %plugin, reason = %reason, "Plugin rejected");
                }
                PluginEvent::InitializationFailed { plugin, error } => {
                    tracing::warn!(plugin = %plugin, error = %error, "Plugin failed to start");
                }
                event => {
                    tracing::debug!(event = ?event, at = %timed.at, "Plugin event");
                }
            }
        }
    })
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
