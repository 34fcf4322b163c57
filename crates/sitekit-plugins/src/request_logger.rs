//! `request-logger` — tags every request with an id and logs it.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value, json};
use tracing::{Instrument, debug, info};
use uuid::Uuid;

use sitekit_plugin::prelude::*;

/// Factory name.
pub const NAME: &str = "request-logger";

/// Request logging middleware
#[derive(Debug)]
pub struct RequestLoggerPlugin {
    base: BasePlugin,
    /// Requests tagged since load
    served: AtomicU64,
}

impl RequestLoggerPlugin {
    /// Create the plugin from its effective settings
    pub fn new(settings: &PluginSettings) -> Self {
        Self {
            base: BasePlugin::new(NAME, env!("CARGO_PKG_VERSION"), &Self::defaults(), settings)
                .with_description("Assigns request ids and logs requests")
                .with_author("SiteKit"),
            served: AtomicU64::new(0),
        }
    }

    fn defaults() -> Map<String, Value> {
        let mut defaults = Map::new();
        defaults.insert("header".into(), json!("x-request-id"));
        defaults.insert("skip_prefixes".into(), json!(["/static/", "/favicon.ico"]));
        defaults
    }

    /// Response header carrying the request id
    pub fn header(&self) -> String {
        self.base.option_str("header", "x-request-id")
    }

    /// Number of requests tagged so far
    pub fn served(&self) -> u64 {
        self.served.load(Ordering::Relaxed)
    }

    fn skipped(&self, path: &str) -> bool {
        self.base
            .option("skip_prefixes")
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default()
            .iter()
            .filter_map(Value::as_str)
            .any(|prefix| path.starts_with(prefix))
    }
}

#[async_trait]
impl Plugin for RequestLoggerPlugin {
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
            // request:end receives [method, path, status, duration_ms]
            ctx.register_fn(HookName::RequestEnd, 100, |args: HookArgs| async move {
                let method = args.first().and_then(|v| v.as_str()).unwrap_or("-");
                let path = args.get(1).and_then(|v| v.as_str()).unwrap_or("-");
                let status = args.get(2).and_then(|v| v.as_u64()).unwrap_or(0);
                let duration_ms = args.get(3).and_then(|v| v.as_f64()).unwrap_or(0.0);
                info!(
                    method = %method,
                    path = %path,
                    status = status,
                    duration_ms = duration_ms,
                    "Request finished"
                );
                Ok(HookOutcome::Unchanged)
            })
            .await;
            debug!(header = %self.header(), "Request logging ready");
        }
        .instrument(self.base.span())
        .await;

        Ok(())
    }

    async fn cleanup(&self) -> AppResult<()> {
        info!(plugin = NAME, served = self.served(), "Request logger stopped");
        Ok(())
    }

    fn configure(&self, options: &Map<String, Value>) -> AppResult<()> {
        self.base.configure(options)
    }

    fn validate(&self) -> bool {
        !self.header().trim().is_empty()
    }

    fn is_enabled(&self) -> bool {
        self.base.is_enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        self.base.set_enabled(enabled);
    }

    fn as_middleware(&self) -> Option<&dyn Middleware> {
        Some(self)
    }
}

#[async_trait]
impl Middleware for RequestLoggerPlugin {
    async fn handle(&self, request: &mut RequestContext) -> MiddlewareFlow {
        if self.skipped(&request.path) {
            return MiddlewareFlow::Next;
        }

        let id = request
            .headers
            .get(&self.header())
            .cloned()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        request.response_headers.insert(self.header(), id.clone());
        request.locals.insert("request_id".into(), json!(id));
        self.served.fetch_add(1, Ordering::Relaxed);

        info!(
            method = %request.method,
            path = %request.path,
            request_id = %id,
            "Request started"
        );
        MiddlewareFlow::Next
    }
}
