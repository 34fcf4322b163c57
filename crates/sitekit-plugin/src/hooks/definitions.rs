//! Hook name vocabulary, argument tuples and callback outcomes.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use sitekit_core::error::AppError;

/// The running argument tuple threaded through a hook chain.
pub type HookArgs = Vec<Value>;

/// The recognized hook names, grouped by phase.
///
/// The vocabulary is advisory: the registry accepts any string, and a name
/// nobody registered for simply passes its arguments through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum HookName {
    // ── Application lifecycle ──
    /// Before the host application starts.
    AppBeforeStart,
    /// After the host application started.
    AppAfterStart,
    /// Before the host application shuts down.
    AppBeforeShutdown,
    /// After the host application shut down.
    AppAfterShutdown,

    // ── Build ──
    /// Before a build run starts.
    BuildBeforeStart,
    /// After a build run finished.
    BuildAfterStart,
    /// Before stylesheets are compiled.
    BuildBeforeScss,
    /// After stylesheets were compiled.
    BuildAfterScss,
    /// Before assets are bundled.
    BuildBeforeAssets,
    /// After assets were bundled.
    BuildAfterAssets,
    /// Before static pages are generated.
    BuildBeforeStatic,
    /// After static pages were generated.
    BuildAfterStatic,

    // ── Middleware ──
    /// Before security middleware is installed.
    MiddlewareBeforeSecurity,
    /// After security middleware is installed.
    MiddlewareAfterSecurity,
    /// Before routes are mounted.
    MiddlewareBeforeRoutes,
    /// After routes are mounted.
    MiddlewareAfterRoutes,

    // ── Request / response ──
    /// A request entered the server.
    RequestStart,
    /// A request finished.
    RequestEnd,
    /// A response is about to be sent.
    ResponseBeforeSend,

    // ── Templates ──
    /// Before a template is rendered.
    TemplateBeforeRender,
    /// After a template was rendered.
    TemplateAfterRender,

    // ── Assets ──
    /// Before an asset is processed.
    AssetBeforeProcess,
    /// After an asset was processed.
    AssetAfterProcess,

    // ── Cache ──
    /// A cache lookup hit.
    CacheHit,
    /// A cache lookup missed.
    CacheMiss,
    /// A cache entry was written.
    CacheSet,
    /// The cache was cleared.
    CacheClear,

    // ── Performance ──
    /// A timing or size metric was recorded.
    PerformanceMetric,
    /// A performance report was produced.
    PerformanceReport,

    // ── Feature flags ──
    /// A feature flag is being checked.
    FeatureCheck,
    /// A feature flag is being modified.
    FeatureModify,

    // ── CLI ──
    /// Before a plugin CLI command runs.
    CliBeforeCommand,
    /// After a plugin CLI command ran.
    CliAfterCommand,

    // ── Tests ──
    /// Before a test run.
    TestBeforeRun,
    /// After a test run.
    TestAfterRun,
}

impl HookName {
    /// Returns the string name of this hook.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppBeforeStart => "app:before-start",
            Self::AppAfterStart => "app:after-start",
            Self::AppBeforeShutdown => "app:before-shutdown",
            Self::AppAfterShutdown => "app:after-shutdown",
            Self::BuildBeforeStart => "build:before-start",
            Self::BuildAfterStart => "build:after-start",
            Self::BuildBeforeScss => "build:before-scss",
            Self::BuildAfterScss => "build:after-scss",
            Self::BuildBeforeAssets => "build:before-assets",
            Self::BuildAfterAssets => "build:after-assets",
            Self::BuildBeforeStatic => "build:before-static",
            Self::BuildAfterStatic => "build:after-static",
            Self::MiddlewareBeforeSecurity => "middleware:before-security",
            Self::MiddlewareAfterSecurity => "middleware:after-security",
            Self::MiddlewareBeforeRoutes => "middleware:before-routes",
            Self::MiddlewareAfterRoutes => "middleware:after-routes",
            Self::RequestStart => "request:start",
            Self::RequestEnd => "request:end",
            Self::ResponseBeforeSend => "response:before-send",
            Self::TemplateBeforeRender => "template:before-render",
            Self::TemplateAfterRender => "template:after-render",
            Self::AssetBeforeProcess => "asset:before-process",
            Self::AssetAfterProcess => "asset:after-process",
            Self::CacheHit => "cache:hit",
            Self::CacheMiss => "cache:miss",
            Self::CacheSet => "cache:set",
            Self::CacheClear => "cache:clear",
            Self::PerformanceMetric => "performance:metric",
            Self::PerformanceReport => "performance:report",
            Self::FeatureCheck => "feature:check",
            Self::FeatureModify => "feature:modify",
            Self::CliBeforeCommand => "cli:before-command",
            Self::CliAfterCommand => "cli:after-command",
            Self::TestBeforeRun => "test:before-run",
            Self::TestAfterRun => "test:after-run",
        }
    }

    /// Every recognized hook, in declaration order.
    pub fn all() -> &'static [HookName] {
        &[
            Self::AppBeforeStart,
            Self::AppAfterStart,
            Self::AppBeforeShutdown,
            Self::AppAfterShutdown,
            Self::BuildBeforeStart,
            Self::BuildAfterStart,
            Self::BuildBeforeScss,
            Self::BuildAfterScss,
            Self::BuildBeforeAssets,
            Self::BuildAfterAssets,
            Self::BuildBeforeStatic,
            Self::BuildAfterStatic,
            Self::MiddlewareBeforeSecurity,
            Self::MiddlewareAfterSecurity,
            Self::MiddlewareBeforeRoutes,
            Self::MiddlewareAfterRoutes,
            Self::RequestStart,
            Self::RequestEnd,
            Self::ResponseBeforeSend,
            Self::TemplateBeforeRender,
            Self::TemplateAfterRender,
            Self::AssetBeforeProcess,
            Self::AssetAfterProcess,
            Self::CacheHit,
            Self::CacheMiss,
            Self::CacheSet,
            Self::CacheClear,
            Self::PerformanceMetric,
            Self::PerformanceReport,
            Self::FeatureCheck,
            Self::FeatureModify,
            Self::CliBeforeCommand,
            Self::CliAfterCommand,
            Self::TestBeforeRun,
            Self::TestAfterRun,
        ]
    }

    /// The phase prefix (`"app"`, `"build"`, ...).
    pub fn phase(&self) -> &'static str {
        let name = self.as_str();
        name.split_once(':').map(|(phase, _)| phase).unwrap_or(name)
    }
}

impl std::fmt::Display for HookName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl AsRef<str> for HookName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl FromStr for HookName {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|hook| hook.as_str() == s)
            .ok_or_else(|| AppError::not_found(format!("Unknown hook name '{s}'")))
    }
}

impl From<HookName> for String {
    fn from(hook: HookName) -> Self {
        hook.as_str().to_string()
    }
}

impl TryFrom<String> for HookName {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// What a hook callback wants done with the running arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HookOutcome {
    /// Keep the arguments as they were.
    Unchanged,
    /// Replace the whole argument tuple.
    Replace(HookArgs),
}

impl HookOutcome {
    /// Replaces the argument tuple with a single value.
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Replace(vec![value.into()])
    }

    /// Replaces the argument tuple.
    pub fn replace(args: HookArgs) -> Self {
        Self::Replace(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_every_name() {
        for hook in HookName::all() {
            let parsed: HookName = hook.as_str().parse().expect("known hook");
            assert_eq!(&parsed, hook);
        }
    }

    #[test]
    fn test_unknown_name_rejected() {
        assert!("nonexistent-hook".parse::<HookName>().is_err());
    }

    #[test]
    fn test_serializes_as_wire_name() {
        let encoded = serde_json::to_value(HookName::BuildAfterScss).expect("serialize");
        assert_eq!(encoded, Value::from("build:after-scss"));

        let decoded: HookName =
            serde_json::from_value(Value::from("cache:hit")).expect("deserialize");
        assert_eq!(decoded, HookName::CacheHit);
        assert!(serde_json::from_value::<HookName>(Value::from("CacheHit")).is_err());
    }

    #[test]
    fn test_phase() {
        assert_eq!(HookName::BuildAfterScss.phase(), "build");
        assert_eq!(HookName::CacheHit.phase(), "cache");
        assert_eq!(format!("{}", HookName::AppBeforeStart), "app:before-start");
    }

    #[test]
    fn test_value_outcome_wraps_single_value() {
        assert_eq!(
            HookOutcome::value("x"),
            HookOutcome::Replace(vec![Value::from("x")])
        );
    }
}
