//! Duration and size bookkeeping, published through the performance hooks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::debug;

use sitekit_core::error::AppError;
use sitekit_core::result::AppResult;

use crate::hooks::definitions::HookName;
use crate::hooks::dispatcher::HookDispatcher;

/// A recorded measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Metric {
    /// A completed timing span.
    Timing {
        /// Span label.
        label: String,
        /// Duration in milliseconds.
        duration_ms: f64,
    },
    /// A size measurement.
    Size {
        /// Label.
        label: String,
        /// Size in bytes.
        bytes: u64,
    },
}

/// Summary of everything recorded so far.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    /// All metrics, in recording order.
    pub metrics: Vec<Metric>,
    /// Sum of all timings in milliseconds.
    pub total_duration_ms: f64,
    /// Sum of all sizes in bytes.
    pub total_bytes: u64,
}

#[derive(Debug, Default)]
struct MonitorState {
    open: HashMap<String, Instant>,
    metrics: Vec<Metric>,
}

/// Records timings and sizes.
#[derive(Debug, Default)]
pub struct PerformanceMonitor {
    state: Mutex<MonitorState>,
    dispatcher: Option<Arc<HookDispatcher>>,
}

impl PerformanceMonitor {
    /// Creates a monitor that only records.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a monitor that also fires `performance:metric` per measurement.
    pub fn with_dispatcher(dispatcher: Arc<HookDispatcher>) -> Self {
        Self {
            state: Mutex::default(),
            dispatcher: Some(dispatcher),
        }
    }

    /// Starts (or restarts) a timing span.
    pub async fn start_timing(&self, label: &str) {
        let mut state = self.state.lock().await;
        if state.open.insert(label.to_string(), Instant::now()).is_some() {
            debug!(label = %label, "Timing span restarted");
        }
    }

    /// Ends a timing span. Ending a span that was never started is an error.
    pub async fn end_timing(&self, label: &str) -> AppResult<Duration> {
        let elapsed = {
            let mut state = self.state.lock().await;
            let started = state.open.remove(label).ok_or_else(|| {
                AppError::not_found(format!("Timing span '{label}' was never started"))
            })?;
            let elapsed = started.elapsed();
            state.metrics.push(Metric::Timing {
                label: label.to_string(),
                duration_ms: elapsed.as_secs_f64() * 1000.0,
            });
            elapsed
        };

        self.publish(json!({
            "kind": "timing",
            "label": label,
            "duration_ms": elapsed.as_secs_f64() * 1000.0,
        }))
        .await;

        Ok(elapsed)
    }

    /// Records a size measurement.
    pub async fn record_size(&self, label: &str, bytes: u64) {
        self.state.lock().await.metrics.push(Metric::Size {
            label: label.to_string(),
            bytes,
        });

        self.publish(json!({ "kind": "size", "label": label, "bytes": bytes }))
            .await;
    }

    /// Summarizes the recorded metrics.
    pub async fn report(&self) -> PerformanceReport {
        let state = self.state.lock().await;
        let mut total_duration_ms = 0.0;
        let mut total_bytes = 0;
        for metric in &state.metrics {
            match metric {
                Metric::Timing { duration_ms, .. } => total_duration_ms += duration_ms,
                Metric::Size { bytes, .. } => total_bytes += bytes,
            }
        }
        PerformanceReport {
            metrics: state.metrics.clone(),
            total_duration_ms,
            total_bytes,
        }
    }

    /// Fires `performance:report` with the current report.
    pub async fn publish_report(&self) -> AppResult<PerformanceReport> {
        let report = self.report().await;
        if let Some(dispatcher) = &self.dispatcher {
            let value = serde_json::to_value(&report)?;
            dispatcher
                .execute(HookName::PerformanceReport.as_str(), vec![value])
                .await;
        }
        Ok(report)
    }

    async fn publish(&self, metric: serde_json::Value) {
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher
                .execute(HookName::PerformanceMetric.as_str(), vec![metric])
                .await;
        }
    }
}
