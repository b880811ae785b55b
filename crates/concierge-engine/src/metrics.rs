//! Prometheus metrics for the request pipeline.
//!
//! Label cardinality is kept bounded: task category and outcome come from
//! closed sets, and the tool label is limited to registered catalog names.

use std::sync::{Arc, OnceLock};

use prometheus::{
    CounterVec, HistogramOpts, HistogramVec, Opts, Registry,
};
use thiserror::Error;

/// Latency buckets covering fast cache hits through slow LLM calls.
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.02, 0.05, 0.1, 0.2, 0.5, 1.0, 2.5, 5.0, 10.0,
];

static GLOBAL: OnceLock<Arc<EngineMetrics>> = OnceLock::new();

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metric registration failed: {0}")]
    Registration(#[from] prometheus::Error),
}

/// Counters and histograms exposed by the engine.
#[derive(Debug)]
pub struct EngineMetrics {
    /// Pipeline completions by task category and outcome. Cardinality:
    /// 4 categories x 6 outcomes.
    pub pipeline_requests_total: CounterVec,
    /// Step settlements by tool and outcome. Cardinality: catalog size x 3.
    pub step_exec_total: CounterVec,
    /// Step execution duration by tool.
    pub step_exec_duration_seconds: HistogramVec,
    /// State Manager operations by operation and outcome.
    pub state_ops_total: CounterVec,
}

impl EngineMetrics {
    /// Register all engine metrics in `registry` under `namespace`.
    pub fn register(registry: &Registry, namespace: &str) -> Result<Self, MetricsError> {
        let pipeline_requests_total = CounterVec::new(
            Opts::new(
                format!("{namespace}_pipeline_requests_total"),
                "Pipeline completions by task category and outcome",
            ),
            &["category", "outcome"],
        )?;
        registry.register(Box::new(pipeline_requests_total.clone()))?;

        let step_exec_total = CounterVec::new(
            Opts::new(
                format!("{namespace}_step_exec_total"),
                "Plan step settlements by tool and outcome",
            ),
            &["tool", "outcome"],
        )?;
        registry.register(Box::new(step_exec_total.clone()))?;

        let step_exec_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                format!("{namespace}_step_exec_duration_seconds"),
                "Plan step execution duration by tool",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["tool"],
        )?;
        registry.register(Box::new(step_exec_duration_seconds.clone()))?;

        let state_ops_total = CounterVec::new(
            Opts::new(
                format!("{namespace}_state_ops_total"),
                "State Manager operations by operation and outcome",
            ),
            &["op", "outcome"],
        )?;
        registry.register(Box::new(state_ops_total.clone()))?;

        Ok(Self {
            pipeline_requests_total,
            step_exec_total,
            step_exec_duration_seconds,
            state_ops_total,
        })
    }

    /// The process-wide metrics instance, registered lazily in a private
    /// registry on first use.
    pub fn global() -> Arc<EngineMetrics> {
        Arc::clone(GLOBAL.get_or_init(|| {
            let registry = Registry::new();
            let metrics = EngineMetrics::register(&registry, "concierge")
                .unwrap_or_else(|e| panic!("engine metrics registration failed: {e}"));
            Arc::new(metrics)
        }))
    }

    pub fn record_pipeline(&self, category: &str, outcome: &str) {
        self.pipeline_requests_total
            .with_label_values(&[category, outcome])
            .inc();
    }

    pub fn record_step(&self, tool: &str, outcome: &str, duration_ms: u64) {
        self.step_exec_total.with_label_values(&[tool, outcome]).inc();
        self.step_exec_duration_seconds
            .with_label_values(&[tool])
            .observe(duration_ms as f64 / 1000.0);
    }

    pub fn record_state_op(&self, op: &str, outcome: &str) {
        self.state_ops_total.with_label_values(&[op, outcome]).inc();
    }
}
