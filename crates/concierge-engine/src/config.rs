//! Engine tunables.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the request pipeline and executor.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Overall budget for one message: planner latency plus all step
    /// executions. A pipeline past this budget is cancelled and the user
    /// gets a timeout-classified failure.
    pub request_timeout_secs: u64,
    /// Maximum concurrently running steps. `1` means strict sequential
    /// execution, which is the default; raise it only when the tool
    /// collaborators tolerate reordered side effects.
    pub max_inflight_steps: usize,
    /// How many prior turns the router and planner see.
    pub max_history: usize,
    /// Sampling temperature for the planner model. Near-zero keeps plans
    /// reproducible; the validator remains the actual safety boundary.
    pub planner_temperature: f32,
    /// Model name passed to the LLM backend.
    pub planner_model: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            max_inflight_steps: 1,
            max_history: 10,
            planner_temperature: 0.0,
            planner_model: "gpt-4o-mini".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
