//! Assistant engine: routing, planning, validation, and execution.
//!
//! The engine turns one natural-language message into either a direct
//! answer or a validated, executed tool plan:
//!
//! 1. [`router`] classifies the message with cheap keyword heuristics.
//! 2. A [`planner::Planner`] asks an LLM for a strict-JSON plan or answer.
//! 3. [`validator::validate`] checks the plan against the catalog and
//!    repairs missing precondition lookups; only a
//!    [`validator::ValidatedPlan`] can reach the executor.
//! 4. The [`executor::Executor`] runs plan steps, resolving `$bind`
//!    references between them.
//!
//! [`pipeline::Pipeline`] composes all of the above with the state tiers
//! under a per-request timeout.

pub mod config;
pub mod executor;
pub mod llm;
pub mod metrics;
pub mod pipeline;
pub mod planner;
pub mod router;
pub mod validator;

pub use config::EngineConfig;
pub use executor::{ExecutedStep, ExecutionReport, Executor};
pub use llm::{LlmClient, LlmError, LlmRequest, OpenAiClient};
pub use metrics::EngineMetrics;
pub use pipeline::{Pipeline, PipelineError, PipelineOutcome, PipelineResponse};
pub use planner::{LlmPlanner, PlanError, Planner};
pub use router::{Classification, IntentCategory, Signal};
pub use validator::{validate, ValidatedPlan};
