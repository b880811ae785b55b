//! # Concierge Core
//!
//! Core types for the Concierge assistant engine: validated identifiers,
//! tool descriptors and the collaborator interface, plan types, session and
//! conversation records, and the shared error taxonomy.
//!
//! This crate performs no I/O. Everything here is plain data plus the
//! traits the engine and state crates implement against.

pub mod conversation;
pub mod error;
pub mod identifiers;
pub mod plan;
pub mod tool;
pub mod validation;

pub use conversation::{
    ConversationTurn, Role, SessionRecord, StepTrace, TurnMessage, TurnMetadata,
};
pub use error::{PlanViolation, StateError, StateTier};
pub use identifiers::{ConversationId, SessionId, ToolName, UserId};
pub use plan::{Binding, Plan, PlanStep, PlannerOutput, StepArg, StepStatus};
pub use tool::{
    FieldKind, FieldSpec, InvocationErrorKind, InvocationOutcome, Precondition, ToolCollaborator,
    ToolDescriptor,
};
pub use validation::{IdentifierRules, ValidationError};
