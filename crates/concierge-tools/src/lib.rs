//! # Concierge Tools
//!
//! The immutable [`ToolCatalog`] and the standard calendar/email/knowledge
//! tool descriptors. The catalog pairs each descriptor with the
//! collaborator backend that executes it; both are fixed at startup.

pub mod catalog;
pub mod standard;

pub use catalog::ToolCatalog;
