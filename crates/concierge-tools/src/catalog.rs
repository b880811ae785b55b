//! The immutable tool catalog.

use std::collections::HashMap;
use std::sync::Arc;

use concierge_core::{ToolCollaborator, ToolDescriptor, ToolName};

struct CatalogEntry {
    descriptor: Arc<ToolDescriptor>,
    collaborator: Arc<dyn ToolCollaborator>,
}

/// Catalog of every tool known to the system.
///
/// Built once at startup with [`ToolCatalog::with_tool`] and never mutated
/// afterwards; router, planner, validator, and executor all receive shared
/// references. This replaces any notion of runtime-mutable classification
/// rules: what the planner may propose is exactly what was registered here.
#[derive(Default)]
pub struct ToolCatalog {
    entries: HashMap<ToolName, CatalogEntry>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor together with its backend.
    ///
    /// Consumes and returns `self` so catalogs are built in one expression
    /// and stay immutable afterwards.
    pub fn with_tool(
        mut self,
        descriptor: ToolDescriptor,
        collaborator: Arc<dyn ToolCollaborator>,
    ) -> Self {
        self.entries.insert(
            descriptor.name.clone(),
            CatalogEntry {
                descriptor: Arc::new(descriptor),
                collaborator,
            },
        );
        self
    }

    /// Look up a descriptor by raw tool name.
    pub fn descriptor(&self, name: &str) -> Option<&ToolDescriptor> {
        ToolName::parse(name)
            .ok()
            .and_then(|n| self.entries.get(&n))
            .map(|e| e.descriptor.as_ref())
    }

    /// Look up the backend for a tool.
    pub fn collaborator(&self, name: &ToolName) -> Option<Arc<dyn ToolCollaborator>> {
        self.entries.get(name).map(|e| Arc::clone(&e.collaborator))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.descriptor(name).is_some()
    }

    /// Iterate over all descriptors, sorted by name for stable prompts.
    pub fn descriptors(&self) -> Vec<&ToolDescriptor> {
        let mut all: Vec<_> = self.entries.values().map(|e| e.descriptor.as_ref()).collect();
        all.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));
        all
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
