//! Per-phase route tables.

use crate::{Handler, Phase};
use indexmap::IndexMap;
use portcullis_router::RoutePattern;
use std::sync::Arc;

/// One registered handler: its pattern, its declared bindings and the
/// handler itself.
#[derive(Clone)]
pub struct RouteEntry {
    /// Compiled route pattern the request line must match.
    pub pattern: Arc<RoutePattern>,
    /// Parameter names the handler declared, in order.
    pub bindings: Arc<[String]>,
    /// The handler to run.
    pub handler: Arc<dyn Handler>,
}

impl std::fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteEntry")
            .field("pattern", &self.pattern)
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

/// Handlers grouped by phase, preserving registration order within each
/// phase. Registration order is the only priority rule: the first
/// registered entry whose pattern matches wins ties.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    phases: IndexMap<Phase, Vec<RouteEntry>>,
}

impl RouteTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry to a phase.
    pub fn register(&mut self, phase: Phase, entry: RouteEntry) {
        self.phases.entry(phase).or_default().push(entry);
    }

    /// Returns the entries registered for a phase, in registration order.
    #[must_use]
    pub fn entries(&self, phase: Phase) -> &[RouteEntry] {
        self.phases.get(&phase).map_or(&[], Vec::as_slice)
    }

    /// Returns true when no entries are registered at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phases.values().all(Vec::is_empty)
    }
}
