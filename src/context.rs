use std::sync::Arc;

use crate::{config::EngineConfig, out::Out, resolver::ResolverManager, value::Value};

/// Read-only state shared by all renders of an engine.
pub struct Runtime {
    resolvers: ResolverManager,
    config: EngineConfig,
}

impl Runtime {
    pub const fn new(resolvers: ResolverManager, config: EngineConfig) -> Self {
        Self { resolvers, config }
    }

    pub const fn resolvers(&self) -> &ResolverManager {
        &self.resolvers
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Per-render execution state: one slot per variable of the running frame,
/// the active loop index and the output sink.
pub struct InternalContext<'a> {
    pub vars: Vec<Value>,
    /// Label index of the innermost running loop, targeted by a bare
    /// `break` or `continue`.
    pub indexer: usize,
    pub out: &'a mut dyn Out,
    pub runtime: &'a Arc<Runtime>,
}

impl<'a> InternalContext<'a> {
    pub fn new(vars: Vec<Value>, out: &'a mut dyn Out, runtime: &'a Arc<Runtime>) -> Self {
        Self {
            vars,
            indexer: 0,
            out,
            runtime,
        }
    }

    pub fn get(&self, slot: usize) -> Value {
        self.vars.get(slot).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, slot: usize, value: Value) {
        if let Some(var) = self.vars.get_mut(slot) {
            *var = value;
        }
    }

    pub fn resolvers(&self) -> &'a ResolverManager {
        self.runtime.resolvers()
    }
}
