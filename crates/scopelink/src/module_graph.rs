//! Module connection graph
//!
//! Records which modules import which, and which modules evaluate
//! asynchronously (top-level await or an async dependency). The linker only
//! reads this graph; building it is the job of upstream dependency analysis.

use petgraph::{
    Direction,
    graph::{DiGraph, NodeIndex},
};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::types::ModuleId;

#[derive(Debug, Default)]
pub struct ModuleGraph {
    /// Edge `a -> b` means module `a` imports module `b`
    graph: DiGraph<ModuleId, ()>,
    nodes: FxHashMap<ModuleId, NodeIndex>,
    async_modules: FxHashSet<ModuleId>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_module(&mut self, module: ModuleId) -> NodeIndex {
        if let Some(&node) = self.nodes.get(&module) {
            return node;
        }
        let node = self.graph.add_node(module);
        self.nodes.insert(module, node);
        node
    }

    /// Record that `origin` imports `module`
    pub fn add_dependency(&mut self, origin: ModuleId, module: ModuleId) {
        let from = self.add_module(origin);
        let to = self.add_module(module);
        if !self.graph.contains_edge(from, to) {
            self.graph.add_edge(from, to, ());
        }
    }

    /// Modules that import `module` directly
    pub fn incoming_origins(&self, module: ModuleId) -> Vec<ModuleId> {
        let Some(&node) = self.nodes.get(&module) else {
            return Vec::new();
        };
        let mut origins: Vec<ModuleId> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .map(|origin| self.graph[origin])
            .collect();
        origins.sort_unstable();
        origins
    }

    pub fn has_incoming_module_connections(&self, module: ModuleId) -> bool {
        self.nodes.get(&module).is_some_and(|&node| {
            self.graph
                .neighbors_directed(node, Direction::Incoming)
                .next()
                .is_some()
        })
    }

    pub fn set_async(&mut self, module: ModuleId) {
        self.add_module(module);
        self.async_modules.insert(module);
    }

    pub fn is_async(&self, module: ModuleId) -> bool {
        self.async_modules.contains(&module)
    }
}
