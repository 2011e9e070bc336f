//! Export graph: per-module export records and re-export resolution
//!
//! Each module carries an ordered list of [`ExportRecord`]s built by upstream
//! analysis. A record may forward to another module's export (a re-export),
//! so the records form a directed graph that can chain and can cycle. The
//! forwarding edges are mirrored into a petgraph arena for cycle diagnostics,
//! while [`ExportGraph::resolve`] walks the chain with an explicit visited set.

use log::trace;
use petgraph::{
    algo::tarjan_scc,
    graph::{DiGraph, NodeIndex},
    visit::EdgeRef,
};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;

use crate::{
    error::LinkError,
    types::{FxIndexMap, ModuleId},
};


/// Whether an export is known to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProvidedState {
    #[default]
    Provided,
    NotProvided,
    /// Exports could not be enumerated statically (e.g. a dynamic star re-export)
    Unknown,
}

/// How an export is used in one evaluation context
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UsedState {
    Unused,
    Used,
    /// Used, but accessed under a mangled property name
    Renamed(String),
    /// The whole exports object is used
    Namespace,
}

static USED_BY_DEFAULT: UsedState = UsedState::Used;

/// Statically known literal value of an export
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ConstantValue {
    Bool(bool),
    Number(f64),
    String(String),
    #[serde(skip_deserializing)]
    Null,
    #[serde(skip_deserializing)]
    Undefined,
}

impl ConstantValue {
    /// Render the value as a JavaScript literal
    pub fn to_js(&self) -> String {
        match self {
            Self::Bool(value) => value.to_string(),
            Self::Number(value) if value.is_nan() => "NaN".to_owned(),
            Self::Number(value) if value.is_infinite() => {
                if value.is_sign_positive() {
                    "Infinity".to_owned()
                } else {
                    "-Infinity".to_owned()
                }
            }
            Self::Number(value) => value.to_string(),
            Self::String(value) => crate::identifier::string_literal(value),
            Self::Null => "null".to_owned(),
            Self::Undefined => "undefined".to_owned(),
        }
    }
}

/// Forwarding edge of a re-export
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct ExportTarget {
    pub module: ModuleId,
    /// `None` forwards the whole namespace object of `module`
    #[serde(default)]
    pub export: Option<String>,
}

/// A declared or inferred export of a module
#[derive(Debug, Clone)]
pub struct ExportRecord {
    pub name: String,
    pub provided: ProvidedState,
    /// Usage per runtime; a runtime without an entry is treated as used
    pub usage: FxHashMap<String, UsedState>,
    pub target: Option<ExportTarget>,
    pub constant_value: Option<ConstantValue>,
}

impl ExportRecord {
    pub fn new(name: impl Into<String>, provided: ProvidedState) -> Self {
        Self {
            name: name.into(),
            provided,
            usage: FxHashMap::default(),
            target: None,
            constant_value: None,
        }
    }

    /// A locally defined, provided export
    pub fn provided(name: impl Into<String>) -> Self {
        Self::new(name, ProvidedState::Provided)
    }

    #[must_use]
    pub fn with_target(mut self, module: ModuleId, export: Option<&str>) -> Self {
        self.target = Some(ExportTarget {
            module,
            export: export.map(str::to_owned),
        });
        self
    }

    #[must_use]
    pub fn with_constant(mut self, value: ConstantValue) -> Self {
        self.constant_value = Some(value);
        self
    }

    #[must_use]
    pub fn with_usage(mut self, runtime: &str, state: UsedState) -> Self {
        self.usage.insert(runtime.to_owned(), state);
        self
    }

    pub const fn is_reexport(&self) -> bool {
        self.target.is_some()
    }

    pub fn used_state(&self, runtime: &str) -> &UsedState {
        self.usage.get(runtime).unwrap_or(&USED_BY_DEFAULT)
    }

    /// Name under which the export is accessed at runtime, `None` if unused
    pub fn used_name(&self, runtime: &str) -> Option<&str> {
        match self.used_state(runtime) {
            UsedState::Unused => None,
            UsedState::Used | UsedState::Namespace => Some(&self.name),
            UsedState::Renamed(name) => Some(name),
        }
    }
}

/// All exports of one module, in declaration order
#[derive(Debug, Clone)]
pub struct ModuleExports {
    pub module_id: ModuleId,
    /// Human readable module name (e.g. "./src/utils.js")
    pub module_name: String,
    exports: FxIndexMap<String, ExportRecord>,
    /// Provided state of names that have no record
    other_exports: ProvidedState,
}

impl ModuleExports {
    fn new(module_id: ModuleId, module_name: String) -> Self {
        Self {
            module_id,
            module_name,
            exports: FxIndexMap::default(),
            other_exports: ProvidedState::NotProvided,
        }
    }

    /// Exports in declaration order
    pub fn ordered_exports(&self) -> impl Iterator<Item = &ExportRecord> {
        self.exports.values()
    }

    pub fn export(&self, name: &str) -> Option<&ExportRecord> {
        self.exports.get(name)
    }

    pub fn has_export(&self, name: &str) -> bool {
        self.exports.contains_key(name)
    }

    pub const fn other_exports(&self) -> ProvidedState {
        self.other_exports
    }

    /// Provided state of `name`, falling back to the state of unlisted exports
    pub fn provided_state(&self, name: &str) -> ProvidedState {
        self.exports
            .get(name)
            .map_or(self.other_exports, |record| record.provided)
    }
}

/// One (module, export name) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExportRef {
    pub module: ModuleId,
    pub name: String,
}

impl std::fmt::Display for ExportRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.module, self.name)
    }
}

/// Concrete origin of a resolved export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedExport {
    pub module: ModuleId,
    /// `None` when the chain ends at a whole-namespace re-export
    pub export: Option<String>,
}

/// Outcome of walking a re-export chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The chain ends at an export with no further target
    Resolved(ResolvedExport),
    /// A link of the chain is definitely not provided
    NotProvided { at: ExportRef },
    /// A link of the chain has unknown provided state
    Unresolved { at: ExportRef },
    /// The chain revisits a link already on the walk
    Cyclic { at: ExportRef },
}

impl Resolution {
    pub const fn resolved(&self) -> Option<&ResolvedExport> {
        match self {
            Self::Resolved(resolved) => Some(resolved),
            _ => None,
        }
    }
}

/// Export records of every module in the current build pass
#[derive(Debug, Default)]
pub struct ExportGraph {
    modules: FxIndexMap<ModuleId, ModuleExports>,
    /// Mirror of forwarding edges, one node per (module, export)
    arena: DiGraph<ExportRef, ()>,
    nodes: FxHashMap<ExportRef, NodeIndex>,
}

impl ExportGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module; registering an existing id only updates its name
    pub fn add_module(&mut self, module_id: ModuleId, module_name: impl Into<String>) {
        let module_name = module_name.into();
        self.modules
            .entry(module_id)
            .and_modify(|module| module.module_name.clone_from(&module_name))
            .or_insert_with(|| ModuleExports::new(module_id, module_name));
    }

    pub fn module(&self, module_id: ModuleId) -> Option<&ModuleExports> {
        self.modules.get(&module_id)
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleExports> {
        self.modules.values()
    }

    pub fn contains_module(&self, module_id: ModuleId) -> bool {
        self.modules.contains_key(&module_id)
    }

    pub fn export(&self, module_id: ModuleId, name: &str) -> Option<&ExportRecord> {
        self.modules.get(&module_id)?.export(name)
    }

    /// Add or replace an export record of a registered module
    pub fn add_export(
        &mut self,
        module_id: ModuleId,
        record: ExportRecord,
    ) -> Result<(), LinkError> {
        let module = self
            .modules
            .get_mut(&module_id)
            .ok_or(LinkError::UnknownModule(module_id))?;

        let source = ExportRef {
            module: module_id,
            name: record.name.clone(),
        };
        let target = record.target.as_ref().and_then(|target| {
            target.export.as_ref().map(|export| ExportRef {
                module: target.module,
                name: export.clone(),
            })
        });
        module.exports.insert(record.name.clone(), record);

        let source_node = self.node_for(source);
        // a replaced record drops its old forwarding edge
        while let Some(edge) = self.arena.edges(source_node).next().map(|edge| edge.id()) {
            self.arena.remove_edge(edge);
        }
        if let Some(target) = target {
            let target_node = self.node_for(target);
            self.arena.add_edge(source_node, target_node, ());
        }
        Ok(())
    }

    /// Set the provided state of exports that have no record
    pub fn set_other_exports(
        &mut self,
        module_id: ModuleId,
        state: ProvidedState,
    ) -> Result<(), LinkError> {
        let module = self
            .modules
            .get_mut(&module_id)
            .ok_or(LinkError::UnknownModule(module_id))?;
        module.other_exports = state;
        Ok(())
    }

    fn node_for(&mut self, export: ExportRef) -> NodeIndex {
        if let Some(&node) = self.nodes.get(&export) {
            return node;
        }
        let node = self.arena.add_node(export.clone());
        self.nodes.insert(export, node);
        node
    }

    /// Follow the re-export chain starting at `module.name` to its origin
    ///
    /// A module that is not part of the graph (for example an external) is
    /// opaque: any export of it is taken as a concrete origin.
    pub fn resolve(&self, module: ModuleId, name: &str) -> Resolution {
        let mut visited: FxHashSet<(ModuleId, &str)> = FxHashSet::default();
        let mut current_module = module;
        let mut current_name = name;

        loop {
            let at = || ExportRef {
                module: current_module,
                name: current_name.to_owned(),
            };
            if !visited.insert((current_module, current_name)) {
                trace!("Re-export chain from {module}:{name} is cyclic at {}", at());
                return Resolution::Cyclic { at: at() };
            }

            let Some(module_exports) = self.modules.get(&current_module) else {
                return Resolution::Resolved(ResolvedExport {
                    module: current_module,
                    export: Some(current_name.to_owned()),
                });
            };

            match module_exports.provided_state(current_name) {
                ProvidedState::Provided => {}
                ProvidedState::NotProvided => return Resolution::NotProvided { at: at() },
                ProvidedState::Unknown => return Resolution::Unresolved { at: at() },
            }

            let target = module_exports
                .export(current_name)
                .and_then(|record| record.target.as_ref());
            match target {
                None => {
                    return Resolution::Resolved(ResolvedExport {
                        module: current_module,
                        export: Some(current_name.to_owned()),
                    });
                }
                Some(ExportTarget {
                    module: target_module,
                    export: None,
                }) => {
                    return Resolution::Resolved(ResolvedExport {
                        module: *target_module,
                        export: None,
                    });
                }
                Some(ExportTarget {
                    module: target_module,
                    export: Some(target_name),
                }) => {
                    current_module = *target_module;
                    current_name = target_name.as_str();
                }
            }
        }
    }

    /// Groups of exports that forward to each other in a cycle
    pub fn reexport_cycles(&self) -> Vec<Vec<ExportRef>> {
        tarjan_scc(&self.arena)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&node| self.arena.contains_edge(node, node))
            })
            .map(|component| {
                let mut cycle: Vec<ExportRef> = component
                    .into_iter()
                    .map(|node| self.arena[node].clone())
                    .collect();
                cycle.sort_by(|a, b| a.module.cmp(&b.module).then_with(|| a.name.cmp(&b.name)));
                cycle
            })
            .collect()
    }
}
