//! The link pass
//!
//! A [`BuildPass`] owns everything the linker reads: the export graph, the
//! module and chunk graphs, per-module code generation facts, the registered
//! hooks and the configuration. Components never construct these on their
//! own; they are handed the pass.

use anyhow::Result;
use log::{debug, info, warn};

use crate::{
    chunk_graph::ChunkGraph,
    codegen::CodeGenerationResults,
    concatenation::{ConcatenationUnit, NameExpr},
    config::LinkConfig,
    export_graph::ExportGraph,
    externals::ExternalsInterop,
    hooks::LinkHooks,
    library::ModuleLibrary,
    module_graph::ModuleGraph,
    types::{FxIndexMap, ModuleId},
};

#[derive(Debug)]
pub struct BuildPass {
    pub export_graph: ExportGraph,
    pub module_graph: ModuleGraph,
    pub chunk_graph: ChunkGraph,
    pub codegen_results: CodeGenerationResults,
    pub hooks: LinkHooks,
    pub config: LinkConfig,
}

/// Output of linking one library entry
#[derive(Debug, Clone)]
pub struct LinkedLibrary {
    pub root: ModuleId,
    /// External imports followed by the module interface
    pub code: String,
    /// Final expression per used export name of the root
    pub exports_final_name: FxIndexMap<String, NameExpr>,
    pub wrapper_omittable: bool,
    /// Whether a raw export map tap rewrote anything
    pub raw_export_maps_changed: bool,
    /// Digest of the concatenation, `None` when nothing was concatenated
    pub content_hash: Option<String>,
}

impl BuildPass {
    /// An empty pass without any registered taps
    pub fn new(config: LinkConfig) -> Self {
        Self {
            export_graph: ExportGraph::new(),
            module_graph: ModuleGraph::new(),
            chunk_graph: ChunkGraph::new(),
            codegen_results: CodeGenerationResults::new(),
            hooks: LinkHooks::new(),
            config,
        }
    }

    /// A pass with module library output and external interop registered
    pub fn with_default_plugins(config: LinkConfig) -> Self {
        let mut pass = Self::new(config);
        ExternalsInterop::apply(&mut pass.hooks);
        ModuleLibrary::apply(&mut pass.hooks);
        pass
    }

    /// Runtime used for used-name lookups
    pub fn runtime(&self) -> &str {
        &self.config.output.runtime
    }

    /// Link `members` rooted at `root` and render the root's public interface
    ///
    /// With no members the root is rendered on its own: every export is read
    /// from the runtime exports object.
    pub fn link_library(&mut self, root: ModuleId, members: &[ModuleId]) -> Result<LinkedLibrary> {
        let library = ModuleLibrary::parse_options(&self.config.library)?;
        library.bind(root, self)?;

        for cycle in self.export_graph.reexport_cycles() {
            let names: Vec<String> = cycle.iter().map(ToString::to_string).collect();
            warn!("Re-export cycle: {}", names.join(" -> "));
        }

        let unit = if members.is_empty() {
            None
        } else {
            Some(ConcatenationUnit::build(self, root, members.iter().copied())?)
        };

        let mut code = String::new();
        let mut exports_final_name = FxIndexMap::default();
        if let Some(unit) = &unit {
            exports_final_name = unit.exports_final_name(self);
            self.publish(unit, &exports_final_name);
            for module in unit.members().iter() {
                if let Some(member) = unit.member_info(*module) {
                    for fragment in &member.external_imports {
                        code.push_str(&fragment.render());
                    }
                }
            }
        } else if let Some(data) = self.codegen_results.get(root, self.runtime()) {
            for fragment in &data.external_imports {
                code.push_str(&fragment.render());
            }
        }

        let context = library.plan(root, self, unit.as_ref())?;
        code.push_str(&context.render());
        info!(
            "Linked {root}: {} exports, wrapper {}",
            context.resolved_exports.len(),
            if context.wrapper_omittable {
                "omitted"
            } else {
                "kept"
            }
        );

        Ok(LinkedLibrary {
            root,
            code,
            exports_final_name,
            wrapper_omittable: context.wrapper_omittable,
            raw_export_maps_changed: unit.as_ref().is_some_and(ConcatenationUnit::is_dirty),
            content_hash: unit.as_ref().map(ConcatenationUnit::content_hash),
        })
    }

    /// Record the linking results in the code generation side tables
    fn publish(&mut self, unit: &ConcatenationUnit, definitions: &FxIndexMap<String, NameExpr>) {
        let runtime = self.runtime().to_owned();
        self.codegen_results
            .get_or_insert(unit.root(), &runtime)
            .exports_final_name = Some(definitions.clone());

        for module in unit.members().iter() {
            if let Some(member) = unit.member_info(*module) {
                self.codegen_results
                    .get_or_insert(*module, &runtime)
                    .external_imports
                    .clone_from(&member.external_imports);
            }
        }
        debug!(
            "Published {} export definitions for {}",
            definitions.len(),
            unit.root()
        );
    }
}
