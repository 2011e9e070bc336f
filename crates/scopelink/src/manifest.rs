//! Link manifest: the facts upstream analysis hands to the linker
//!
//! The manifest is a TOML document describing modules, their exports and
//! top-level declarations, module dependencies, chunks, and which modules
//! form the concatenation:
//!
//! ```toml
//! root = 0
//! members = [0, 1]
//!
//! [[modules]]
//! id = 0
//! name = "./index.js"
//! top-level-declarations = ["value"]
//!
//! [[modules.exports]]
//! name = "value"
//!
//! [[modules.exports]]
//! name = "helper"
//! target = { module = 1, export = "helper" }
//! ```

use std::{fs, path::Path};

use anyhow::{Context, Result};
use log::debug;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::{
    build_pass::{BuildPass, LinkedLibrary},
    chunk_graph::Chunk,
    codegen::ExternalImportFragment,
    concatenation::NameExpr,
    config::LinkConfig,
    export_graph::{ConstantValue, ExportRecord, ExportTarget, ProvidedState, UsedState},
    types::{ChunkId, FxIndexMap, ModuleId},
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Manifest {
    /// Module whose interface is rendered
    pub root: ModuleId,
    /// Modules merged into one scope with the root; empty links the root alone
    #[serde(default)]
    pub members: Vec<ModuleId>,
    #[serde(default)]
    pub modules: Vec<ModuleManifest>,
    #[serde(default)]
    pub chunks: Vec<ChunkManifest>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ModuleManifest {
    pub id: ModuleId,
    pub name: String,
    /// Top-level await, directly or through a dependency
    #[serde(default, rename = "async")]
    pub is_async: bool,
    /// Modules this module imports
    #[serde(default)]
    pub dependencies: Vec<ModuleId>,
    #[serde(default = "not_provided")]
    pub other_exports: ProvidedState,
    #[serde(default)]
    pub exports: Vec<ExportManifest>,
    #[serde(default)]
    pub top_level_declarations: Vec<String>,
    /// Export name -> local declaration, when they differ
    #[serde(default)]
    pub local_exports: FxIndexMap<String, String>,
    /// Precomputed export definitions, for modules concatenated elsewhere
    #[serde(default)]
    pub exports_final_name: Option<FxIndexMap<String, NameExpr>>,
    #[serde(default)]
    pub external_imports: Vec<ExternalImportManifest>,
}

const fn not_provided() -> ProvidedState {
    ProvidedState::NotProvided
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ExportManifest {
    pub name: String,
    #[serde(default)]
    pub provided: ProvidedState,
    /// Usage per runtime; missing runtimes count as used
    #[serde(default)]
    pub usage: FxHashMap<String, UsedState>,
    pub target: Option<ExportTarget>,
    pub constant: Option<ConstantValue>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ExternalImportManifest {
    pub request: String,
    /// Imported specifier -> local binding
    #[serde(default)]
    pub imports: FxIndexMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ChunkManifest {
    pub id: ChunkId,
    pub name: Option<String>,
    #[serde(default)]
    pub has_runtime: bool,
    #[serde(default)]
    pub entry_modules: Vec<ModuleId>,
    #[serde(default)]
    pub modules: Vec<ModuleId>,
}

impl Manifest {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse link manifest")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("Invalid manifest {}", path.display()))
    }

    /// Populate a build pass with the default plugins registered
    pub fn build_pass(&self, config: LinkConfig) -> Result<BuildPass> {
        let mut pass = BuildPass::with_default_plugins(config);
        self.populate(&mut pass)?;
        Ok(pass)
    }

    /// Load every module and chunk into `pass`
    pub fn populate(&self, pass: &mut BuildPass) -> Result<()> {
        // register every module first so export targets may point forward
        for module in &self.modules {
            pass.export_graph.add_module(module.id, module.name.clone());
            pass.module_graph.add_module(module.id);
        }

        let runtime = pass.runtime().to_owned();
        for module in &self.modules {
            module
                .populate(pass, &runtime)
                .with_context(|| format!("Failed to load module {} ({})", module.id, module.name))?;
        }

        for chunk in &self.chunks {
            pass.chunk_graph.add_chunk(chunk.to_chunk());
        }

        debug!(
            "Loaded manifest: {} modules, {} chunks",
            self.modules.len(),
            self.chunks.len()
        );
        Ok(())
    }

    /// Build a pass from the manifest and link its root
    pub fn link(&self, config: LinkConfig) -> Result<LinkedLibrary> {
        let mut pass = self.build_pass(config)?;
        pass.link_library(self.root, &self.members)
    }
}

impl ModuleManifest {
    fn populate(&self, pass: &mut BuildPass, runtime: &str) -> Result<()> {
        pass.export_graph.set_other_exports(self.id, self.other_exports)?;
        for export in &self.exports {
            pass.export_graph.add_export(self.id, export.to_record())?;
        }

        for &dependency in &self.dependencies {
            pass.module_graph.add_dependency(self.id, dependency);
        }
        if self.is_async {
            pass.module_graph.set_async(self.id);
        }

        let data = pass.codegen_results.get_or_insert(self.id, runtime);
        data.top_level_declarations
            .extend(self.top_level_declarations.iter().cloned());
        data.local_exports.clone_from(&self.local_exports);
        data.exports_final_name.clone_from(&self.exports_final_name);
        data.external_imports = self
            .external_imports
            .iter()
            .map(ExternalImportManifest::to_fragment)
            .collect();
        Ok(())
    }
}

impl ExportManifest {
    fn to_record(&self) -> ExportRecord {
        let mut record = ExportRecord::new(self.name.clone(), self.provided);
        record.usage.clone_from(&self.usage);
        record.target.clone_from(&self.target);
        record.constant_value.clone_from(&self.constant);
        record
    }
}

impl ExternalImportManifest {
    fn to_fragment(&self) -> ExternalImportFragment {
        self.imports.iter().fold(
            ExternalImportFragment::new(self.request.clone()),
            |fragment, (specifier, local)| fragment.with_import(specifier.clone(), local.clone()),
        )
    }
}

impl ChunkManifest {
    fn to_chunk(&self) -> Chunk {
        let mut chunk = Chunk::new(self.id);
        chunk.name.clone_from(&self.name);
        chunk.has_runtime = self.has_runtime;
        chunk.modules.extend(self.modules.iter().copied());
        for &module in &self.entry_modules {
            chunk.add_entry_module(module);
        }
        chunk
    }
}
