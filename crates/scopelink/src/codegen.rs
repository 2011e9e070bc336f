//! Per-module code generation side tables
//!
//! Code generation of individual modules happens upstream. The linker only
//! consults the few facts it needs from it: which top-level bindings a module
//! declares, under which expression each export ends up after concatenation,
//! and the external imports the module's code relies on.

use rustc_hash::FxHashMap;

use crate::{
    concatenation::NameExpr,
    identifier::{export_specifier_name, string_literal},
    types::{FxIndexMap, FxIndexSet, ModuleId},
};

/// Import of bindings from an external module, emitted ahead of module code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalImportFragment {
    /// Module request as written in the output, e.g. "node:fs"
    pub request: String,
    /// Imported specifier and the local name it is bound to
    pub imported: Vec<(String, String)>,
}

impl ExternalImportFragment {
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            imported: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_import(mut self, specifier: impl Into<String>, local: impl Into<String>) -> Self {
        self.imported.push((specifier.into(), local.into()));
        self
    }

    pub fn render(&self) -> String {
        let request = string_literal(&self.request);
        if self.imported.is_empty() {
            return format!("import {request};\n");
        }
        let specifiers: Vec<String> = self
            .imported
            .iter()
            .map(|(specifier, local)| {
                if specifier == local {
                    local.clone()
                } else {
                    format!("{} as {local}", export_specifier_name(specifier))
                }
            })
            .collect();
        format!("import {{ {} }} from {request};\n", specifiers.join(", "))
    }
}

/// Generated-code facts about one module in one runtime
#[derive(Debug, Clone, Default)]
pub struct CodeGenerationData {
    /// Names the module's code declares at top level
    pub top_level_declarations: FxIndexSet<String>,
    /// Export name -> local declaration backing it, when the two differ
    pub local_exports: FxIndexMap<String, String>,
    /// Final expression per used export name, set once the module is concatenated
    pub exports_final_name: Option<FxIndexMap<String, NameExpr>>,
    pub external_imports: Vec<ExternalImportFragment>,
}

#[derive(Debug, Default)]
pub struct CodeGenerationResults {
    results: FxHashMap<(ModuleId, String), CodeGenerationData>,
}

impl CodeGenerationResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, module: ModuleId, runtime: &str) -> Option<&CodeGenerationData> {
        self.results.get(&(module, runtime.to_owned()))
    }

    pub fn get_or_insert(&mut self, module: ModuleId, runtime: &str) -> &mut CodeGenerationData {
        self.results
            .entry((module, runtime.to_owned()))
            .or_default()
    }
}
