//! Module library output: the public interface of a linked module
//!
//! For the designated module this renders the native `export` statements
//! that expose its exports. Exports whose final binding is a plain
//! identifier are collected into one `export { ... };` list; exports bound to
//! an arbitrary expression get a standalone `export const name = expr;`.
//!
//! It also answers whether the module's scope wrapper can be dropped, which
//! is registered as an exports-definitions tap.

use anyhow::Result;
use log::{debug, trace};

use crate::{
    build_pass::BuildPass,
    concatenation::{ConcatenationUnit, NameExpr},
    config::LibraryOptions,
    error::LinkError,
    export_graph::{ConstantValue, ExportRecord, ProvidedState, Resolution},
    hooks::{ExportsDefinitionsTap, LinkHooks},
    identifier::{export_specifier_name, is_identifier, property_access, to_identifier},
    name_allocator::NameAllocator,
    types::{DEFAULT_EXPORT, FxIndexMap, ModuleId, runtime_globals},
};

#[cfg(test)]
mod tests;

/// `const alias = init;`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasDeclaration {
    pub name: String,
    pub init: String,
}

/// Entry of the compact export list: `local as exported`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShorthandExport {
    pub local: String,
    pub exported: String,
}

impl ShorthandExport {
    fn render(&self) -> String {
        if self.local == self.exported && is_identifier(&self.exported) {
            self.local.clone()
        } else {
            format!("{} as {}", self.local, export_specifier_name(&self.exported))
        }
    }
}

/// Standalone `export const exported = expr;`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerboseExport {
    pub exported: String,
    pub expr: String,
}

/// Per-render state for one module's interface
#[derive(Debug, Clone)]
pub struct LibraryRenderContext {
    pub module: ModuleId,
    /// The module evaluates asynchronously; its exports object must be awaited
    pub is_async: bool,
    pub declaration_keyword: &'static str,
    /// Exports that made it into the interface with their final binding
    pub resolved_exports: Vec<(String, NameExpr)>,
    pub declarations: Vec<AliasDeclaration>,
    pub shorthand: Vec<ShorthandExport>,
    pub verbose: Vec<VerboseExport>,
    /// The surrounding code may omit the module's scope wrapper
    pub wrapper_omittable: bool,
}

impl LibraryRenderContext {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let keyword = self.declaration_keyword;
        if self.is_async {
            out.push_str(&format!(
                "{exports} = await {exports};\n",
                exports = runtime_globals::EXPORTS
            ));
        }
        for declaration in &self.declarations {
            out.push_str(&format!(
                "{keyword} {} = {};\n",
                declaration.name, declaration.init
            ));
        }
        if !self.shorthand.is_empty() {
            let list: Vec<String> = self.shorthand.iter().map(ShorthandExport::render).collect();
            out.push_str(&format!("export {{ {} }};\n", list.join(", ")));
        }
        for export in &self.verbose {
            out.push_str(&format!(
                "export {keyword} {} = {};\n",
                export.exported, export.expr
            ));
        }
        out
    }
}

/// Library type that renders the root module's exports as ESM exports
#[derive(Debug, Clone, Default)]
pub struct ModuleLibrary {
    /// Single export to expose instead of the whole interface
    export: Option<String>,
}

impl ModuleLibrary {
    /// Validate library options; a module library cannot have a name
    pub fn parse_options(options: &LibraryOptions) -> Result<Self, LinkError> {
        if let Some(name) = &options.name {
            return Err(LinkError::InvalidLibraryOption(format!(
                "library name must be unset for module output (got '{name}'); the exports of \
                 the entry module are the library"
            )));
        }
        Ok(Self {
            export: options
                .export
                .as_ref()
                .and_then(|export| export.first())
                .map(str::to_owned),
        })
    }

    pub fn export(&self) -> Option<&str> {
        self.export.as_deref()
    }

    /// Check that the options fit `module`
    pub fn bind(&self, module: ModuleId, pass: &BuildPass) -> Result<(), LinkError> {
        let exports = pass
            .export_graph
            .module(module)
            .ok_or(LinkError::UnknownModule(module))?;
        if let Some(export) = &self.export
            && !exports.has_export(export)
        {
            return Err(LinkError::UnknownExport {
                module,
                export: export.clone(),
            });
        }
        Ok(())
    }

    /// Register the wrapper-omission check on the build pass hooks
    pub fn apply(hooks: &mut LinkHooks) {
        hooks.tap_exports_definitions(ModuleLibraryInlineCheck);
    }

    /// Append the interface of `module` to `source`
    pub fn render_startup(
        &self,
        source: &str,
        module: ModuleId,
        pass: &BuildPass,
        unit: Option<&ConcatenationUnit>,
    ) -> Result<String> {
        let context = self.plan(module, pass, unit)?;
        Ok(format!("{source}{}", context.render()))
    }

    /// Decide, per export, how it appears in the interface
    pub fn plan(
        &self,
        module: ModuleId,
        pass: &BuildPass,
        unit: Option<&ConcatenationUnit>,
    ) -> Result<LibraryRenderContext> {
        let exports = pass
            .export_graph
            .module(module)
            .ok_or(LinkError::UnknownModule(module))?;
        let records: Vec<&ExportRecord> = match &self.export {
            Some(name) => exports.export(name).into_iter().collect(),
            None => exports.ordered_exports().collect(),
        };

        let empty = FxIndexMap::default();
        let codegen = pass.codegen_results.get(module, pass.runtime());
        let definitions = codegen
            .and_then(|data| data.exports_final_name.as_ref())
            .unwrap_or(&empty);

        let mut planner = ExportPlanner {
            pass,
            module,
            definitions,
            allocator: Self::allocator_for(module, pass, unit),
            context: LibraryRenderContext {
                module,
                is_async: pass.module_graph.is_async(module),
                declaration_keyword: pass.config.output.environment.declaration_keyword(),
                resolved_exports: Vec::new(),
                declarations: Vec::new(),
                shorthand: Vec::new(),
                verbose: Vec::new(),
                wrapper_omittable: false,
            },
        };
        for record in records {
            planner.plan_export(record)?;
        }

        let mut context = planner.context;
        if unit.is_some() {
            context.wrapper_omittable = pass
                .hooks
                .call_exports_definitions(definitions, module, pass)
                .unwrap_or(false);
        }
        Ok(context)
    }

    fn allocator_for(
        module: ModuleId,
        pass: &BuildPass,
        unit: Option<&ConcatenationUnit>,
    ) -> NameAllocator {
        if let Some(unit) = unit {
            return unit.allocator().clone();
        }
        let mut allocator = NameAllocator::with_reserved([runtime_globals::EXPORTS]);
        if let Some(data) = pass.codegen_results.get(module, pass.runtime()) {
            for declaration in &data.top_level_declarations {
                allocator.reserve(declaration.clone());
            }
            for fragment in &data.external_imports {
                for (_, local) in &fragment.imported {
                    allocator.reserve(local.clone());
                }
            }
        }
        allocator
    }
}

struct ExportPlanner<'a> {
    pass: &'a BuildPass,
    module: ModuleId,
    definitions: &'a FxIndexMap<String, NameExpr>,
    allocator: NameAllocator,
    context: LibraryRenderContext,
}

impl ExportPlanner<'_> {
    fn plan_export(&mut self, record: &ExportRecord) -> Result<()> {
        let original = record.name.as_str();
        if record.provided != ProvidedState::Provided {
            trace!("Skipping export '{original}': not provided");
            return Ok(());
        }
        if self.is_dangling(record) {
            return Ok(());
        }
        let Some(used_name) = record.used_name(self.pass.runtime()) else {
            trace!("Skipping export '{original}': unused");
            return Ok(());
        };

        let final_name = match self.definitions.get(used_name) {
            Some(definition) => definition.clone(),
            None => {
                let init = record.constant_value.as_ref().map_or_else(
                    || format!("{}{}", runtime_globals::EXPORTS, property_access(&[used_name])),
                    ConstantValue::to_js,
                );
                NameExpr::Identifier(self.declare_alias(original, init)?)
            }
        };
        self.context
            .resolved_exports
            .push((original.to_owned(), final_name.clone()));

        match final_name {
            NameExpr::Identifier(local) => self.context.shorthand.push(ShorthandExport {
                local,
                exported: original.to_owned(),
            }),
            NameExpr::Expression(expr) => self.plan_expression_export(original, expr)?,
        }
        Ok(())
    }

    /// A re-export whose chain does not end at a provided export
    fn is_dangling(&self, record: &ExportRecord) -> bool {
        match self.pass.export_graph.resolve(self.module, &record.name) {
            Resolution::Resolved(_) => false,
            Resolution::NotProvided { at } if at.name == DEFAULT_EXPORT => false,
            other => {
                debug!(
                    "Omitting export '{}' of {}: {other:?}",
                    record.name, self.module
                );
                true
            }
        }
    }

    fn plan_expression_export(&mut self, original: &str, expr: String) -> Result<()> {
        // `export const <name>` needs a name that is free in the whole scope
        // and writable as a binding
        if self.allocator.is_taken(original) || !is_identifier(original) {
            let local = self.declare_alias(original, expr)?;
            self.context.shorthand.push(ShorthandExport {
                local,
                exported: original.to_owned(),
            });
        } else {
            self.allocator.reserve(original);
            self.context.verbose.push(VerboseExport {
                exported: original.to_owned(),
                expr,
            });
        }
        Ok(())
    }

    fn declare_alias(&mut self, original: &str, init: String) -> Result<String> {
        let preferred = format!("{}{}", runtime_globals::EXPORTS, to_identifier(original));
        let name = self.allocator.allocate(&preferred)?;
        self.context.declarations.push(AliasDeclaration {
            name: name.clone(),
            init,
        });
        Ok(name)
    }
}

/// Exports-definitions tap contributed by the module library
#[derive(Debug, Clone, Copy)]
pub struct ModuleLibraryInlineCheck;

impl ExportsDefinitionsTap for ModuleLibraryInlineCheck {
    fn name(&self) -> &str {
        "ModuleLibraryPlugin"
    }

    fn evaluate(
        &self,
        _definitions: &FxIndexMap<String, NameExpr>,
        module: ModuleId,
        pass: &BuildPass,
    ) -> Option<bool> {
        Some(can_inline_exports_definitions(module, pass))
    }
}

/// Whether `module`'s scope wrapper can be omitted in the current chunk graph
///
/// The wrapper stays when an inline bailout tap objects, when any other module
/// imports `module` directly, or when a chunk containing it lacks its own
/// runtime or has more than one entry module.
pub fn can_inline_exports_definitions(module: ModuleId, pass: &BuildPass) -> bool {
    if let Some(reason) = pass.hooks.call_inline_in_runtime_bailout(module, pass) {
        debug!("Keeping wrapper of {module}: {reason}");
        return false;
    }

    if pass.module_graph.has_incoming_module_connections(module) {
        debug!("Keeping wrapper of {module}: imported by other modules");
        return false;
    }

    for chunk in pass.chunk_graph.module_chunks(module) {
        if !chunk.has_runtime || pass.chunk_graph.number_of_entry_modules(chunk.id) > 1 {
            debug!(
                "Keeping wrapper of {module}: chunk {} needs it",
                chunk.id.as_u32()
            );
            return false;
        }
    }

    true
}
