//! Concatenation unit: modules merged into one lexical scope
//!
//! Building a unit does three things, in order:
//! 1. every member's top-level declarations and import bindings get a name
//!    in the merged scope
//! 2. every provided export of every member gets a raw export map entry,
//!    re-exports being resolved to the binding of their origin
//! 3. the raw export map taps registered on the build pass run per member
//!
//! After that the unit is only read.

use std::fmt;

use anyhow::{Result, bail};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    build_pass::BuildPass,
    codegen::ExternalImportFragment,
    error::LinkError,
    export_graph::{ExportRecord, ProvidedState, Resolution},
    identifier::{property_access, to_identifier},
    name_allocator::NameAllocator,
    ordered_set::OrderedSet,
    types::{FxIndexMap, FxIndexSet, ModuleId, runtime_globals},
};


/// What an export name refers to in the merged scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NameExpr {
    /// A plain binding, e.g. `helper_1`
    Identifier(String),
    /// Any other expression, e.g. `ns.helper` or `getValue()`
    Expression(String),
}

impl NameExpr {
    pub fn identifier(name: impl Into<String>) -> Self {
        Self::Identifier(name.into())
    }

    pub fn expression(text: impl Into<String>) -> Self {
        Self::Expression(text.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Identifier(text) | Self::Expression(text) => text,
        }
    }

    pub const fn is_identifier(&self) -> bool {
        matches!(self, Self::Identifier(_))
    }
}

impl fmt::Display for NameExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Original export name -> expression in the merged scope
pub type RawExportMap = FxIndexMap<String, NameExpr>;

/// Linking state of one member of a unit
#[derive(Debug, Clone)]
pub struct MemberInfo {
    pub module: ModuleId,
    /// Position in the unit's member order
    pub index: usize,
    pub raw_export_map: RawExportMap,
    /// Top-level declaration or import binding -> name in the merged scope
    pub internal_names: FxIndexMap<String, String>,
    /// Binding of the member's namespace object, allocated on first use
    pub namespace_object_name: Option<String>,
    pub external_imports: Vec<ExternalImportFragment>,
}

impl MemberInfo {
    fn new(module: ModuleId, index: usize) -> Self {
        Self {
            module,
            index,
            raw_export_map: RawExportMap::default(),
            internal_names: FxIndexMap::default(),
            namespace_object_name: None,
            external_imports: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct ConcatenationUnit {
    root: ModuleId,
    runtime: String,
    members: OrderedSet<ModuleId>,
    infos: FxIndexMap<ModuleId, MemberInfo>,
    allocator: NameAllocator,
    /// Namespace bindings of modules referenced from the unit but not merged
    external_namespaces: FxIndexMap<ModuleId, String>,
    /// Whether any tap rewrote a raw export map
    dirty: bool,
}

impl ConcatenationUnit {
    /// Build the unit for `members` (deduplicated, order preserved) rooted at `root`
    pub fn build(
        pass: &BuildPass,
        root: ModuleId,
        members: impl IntoIterator<Item = ModuleId>,
    ) -> Result<Self> {
        let members: OrderedSet<ModuleId> = members.into_iter().collect();
        if !members.contains(&root) {
            bail!("root module {root} is not a member of the concatenation");
        }
        for &member in members.iter() {
            if !pass.export_graph.contains_module(member) {
                return Err(LinkError::UnknownModule(member).into());
            }
        }

        let mut allocator = NameAllocator::new();
        allocator.reserve(runtime_globals::EXPORTS);

        let mut unit = Self {
            root,
            runtime: pass.runtime().to_owned(),
            infos: members
                .iter()
                .enumerate()
                .map(|(index, &module)| (module, MemberInfo::new(module, index)))
                .collect(),
            members,
            allocator,
            external_namespaces: FxIndexMap::default(),
            dirty: false,
        };

        unit.allocate_top_level_names(pass)?;
        unit.populate_raw_export_maps(pass)?;
        unit.run_raw_export_map_taps(pass)?;

        debug!(
            "Built concatenation of {} modules rooted at {root} ({} names allocated)",
            unit.members.len(),
            unit.allocator.global_names().len()
        );
        Ok(unit)
    }

    fn allocate_top_level_names(&mut self, pass: &BuildPass) -> Result<()> {
        for info in self.infos.values_mut() {
            let Some(data) = pass.codegen_results.get(info.module, &self.runtime) else {
                continue;
            };
            for declaration in &data.top_level_declarations {
                let name = self.allocator.allocate(declaration)?;
                info.internal_names.insert(declaration.clone(), name);
            }
            // import bindings live in the merged scope as well
            for fragment in &data.external_imports {
                for (_, local) in &fragment.imported {
                    if !info.internal_names.contains_key(local) {
                        let name = self.allocator.allocate(local)?;
                        info.internal_names.insert(local.clone(), name);
                    }
                }
            }
            info.external_imports.clone_from(&data.external_imports);
        }
        Ok(())
    }

    fn populate_raw_export_maps(&mut self, pass: &BuildPass) -> Result<()> {
        // locals first, so re-exports can point at their origin's binding
        let mut locals: FxIndexMap<ModuleId, RawExportMap> = FxIndexMap::default();
        let members: Vec<ModuleId> = self.members.serialize();
        for &member in &members {
            let mut map = RawExportMap::default();
            for record in self.linkable_exports(pass, member) {
                if !record.is_reexport() {
                    let expr = self.local_binding(pass, member, record)?;
                    map.insert(record.name.clone(), expr);
                }
            }
            locals.insert(member, map);
        }

        for &member in &members {
            let mut map = RawExportMap::default();
            for record in self.linkable_exports(pass, member) {
                let expr = if record.is_reexport() {
                    self.reexport_binding(pass, member, record, &locals)?
                } else {
                    locals[&member].get(&record.name).cloned()
                };
                if let Some(expr) = expr {
                    map.insert(record.name.clone(), expr);
                }
            }
            if let Some(info) = self.infos.get_mut(&member) {
                info.raw_export_map = map;
            }
        }
        Ok(())
    }

    /// Provided, used exports of `member` in declaration order
    fn linkable_exports<'p>(
        &self,
        pass: &'p BuildPass,
        member: ModuleId,
    ) -> Vec<&'p ExportRecord> {
        pass.export_graph
            .module(member)
            .map(|module| {
                module
                    .ordered_exports()
                    .filter(|record| record.provided == ProvidedState::Provided)
                    .filter(|record| record.used_name(&self.runtime).is_some())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn local_binding(
        &mut self,
        pass: &BuildPass,
        member: ModuleId,
        record: &ExportRecord,
    ) -> Result<NameExpr> {
        let local = pass
            .codegen_results
            .get(member, &self.runtime)
            .and_then(|data| data.local_exports.get(&record.name))
            .unwrap_or(&record.name);
        // reuse the declaration the module already has instead of aliasing it
        if let Some(name) = self.infos[&member].internal_names.get(local) {
            return Ok(NameExpr::identifier(name.clone()));
        }
        let name = self.allocator.allocate(&record.name)?;
        trace!("Allocated '{name}' for export '{}' of {member}", record.name);
        Ok(NameExpr::Identifier(name))
    }

    fn reexport_binding(
        &mut self,
        pass: &BuildPass,
        member: ModuleId,
        record: &ExportRecord,
        locals: &FxIndexMap<ModuleId, RawExportMap>,
    ) -> Result<Option<NameExpr>> {
        let resolved = match pass.export_graph.resolve(member, &record.name) {
            Resolution::Resolved(resolved) => resolved,
            other => {
                debug!(
                    "Export '{}' of {member} is not linked: {other:?}",
                    record.name
                );
                return Ok(None);
            }
        };

        let origin = resolved.module;
        let expr = match (resolved.export, self.members.contains(&origin)) {
            (Some(export), true) => locals
                .get(&origin)
                .and_then(|map| map.get(&export))
                .cloned(),
            (Some(export), false) => {
                let namespace = self.external_namespace(pass, origin)?;
                let used = pass
                    .export_graph
                    .export(origin, &export)
                    .and_then(|origin_record| origin_record.used_name(&self.runtime))
                    .unwrap_or(export.as_str())
                    .to_owned();
                Some(NameExpr::expression(format!(
                    "{namespace}{}",
                    property_access(&[used])
                )))
            }
            (None, true) => Some(NameExpr::Identifier(self.namespace_object(pass, origin)?)),
            (None, false) => Some(NameExpr::Identifier(self.external_namespace(pass, origin)?)),
        };
        Ok(expr)
    }

    fn namespace_object(&mut self, pass: &BuildPass, module: ModuleId) -> Result<String> {
        if let Some(name) = &self.infos[&module].namespace_object_name {
            return Ok(name.clone());
        }
        let name = self
            .allocator
            .allocate(&format!("{}_namespaceObject", module_base_name(pass, module)))?;
        if let Some(info) = self.infos.get_mut(&module) {
            info.namespace_object_name = Some(name.clone());
        }
        Ok(name)
    }

    fn external_namespace(&mut self, pass: &BuildPass, module: ModuleId) -> Result<String> {
        if let Some(name) = self.external_namespaces.get(&module) {
            return Ok(name.clone());
        }
        let name = self
            .allocator
            .allocate(&format!("{}_namespace", module_base_name(pass, module)))?;
        self.external_namespaces.insert(module, name.clone());
        Ok(name)
    }

    fn run_raw_export_map_taps(&mut self, pass: &BuildPass) -> Result<()> {
        for info in self.infos.values_mut() {
            let raw_export_map = info.raw_export_map.clone();
            let outcome =
                pass.hooks
                    .call_concatenated_module_info(info.module, raw_export_map, info)?;
            info.raw_export_map = outcome.raw_export_map;
            self.dirty |= outcome.changed;
        }
        Ok(())
    }

    pub const fn root(&self) -> ModuleId {
        self.root
    }

    pub fn runtime(&self) -> &str {
        &self.runtime
    }

    pub const fn members(&self) -> &OrderedSet<ModuleId> {
        &self.members
    }

    pub fn member_info(&self, module: ModuleId) -> Option<&MemberInfo> {
        self.infos.get(&module)
    }

    pub fn raw_export_map(&self, module: ModuleId) -> Option<&RawExportMap> {
        self.infos.get(&module).map(|info| &info.raw_export_map)
    }

    pub fn external_namespaces(&self) -> &FxIndexMap<ModuleId, String> {
        &self.external_namespaces
    }

    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn global_names(&self) -> &FxIndexSet<String> {
        self.allocator.global_names()
    }

    /// Allocator state after linking, for callers that need more names in this scope
    pub const fn allocator(&self) -> &NameAllocator {
        &self.allocator
    }

    /// The root's raw export map keyed by used export name
    pub fn exports_final_name(&self, pass: &BuildPass) -> FxIndexMap<String, NameExpr> {
        let Some(raw_export_map) = self.raw_export_map(self.root) else {
            return FxIndexMap::default();
        };
        raw_export_map
            .iter()
            .map(|(name, expr)| {
                let used = pass
                    .export_graph
                    .export(self.root, name)
                    .and_then(|record| record.used_name(&self.runtime))
                    .unwrap_or(name.as_str());
                (used.to_owned(), expr.clone())
            })
            .collect()
    }

    /// SHA-256 over member order and raw export maps
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for module in self.members.iter() {
            hasher.update(module.as_u32().to_le_bytes());
            if let Some(map) = self.raw_export_map(*module) {
                for (name, expr) in map {
                    hasher.update(name.as_bytes());
                    hasher.update([0_u8]);
                    hasher.update([u8::from(expr.is_identifier())]);
                    hasher.update(expr.as_str().as_bytes());
                    hasher.update([0_u8]);
                }
            }
            hasher.update([0xff_u8]);
        }
        format!("{:x}", hasher.finalize())
    }
}

fn module_base_name(pass: &BuildPass, module: ModuleId) -> String {
    pass.export_graph.module(module).map_or_else(
        || format!("module_{}", module.as_u32()),
        |exports| {
            let trimmed = exports
                .module_name
                .trim_start_matches("./")
                .rsplit('/')
                .next()
                .unwrap_or_default();
            let stem = trimmed.split('.').next().unwrap_or(trimmed);
            to_identifier(stem)
        },
    )
}
