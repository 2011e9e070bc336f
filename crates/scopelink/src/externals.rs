//! Interop between concatenated members and the external modules they import
//!
//! An external import fragment is generated before linking, when the final
//! names in the merged scope are not known yet. Once the raw export map of a
//! member exists, the locals of its fragments are rebound: a specifier the
//! member re-exports under the same name binds straight to that export's
//! identifier, anything else follows the member's renamed declarations.

use anyhow::Result;
use log::trace;

use crate::{
    concatenation::{MemberInfo, NameExpr, RawExportMap},
    hooks::{LinkHooks, RawExportMapTap},
    types::{ModuleId, TapResult},
};

#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalsInterop;

impl ExternalsInterop {
    pub fn apply(hooks: &mut LinkHooks) {
        hooks.tap_concatenated_module_info(Self);
    }
}

impl RawExportMapTap for ExternalsInterop {
    fn name(&self) -> &str {
        "ExternalsPlugin"
    }

    fn tap(
        &self,
        module: ModuleId,
        raw_export_map: &RawExportMap,
        info: &mut MemberInfo,
    ) -> Result<TapResult<RawExportMap>> {
        let mut changed = false;
        for fragment in &mut info.external_imports {
            for (specifier, local) in &mut fragment.imported {
                let rebound = match raw_export_map.get(specifier.as_str()) {
                    Some(NameExpr::Identifier(name)) => Some(name),
                    _ => info.internal_names.get(local.as_str()),
                };
                if let Some(name) = rebound
                    && name.as_str() != local.as_str()
                {
                    trace!(
                        "Rebinding import '{specifier}' from {} in {module}: {local} -> {name}",
                        fragment.request
                    );
                    local.clone_from(name);
                    changed = true;
                }
            }
        }

        // fragments changed but the map itself did not; report it all the same
        Ok(if changed {
            TapResult::Changed(raw_export_map.clone())
        } else {
            TapResult::Unchanged
        })
    }
}
