//! Extension points of the link pass
//!
//! Collaborators such as external-module interop or library output register
//! taps here. Taps of one extension point run sequentially in registration
//! order; a tap that fails aborts the pass.

use std::fmt;

use anyhow::Result;
use log::{debug, trace};

use crate::{
    build_pass::BuildPass,
    concatenation::{MemberInfo, NameExpr, RawExportMap},
    error::LinkError,
    types::{FxIndexMap, ModuleId, TapResult},
};

/// Observes and may rewrite a member's raw export map before rendering
///
/// A tap may only change the expression bound to existing export names;
/// returning a map with added or removed names is rejected.
pub trait RawExportMapTap: fmt::Debug {
    fn name(&self) -> &str;

    fn tap(
        &self,
        module: ModuleId,
        raw_export_map: &RawExportMap,
        info: &mut MemberInfo,
    ) -> Result<TapResult<RawExportMap>>;
}

/// Decides whether a concatenated module's export definitions can be inlined
/// into the surrounding code, letting the scope wrapper be omitted
///
/// `Some(true)` allows it, `Some(false)` forces the wrapper, `None` defers to
/// the next tap.
pub trait ExportsDefinitionsTap: fmt::Debug {
    fn name(&self) -> &str;

    fn evaluate(
        &self,
        definitions: &FxIndexMap<String, NameExpr>,
        module: ModuleId,
        pass: &BuildPass,
    ) -> Option<bool>;
}

/// Vetoes inlining a module into the runtime; the returned reason forces the
/// module's wrapper to stay
pub trait InlineBailoutTap: fmt::Debug {
    fn name(&self) -> &str;

    fn bailout_reason(&self, module: ModuleId, pass: &BuildPass) -> Option<String>;
}

/// Result of running every raw export map tap for one member
#[derive(Debug, Clone)]
pub struct RawExportMapOutcome {
    pub raw_export_map: RawExportMap,
    /// Whether any tap reported a change
    pub changed: bool,
}

#[derive(Debug, Default)]
pub struct LinkHooks {
    concatenated_module_info: Vec<Box<dyn RawExportMapTap>>,
    exports_definitions: Vec<Box<dyn ExportsDefinitionsTap>>,
    inline_in_runtime_bailout: Vec<Box<dyn InlineBailoutTap>>,
}

impl LinkHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tap_concatenated_module_info(&mut self, tap: impl RawExportMapTap + 'static) {
        self.concatenated_module_info.push(Box::new(tap));
    }

    pub fn tap_exports_definitions(&mut self, tap: impl ExportsDefinitionsTap + 'static) {
        self.exports_definitions.push(Box::new(tap));
    }

    pub fn tap_inline_in_runtime_bailout(&mut self, tap: impl InlineBailoutTap + 'static) {
        self.inline_in_runtime_bailout.push(Box::new(tap));
    }

    /// Run the raw export map taps for one member in registration order
    pub fn call_concatenated_module_info(
        &self,
        module: ModuleId,
        raw_export_map: RawExportMap,
        info: &mut MemberInfo,
    ) -> Result<RawExportMapOutcome> {
        let mut current = raw_export_map;
        let mut changed = false;

        for tap in &self.concatenated_module_info {
            match tap.tap(module, &current, info)? {
                TapResult::Unchanged => {
                    trace!("Tap '{}' left raw export map of {module} unchanged", tap.name());
                }
                TapResult::Changed(updated) => {
                    validate_rewrite(tap.name(), module, &current, &updated)?;
                    debug!("Tap '{}' rewrote raw export map of {module}", tap.name());
                    current = updated;
                    changed = true;
                }
            }
        }

        Ok(RawExportMapOutcome {
            raw_export_map: current,
            changed,
        })
    }

    /// First definite answer of the exports definitions taps
    pub fn call_exports_definitions(
        &self,
        definitions: &FxIndexMap<String, NameExpr>,
        module: ModuleId,
        pass: &BuildPass,
    ) -> Option<bool> {
        self.exports_definitions.iter().find_map(|tap| {
            let verdict = tap.evaluate(definitions, module, pass);
            if let Some(verdict) = verdict {
                trace!("Tap '{}' decided {verdict} for {module}", tap.name());
            }
            verdict
        })
    }

    /// First bailout reason reported by the inline bailout taps
    pub fn call_inline_in_runtime_bailout(
        &self,
        module: ModuleId,
        pass: &BuildPass,
    ) -> Option<String> {
        self.inline_in_runtime_bailout
            .iter()
            .find_map(|tap| tap.bailout_reason(module, pass))
    }
}

fn validate_rewrite(
    tap: &str,
    module: ModuleId,
    before: &RawExportMap,
    after: &RawExportMap,
) -> Result<(), LinkError> {
    let added: Vec<String> = after
        .keys()
        .filter(|name| !before.contains_key(*name))
        .cloned()
        .collect();
    let removed: Vec<String> = before
        .keys()
        .filter(|name| !after.contains_key(*name))
        .cloned()
        .collect();

    if added.is_empty() && removed.is_empty() {
        Ok(())
    } else {
        Err(LinkError::ExtensionMisuse {
            tap: tap.to_owned(),
            module,
            added,
            removed,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::LinkConfig;

    #[derive(Debug)]
    struct Verdict(&'static str, Option<bool>);

    impl ExportsDefinitionsTap for Verdict {
        fn name(&self) -> &str {
            self.0
        }

        fn evaluate(
            &self,
            _definitions: &FxIndexMap<String, NameExpr>,
            _module: ModuleId,
            _pass: &BuildPass,
        ) -> Option<bool> {
            self.1
        }
    }

    #[derive(Debug)]
    struct Veto(ModuleId);

    impl InlineBailoutTap for Veto {
        fn name(&self) -> &str {
            "veto"
        }

        fn bailout_reason(&self, module: ModuleId, _pass: &BuildPass) -> Option<String> {
            (module == self.0).then(|| format!("{module} uses eval"))
        }
    }

    #[derive(Debug)]
    struct DropAll;

    impl RawExportMapTap for DropAll {
        fn name(&self) -> &str {
            "drop-all"
        }

        fn tap(
            &self,
            _module: ModuleId,
            _raw_export_map: &RawExportMap,
            _info: &mut MemberInfo,
        ) -> Result<TapResult<RawExportMap>> {
            Ok(TapResult::Changed(RawExportMap::default()))
        }
    }

    fn member() -> MemberInfo {
        MemberInfo {
            module: ModuleId::new(0),
            index: 0,
            raw_export_map: RawExportMap::default(),
            internal_names: FxIndexMap::default(),
            namespace_object_name: None,
            external_imports: Vec::new(),
        }
    }

    #[test]
    fn test_exports_definitions_first_answer_wins() {
        let mut pass = BuildPass::new(LinkConfig::default());
        let definitions = FxIndexMap::default();
        let module = ModuleId::new(0);
        assert_eq!(
            pass.hooks.call_exports_definitions(&definitions, module, &pass),
            None
        );

        pass.hooks.tap_exports_definitions(Verdict("undecided", None));
        pass.hooks.tap_exports_definitions(Verdict("deny", Some(false)));
        pass.hooks.tap_exports_definitions(Verdict("allow", Some(true)));
        assert_eq!(
            pass.hooks.call_exports_definitions(&definitions, module, &pass),
            Some(false)
        );
    }

    #[test]
    fn test_inline_bailout_reason() {
        let mut pass = BuildPass::new(LinkConfig::default());
        pass.hooks.tap_inline_in_runtime_bailout(Veto(ModuleId::new(1)));

        assert_eq!(
            pass.hooks.call_inline_in_runtime_bailout(ModuleId::new(0), &pass),
            None
        );
        assert_eq!(
            pass.hooks
                .call_inline_in_runtime_bailout(ModuleId::new(1), &pass)
                .as_deref(),
            Some("m1 uses eval")
        );
    }

    #[test]
    fn test_removed_export_names_are_reported() {
        let mut hooks = LinkHooks::new();
        hooks.tap_concatenated_module_info(DropAll);
        let mut raw = RawExportMap::default();
        raw.insert("a".to_owned(), NameExpr::identifier("a"));

        let err = hooks
            .call_concatenated_module_info(ModuleId::new(0), raw, &mut member())
            .unwrap_err();
        insta::assert_snapshot!(
            err,
            @r#"tap 'drop-all' changed the export names of module m0 (added: [], removed: ["a"])"#
        );
    }

    #[test]
    fn test_no_taps_means_unchanged() {
        let hooks = LinkHooks::new();
        let mut raw = RawExportMap::default();
        raw.insert("a".to_owned(), NameExpr::expression("ns.a"));

        let outcome = hooks
            .call_concatenated_module_info(ModuleId::new(0), raw.clone(), &mut member())
            .unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.raw_export_map, raw);
    }
}
