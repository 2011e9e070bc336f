//! Tests for module interface rendering and wrapper omission

use pretty_assertions::assert_eq;

use super::*;
use crate::{
    chunk_graph::Chunk,
    config::{LibraryExport, LinkConfig},
    export_graph::UsedState,
    hooks::InlineBailoutTap,
    types::{ChunkId, DEFAULT_RUNTIME},
};

const INDEX: ModuleId = ModuleId::new(0);
const UTIL: ModuleId = ModuleId::new(1);

fn pass_with_exports(config: LinkConfig, exports: Vec<ExportRecord>) -> BuildPass {
    let mut pass = BuildPass::with_default_plugins(config);
    pass.export_graph.add_module(INDEX, "./index.js");
    pass.export_graph.add_module(UTIL, "./util.js");
    for record in exports {
        pass.export_graph.add_export(INDEX, record).unwrap();
    }
    pass
}

fn set_definitions(pass: &mut BuildPass, definitions: &[(&str, NameExpr)]) {
    let runtime = pass.runtime().to_owned();
    pass.codegen_results
        .get_or_insert(INDEX, &runtime)
        .exports_final_name = Some(
        definitions
            .iter()
            .map(|(name, expr)| ((*name).to_owned(), expr.clone()))
            .collect(),
    );
}

fn declare(pass: &mut BuildPass, declarations: &[&str]) {
    let runtime = pass.runtime().to_owned();
    pass.codegen_results
        .get_or_insert(INDEX, &runtime)
        .top_level_declarations
        .extend(declarations.iter().map(|name| (*name).to_owned()));
}

fn render(pass: &BuildPass) -> String {
    ModuleLibrary::default()
        .render_startup("", INDEX, pass, None)
        .unwrap()
}

#[test]
fn test_identifiers_and_expressions_are_split() {
    let mut pass = pass_with_exports(
        LinkConfig::default(),
        vec![ExportRecord::provided("x"), ExportRecord::provided("y")],
    );
    set_definitions(
        &mut pass,
        &[
            ("x", NameExpr::identifier("exportsX")),
            ("y", NameExpr::expression("helper.getY()")),
        ],
    );

    insta::assert_snapshot!(render(&pass), @r"
    export { exportsX as x };
    export const y = helper.getY();
    ");
}

#[test]
fn test_matching_local_name_is_exported_bare() {
    let mut pass = pass_with_exports(
        LinkConfig::default(),
        vec![ExportRecord::provided("value"), ExportRecord::provided("other")],
    );
    set_definitions(
        &mut pass,
        &[
            ("value", NameExpr::identifier("value")),
            ("other", NameExpr::identifier("other_1")),
        ],
    );

    assert_eq!(render(&pass), "export { value, other_1 as other };\n");
}

#[test]
fn test_async_module_awaits_exports_first() {
    let mut pass = pass_with_exports(LinkConfig::default(), vec![ExportRecord::provided("a")]);
    pass.module_graph.set_async(INDEX);

    insta::assert_snapshot!(render(&pass), @r"
    __scopelink_exports__ = await __scopelink_exports__;
    const __scopelink_exports__a = __scopelink_exports__.a;
    export { __scopelink_exports__a as a };
    ");
}

#[test]
fn test_var_declarations_without_const_support() {
    let config = LinkConfig::from_toml_str("[output.environment]\nconst = false\n").unwrap();
    let mut pass = pass_with_exports(
        config,
        vec![ExportRecord::provided("a"), ExportRecord::provided("b")],
    );
    set_definitions(&mut pass, &[("b", NameExpr::expression("compute()"))]);

    insta::assert_snapshot!(render(&pass), @r"
    var __scopelink_exports__a = __scopelink_exports__.a;
    export { __scopelink_exports__a as a };
    export var b = compute();
    ");
}

#[test]
fn test_default_and_string_names_use_aliases() {
    let mut pass = pass_with_exports(
        LinkConfig::default(),
        vec![
            ExportRecord::provided("default"),
            ExportRecord::provided("my-name"),
        ],
    );
    set_definitions(
        &mut pass,
        &[
            ("default", NameExpr::expression("foo()")),
            ("my-name", NameExpr::expression("bar.baz")),
        ],
    );

    insta::assert_snapshot!(render(&pass), @r#"
    const __scopelink_exports__default = foo();
    const __scopelink_exports__my_name = bar.baz;
    export { __scopelink_exports__default as default, __scopelink_exports__my_name as "my-name" };
    "#);
}

#[test]
fn test_expression_shadowing_declaration_gets_alias() {
    let mut pass = pass_with_exports(LinkConfig::default(), vec![ExportRecord::provided("y")]);
    declare(&mut pass, &["y"]);
    set_definitions(&mut pass, &[("y", NameExpr::expression("helper.getY()"))]);

    insta::assert_snapshot!(render(&pass), @r"
    const __scopelink_exports__y = helper.getY();
    export { __scopelink_exports__y as y };
    ");
}

#[test]
fn test_alias_avoids_existing_declarations() {
    let mut pass = pass_with_exports(LinkConfig::default(), vec![ExportRecord::provided("a")]);
    declare(&mut pass, &["__scopelink_exports__a"]);

    assert_eq!(
        render(&pass),
        "const __scopelink_exports__a_1 = __scopelink_exports__.a;\nexport { \
         __scopelink_exports__a_1 as a };\n"
    );
}

#[test]
fn test_constants_are_inlined() {
    let mut pass = pass_with_exports(
        LinkConfig::default(),
        vec![
            ExportRecord::provided("version")
                .with_constant(ConstantValue::String("1.0".to_owned())),
            ExportRecord::provided("debug").with_constant(ConstantValue::Bool(false)),
        ],
    );
    // a known definition wins over the constant
    set_definitions(&mut pass, &[("debug", NameExpr::identifier("debug"))]);

    insta::assert_snapshot!(render(&pass), @r#"
    const __scopelink_exports__version = "1.0";
    export { __scopelink_exports__version as version, debug };
    "#);
}

#[test]
fn test_used_names_and_unused_exports() {
    let pass = pass_with_exports(
        LinkConfig::default(),
        vec![
            ExportRecord::provided("longName")
                .with_usage(DEFAULT_RUNTIME, UsedState::Renamed("a".to_owned())),
            ExportRecord::provided("dead").with_usage(DEFAULT_RUNTIME, UsedState::Unused),
        ],
    );

    insta::assert_snapshot!(render(&pass), @r"
    const __scopelink_exports__longName = __scopelink_exports__.a;
    export { __scopelink_exports__longName as longName };
    ");
}

#[test]
fn test_dangling_reexports_are_omitted() {
    let mut pass = pass_with_exports(
        LinkConfig::default(),
        vec![
            ExportRecord::provided("kept"),
            ExportRecord::provided("gone").with_target(UTIL, Some("missing")),
            ExportRecord::provided("maybe").with_target(UTIL, Some("dynamic")),
            ExportRecord::new("hidden", ProvidedState::NotProvided),
        ],
    );
    pass.export_graph
        .add_export(UTIL, ExportRecord::new("dynamic", ProvidedState::Unknown))
        .unwrap();
    set_definitions(&mut pass, &[("kept", NameExpr::identifier("kept"))]);

    let context = ModuleLibrary::default()
        .plan(INDEX, &pass, None)
        .unwrap();
    assert_eq!(
        context.resolved_exports,
        vec![("kept".to_owned(), NameExpr::identifier("kept"))]
    );
    assert_eq!(context.render(), "export { kept };\n");
}

#[test]
fn test_reexport_chain_ending_at_default_is_kept() {
    let mut pass = pass_with_exports(
        LinkConfig::default(),
        vec![ExportRecord::provided("main").with_target(UTIL, Some("default"))],
    );
    pass.export_graph
        .add_export(UTIL, ExportRecord::new("default", ProvidedState::NotProvided))
        .unwrap();
    set_definitions(&mut pass, &[("main", NameExpr::expression("util_default()"))]);

    assert_eq!(render(&pass), "export const main = util_default();\n");
}

#[test]
fn test_single_export_option() {
    let config = LinkConfig::from_toml_str("[library]\nexport = [\"b\", \"nested\"]\n").unwrap();
    let mut pass = pass_with_exports(
        config,
        vec![ExportRecord::provided("a"), ExportRecord::provided("b")],
    );
    set_definitions(
        &mut pass,
        &[
            ("a", NameExpr::identifier("a")),
            ("b", NameExpr::identifier("b")),
        ],
    );

    let library = ModuleLibrary::parse_options(&pass.config.library).unwrap();
    assert_eq!(library.export(), Some("b"));
    library.bind(INDEX, &pass).unwrap();
    assert_eq!(
        library.render_startup("// code\n", INDEX, &pass, None).unwrap(),
        "// code\nexport { b };\n"
    );
}

#[test]
fn test_invalid_options() {
    let named = LibraryOptions {
        name: Some("MyLib".to_owned()),
        export: None,
    };
    let err = ModuleLibrary::parse_options(&named).unwrap_err();
    assert!(matches!(err, LinkError::InvalidLibraryOption(_)));

    let missing = LibraryOptions {
        name: None,
        export: Some(LibraryExport::Single("nope".to_owned())),
    };
    let pass = pass_with_exports(LinkConfig::default(), vec![ExportRecord::provided("a")]);
    let library = ModuleLibrary::parse_options(&missing).unwrap();
    insta::assert_snapshot!(
        library.bind(INDEX, &pass).unwrap_err(),
        @"module m0 has no export named 'nope'"
    );
    assert!(matches!(
        library.bind(ModuleId::new(7), &pass),
        Err(LinkError::UnknownModule(_))
    ));
}

fn runtime_chunk(id: u32, entries: &[ModuleId]) -> Chunk {
    let mut chunk = Chunk::new(ChunkId::new(id));
    chunk.has_runtime = true;
    for &entry in entries {
        chunk.add_entry_module(entry);
    }
    chunk
}

#[test]
fn test_wrapper_omitted_for_sole_entry() {
    let mut pass = pass_with_exports(LinkConfig::default(), vec![ExportRecord::provided("a")]);
    pass.chunk_graph.add_chunk(runtime_chunk(0, &[INDEX]));
    assert!(can_inline_exports_definitions(INDEX, &pass));

    // no chunk at all imposes no constraint either
    pass.chunk_graph = crate::chunk_graph::ChunkGraph::new();
    assert!(can_inline_exports_definitions(INDEX, &pass));
}

#[test]
fn test_wrapper_kept_when_imported() {
    let mut pass = pass_with_exports(LinkConfig::default(), vec![ExportRecord::provided("a")]);
    pass.chunk_graph.add_chunk(runtime_chunk(0, &[INDEX]));
    pass.module_graph.add_dependency(UTIL, INDEX);
    assert!(!can_inline_exports_definitions(INDEX, &pass));
}

#[test]
fn test_wrapper_kept_without_runtime() {
    let mut pass = pass_with_exports(LinkConfig::default(), vec![ExportRecord::provided("a")]);
    let mut chunk = runtime_chunk(0, &[INDEX]);
    chunk.has_runtime = false;
    pass.chunk_graph.add_chunk(chunk);
    assert!(!can_inline_exports_definitions(INDEX, &pass));
}

#[test]
fn test_wrapper_kept_with_several_entries() {
    let mut pass = pass_with_exports(LinkConfig::default(), vec![ExportRecord::provided("a")]);
    pass.chunk_graph.add_chunk(runtime_chunk(0, &[INDEX, UTIL]));
    assert!(!can_inline_exports_definitions(INDEX, &pass));
}

#[derive(Debug)]
struct UsesEval;

impl InlineBailoutTap for UsesEval {
    fn name(&self) -> &str {
        "uses-eval"
    }

    fn bailout_reason(&self, _module: ModuleId, _pass: &BuildPass) -> Option<String> {
        Some("module uses eval".to_owned())
    }
}

#[test]
fn test_wrapper_kept_on_bailout() {
    let mut pass = pass_with_exports(LinkConfig::default(), vec![ExportRecord::provided("a")]);
    pass.chunk_graph.add_chunk(runtime_chunk(0, &[INDEX]));
    pass.hooks.tap_inline_in_runtime_bailout(UsesEval);
    assert!(!can_inline_exports_definitions(INDEX, &pass));
}
