//! Linking core of a scope-hoisting JavaScript module bundler
//!
//! Given the export graph of a build and a set of modules to merge into one
//! scope, the linker resolves re-export chains, allocates collision-free
//! names, lets registered taps adjust the result, and renders the public
//! interface of the root module as native `export` statements.

pub mod build_pass;
pub mod chunk_graph;
pub mod codegen;
pub mod concatenation;
pub mod config;
pub mod error;
pub mod export_graph;
pub mod externals;
pub mod hooks;
pub mod identifier;
pub mod library;
pub mod manifest;
pub mod module_graph;
pub mod name_allocator;
pub mod ordered_set;
pub mod types;
