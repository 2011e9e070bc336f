//! Shared type definitions for the scopelink crate
//!
//! This module contains common types that are used across multiple components
//! of the linker, ensuring consistency and avoiding circular dependencies.

use std::hash::BuildHasherDefault;

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};

pub type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

pub type FxIndexSet<T> = IndexSet<T, BuildHasherDefault<FxHasher>>;

/// Export name reserved for the default export
pub const DEFAULT_EXPORT: &str = "default";

/// Evaluation context used when no runtime is configured
pub const DEFAULT_RUNTIME: &str = "main";

/// Identifiers injected by the bundle runtime
pub mod runtime_globals {
    /// The exports object of the module being rendered
    pub const EXPORTS: &str = "__scopelink_exports__";
}

/// Unique identifier for a module
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ModuleId(u32);

impl ModuleId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying u32 value of the ModuleId
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// Unique identifier for a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(u32);

impl ChunkId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

/// Result of a single tap on an extension point
///
/// Taps report whether they changed the value instead of returning an
/// untyped flag, so callers can tell "kept as is" from "replaced".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapResult<T> {
    Unchanged,
    Changed(T),
}

impl<T> TapResult<T> {
    pub const fn is_changed(&self) -> bool {
        matches!(self, Self::Changed(_))
    }
}
