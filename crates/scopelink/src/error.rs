//! Error taxonomy of the link core
//!
//! Unresolvable exports are not errors; they surface as
//! [`crate::export_graph::Resolution`] values and are skipped by the renderer.

use thiserror::Error;

use crate::types::ModuleId;

#[derive(Debug, Error)]
pub enum LinkError {
    /// A library option is set to a value the module library cannot honor
    #[error("invalid library option: {0}")]
    InvalidLibraryOption(String),

    /// The requested public export does not exist on the target module
    #[error("module {module} has no export named '{export}'")]
    UnknownExport { module: ModuleId, export: String },

    /// A module id was used that the export graph does not know about
    #[error("module {0} is not part of the export graph")]
    UnknownModule(ModuleId),

    /// The allocator produced a name that is already taken (internal defect)
    #[error("internal error: allocated name '{name}' collides with an existing binding")]
    NameCollision { name: String },

    /// A raw export map tap added or removed export names
    #[error(
        "tap '{tap}' changed the export names of module {module} (added: {added:?}, removed: \
         {removed:?})"
    )]
    ExtensionMisuse {
        tap: String,
        module: ModuleId,
        added: Vec<String>,
        removed: Vec<String>,
    },
}
