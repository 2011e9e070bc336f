//! Link configuration
//!
//! Only the options that influence linking and interface rendering live
//! here; everything else about the build is configured upstream.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::types::DEFAULT_RUNTIME;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct LinkConfig {
    pub output: OutputOptions,
    pub library: LibraryOptions,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct OutputOptions {
    pub environment: Environment,
    /// Evaluation context used for used-name lookups
    pub runtime: String,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            runtime: DEFAULT_RUNTIME.to_owned(),
        }
    }
}

/// Language features the output may rely on
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Environment {
    /// Whether `const` declarations are available
    #[serde(rename = "const")]
    pub const_declarations: bool,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            const_declarations: true,
        }
    }
}

impl Environment {
    /// Keyword for generated declarations
    pub const fn declaration_keyword(&self) -> &'static str {
        if self.const_declarations {
            "const"
        } else {
            "var"
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LibraryOptions {
    /// Must stay unset for module output; a module library has no global name
    pub name: Option<String>,
    /// Restrict the public interface to a single export
    pub export: Option<LibraryExport>,
}

/// `export = "name"` or `export = ["name", ...]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LibraryExport {
    Single(String),
    Path(Vec<String>),
}

impl LibraryExport {
    /// The export that is exposed; only the first element of a path counts
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Single(name) => Some(name.as_str()),
            Self::Path(path) => path.first().map(String::as_str),
        }
    }
}

impl LinkConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse link configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }
}
