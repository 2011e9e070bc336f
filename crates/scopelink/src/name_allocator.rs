//! Collision-free identifier allocation inside a merged scope

use log::debug;

use crate::{
    error::LinkError,
    identifier::{is_identifier, to_identifier},
    types::FxIndexSet,
};

/// Allocates identifiers that are unique among all names of a merged scope
///
/// Collisions are resolved with a numeric suffix (`name_1`, `name_2`, ...),
/// so for a fixed sequence of requests the output is always the same.
#[derive(Debug, Clone, Default)]
pub struct NameAllocator {
    global_names: FxIndexSet<String>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an allocator that treats `names` as already taken
    pub fn with_reserved<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            global_names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Mark an existing binding as taken; returns `false` if it already was
    pub fn reserve(&mut self, name: impl Into<String>) -> bool {
        self.global_names.insert(name.into())
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.global_names.contains(name)
    }

    /// All names taken so far, in allocation order
    pub fn global_names(&self) -> &FxIndexSet<String> {
        &self.global_names
    }

    /// Allocate a name as close to `preferred` as possible
    pub fn allocate(&mut self, preferred: &str) -> Result<String, LinkError> {
        let mut base = to_identifier(preferred);
        if !is_identifier(&base) {
            // empty input or a reserved word
            base.insert(0, '_');
        }

        let name = self.first_free(&base);
        if !self.global_names.insert(name.clone()) {
            return Err(LinkError::NameCollision { name });
        }
        if name != preferred {
            debug!("Allocated '{name}' for preferred name '{preferred}'");
        }
        Ok(name)
    }

    fn first_free(&self, base: &str) -> String {
        if !self.global_names.contains(base) {
            return base.to_owned();
        }
        (1_u32..)
            .map(|i| format!("{base}_{i}"))
            .find(|candidate| !self.global_names.contains(candidate))
            .unwrap_or_else(|| format!("__scopelink_renamed_{base}"))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rustc_hash::FxHashSet;

    use super::*;

    #[test]
    fn test_allocate_prefers_requested_name() {
        let mut allocator = NameAllocator::new();
        assert_eq!(allocator.allocate("value").unwrap(), "value");
        assert!(allocator.is_taken("value"));
    }

    #[test]
    fn test_collisions_get_numeric_suffix() {
        let mut allocator = NameAllocator::with_reserved(["helper"]);
        assert_eq!(allocator.allocate("helper").unwrap(), "helper_1");
        assert_eq!(allocator.allocate("helper").unwrap(), "helper_2");
        assert_eq!(allocator.allocate("helper_1").unwrap(), "helper_1_1");
    }

    #[test]
    fn test_invalid_names_are_sanitized() {
        let mut allocator = NameAllocator::new();
        assert_eq!(allocator.allocate("my-export").unwrap(), "my_export");
        assert_eq!(allocator.allocate("default").unwrap(), "_default");
        assert_eq!(allocator.allocate("").unwrap(), "_");
        assert_eq!(allocator.allocate("9lives").unwrap(), "_9lives");
    }

    #[test]
    fn test_allocations_are_pairwise_distinct() {
        let requests = [
            "a", "a", "a_1", "a", "b", "a-1", "a_1", "", "", "default", "_default", "a_2",
        ];
        let mut allocator = NameAllocator::new();
        let names: Vec<String> = requests
            .iter()
            .map(|request| allocator.allocate(request).unwrap())
            .collect();

        let distinct: FxHashSet<&String> = names.iter().collect();
        assert_eq!(distinct.len(), names.len());
        assert_eq!(allocator.global_names().len(), names.len());
        for name in &names {
            assert!(allocator.is_taken(name));
        }
    }

    #[test]
    fn test_allocation_is_deterministic() {
        let requests = ["x", "x", "y", "x", "x_1"];
        let run = || {
            let mut allocator = NameAllocator::with_reserved(["y"]);
            requests
                .iter()
                .map(|request| allocator.allocate(request).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
        assert_eq!(run(), vec!["x", "x_1", "y_1", "x_2", "x_1_1"]);
    }
}
