//! Insertion-unique set with an optional, swappable sort order
//!
//! `OrderedSet` keeps set semantics (no duplicates) and enumerates either in
//! insertion order or in the order of the active comparator. The sorted order
//! is computed lazily on the first read and cached until the next mutation or
//! comparator change, so repeated reads of an unchanged set are stable.

use std::{cell::OnceCell, cmp::Ordering, fmt, hash::Hash, rc::Rc};

use serde::{Serialize, Serializer};

use crate::types::FxIndexSet;

/// Total order used to enumerate an [`OrderedSet`]
pub type Comparator<T> = Rc<dyn Fn(&T, &T) -> Ordering>;

pub struct OrderedSet<T> {
    items: FxIndexSet<T>,
    /// Comparator supplied at construction, activated by `sort_default`
    default_comparator: Option<Comparator<T>>,
    /// Comparator currently used for enumeration; `None` means insertion order
    active_comparator: Option<Comparator<T>>,
    /// Positions into `items` in enumeration order
    order: OnceCell<Vec<usize>>,
}

impl<T: Hash + Eq> OrderedSet<T> {
    /// Create an empty set that enumerates in insertion order
    pub fn new() -> Self {
        Self {
            items: FxIndexSet::default(),
            default_comparator: None,
            active_comparator: None,
            order: OnceCell::new(),
        }
    }

    /// Create an empty set with a default comparator for `sort_default`
    pub fn with_comparator(comparator: impl Fn(&T, &T) -> Ordering + 'static) -> Self {
        Self {
            default_comparator: Some(Rc::new(comparator)),
            ..Self::new()
        }
    }

    /// Insert an item; returns `false` if it was already present
    pub fn insert(&mut self, item: T) -> bool {
        let inserted = self.items.insert(item);
        if inserted {
            self.invalidate();
        }
        inserted
    }

    /// Remove an item; returns `false` if it was not present
    pub fn delete(&mut self, item: &T) -> bool {
        let removed = self.items.shift_remove(item);
        if removed {
            self.invalidate();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.invalidate();
    }

    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Enumerate using the comparator supplied at construction
    ///
    /// Without a construction comparator this falls back to insertion order.
    pub fn sort_default(&mut self) {
        self.active_comparator.clone_from(&self.default_comparator);
        self.invalidate();
    }

    /// Replace the active comparator
    pub fn sort_with(&mut self, comparator: impl Fn(&T, &T) -> Ordering + 'static) {
        self.active_comparator = Some(Rc::new(comparator));
        self.invalidate();
    }

    /// Whether the enumeration order is currently cached
    pub fn has_cached_order(&self) -> bool {
        self.order.get().is_some()
    }

    /// Iterate in the active order, computing it first if needed
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.current_order()
            .iter()
            .filter_map(|&index| self.items.get_index(index))
    }

    pub fn first(&self) -> Option<&T> {
        self.iter().next()
    }

    /// Current enumeration order as a plain sequence, used for hashing and snapshots
    pub fn serialize(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().cloned().collect()
    }

    fn current_order(&self) -> &[usize] {
        self.order.get_or_init(|| {
            let mut order: Vec<usize> = (0..self.items.len()).collect();
            if let Some(comparator) = &self.active_comparator {
                // stable: equal items keep insertion order
                order.sort_by(|&a, &b| comparator(&self.items[a], &self.items[b]));
            }
            order
        })
    }

    fn invalidate(&mut self) {
        self.order.take();
    }
}

impl<T: Hash + Eq> Default for OrderedSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Hash + Eq + Clone> Clone for OrderedSet<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            default_comparator: self.default_comparator.clone(),
            active_comparator: self.active_comparator.clone(),
            order: self.order.clone(),
        }
    }
}

impl<T: Hash + Eq + fmt::Debug> fmt::Debug for OrderedSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedSet")
            .field("items", &self.items)
            .field("sorted", &self.active_comparator.is_some())
            .finish_non_exhaustive()
    }
}

impl<T: Hash + Eq> FromIterator<T> for OrderedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<T: Hash + Eq> Extend<T> for OrderedSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.insert(item);
        }
    }
}

impl<T: Hash + Eq + Serialize> Serialize for OrderedSet<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const NUMBERS: [i32; 18] = [1, 1, 1, 6, 6, 1, 1, 4, 5, 2, 3, 8, 5, 7, 9, 0, 3, 1];

    fn ascending() -> OrderedSet<i32> {
        let mut set = OrderedSet::with_comparator(|a: &i32, b: &i32| a.cmp(b));
        set.extend(NUMBERS);
        set
    }

    #[test]
    fn test_insertion_order_without_comparator() {
        let set: OrderedSet<i32> = [1, 1, 1, 1, 1, 4, 5, 2].into_iter().collect();
        assert_eq!(set.serialize(), vec![1, 4, 5, 2]);
    }

    #[test]
    fn test_sort_default() {
        let mut set = ascending();
        // construction comparator is not active until requested
        assert_eq!(set.first(), Some(&1));
        set.sort_default();
        assert_eq!(set.serialize(), vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_sort_with_replaces_comparator() {
        let mut set = ascending();
        set.sort_with(|a, b| a.cmp(b));
        set.sort_with(|a, b| b.cmp(a));
        let first: Vec<i32> = set.iter().copied().collect();
        assert_eq!(first, vec![9, 8, 7, 6, 5, 4, 3, 2, 1, 0]);
        assert_eq!(set.serialize(), first);
    }

    #[test]
    fn test_reads_are_stable_between_mutations() {
        let mut set = ascending();
        set.sort_with(|a, b| b.cmp(a));
        let first: Vec<i32> = set.iter().copied().collect();
        assert!(set.has_cached_order());
        let second: Vec<i32> = set.iter().copied().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_mutation_invalidates_cached_order() {
        let mut set = ascending();
        set.sort_with(|a, b| b.cmp(a));
        let _ = set.serialize();

        assert!(!set.insert(4), "duplicate insert must be a no-op");
        assert!(set.has_cached_order());
        assert_eq!(set.len(), 10);

        assert!(set.insert(42));
        assert!(!set.has_cached_order());
        assert_eq!(set.first(), Some(&42));

        assert!(set.delete(&42));
        assert_eq!(set.first(), Some(&9));
        assert!(!set.delete(&42));
    }

    #[test]
    fn test_sort_default_without_comparator_keeps_insertion_order() {
        let mut set: OrderedSet<&str> = ["b", "a", "c"].into_iter().collect();
        set.sort_with(|a, b| a.cmp(b));
        assert_eq!(set.serialize(), vec!["a", "b", "c"]);
        set.sort_default();
        assert_eq!(set.serialize(), vec!["b", "a", "c"]);
    }
}
