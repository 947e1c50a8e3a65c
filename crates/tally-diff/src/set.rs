//! Set accumulator for IDs of touched ancestors.

use std::collections::HashSet;
use std::hash::Hash;

/// Unordered, duplicate-free collection.
///
/// Used to track IDs of ancestors whose own fields are unchanged but whose
/// descendants changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Set<T: Eq + Hash> {
    items: HashSet<T>,
}

impl<T: Eq + Hash> Default for Set<T> {
    fn default() -> Self {
        Self {
            items: HashSet::new(),
        }
    }
}

impl<T: Eq + Hash> Set<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert items; duplicates are ignored.
    pub fn add(&mut self, items: impl IntoIterator<Item = T>) {
        self.items.extend(items);
    }

    /// Remove items that are present; missing ones are ignored.
    pub fn remove<'a>(&mut self, items: impl IntoIterator<Item = &'a T>)
    where
        T: 'a,
    {
        for item in items {
            self.items.remove(item);
        }
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

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: Eq + Hash + Clone> Set<T> {
    /// Members in unspecified order.
    pub fn as_slice(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }

    /// Members of either set.
    #[must_use]
    pub fn union(&self, other: &Set<T>) -> Set<T> {
        Set {
            items: self.items.union(&other.items).cloned().collect(),
        }
    }

    /// Members of `self` that are not in `other`.
    #[must_use]
    pub fn subtract(&self, other: &Set<T>) -> Set<T> {
        Set {
            items: self.items.difference(&other.items).cloned().collect(),
        }
    }
}

impl<T: Eq + Hash> FromIterator<T> for Set<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Set {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T: Eq + Hash> Extend<T> for Set<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

impl<T: Eq + Hash> IntoIterator for Set<T> {
    type Item = T;
    type IntoIter = std::collections::hash_set::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
