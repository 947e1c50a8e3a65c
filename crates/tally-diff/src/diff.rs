//! Batch accumulators.

/// A correlated, non-deleted entity that may have changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiffUpdate<T> {
    pub persisted_state: T,
    pub expected_state: T,
}

impl<T> DiffUpdate<T> {
    pub fn new(persisted_state: T, expected_state: T) -> Self {
        Self {
            persisted_state,
            expected_state,
        }
    }

    /// Apply `f` to both states.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> DiffUpdate<U> {
        DiffUpdate {
            persisted_state: f(self.persisted_state),
            expected_state: f(self.expected_state),
        }
    }
}

/// Create, update and delete batches for one entity kind.
///
/// When produced by a single correlation pass, every ID seen lands in exactly
/// one of the three lists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diff<T> {
    pub create: Vec<T>,
    pub update: Vec<DiffUpdate<T>>,
    pub delete: Vec<T>,
}

impl<T> Default for Diff<T> {
    fn default() -> Self {
        Self {
            create: Vec::new(),
            update: Vec::new(),
            delete: Vec::new(),
        }
    }
}

impl<T> Diff<T> {
    /// Create an empty diff.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn needs_create(&mut self, item: T) {
        self.create.push(item);
    }

    pub fn needs_update(&mut self, update: DiffUpdate<T>) {
        self.update.push(update);
    }

    pub fn needs_delete(&mut self, item: T) {
        self.delete.push(item);
    }

    /// Concatenate `other` onto this diff, batch by batch.
    #[must_use]
    pub fn append(mut self, other: Diff<T>) -> Diff<T> {
        self.create.extend(other.create);
        self.update.extend(other.update);
        self.delete.extend(other.delete);
        self
    }

    /// Returns `true` if there is nothing to create, update or delete.
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    /// Total number of operations across the three batches.
    pub fn len(&self) -> usize {
        self.create.len() + self.update.len() + self.delete.len()
    }

    /// Re-tag every item, e.g. to attach a parent or project to an ID.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Diff<U> {
        Diff {
            create: self.create.into_iter().map(&mut f).collect(),
            update: self.update.into_iter().map(|u| u.map(&mut f)).collect(),
            delete: self.delete.into_iter().map(&mut f).collect(),
        }
    }
}

/// Merge any number of diffs, preserving order.
pub fn union<T>(diffs: impl IntoIterator<Item = Diff<T>>) -> Diff<T> {
    diffs.into_iter().fold(Diff::new(), Diff::append)
}
