//! Correlation of expected and persisted entities by ID.
//!
//! [`correlate`] is the shared core. [`diff_by_id_equaler`] layers content
//! equality on top of it for leaf entities; [`diff_by_id`] hands every
//! correlated entity to a [`DiffHandler`] so composite entities can recurse
//! into their children.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::warn;

use crate::diff::{Diff, DiffUpdate};
use crate::entity::{Entity, Equaler};
use crate::error::{join_errors, JoinedError};

/// Classification of two collections by identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Correlation<T> {
    pub create: Vec<T>,
    pub delete: Vec<T>,
    /// Live entities present on both sides, changed or not.
    pub update_candidates: Vec<DiffUpdate<T>>,
}

impl<T> Default for Correlation<T> {
    fn default() -> Self {
        Self {
            create: Vec::new(),
            delete: Vec::new(),
            update_candidates: Vec::new(),
        }
    }
}

/// Correlate `expected` against `persisted` by ID.
///
/// - Expected items without an ID, or with an ID unknown to `persisted`, are
///   created unless they are deleted. An unknown ID therefore behaves like an
///   empty one, which is what re-keying relies on.
/// - Deleted expected items with a live persisted counterpart are deleted.
///   The expected value is emitted so edits made alongside the deletion are
///   kept; an already deleted counterpart makes this a no-op.
/// - Live expected items with a persisted counterpart become update
///   candidates.
/// - Persisted items whose ID no expected item carries are deleted.
///
/// Output follows input order. This function is total.
pub fn correlate<T: Entity + Clone>(expected: &[T], persisted: &[T]) -> Correlation<T> {
    let mut persisted_by_id: HashMap<&str, &T> = HashMap::with_capacity(persisted.len());
    for item in persisted {
        if item.id().is_empty() {
            warn!("persisted entity without an ID ignored during correlation");
            continue;
        }
        persisted_by_id.insert(item.id(), item);
    }

    let mut out = Correlation::default();
    let mut expected_ids: HashSet<&str> = HashSet::with_capacity(expected.len());

    for item in expected {
        let id = item.id();
        if id.is_empty() {
            if !item.is_deleted() {
                out.create.push(item.clone());
            }
            continue;
        }
        expected_ids.insert(id);

        match persisted_by_id.get(id) {
            None => {
                if !item.is_deleted() {
                    out.create.push(item.clone());
                }
            }
            Some(db) if item.is_deleted() => {
                if !db.is_deleted() {
                    out.delete.push(item.clone());
                }
            }
            Some(db) => {
                out.update_candidates
                    .push(DiffUpdate::new((*db).clone(), item.clone()));
            }
        }
    }

    let mut dropped: HashSet<&str> = HashSet::new();
    for item in persisted {
        let id = item.id();
        if id.is_empty() || expected_ids.contains(id) || !dropped.insert(id) {
            continue;
        }
        out.delete.push(item.clone());
    }

    out
}

/// Diff leaf entities: correlate, then keep only candidates whose content
/// actually changed.
///
/// Diffing a collection against its own snapshot yields an empty diff.
pub fn diff_by_id_equaler<T: Entity + Equaler + Clone>(expected: &[T], persisted: &[T]) -> Diff<T> {
    let correlation = correlate(expected, persisted);

    Diff {
        create: correlation.create,
        update: correlation
            .update_candidates
            .into_iter()
            .filter(|u| !u.persisted_state.equal(&u.expected_state))
            .collect(),
        delete: correlation.delete,
    }
}

/// Receives the outcome of [`diff_by_id`] one entity at a time.
///
/// `handle_update` is called for every correlated pair, changed or not; the
/// handler decides whether the entity itself, its children, or nothing needs
/// to be written.
pub trait DiffHandler<T> {
    type Error: fmt::Debug + fmt::Display;

    fn handle_delete(&mut self, item: T) -> Result<(), Self::Error>;

    fn handle_create(&mut self, item: T) -> Result<(), Self::Error>;

    fn handle_update(&mut self, update: DiffUpdate<T>) -> Result<(), Self::Error>;
}

impl<T, H: DiffHandler<T> + ?Sized> DiffHandler<T> for &mut H {
    type Error = H::Error;

    fn handle_delete(&mut self, item: T) -> Result<(), Self::Error> {
        (**self).handle_delete(item)
    }

    fn handle_create(&mut self, item: T) -> Result<(), Self::Error> {
        (**self).handle_create(item)
    }

    fn handle_update(&mut self, update: DiffUpdate<T>) -> Result<(), Self::Error> {
        (**self).handle_update(update)
    }
}

/// Input of [`diff_by_id`].
pub struct DiffByIdInput<'a, T, H> {
    pub db_state: &'a [T],
    pub expected_state: &'a [T],
    pub handler: H,
}

/// Diff composite entities through callbacks.
///
/// Handlers run for deletions, then creations, then update candidates. Every
/// handler is invoked even after a failure; all errors are returned together.
/// Effects of successful handlers are not undone.
pub fn diff_by_id<T, H>(input: DiffByIdInput<'_, T, H>) -> Result<(), JoinedError<H::Error>>
where
    T: Entity + Clone,
    H: DiffHandler<T>,
{
    let DiffByIdInput {
        db_state,
        expected_state,
        mut handler,
    } = input;

    let correlation = correlate(expected_state, db_state);
    let mut errors = Vec::new();

    for item in correlation.delete {
        if let Err(e) = handler.handle_delete(item) {
            errors.push(e);
        }
    }
    for item in correlation.create {
        if let Err(e) = handler.handle_create(item) {
            errors.push(e);
        }
    }
    for update in correlation.update_candidates {
        if let Err(e) = handler.handle_update(update) {
            errors.push(e);
        }
    }

    join_errors(errors)
}
