//! Error aggregation for callback-driven diffs.

use std::fmt;

/// Every error raised by diff handlers during one pass.
///
/// Handlers are never short-circuited, so one failing sibling does not hide
/// another. Always holds at least one error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", join_lines(.errors))]
pub struct JoinedError<E: fmt::Debug + fmt::Display> {
    errors: Vec<E>,
}

impl<E: fmt::Debug + fmt::Display> JoinedError<E> {
    /// Wrap `errors`, or `None` if there are none.
    pub fn from_vec(errors: Vec<E>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    pub fn errors(&self) -> &[E] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<E> {
        self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

fn join_lines<E: fmt::Display>(errors: &[E]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// `Ok(())` if `errors` is empty, otherwise all of them joined.
pub fn join_errors<E>(errors: Vec<E>) -> Result<(), JoinedError<E>>
where
    E: fmt::Debug + fmt::Display,
{
    match JoinedError::from_vec(errors) {
        Some(joined) => Err(joined),
        None => Ok(()),
    }
}
