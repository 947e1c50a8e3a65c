use std::fmt;

use serde::{Deserialize, Serialize};
use tally_diff::{join_errors, JoinedError};

/// The entity kinds of the invoice line hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Line,
    UsageDiscount,
    AmountDiscount,
    DetailedLine,
    DetailedLineAmountDiscount,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Line => "line",
            EntityKind::UsageDiscount => "usage discount",
            EntityKind::AmountDiscount => "amount discount",
            EntityKind::DetailedLine => "detailed line",
            EntityKind::DetailedLineAmountDiscount => "detailed line amount discount",
        };
        f.write_str(name)
    }
}

/// Errors produced by billing operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BillingError {
    #[error("invalid {kind} {id:?}: {reason}")]
    Validation {
        kind: EntityKind,
        id: String,
        reason: String,
    },

    #[error(transparent)]
    Joined(#[from] JoinedError<BillingError>),

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl BillingError {
    pub(crate) fn validation(kind: EntityKind, id: &str, reason: impl Into<String>) -> Self {
        BillingError::Validation {
            kind,
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    /// Every leaf error, with joined errors flattened.
    pub fn leaves(&self) -> Vec<&BillingError> {
        match self {
            BillingError::Joined(joined) => {
                joined.errors().iter().flat_map(|e| e.leaves()).collect()
            }
            other => vec![other],
        }
    }
}

/// Convenience alias for billing results.
pub type BillingResult<T> = Result<T, BillingError>;

/// Collapse collected errors: none is `Ok`, one is returned as is, several
/// are joined.
pub(crate) fn collect_errors(mut errors: Vec<BillingError>) -> BillingResult<()> {
    if errors.len() == 1 {
        return Err(errors.remove(0));
    }
    join_errors(errors).map_err(BillingError::Joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display() {
        let err = BillingError::validation(EntityKind::DetailedLine, "dl-1", "negative quantity");
        assert_eq!(err.to_string(), "invalid detailed line \"dl-1\": negative quantity");
    }

    #[test]
    fn collect_none_one_many() {
        assert!(collect_errors(vec![]).is_ok());

        let one = collect_errors(vec![BillingError::Storage("a".into())]).unwrap_err();
        assert_eq!(one, BillingError::Storage("a".into()));

        let many = collect_errors(vec![
            BillingError::Storage("a".into()),
            BillingError::Storage("b".into()),
        ])
        .unwrap_err();
        assert_eq!(many.to_string(), "storage error: a\nstorage error: b");
        assert_eq!(many.leaves().len(), 2);
    }

    #[test]
    fn leaves_flatten_nested_joins() {
        let inner = collect_errors(vec![
            BillingError::Storage("a".into()),
            BillingError::Storage("b".into()),
        ])
        .unwrap_err();
        let outer = collect_errors(vec![inner, BillingError::Config("c".into())]).unwrap_err();
        assert_eq!(outer.leaves().len(), 3);
    }
}
