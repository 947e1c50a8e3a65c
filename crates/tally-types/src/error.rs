use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid decimal string: {0:?}")]
    InvalidDecimal(String),

    #[error("too many fractional digits in {value:?}: at most {max} allowed")]
    Precision { value: String, max: u32 },

    #[error("decimal out of range: {0}")]
    Overflow(String),
}
