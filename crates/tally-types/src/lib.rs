//! Foundation types for Tally.
//!
//! This crate provides the value types shared by the diff engine and the
//! billing model. Every other Tally crate depends on `tally-types`.
//!
//! # Key Types
//!
//! - [`Micros`] -- Fixed-point decimal (1e-6 scale) for money and quantities
//! - [`Period`] -- Half-open billing period over UTC timestamps
//! - [`new_entity_id`] -- Time-ordered (UUID v7) identifier for new rows

pub mod amount;
pub mod error;
pub mod identity;
pub mod period;

pub use amount::Micros;
pub use error::TypeError;
pub use identity::{is_unsaved, new_entity_id};
pub use period::Period;
