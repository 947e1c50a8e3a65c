//! Identity-based diff engine for Tally.
//!
//! Correlates a freshly computed collection of entities against the last
//! persisted snapshot of the same collection and classifies every entity as
//! created, updated or deleted. Entities only need an ID and a soft-delete
//! flag ([`Entity`]); content comparison ([`Equaler`]) is opt-in and only
//! required for leaf entities.
//!
//! # Key Types
//!
//! - [`Entity`] / [`Equaler`] / [`WithParent`] -- Capabilities of diffable values
//! - [`correlate`] / [`Correlation`] -- Pairwise correlation by ID
//! - [`diff_by_id_equaler`] -- Correlation filtered by content equality (leaf entities)
//! - [`diff_by_id`] / [`DiffHandler`] -- Callback-driven diff for composite entities
//! - [`Diff`] / [`DiffUpdate`] / [`Set`] -- Batch accumulators

pub mod by_id;
pub mod diff;
pub mod entity;
pub mod error;
pub mod set;

pub use by_id::{
    correlate, diff_by_id, diff_by_id_equaler, Correlation, DiffByIdInput, DiffHandler,
};
pub use diff::{union, Diff, DiffUpdate};
pub use entity::{Entity, Equaler, WithParent};
pub use error::{join_errors, JoinedError};
pub use set::Set;
