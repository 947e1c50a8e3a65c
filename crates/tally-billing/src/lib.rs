//! Invoice line hierarchy for Tally.
//!
//! An invoice is billed as a set of [`Line`]s. Each line carries usage and
//! amount discounts and may be broken down into [`DetailedLine`]s, which carry
//! amount discounts of their own. Lines are recomputed wholesale on every
//! billing pass; this crate reconciles the recomputed hierarchy against the
//! persisted snapshot and persists only what changed.
//!
//! - [`diff_invoice_lines`] builds a [`LineDiff`]: create/update/delete batches
//!   for every entity kind plus the IDs of ancestors to touch
//! - [`LineGateway`] is the persistence boundary; [`InMemoryLineStore`]
//!   implements it for tests and embedding
//! - [`PlanReport`] is the serializable summary of a plan

pub mod config;
pub mod detailed_line;
pub mod discount;
pub mod error;
pub mod line;
pub mod line_diff;
pub mod managed;
pub mod memory;
pub mod report;
pub mod traits;

#[cfg(test)]
pub(crate) mod fixtures;

pub use config::StoreConfig;
pub use detailed_line::{DetailedLine, DetailedLineCategory};
pub use discount::{AmountDiscount, DiscountReason, UsageDiscount};
pub use error::{BillingError, BillingResult, EntityKind};
pub use line::{Line, LineStatus, Totals};
pub use line_diff::{diff_invoice_lines, diff_invoice_lines_with, DiffOptions, LineDiff};
pub use managed::{Managed, ManagedFields};
pub use memory::InMemoryLineStore;
pub use report::{BatchReport, PlanReport};
pub use traits::{LineGateway, UpsertOutcome};
pub use tally_diff::Entity;
