use serde::{Deserialize, Serialize};

use crate::error::BillingError;
use crate::line::Line;
use crate::report::PlanReport;

/// Result of a successful [`LineGateway::upsert_lines`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertOutcome {
    /// The plan that was applied.
    pub report: PlanReport,
}

/// Persistence boundary for invoice line hierarchies.
pub trait LineGateway: Send + Sync {
    /// Reconcile `lines` against the snapshots they carry and persist the
    /// difference.
    ///
    /// On success every written entity has its ID and timestamps filled in
    /// and every line's snapshot reflects the new persisted state. On error
    /// neither the store nor `lines` are modified.
    fn upsert_lines(&self, lines: &mut [Line]) -> Result<UpsertOutcome, BillingError>;

    /// Load the live lines of an invoice with their snapshots captured.
    /// Deleted lines and deleted children are left out.
    fn get_lines(&self, invoice_id: &str) -> Result<Vec<Line>, BillingError>;

    /// Like [`get_lines`](Self::get_lines) but keeps soft-deleted entities.
    fn get_lines_including_deleted(&self, invoice_id: &str) -> Result<Vec<Line>, BillingError>;
}
