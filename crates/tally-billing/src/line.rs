use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_diff::{Entity, Equaler};
use tally_types::{Micros, Period};

use crate::detailed_line::DetailedLine;
use crate::discount::{AmountDiscount, UsageDiscount};
use crate::error::{BillingError, BillingResult, EntityKind};
use crate::managed::{Managed, ManagedFields};

/// Lifecycle of a line within progressive billing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
    /// A regular, billable line.
    #[default]
    Valid,
    /// A line that was split across invoices; its parts are billed instead.
    Split,
    /// A line produced as a detailed breakdown of another line.
    Detailed,
}

/// Computed monetary totals of a line or detailed line.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Totals {
    pub amount: Micros,
    pub charges_total: Micros,
    pub discounts_total: Micros,
    pub taxes_total: Micros,
    pub total: Micros,
}

/// A top-level invoice line and everything billed under it.
///
/// `db_state` holds the persisted snapshot captured when the line was loaded
/// (`None` for lines that were never saved). The reconciler reads it and
/// never modifies it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    #[serde(default)]
    pub id: String,
    pub invoice_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub currency: String,
    #[serde(default)]
    pub status: LineStatus,
    pub period: Period,
    pub invoice_at: DateTime<Utc>,
    pub quantity: Micros,
    pub per_unit_amount: Micros,
    #[serde(default)]
    pub totals: Totals,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_line_group_id: Option<String>,
    #[serde(default)]
    pub usage_discounts: Vec<UsageDiscount>,
    #[serde(default)]
    pub amount_discounts: Vec<AmountDiscount>,
    #[serde(default)]
    pub detailed_lines: Vec<DetailedLine>,
    #[serde(flatten)]
    pub managed: ManagedFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_state: Option<Box<Line>>,
}

impl Line {
    pub fn new(
        invoice_id: impl Into<String>,
        name: impl Into<String>,
        currency: impl Into<String>,
        period: Period,
        quantity: Micros,
        per_unit_amount: Micros,
    ) -> Self {
        Self {
            id: String::new(),
            invoice_id: invoice_id.into(),
            name: name.into(),
            description: None,
            currency: currency.into(),
            status: LineStatus::Valid,
            period,
            invoice_at: period.end,
            quantity,
            per_unit_amount,
            totals: Totals::default(),
            split_line_group_id: None,
            usage_discounts: Vec::new(),
            amount_discounts: Vec::new(),
            detailed_lines: Vec::new(),
            managed: ManagedFields::default(),
            db_state: None,
        }
    }

    /// The persisted view of this line: a copy without its own snapshot.
    pub fn snapshot(&self) -> Line {
        Line {
            db_state: None,
            ..self.clone()
        }
    }

    /// Record the current state as the persisted snapshot.
    pub fn save_db_state(&mut self) {
        let snapshot = self.snapshot();
        self.db_state = Some(Box::new(snapshot));
    }

    /// The line's own columns, without children or snapshot.
    pub fn header(&self) -> Line {
        Line {
            id: self.id.clone(),
            invoice_id: self.invoice_id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            currency: self.currency.clone(),
            status: self.status,
            period: self.period,
            invoice_at: self.invoice_at,
            quantity: self.quantity,
            per_unit_amount: self.per_unit_amount,
            totals: self.totals.clone(),
            split_line_group_id: self.split_line_group_id.clone(),
            usage_discounts: Vec::new(),
            amount_discounts: Vec::new(),
            detailed_lines: Vec::new(),
            managed: self.managed.clone(),
            db_state: None,
        }
    }

    /// Validate the line's own columns.
    pub fn validate(&self) -> BillingResult<()> {
        let fail =
            |reason: String| Err(BillingError::validation(EntityKind::Line, &self.id, reason));

        if self.invoice_id.is_empty() {
            return fail("invoice ID must not be empty".into());
        }
        if self.name.trim().is_empty() {
            return fail("name must not be empty".into());
        }
        if self.currency.len() != 3 || !self.currency.bytes().all(|b| b.is_ascii_uppercase()) {
            return fail(format!("currency must be a three letter code, got {:?}", self.currency));
        }
        if !self.period.is_valid() {
            return fail(format!("period start is after end ({})", self.period));
        }
        if self.quantity.is_negative() {
            return fail(format!("quantity must not be negative, got {}", self.quantity));
        }
        Ok(())
    }

    /// Validate the line and every live entity beneath it, reporting all
    /// failures.
    pub fn validate_subtree(&self) -> Vec<BillingError> {
        let mut errors: Vec<BillingError> = self.validate().err().into_iter().collect();
        errors.extend(
            self.usage_discounts
                .iter()
                .filter(|d| !d.is_deleted())
                .filter_map(|d| d.validate().err()),
        );
        errors.extend(
            self.amount_discounts
                .iter()
                .filter(|d| !d.is_deleted())
                .filter_map(|d| d.validate(EntityKind::AmountDiscount).err()),
        );
        for child in self.detailed_lines.iter().filter(|c| !c.is_deleted()) {
            errors.extend(child.validate_subtree());
        }
        errors
    }
}

impl Entity for Line {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_deleted(&self) -> bool {
        self.managed.is_deleted()
    }
}

/// Own-column equality: children, bookkeeping and the snapshot are excluded.
impl Equaler for Line {
    fn equal(&self, other: &Self) -> bool {
        self.id == other.id
            && self.invoice_id == other.invoice_id
            && self.name == other.name
            && self.description == other.description
            && self.currency == other.currency
            && self.status == other.status
            && self.period == other.period
            && self.invoice_at == other.invoice_at
            && self.quantity == other.quantity
            && self.per_unit_amount == other.per_unit_amount
            && self.totals == other.totals
            && self.split_line_group_id == other.split_line_group_id
    }
}

impl Managed for Line {
    fn managed(&self) -> &ManagedFields {
        &self.managed
    }

    fn managed_mut(&mut self) -> &mut ManagedFields {
        &mut self.managed
    }
}
