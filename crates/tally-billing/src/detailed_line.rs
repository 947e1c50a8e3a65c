use serde::{Deserialize, Serialize};
use tally_diff::{Entity, Equaler};
use tally_types::{Micros, Period};

use crate::discount::AmountDiscount;
use crate::error::{BillingError, BillingResult, EntityKind};
use crate::line::Totals;
use crate::managed::{Managed, ManagedFields};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailedLineCategory {
    #[default]
    Regular,
    /// Charge for unmet minimum spend commitments.
    Commitment,
}

/// A priced breakdown of a [`Line`](crate::Line) (e.g. one tier of a tiered
/// price, or one flat fee).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedLine {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub category: DetailedLineCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_unique_reference_id: Option<String>,
    /// Display position among the line's children.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    pub period: Period,
    pub per_unit_amount: Micros,
    pub quantity: Micros,
    #[serde(default)]
    pub totals: Totals,
    #[serde(default)]
    pub amount_discounts: Vec<AmountDiscount>,
    #[serde(flatten)]
    pub managed: ManagedFields,
}

impl DetailedLine {
    pub fn new(
        name: impl Into<String>,
        period: Period,
        per_unit_amount: Micros,
        quantity: Micros,
    ) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            description: None,
            category: DetailedLineCategory::Regular,
            child_unique_reference_id: None,
            index: None,
            period,
            per_unit_amount,
            quantity,
            totals: Totals::default(),
            amount_discounts: Vec::new(),
            managed: ManagedFields::default(),
        }
    }

    /// The detailed line's own columns, without its discounts.
    pub fn header(&self) -> DetailedLine {
        DetailedLine {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            category: self.category,
            child_unique_reference_id: self.child_unique_reference_id.clone(),
            index: self.index,
            period: self.period,
            per_unit_amount: self.per_unit_amount,
            quantity: self.quantity,
            totals: self.totals.clone(),
            amount_discounts: Vec::new(),
            managed: self.managed.clone(),
        }
    }

    /// Validate the detailed line's own columns.
    pub fn validate(&self) -> BillingResult<()> {
        let fail = |reason: String| {
            Err(BillingError::validation(EntityKind::DetailedLine, &self.id, reason))
        };

        if self.name.trim().is_empty() {
            return fail("name must not be empty".into());
        }
        if !self.period.is_valid() {
            return fail(format!("period start is after end ({})", self.period));
        }
        if self.quantity.is_negative() {
            return fail(format!("quantity must not be negative, got {}", self.quantity));
        }
        Ok(())
    }

    /// Validate the detailed line and every live discount under it,
    /// reporting all failures.
    pub fn validate_subtree(&self) -> Vec<BillingError> {
        let mut errors: Vec<BillingError> = self.validate().err().into_iter().collect();
        errors.extend(
            self.amount_discounts
                .iter()
                .filter(|d| !d.is_deleted())
                .filter_map(|d| d.validate(EntityKind::DetailedLineAmountDiscount).err()),
        );
        errors
    }
}

impl Entity for DetailedLine {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_deleted(&self) -> bool {
        self.managed.is_deleted()
    }
}

/// Own-column equality: discounts and bookkeeping are excluded.
impl Equaler for DetailedLine {
    fn equal(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.description == other.description
            && self.category == other.category
            && self.child_unique_reference_id == other.child_unique_reference_id
            && self.index == other.index
            && self.period == other.period
            && self.per_unit_amount == other.per_unit_amount
            && self.quantity == other.quantity
            && self.totals == other.totals
    }
}

impl Managed for DetailedLine {
    fn managed(&self) -> &ManagedFields {
        &self.managed
    }

    fn managed_mut(&mut self) -> &mut ManagedFields {
        &mut self.managed
    }
}
