//! Discounts attached to lines and detailed lines.
//!
//! Discounts are leaf entities: they are diffed by ID and content equality
//! and never have children of their own.

use serde::{Deserialize, Serialize};
use tally_diff::{Entity, Equaler};
use tally_types::Micros;

use crate::error::{BillingError, BillingResult, EntityKind};
use crate::managed::{Managed, ManagedFields};

/// Why a discount was granted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountReason {
    /// Spend above the rate card's maximum was waived.
    MaximumSpend,
    /// Percentage discount from the rate card.
    RatecardPercentage,
    /// Free usage quantity from the rate card.
    RatecardUsage,
}

/// A discount expressed as metered quantity removed before pricing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageDiscount {
    #[serde(default)]
    pub id: String,
    /// Stable key assigned by the rating pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_unique_reference_id: Option<String>,
    pub reason: DiscountReason,
    pub quantity: Micros,
    /// Quantity already discounted in earlier periods of a split line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_line_period_quantity: Option<Micros>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub managed: ManagedFields,
}

impl UsageDiscount {
    pub fn new(reason: DiscountReason, quantity: Micros) -> Self {
        Self {
            id: String::new(),
            child_unique_reference_id: None,
            reason,
            quantity,
            pre_line_period_quantity: None,
            description: None,
            managed: ManagedFields::default(),
        }
    }

    pub fn validate(&self) -> BillingResult<()> {
        if self.quantity.is_negative() {
            return Err(BillingError::validation(
                EntityKind::UsageDiscount,
                &self.id,
                format!("quantity must not be negative, got {}", self.quantity),
            ));
        }
        if self.pre_line_period_quantity.is_some_and(Micros::is_negative) {
            return Err(BillingError::validation(
                EntityKind::UsageDiscount,
                &self.id,
                "pre-line period quantity must not be negative",
            ));
        }
        Ok(())
    }
}

impl Entity for UsageDiscount {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_deleted(&self) -> bool {
        self.managed.is_deleted()
    }
}

impl Equaler for UsageDiscount {
    fn equal(&self, other: &Self) -> bool {
        self.id == other.id
            && self.child_unique_reference_id == other.child_unique_reference_id
            && self.reason == other.reason
            && self.quantity == other.quantity
            && self.pre_line_period_quantity == other.pre_line_period_quantity
            && self.description == other.description
    }
}

impl Managed for UsageDiscount {
    fn managed(&self) -> &ManagedFields {
        &self.managed
    }

    fn managed_mut(&mut self) -> &mut ManagedFields {
        &mut self.managed
    }
}

/// A discount expressed as money taken off the line amount.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountDiscount {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_unique_reference_id: Option<String>,
    pub reason: DiscountReason,
    pub amount: Micros,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub managed: ManagedFields,
}

impl AmountDiscount {
    pub fn new(reason: DiscountReason, amount: Micros) -> Self {
        Self {
            id: String::new(),
            child_unique_reference_id: None,
            reason,
            amount,
            description: None,
            managed: ManagedFields::default(),
        }
    }

    /// `kind` distinguishes line-level from detailed-line-level discounts in
    /// error reports.
    pub fn validate(&self, kind: EntityKind) -> BillingResult<()> {
        if self.amount.is_negative() {
            return Err(BillingError::validation(
                kind,
                &self.id,
                format!("amount must not be negative, got {}", self.amount),
            ));
        }
        Ok(())
    }
}

impl Entity for AmountDiscount {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_deleted(&self) -> bool {
        self.managed.is_deleted()
    }
}

impl Equaler for AmountDiscount {
    fn equal(&self, other: &Self) -> bool {
        self.id == other.id
            && self.child_unique_reference_id == other.child_unique_reference_id
            && self.reason == other.reason
            && self.amount == other.amount
            && self.description == other.description
    }
}

impl Managed for AmountDiscount {
    fn managed(&self) -> &ManagedFields {
        &self.managed
    }

    fn managed_mut(&mut self) -> &mut ManagedFields {
        &mut self.managed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn m(s: &str) -> Micros {
        s.parse().unwrap()
    }

    #[test]
    fn equality_ignores_managed_fields() {
        let mut a = AmountDiscount::new(DiscountReason::MaximumSpend, m("5"));
        a.id = "d1".into();
        let mut b = a.clone();
        b.managed = ManagedFields::created(Utc::now());
        b.soft_delete(Utc::now());
        assert!(a.equal(&b));
        assert!(a.equal(&a));
    }

    #[test]
    fn equality_detects_content_change() {
        let mut a = UsageDiscount::new(DiscountReason::RatecardUsage, m("10"));
        a.id = "u1".into();
        let mut b = a.clone();
        b.pre_line_period_quantity = Some(m("2"));
        assert!(!a.equal(&b));
    }

    #[test]
    fn negative_values_are_rejected() {
        let usage = UsageDiscount::new(DiscountReason::RatecardUsage, m("-1"));
        assert!(matches!(
            usage.validate(),
            Err(BillingError::Validation { kind: EntityKind::UsageDiscount, .. })
        ));

        let amount = AmountDiscount::new(DiscountReason::RatecardPercentage, m("-0.01"));
        assert!(matches!(
            amount.validate(EntityKind::DetailedLineAmountDiscount),
            Err(BillingError::Validation { kind: EntityKind::DetailedLineAmountDiscount, .. })
        ));
    }

    #[test]
    fn deserializes_with_flattened_timestamps() {
        let json = r#"{
            "id": "d1",
            "reason": "maximum_spend",
            "amount": "12.5",
            "deleted_at": "2024-01-02T00:00:00Z"
        }"#;
        let d: AmountDiscount = serde_json::from_str(json).unwrap();
        assert_eq!(d.amount, m("12.5"));
        assert!(d.is_deleted());
    }
}
