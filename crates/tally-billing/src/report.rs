//! Serializable summaries of reconciliation plans.

use serde::{Deserialize, Serialize};
use tally_diff::{Diff, Entity, Set};

use crate::line_diff::LineDiff;

/// IDs per operation of one entity batch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub create: Vec<String>,
    pub update: Vec<String>,
    pub delete: Vec<String>,
}

impl BatchReport {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    pub fn len(&self) -> usize {
        self.create.len() + self.update.len() + self.delete.len()
    }
}

impl<T: Entity> From<&Diff<T>> for BatchReport {
    fn from(diff: &Diff<T>) -> Self {
        Self {
            create: diff.create.iter().map(|i| i.id().to_string()).collect(),
            update: diff
                .update
                .iter()
                .map(|u| u.expected_state.id().to_string())
                .collect(),
            delete: diff.delete.iter().map(|i| i.id().to_string()).collect(),
        }
    }
}

/// What a plan does, by entity kind. Entities without an ID yet are listed
/// with an empty ID.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanReport {
    pub lines: BatchReport,
    pub usage_discounts: BatchReport,
    pub amount_discounts: BatchReport,
    pub detailed_lines: BatchReport,
    pub detailed_line_amount_discounts: BatchReport,
    /// Sorted.
    pub affected_line_ids: Vec<String>,
    /// Sorted.
    pub detailed_line_affected_line_ids: Vec<String>,
}

impl PlanReport {
    pub fn is_empty(&self) -> bool {
        self.batches().iter().all(|(_, b)| b.is_empty())
            && self.affected_line_ids.is_empty()
            && self.detailed_line_affected_line_ids.is_empty()
    }

    /// Rows written by the plan, not counting touched ancestors.
    pub fn operation_count(&self) -> usize {
        self.batches().iter().map(|(_, b)| b.len()).sum()
    }

    /// Every batch with a display label, in apply order.
    pub fn batches(&self) -> [(&'static str, &BatchReport); 5] {
        [
            ("lines", &self.lines),
            ("usage discounts", &self.usage_discounts),
            ("amount discounts", &self.amount_discounts),
            ("detailed lines", &self.detailed_lines),
            ("detailed line discounts", &self.detailed_line_amount_discounts),
        ]
    }
}

fn sorted(ids: &Set<String>) -> Vec<String> {
    let mut ids = ids.as_slice();
    ids.sort();
    ids
}

impl From<&LineDiff<'_>> for PlanReport {
    fn from(diff: &LineDiff<'_>) -> Self {
        Self {
            lines: BatchReport::from(&diff.line),
            usage_discounts: BatchReport::from(&diff.usage_discounts),
            amount_discounts: BatchReport::from(&diff.amount_discounts),
            detailed_lines: BatchReport::from(&diff.detailed_line),
            detailed_line_amount_discounts: BatchReport::from(&diff.detailed_line_amount_discounts),
            affected_line_ids: sorted(&diff.affected_line_ids),
            detailed_line_affected_line_ids: sorted(&diff.detailed_line_affected_line_ids),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{micros, persisted, sample_invoice};
    use crate::line_diff::diff_invoice_lines;

    #[test]
    fn report_of_fresh_invoice() {
        let lines = sample_invoice();
        let report = diff_invoice_lines(&lines).unwrap().report();

        assert_eq!(report.lines.create, vec!["1", "2"]);
        assert_eq!(report.detailed_lines.create, vec!["2.1", "2.2"]);
        assert_eq!(report.detailed_line_amount_discounts.create, vec!["D2.1.1"]);
        assert_eq!(report.operation_count(), 5);
        assert!(!report.is_empty());
    }

    #[test]
    fn report_of_unchanged_invoice_is_empty() {
        let lines = persisted(sample_invoice());
        let report = diff_invoice_lines(&lines).unwrap().report();
        assert!(report.is_empty());
        assert_eq!(report.operation_count(), 0);
    }

    #[test]
    fn affected_ids_are_reported_sorted() {
        let mut lines = persisted(sample_invoice());
        lines[0].usage_discounts.push(crate::UsageDiscount::new(
            crate::DiscountReason::RatecardUsage,
            micros("1"),
        ));
        lines[1].detailed_lines[0].amount_discounts[0].amount = micros("3");

        let report = diff_invoice_lines(&lines).unwrap().report();
        assert_eq!(report.affected_line_ids, vec!["1", "2"]);
        assert_eq!(report.detailed_line_affected_line_ids, vec!["2.1"]);
        assert_eq!(report.usage_discounts.create, vec![""]);
        // Touched ancestors are not counted as writes.
        assert_eq!(report.operation_count(), 2);
    }

    #[test]
    fn report_serializes_as_json() {
        let lines = sample_invoice();
        let report = diff_invoice_lines(&lines).unwrap().report();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["lines"]["create"][1], "2");
        let back: PlanReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }
}
