//! Reconciliation of an invoice's whole line hierarchy in one pass.
//!
//! Lines and detailed lines are composite: they go through
//! [`diff_by_id`] so that each correlated pair can recurse into its children.
//! Discounts are leaves and go through [`diff_by_id_equaler`].
//!
//! Creating or deleting an entity creates or deletes its whole subtree. An
//! entity whose own columns are unchanged but whose descendants changed is
//! reported as affected so storage can touch its row.

use std::collections::HashSet;
use std::mem;

use tally_diff::{
    diff_by_id, diff_by_id_equaler, Diff, DiffByIdInput, DiffHandler, DiffUpdate, Entity, Equaler,
    Set, WithParent,
};
use tracing::debug;

use crate::detailed_line::DetailedLine;
use crate::discount::{AmountDiscount, UsageDiscount};
use crate::error::{collect_errors, BillingError, BillingResult, EntityKind};
use crate::line::Line;
use crate::report::PlanReport;

/// An entity owned by a line.
pub type LineChild<'a, T> = WithParent<&'a T, &'a Line>;

/// An entity owned by a detailed line.
pub type DetailedLineChild<'a, T> = WithParent<&'a T, &'a DetailedLine>;

/// The complete plan for one invoice: a batch per entity kind plus the IDs of
/// ancestors whose rows need touching.
#[derive(Debug, Default)]
pub struct LineDiff<'a> {
    pub line: Diff<&'a Line>,
    pub usage_discounts: Diff<LineChild<'a, UsageDiscount>>,
    pub amount_discounts: Diff<LineChild<'a, AmountDiscount>>,
    pub detailed_line: Diff<LineChild<'a, DetailedLine>>,
    pub detailed_line_amount_discounts: Diff<DetailedLineChild<'a, AmountDiscount>>,
    /// Lines whose own columns are unchanged but whose descendants changed.
    pub affected_line_ids: Set<String>,
    /// Detailed lines whose own columns are unchanged but whose discounts
    /// changed.
    pub detailed_line_affected_line_ids: Set<String>,
}

impl LineDiff<'_> {
    /// Returns `true` if storage is already up to date.
    pub fn is_empty(&self) -> bool {
        self.line.is_empty()
            && self.usage_discounts.is_empty()
            && self.amount_discounts.is_empty()
            && self.detailed_line.is_empty()
            && self.detailed_line_amount_discounts.is_empty()
            && self.affected_line_ids.is_empty()
            && self.detailed_line_affected_line_ids.is_empty()
    }

    pub fn report(&self) -> PlanReport {
        PlanReport::from(self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiffOptions {
    /// Validate every expected entity that is created or updated.
    pub validate: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self { validate: true }
    }
}

/// Diff `lines` against the persisted snapshots they carry, validating
/// everything that will be written.
pub fn diff_invoice_lines(lines: &[Line]) -> BillingResult<LineDiff<'_>> {
    diff_invoice_lines_with(lines, DiffOptions::default())
}

/// Diff `lines` against the persisted snapshots they carry.
///
/// Handler failures do not stop the traversal; all of them are returned
/// together and no plan is produced.
pub fn diff_invoice_lines_with(
    lines: &[Line],
    options: DiffOptions,
) -> BillingResult<LineDiff<'_>> {
    let expected: Vec<&Line> = lines.iter().collect();
    let db_state: Vec<&Line> = lines.iter().filter_map(|l| l.db_state.as_deref()).collect();

    let mut out = LineDiff::default();
    let result = diff_by_id(DiffByIdInput {
        db_state: &db_state,
        expected_state: &expected,
        handler: LineHandler {
            out: &mut out,
            validate: options.validate,
        },
    });
    if let Err(joined) = result {
        collect_errors(joined.into_errors())?;
    }

    debug!(
        lines = lines.len(),
        line_ops = out.line.len(),
        usage_discount_ops = out.usage_discounts.len(),
        amount_discount_ops = out.amount_discounts.len(),
        detailed_line_ops = out.detailed_line.len(),
        detailed_line_discount_ops = out.detailed_line_amount_discounts.len(),
        affected_lines = out.affected_line_ids.len(),
        affected_detailed_lines = out.detailed_line_affected_line_ids.len(),
        "computed invoice line diff"
    );

    Ok(out)
}

fn tag<'a, T, P>(items: &'a [T], parent: &'a P) -> Vec<WithParent<&'a T, &'a P>> {
    items.iter().map(|item| WithParent::new(item, parent)).collect()
}

/// Children to delete along with their parent: every persisted child of the
/// expected state plus any persisted child the caller already dropped.
/// Children that never got an ID have no row to delete.
fn cascade<'a, T: Entity>(expected: &'a [T], persisted: Option<&'a [T]>) -> Vec<&'a T> {
    let known: HashSet<&str> = expected.iter().map(|c| c.id()).collect();
    let mut out: Vec<&T> = expected.iter().filter(|c| !c.id().is_empty()).collect();
    if let Some(persisted) = persisted {
        out.extend(
            persisted
                .iter()
                .filter(|c| !c.id().is_empty() && !known.contains(c.id())),
        );
    }
    out
}

/// Items whose expected state will be written.
fn written<T: Copy>(diff: &Diff<T>) -> impl Iterator<Item = T> + '_ {
    diff.create
        .iter()
        .copied()
        .chain(diff.update.iter().map(|u| u.expected_state))
}

fn record_detailed_create<'a>(out: &mut LineDiff<'a>, item: LineChild<'a, DetailedLine>) {
    out.detailed_line.needs_create(item);
    for discount in item.entity.amount_discounts.iter().filter(|d| !d.is_deleted()) {
        out.detailed_line_amount_discounts
            .needs_create(WithParent::new(discount, item.entity));
    }
}

fn record_detailed_delete<'a>(
    out: &mut LineDiff<'a>,
    item: LineChild<'a, DetailedLine>,
    persisted: Option<&'a DetailedLine>,
) {
    out.detailed_line.needs_delete(item);
    let persisted_discounts = persisted.map(|p| p.amount_discounts.as_slice());
    for discount in cascade(&item.entity.amount_discounts, persisted_discounts) {
        out.detailed_line_amount_discounts
            .needs_delete(WithParent::new(discount, item.entity));
    }
}

struct LineHandler<'a, 'd> {
    out: &'d mut LineDiff<'a>,
    validate: bool,
}

impl<'a> DiffHandler<&'a Line> for LineHandler<'a, '_> {
    type Error = BillingError;

    fn handle_delete(&mut self, line: &'a Line) -> BillingResult<()> {
        self.out.line.needs_delete(line);

        let persisted = line.db_state.as_deref();
        let usage = cascade(
            &line.usage_discounts,
            persisted.map(|p| p.usage_discounts.as_slice()),
        );
        for discount in usage {
            self.out.usage_discounts.needs_delete(WithParent::new(discount, line));
        }
        let amount = cascade(
            &line.amount_discounts,
            persisted.map(|p| p.amount_discounts.as_slice()),
        );
        for discount in amount {
            self.out.amount_discounts.needs_delete(WithParent::new(discount, line));
        }
        let children = cascade(
            &line.detailed_lines,
            persisted.map(|p| p.detailed_lines.as_slice()),
        );
        for child in children {
            let persisted_child =
                persisted.and_then(|p| p.detailed_lines.iter().find(|c| c.id == child.id));
            record_detailed_delete(self.out, WithParent::new(child, line), persisted_child);
        }
        Ok(())
    }

    fn handle_create(&mut self, line: &'a Line) -> BillingResult<()> {
        if self.validate {
            collect_errors(line.validate_subtree())?;
        }

        self.out.line.needs_create(line);
        for discount in line.usage_discounts.iter().filter(|d| !d.is_deleted()) {
            self.out.usage_discounts.needs_create(WithParent::new(discount, line));
        }
        for discount in line.amount_discounts.iter().filter(|d| !d.is_deleted()) {
            self.out.amount_discounts.needs_create(WithParent::new(discount, line));
        }
        for child in line.detailed_lines.iter().filter(|c| !c.is_deleted()) {
            record_detailed_create(self.out, WithParent::new(child, line));
        }
        Ok(())
    }

    fn handle_update(&mut self, update: DiffUpdate<&'a Line>) -> BillingResult<()> {
        let DiffUpdate {
            persisted_state: db,
            expected_state: line,
        } = update;
        let mut errors = Vec::new();

        if self.validate {
            errors.extend(line.validate().err());
        }

        let own_changed = !db.equal(line);
        if own_changed {
            self.out.line.needs_update(DiffUpdate::new(db, line));
        }

        let usage = diff_by_id_equaler(
            &tag(&line.usage_discounts, line),
            &tag(&db.usage_discounts, line),
        );
        let amount = diff_by_id_equaler(
            &tag(&line.amount_discounts, line),
            &tag(&db.amount_discounts, line),
        );
        if self.validate {
            errors.extend(written(&usage).filter_map(|d| d.entity.validate().err()));
            errors.extend(
                written(&amount)
                    .filter_map(|d| d.entity.validate(EntityKind::AmountDiscount).err()),
            );
        }
        let mut descendants_changed = !usage.is_empty() || !amount.is_empty();
        self.out.usage_discounts = mem::take(&mut self.out.usage_discounts).append(usage);
        self.out.amount_discounts = mem::take(&mut self.out.amount_discounts).append(amount);

        let expected_children = tag(&line.detailed_lines, line);
        let db_children = tag(&db.detailed_lines, line);
        let mut children = DetailedLineHandler {
            out: &mut *self.out,
            validate: self.validate,
            persisted: &db.detailed_lines,
            changed: false,
        };
        if let Err(joined) = diff_by_id(DiffByIdInput {
            db_state: &db_children,
            expected_state: &expected_children,
            handler: &mut children,
        }) {
            errors.extend(joined.into_errors());
        }
        descendants_changed |= children.changed;

        if !own_changed && descendants_changed && !line.is_deleted() {
            self.out.affected_line_ids.add([line.id.clone()]);
        }

        collect_errors(errors)
    }
}

struct DetailedLineHandler<'a, 'd> {
    out: &'d mut LineDiff<'a>,
    validate: bool,
    /// Persisted children of the line being updated.
    persisted: &'a [DetailedLine],
    /// Set once any detailed line or detailed line discount changes.
    changed: bool,
}

impl<'a> DiffHandler<LineChild<'a, DetailedLine>> for DetailedLineHandler<'a, '_> {
    type Error = BillingError;

    fn handle_delete(&mut self, item: LineChild<'a, DetailedLine>) -> BillingResult<()> {
        let persisted = self.persisted.iter().find(|c| c.id == item.entity.id);
        record_detailed_delete(self.out, item, persisted);
        self.changed = true;
        Ok(())
    }

    fn handle_create(&mut self, item: LineChild<'a, DetailedLine>) -> BillingResult<()> {
        if self.validate {
            collect_errors(item.entity.validate_subtree())?;
        }
        record_detailed_create(self.out, item);
        self.changed = true;
        Ok(())
    }

    fn handle_update(
        &mut self,
        update: DiffUpdate<LineChild<'a, DetailedLine>>,
    ) -> BillingResult<()> {
        let DiffUpdate {
            persisted_state: db,
            expected_state: child,
        } = update;
        let mut errors = Vec::new();

        if self.validate {
            errors.extend(child.entity.validate().err());
        }

        let own_changed = !db.equal(&child);
        if own_changed {
            self.out.detailed_line.needs_update(DiffUpdate::new(db, child));
        }

        let discounts = diff_by_id_equaler(
            &tag(&child.entity.amount_discounts, child.entity),
            &tag(&db.entity.amount_discounts, child.entity),
        );
        if self.validate {
            let kind = EntityKind::DetailedLineAmountDiscount;
            errors.extend(written(&discounts).filter_map(|d| d.entity.validate(kind).err()));
        }

        if !own_changed && !discounts.is_empty() && !child.is_deleted() {
            self.out
                .detailed_line_affected_line_ids
                .add([child.entity.id.clone()]);
        }
        self.changed |= own_changed || !discounts.is_empty();
        self.out.detailed_line_amount_discounts =
            mem::take(&mut self.out.detailed_line_amount_discounts).append(discounts);

        collect_errors(errors)
    }
}
