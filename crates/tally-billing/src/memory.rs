use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tally_diff::{Diff, Entity};
use tally_types::{is_unsaved, new_entity_id};
use tracing::{info, warn};

use crate::config::StoreConfig;
use crate::detailed_line::DetailedLine;
use crate::discount::{AmountDiscount, UsageDiscount};
use crate::error::{BillingError, BillingResult, EntityKind};
use crate::line::Line;
use crate::line_diff::{diff_invoice_lines_with, DiffOptions, LineDiff};
use crate::managed::{Managed, ManagedFields};
use crate::traits::{LineGateway, UpsertOutcome};

/// In-memory line store for tests, local tooling, and embedding.
///
/// Every entity kind lives in its own table keyed by ID, with a reference to
/// its parent (lines reference their invoice). Rows are soft-deleted.
pub struct InMemoryLineStore {
    config: StoreConfig,
    inner: RwLock<Tables>,
}

#[derive(Clone, Debug)]
struct Row<T> {
    parent_id: String,
    value: T,
}

impl<T> Row<T> {
    fn new(parent_id: &str, value: T) -> Self {
        Self {
            parent_id: parent_id.to_string(),
            value,
        }
    }
}

#[derive(Clone, Debug, Default)]
struct Tables {
    lines: HashMap<String, Row<Line>>,
    usage_discounts: HashMap<String, Row<UsageDiscount>>,
    amount_discounts: HashMap<String, Row<AmountDiscount>>,
    detailed_lines: HashMap<String, Row<DetailedLine>>,
    detailed_line_amount_discounts: HashMap<String, Row<AmountDiscount>>,
}

fn poisoned<E>(_: E) -> BillingError {
    BillingError::Storage("line store lock poisoned".into())
}

impl InMemoryLineStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(Tables::default()),
        }
    }

    /// [`LineGateway::upsert_lines`] with an explicit clock.
    pub fn upsert_lines_at(
        &self,
        lines: &mut [Line],
        now: DateTime<Utc>,
    ) -> BillingResult<UpsertOutcome> {
        let mut staged = lines.to_vec();
        assign_ids(&mut staged);

        let mut guard = self.inner.write().map_err(poisoned)?;
        let mut tables = guard.clone();

        let plan = diff_invoice_lines_with(
            &staged,
            DiffOptions {
                validate: self.config.validate_expected,
            },
        )?;
        let report = plan.report();
        apply(&mut tables, &plan, now, self.config.touch_affected_ancestors)?;

        for line in &mut staged {
            refresh_line(line, &tables);
            line.save_db_state();
        }
        *guard = tables;
        drop(guard);

        lines.clone_from_slice(&staged);

        info!(
            lines = lines.len(),
            operations = report.operation_count(),
            affected_lines = report.affected_line_ids.len(),
            affected_detailed_lines = report.detailed_line_affected_line_ids.len(),
            "upserted invoice lines"
        );

        Ok(UpsertOutcome { report })
    }

    fn load(&self, invoice_id: &str, include_deleted: bool) -> BillingResult<Vec<Line>> {
        let tables = self.inner.read().map_err(poisoned)?;
        let visible = |deleted: bool| include_deleted || !deleted;

        let mut lines: Vec<Line> = tables
            .lines
            .values()
            .filter(|row| row.parent_id == invoice_id && visible(row.value.is_deleted()))
            .map(|row| row.value.clone())
            .collect();
        lines.sort_by(|a, b| a.id.cmp(&b.id));

        for line in &mut lines {
            line.usage_discounts = children(&tables.usage_discounts, &line.id, include_deleted);
            line.amount_discounts = children(&tables.amount_discounts, &line.id, include_deleted);
            line.detailed_lines = children(&tables.detailed_lines, &line.id, include_deleted);
            line.detailed_lines
                .sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.id.cmp(&b.id)));
            for child in &mut line.detailed_lines {
                child.amount_discounts =
                    children(&tables.detailed_line_amount_discounts, &child.id, include_deleted);
            }
            line.save_db_state();
        }

        Ok(lines)
    }
}

impl Default for InMemoryLineStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl LineGateway for InMemoryLineStore {
    fn upsert_lines(&self, lines: &mut [Line]) -> Result<UpsertOutcome, BillingError> {
        self.upsert_lines_at(lines, Utc::now())
    }

    fn get_lines(&self, invoice_id: &str) -> Result<Vec<Line>, BillingError> {
        self.load(invoice_id, false)
    }

    fn get_lines_including_deleted(&self, invoice_id: &str) -> Result<Vec<Line>, BillingError> {
        self.load(invoice_id, true)
    }
}

fn children<T: Entity + Clone>(
    table: &HashMap<String, Row<T>>,
    parent_id: &str,
    include_deleted: bool,
) -> Vec<T> {
    let mut out: Vec<T> = table
        .values()
        .filter(|row| row.parent_id == parent_id && (include_deleted || !row.value.is_deleted()))
        .map(|row| row.value.clone())
        .collect();
    out.sort_by(|a, b| a.id().cmp(b.id()));
    out
}

fn fill_id(id: &mut String) {
    if is_unsaved(id) {
        *id = new_entity_id();
    }
}

/// Give every live entity under a live parent an ID before planning.
///
/// An ID unknown to the snapshot correlates exactly like an empty one, so
/// the plan is the same one the caller would get without storage.
fn assign_ids(lines: &mut [Line]) {
    for line in lines.iter_mut().filter(|l| !l.is_deleted()) {
        fill_id(&mut line.id);
        for d in line.usage_discounts.iter_mut().filter(|d| !d.is_deleted()) {
            fill_id(&mut d.id);
        }
        for d in line.amount_discounts.iter_mut().filter(|d| !d.is_deleted()) {
            fill_id(&mut d.id);
        }
        for child in line.detailed_lines.iter_mut().filter(|c| !c.is_deleted()) {
            fill_id(&mut child.id);
            for d in child.amount_discounts.iter_mut().filter(|d| !d.is_deleted()) {
                fill_id(&mut d.id);
            }
        }
    }
}

fn apply(
    tables: &mut Tables,
    plan: &LineDiff<'_>,
    now: DateTime<Utc>,
    touch: bool,
) -> BillingResult<()> {
    apply_batch(
        &mut tables.lines,
        EntityKind::Line,
        plan.line.clone().map(|l| Row::new(&l.invoice_id, l.header())),
        now,
    )?;
    apply_batch(
        &mut tables.usage_discounts,
        EntityKind::UsageDiscount,
        plan.usage_discounts.clone().map(|d| Row::new(&d.parent.id, d.entity.clone())),
        now,
    )?;
    apply_batch(
        &mut tables.amount_discounts,
        EntityKind::AmountDiscount,
        plan.amount_discounts.clone().map(|d| Row::new(&d.parent.id, d.entity.clone())),
        now,
    )?;
    apply_batch(
        &mut tables.detailed_lines,
        EntityKind::DetailedLine,
        plan.detailed_line.clone().map(|c| Row::new(&c.parent.id, c.entity.header())),
        now,
    )?;
    apply_batch(
        &mut tables.detailed_line_amount_discounts,
        EntityKind::DetailedLineAmountDiscount,
        plan.detailed_line_amount_discounts
            .clone()
            .map(|d| Row::new(&d.parent.id, d.entity.clone())),
        now,
    )?;

    if touch {
        touch_rows(&mut tables.lines, EntityKind::Line, plan.affected_line_ids.iter(), now)?;
        touch_rows(
            &mut tables.detailed_lines,
            EntityKind::DetailedLine,
            plan.detailed_line_affected_line_ids.iter(),
            now,
        )?;
    }
    Ok(())
}

/// Apply one batch: soft deletes, then inserts, then updates.
///
/// A deleted row is written like an update, so edits made together with the
/// deletion are kept. Its `deleted_at` is the caller's, or `now` when unset.
///
/// Creating an ID that already has a row replaces the row; this is how a
/// discount moves to a re-keyed parent.
fn apply_batch<T: Entity + Managed>(
    table: &mut HashMap<String, Row<T>>,
    kind: EntityKind,
    batch: Diff<Row<T>>,
    now: DateTime<Utc>,
) -> BillingResult<()> {
    for row in batch.delete {
        let Row { parent_id, mut value } = row;
        let Some(stored) = table.get_mut(value.id()) else {
            warn!(%kind, id = value.id(), "skipping delete of missing row");
            continue;
        };

        let managed = value.managed_mut();
        managed.created_at = stored.value.managed().created_at;
        managed.updated_at = now;
        managed.deleted_at.get_or_insert(now);
        *stored = Row { parent_id, value };
    }

    for mut row in batch.create {
        let id = row.value.id().to_string();
        if id.is_empty() || row.parent_id.is_empty() {
            return Err(BillingError::Storage(format!(
                "cannot insert {kind} {id:?} under parent {:?}",
                row.parent_id
            )));
        }
        *row.value.managed_mut() = ManagedFields::created(now);
        table.insert(id, row);
    }

    for update in batch.update {
        let Row { parent_id, mut value } = update.expected_state;
        let stored = table.get_mut(value.id()).ok_or_else(|| BillingError::NotFound {
            kind,
            id: value.id().to_string(),
        })?;

        let managed = value.managed_mut();
        managed.created_at = stored.value.managed().created_at;
        managed.updated_at = now;
        *stored = Row { parent_id, value };
    }

    Ok(())
}

fn touch_rows<'a, T: Managed>(
    table: &mut HashMap<String, Row<T>>,
    kind: EntityKind,
    ids: impl IntoIterator<Item = &'a String>,
    now: DateTime<Utc>,
) -> BillingResult<()> {
    for id in ids {
        let row = table
            .get_mut(id)
            .ok_or_else(|| BillingError::NotFound { kind, id: id.clone() })?;
        row.value.managed_mut().updated_at = now;
    }
    Ok(())
}

fn refresh<T: Entity + Managed>(item: &mut T, table: &HashMap<String, Row<T>>) {
    if let Some(row) = table.get(item.id()) {
        *item.managed_mut() = row.value.managed().clone();
    }
}

/// Copy storage-maintained columns back into a written hierarchy.
fn refresh_line(line: &mut Line, tables: &Tables) {
    refresh(line, &tables.lines);
    for d in &mut line.usage_discounts {
        refresh(d, &tables.usage_discounts);
    }
    for d in &mut line.amount_discounts {
        refresh(d, &tables.amount_discounts);
    }
    for child in &mut line.detailed_lines {
        refresh(child, &tables.detailed_lines);
        for d in &mut child.amount_discounts {
            refresh(d, &tables.detailed_line_amount_discounts);
        }
    }
}
