use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tally_billing::{
    diff_invoice_lines_with, BatchReport, BillingError, DiffOptions, Entity, InMemoryLineStore,
    Line, LineGateway, PlanReport, StoreConfig,
};
use tracing::debug;

use crate::cli::{Cli, Command, OutputFormat};

/// Input document: the recomputed lines of one or more invoices, each
/// optionally carrying its persisted snapshot in `db_state`.
#[derive(Debug, Deserialize)]
pub struct InvoiceInput {
    pub lines: Vec<Line>,
}

#[derive(Serialize)]
struct ValidationOutput {
    valid: bool,
    errors: Vec<String>,
}

#[derive(Serialize)]
struct ApplyOutput {
    report: PlanReport,
    lines: Vec<Line>,
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let output = match cli.command {
        Command::Diff(args) => cmd_diff(read_input(&args.input)?, &config, cli.format)?,
        Command::Validate(args) => cmd_validate(read_input(&args.input)?, cli.format)?,
        Command::Apply(args) => cmd_apply(read_input(&args.input)?, &config, cli.format)?,
    };
    println!("{output}");
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<StoreConfig> {
    let Some(path) = path else {
        return Ok(StoreConfig::default());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    StoreConfig::from_toml_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

fn read_input(path: &Path) -> anyhow::Result<InvoiceInput> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let input: InvoiceInput =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    debug!(path = %path.display(), lines = input.lines.len(), "read invoice input");
    Ok(input)
}

fn cmd_diff(
    input: InvoiceInput,
    config: &StoreConfig,
    format: OutputFormat,
) -> anyhow::Result<String> {
    let options = DiffOptions {
        validate: config.validate_expected,
    };
    let plan = diff_invoice_lines_with(&input.lines, options).context("reconciling invoice lines")?;
    render_report(&plan.report(), format)
}

fn cmd_validate(input: InvoiceInput, format: OutputFormat) -> anyhow::Result<String> {
    let errors: Vec<BillingError> = input
        .lines
        .iter()
        .filter(|line| !line.is_deleted())
        .flat_map(Line::validate_subtree)
        .collect();

    if format == OutputFormat::Json {
        let output = ValidationOutput {
            valid: errors.is_empty(),
            errors: errors.iter().map(ToString::to_string).collect(),
        };
        return Ok(serde_json::to_string_pretty(&output)?);
    }

    if errors.is_empty() {
        return Ok(format!("{} {} lines valid", "✓".green().bold(), input.lines.len()));
    }
    for err in &errors {
        eprintln!("  {} {err}", "✗".red());
    }
    bail!("{} problem(s) found", errors.len())
}

fn cmd_apply(
    input: InvoiceInput,
    config: &StoreConfig,
    format: OutputFormat,
) -> anyhow::Result<String> {
    let store = InMemoryLineStore::new(config.clone());

    let mut persisted: Vec<Line> = input
        .lines
        .iter()
        .filter_map(|line| line.db_state.as_deref().cloned())
        .collect();
    if !persisted.is_empty() {
        store
            .upsert_lines(&mut persisted)
            .context("loading persisted state")?;
    }

    let mut lines = input.lines;
    let outcome = store.upsert_lines(&mut lines).context("applying invoice lines")?;

    let invoices: BTreeSet<&str> = lines.iter().map(|l| l.invoice_id.as_str()).collect();
    let mut stored = Vec::new();
    for invoice_id in invoices {
        stored.extend(store.get_lines(invoice_id)?);
    }

    match format {
        OutputFormat::Json => {
            let output = ApplyOutput {
                report: outcome.report,
                lines: stored.iter().map(Line::snapshot).collect(),
            };
            Ok(serde_json::to_string_pretty(&output)?)
        }
        OutputFormat::Text => {
            let mut out = render_report(&outcome.report, format)?;
            out.push_str(&format!("\n{} {} live lines stored", "✓".green().bold(), stored.len()));
            Ok(out)
        }
    }
}

fn render_report(report: &PlanReport, format: OutputFormat) -> anyhow::Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(report)?);
    }
    if report.is_empty() {
        return Ok("Up to date.".to_string());
    }

    let count = report.operation_count().to_string();
    let mut lines = vec![format!("{} operations planned", count.bold())];
    for (label, batch) in report.batches() {
        if !batch.is_empty() {
            lines.push(format!("{}:", label.bold()));
            lines.extend(render_batch(batch));
        }
    }
    if !report.affected_line_ids.is_empty() {
        lines.push(format!("touch lines: {}", report.affected_line_ids.join(", ").cyan()));
    }
    if !report.detailed_line_affected_line_ids.is_empty() {
        lines.push(format!(
            "touch detailed lines: {}",
            report.detailed_line_affected_line_ids.join(", ").cyan()
        ));
    }
    Ok(lines.join("\n"))
}

fn render_batch(batch: &BatchReport) -> Vec<String> {
    let label = |id: &String| if id.is_empty() { "(new)".to_string() } else { id.clone() };
    let mut out = Vec::with_capacity(batch.len());
    out.extend(batch.create.iter().map(|id| format!("  {} {}", "+".green(), label(id))));
    out.extend(batch.update.iter().map(|id| format!("  {} {}", "~".yellow(), label(id))));
    out.extend(batch.delete.iter().map(|id| format!("  {} {}", "-".red(), label(id))));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const LINE: &str = r#"{
        "id": "1",
        "invoice_id": "inv-1",
        "name": "compute",
        "currency": "USD",
        "period": { "start": "2024-01-01T00:00:00Z", "end": "2024-02-01T00:00:00Z" },
        "invoice_at": "2024-02-01T00:00:00Z",
        "quantity": "10",
        "per_unit_amount": "1.5",
        "detailed_lines": [{
            "id": "1.1",
            "name": "tier 1",
            "period": { "start": "2024-01-01T00:00:00Z", "end": "2024-02-01T00:00:00Z" },
            "per_unit_amount": "1.5",
            "quantity": "10"
        }]
    }"#;

    fn fresh_input() -> InvoiceInput {
        serde_json::from_str(&format!(r#"{{ "lines": [{LINE}] }}"#)).unwrap()
    }

    fn persisted_input() -> InvoiceInput {
        let mut input = fresh_input();
        input.lines[0].save_db_state();
        input
    }

    #[test]
    fn diff_reports_creates_as_json() {
        let out = cmd_diff(fresh_input(), &StoreConfig::default(), OutputFormat::Json).unwrap();
        let report: PlanReport = serde_json::from_str(&out).unwrap();
        assert_eq!(report.lines.create, vec!["1"]);
        assert_eq!(report.detailed_lines.create, vec!["1.1"]);
    }

    #[test]
    fn diff_of_persisted_input_is_up_to_date() {
        let out = cmd_diff(persisted_input(), &StoreConfig::default(), OutputFormat::Text).unwrap();
        assert_eq!(out, "Up to date.");
    }

    #[test]
    fn diff_text_lists_changes() {
        let mut input = persisted_input();
        input.lines[0].detailed_lines[0].quantity = "12".parse().unwrap();
        let out = cmd_diff(input, &StoreConfig::default(), OutputFormat::Text).unwrap();
        assert!(out.contains("detailed lines"));
        assert!(out.contains("1.1"));
        assert!(out.contains("touch lines"));
    }

    #[test]
    fn diff_fails_on_invalid_input() {
        let mut input = fresh_input();
        input.lines[0].currency = "usd".into();
        assert!(cmd_diff(input, &StoreConfig::default(), OutputFormat::Text).is_err());
    }

    #[test]
    fn validate_reports_problems_as_json() {
        let mut input = fresh_input();
        input.lines[0].currency = "usd".into();
        input.lines[0].detailed_lines[0].name.clear();
        let out = cmd_validate(input, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["valid"], false);
        assert_eq!(value["errors"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn validate_text_fails_on_problems() {
        let mut input = fresh_input();
        input.lines[0].quantity = "-1".parse().unwrap();
        assert!(cmd_validate(input, OutputFormat::Text).is_err());
        assert!(cmd_validate(fresh_input(), OutputFormat::Text).is_ok());
    }

    #[test]
    fn validate_skips_deleted_lines() {
        let mut input = fresh_input();
        input.lines[0].currency = "usd".into();
        input.lines[0].managed.deleted_at = Some(input.lines[0].managed.updated_at);
        let out = cmd_validate(input, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["valid"], true);
    }

    #[test]
    fn apply_persists_and_reports_updates() {
        let mut input = persisted_input();
        input.lines[0].name = "compute (revised)".into();
        let out = cmd_apply(input, &StoreConfig::default(), OutputFormat::Json).unwrap();

        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["report"]["lines"]["update"][0], "1");
        assert_eq!(value["lines"][0]["name"], "compute (revised)");
        assert_eq!(value["lines"][0]["detailed_lines"][0]["id"], "1.1");
    }

    #[test]
    fn config_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "validate_expected = false").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert!(!config.validate_expected);
        assert!(config.touch_affected_ancestors);

        assert_eq!(load_config(None).unwrap(), StoreConfig::default());
    }

    #[test]
    fn invalid_config_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "validate_expected = 3").unwrap();
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("parsing config"));
    }

    #[test]
    fn input_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice.json");
        fs::write(&path, format!(r#"{{ "lines": [{LINE}] }}"#)).unwrap();
        let input = read_input(&path).unwrap();
        assert_eq!(input.lines.len(), 1);
        assert!(read_input(&dir.path().join("missing.json")).is_err());
    }
}
