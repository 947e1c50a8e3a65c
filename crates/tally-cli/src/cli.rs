use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tally",
    about = "Tally: reconcile recomputed invoice lines against persisted state",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Store configuration (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the reconciliation plan for an invoice
    Diff(InputArgs),
    /// Validate every live entity of an invoice
    Validate(InputArgs),
    /// Persist an invoice through an in-memory line store
    Apply(InputArgs),
}

#[derive(Args)]
pub struct InputArgs {
    /// JSON document of the form `{ "lines": [...] }`
    pub input: PathBuf,
}
