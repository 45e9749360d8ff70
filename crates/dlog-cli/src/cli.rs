use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "dlog",
    about = "Distributed log segment entry store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Inspect configuration files
    Config(ConfigArgs),
    /// Write, read, and delete a log segment against in-memory backends
    Smoke(SmokeArgs),
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Parse and validate a configuration file
    Check { path: PathBuf },
    /// Print the effective configuration, defaults filled in
    Show { path: Option<PathBuf> },
}

#[derive(Args)]
pub struct SmokeArgs {
    /// Configuration file; defaults apply when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Entries to write into the segment
    #[arg(short = 'n', long, default_value_t = 16)]
    pub entries: u64,

    /// Allocate through the shared ledger allocator pool
    #[arg(long)]
    pub pooled: bool,

    /// Log name to write
    #[arg(long, default_value = "smoke")]
    pub log: String,
}
