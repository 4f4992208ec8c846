// Command-line surface of the `moneyball-ingest` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "moneyball-ingest")]
#[command(about = "Load per-game stat exports into the document store", long_about = None)]
pub struct Cli {
    /// Directory holding `config/` and `defaults/`
    #[arg(long, global = true, env = "MONEYBALL_CONFIG_DIR", default_value = ".")]
    pub config_dir: PathBuf,

    /// Print summaries as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Ingest a single export file
    File {
        /// Path of the file to ingest
        path: PathBuf,

        /// Name the export was uploaded as; defaults to the file's own name
        #[arg(long)]
        name: Option<String>,
    },

    /// Ingest every pending `.csv` file in a directory
    Sweep {
        /// Directory to sweep; defaults to `ingest.pending_dir`
        dir: Option<PathBuf>,
    },

    /// Show document counts per collection
    Stats,
}
