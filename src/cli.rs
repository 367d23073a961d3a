// Single source of truth for the CLI definitions (Clap structs).

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "eda")]
#[command(about = "Profile, assess, clean and summarize a CSV dataset", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct SourceArgs {
    /// CSV file to analyse
    pub input: PathBuf,

    /// YAML file with column roles and run parameters
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Rows shown in each console preview
    #[arg(long, default_value_t = 5)]
    pub preview_rows: usize,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print row/column counts, kinds and cardinalities
    Profile(SourceArgs),

    /// Print missing values, duplicates and consistency findings
    Assess(SourceArgs),

    /// Run the full pipeline and write the cleaned table and summaries
    Run {
        #[command(flatten)]
        source: SourceArgs,

        /// Directory receiving the cleaned table and summary files
        #[arg(long, short, default_value = "output")]
        output_dir: PathBuf,
    },
}
