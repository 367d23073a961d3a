// Entry point and high-level CLI flow.
//
// - `profile` loads the CSV and prints its structure.
// - `assess` adds the missing-value table, duplicate count and findings.
// - `run` executes every stage, prints previews of each summary and writes
//   the cleaned table plus one file per summary.
mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, SourceArgs};
use eda_pipeline::output::{preview_correlation, preview_data, preview_table_rows};
use eda_pipeline::quality::QualityReport;
use eda_pipeline::util::format_int;
use eda_pipeline::{Pipeline, PipelineConfig};
use std::path::Path;

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(p) => PipelineConfig::load(p)
            .with_context(|| format!("Failed to load config {}", p.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn load_pipeline(args: &SourceArgs) -> Result<Pipeline> {
    let config = load_config(args.config.as_deref())?;
    let pipeline = Pipeline::load(&args.input, config)
        .with_context(|| format!("Failed to load file {}", args.input.display()))?;
    let report = pipeline.load_report();
    println!(
        "Processing dataset... ({} rows, {} columns loaded)",
        format_int(report.total_rows),
        format_int(report.total_columns)
    );
    if report.coerced_cells > 0 {
        println!(
            "Note: {} cells did not match their declared kind and were marked missing.",
            format_int(report.coerced_cells)
        );
    }
    println!();
    Ok(pipeline)
}

/// Handle `profile`: structure only, nothing is changed.
fn handle_profile(args: &SourceArgs) -> Result<Pipeline> {
    let pipeline = load_pipeline(args)?;
    println!("First rows:\n");
    preview_data(pipeline.table(), args.preview_rows);
    let profile = pipeline.profile();
    println!(
        "Table Profile ({} rows x {} columns)\n",
        format_int(profile.rows),
        format_int(profile.columns)
    );
    preview_table_rows(&profile.column_profiles, profile.column_profiles.len());
    Ok(pipeline)
}

fn print_quality(report: &QualityReport) {
    println!("Missing Values\n");
    let missing: Vec<_> = report.columns_with_missing().cloned().collect();
    preview_table_rows(&missing, missing.len());
    println!("Duplicate rows removed: {}\n", format_int(report.duplicate_rows));
    println!("Consistency Findings\n");
    preview_table_rows(&report.findings, report.findings.len());
    for (column, levels) in &report.levels {
        println!("{} levels: {}", column, levels.join(" | "));
    }
    println!();
}

/// Handle `assess`: profile plus quality report.
fn handle_assess(args: &SourceArgs) -> Result<()> {
    let mut pipeline = handle_profile(args)?;
    let report = pipeline.assess();
    print_quality(&report);
    Ok(())
}

/// Handle `run`: every stage, previews, and the output files.
fn handle_run(args: &SourceArgs, output_dir: &Path) -> Result<()> {
    let pipeline = load_pipeline(args)?;
    let n = args.preview_rows;
    let outcome = pipeline
        .run(output_dir)
        .with_context(|| format!("Failed to write outputs to {}", output_dir.display()))?;

    println!("Table Profile\n");
    preview_table_rows(&outcome.profile.column_profiles, outcome.profile.column_profiles.len());
    print_quality(&outcome.quality);

    let log = &outcome.cleaning;
    println!("Imputation\n");
    preview_table_rows(&log.fills, log.fills.len());
    println!("Outlier Capping\n");
    preview_table_rows(&log.caps, log.caps.len());
    for issue in &log.issues {
        println!("Skipped {} for '{}': {}", issue.step, issue.column, issue.message);
    }

    let s = &outcome.summaries;
    println!("Numerical Summary\n");
    preview_table_rows(&s.numeric, s.numeric.len());
    for (column, rows) in &s.value_counts {
        println!("Top values: {}\n", column);
        preview_table_rows(rows, n);
    }
    if let Some(amount) = &s.amount {
        for (column, rows) in &s.groups {
            println!("{} by {}\n", amount, column);
            preview_table_rows(rows, n);
        }
    }
    for (period, rows) in &s.periods {
        println!("{} totals\n", period.name());
        preview_table_rows(rows, n);
    }
    if let Some(top) = &s.top_customers {
        println!("Top Customers\n");
        preview_table_rows(top, n);
    }
    println!("Correlation Matrix\n");
    preview_correlation(&s.correlation);

    println!(
        "Outputs saved to {} ({} files, {} rows).",
        outcome.manifest.output_dir.display(),
        outcome.manifest.files.len(),
        format_int(outcome.manifest.rows)
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Profile(args) => {
            handle_profile(args)?;
        }
        Commands::Assess(args) => handle_assess(args)?,
        Commands::Run { source, output_dir } => handle_run(source, output_dir)?,
    }
    Ok(())
}
