//! Batch processing command for multiple card files.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, error, warn};

use emid_core::models::record::FieldKey;
use emid_core::pipeline::{DocumentProcessor, ExtractionResult};

use super::output::{format_record, OutputFormat};
use super::process::{apply_overrides, StrategyArg};
use super::{load_config, supported_extension};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern for input files
    #[arg(required = true)]
    input: String,

    /// Output directory for per-file results
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also write a summary CSV
    #[arg(long)]
    summary: bool,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,

    /// Extraction strategy (overrides the config file)
    #[arg(short, long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Model directory
    #[arg(short, long)]
    model_dir: Option<PathBuf>,
}

/// Outcome for one input file.
struct FileOutcome {
    path: PathBuf,
    result: Result<ExtractionResult, String>,
    processing_time_ms: u64,
}

/// One row of the summary CSV.
#[derive(Serialize)]
struct SummaryRow<'a> {
    filename: &'a str,
    status: &'static str,
    fields_found: usize,
    name: &'a str,
    id_number: &'a str,
    expiry_date: &'a str,
    processing_time_ms: u64,
    error: &'a str,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    apply_overrides(&mut config, args.strategy, args.model_dir.as_ref());

    let files = expand_inputs(&args.input)?;
    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let processor = Arc::new(
        tokio::task::spawn_blocking(move || DocumentProcessor::from_config(&config)).await??,
    );

    let overall_pb = ProgressBar::new(files.len() as u64);
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    // Sequential: one blocking task per file.
    let mut outcomes = Vec::with_capacity(files.len());
    for path in files {
        let file_start = Instant::now();
        let worker = Arc::clone(&processor);
        let task_path = path.clone();
        let result = tokio::task::spawn_blocking(move || worker.process_file(&task_path)).await?;
        let processing_time_ms = file_start.elapsed().as_millis() as u64;

        match result {
            Ok(result) => {
                // Written as soon as it exists so a later failure cannot lose it.
                if let Some(output_dir) = &args.output_dir {
                    write_output(output_dir, &path, &result, args.format)?;
                }
                outcomes.push(FileOutcome {
                    path,
                    result: Ok(result),
                    processing_time_ms,
                });
            }
            Err(e) => {
                let message = e.to_string();
                if args.continue_on_error {
                    warn!("Failed to process {}: {}", path.display(), message);
                    outcomes.push(FileOutcome {
                        path,
                        result: Err(message),
                        processing_time_ms,
                    });
                } else {
                    error!("Failed to process {}: {}", path.display(), message);
                    overall_pb.abandon();
                    if args.summary {
                        write_summary(&summary_path(&args), &outcomes)?;
                    }
                    anyhow::bail!("Processing failed for {}: {}", path.display(), message);
                }
            }
        }

        overall_pb.inc(1);
    }

    overall_pb.finish_with_message("Complete");

    if args.output_dir.is_none() {
        for outcome in &outcomes {
            if let Ok(result) = &outcome.result {
                println!("{}", style(outcome.path.display()).bold());
                println!("{}", format_record(&result.record, args.format)?);
            }
        }
    }

    if args.summary {
        let path = summary_path(&args);
        write_summary(&path, &outcomes)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            path.display()
        );
    }

    let failed: Vec<&FileOutcome> = outcomes.iter().filter(|o| o.result.is_err()).collect();
    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        outcomes.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(outcomes.len() - failed.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for outcome in &failed {
            if let Err(message) = &outcome.result {
                println!("  - {}: {}", outcome.path.display(), message);
            }
        }
    }

    Ok(())
}

/// Files matching `pattern` with an accepted extension, sorted.
fn expand_inputs(pattern: &str) -> anyhow::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = glob(pattern)?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file() && supported_extension(path).is_some())
        .collect();
    files.sort();
    Ok(files)
}

fn write_output(
    output_dir: &Path,
    input: &Path,
    result: &ExtractionResult,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("card");
    let output_path = output_dir.join(format!("{}.{}", stem, format.extension()));

    fs::write(&output_path, format_record(&result.record, format)?)?;
    debug!("Wrote output to {}", output_path.display());
    Ok(())
}

fn summary_path(args: &BatchArgs) -> PathBuf {
    args.output_dir
        .as_ref()
        .map(|d| d.join("summary.csv"))
        .unwrap_or_else(|| PathBuf::from("summary.csv"))
}

fn write_summary(path: &Path, outcomes: &[FileOutcome]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    for outcome in outcomes {
        let filename = outcome
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");

        let row = match &outcome.result {
            Ok(result) => SummaryRow {
                filename,
                status: "success",
                fields_found: result.record.len(),
                name: result.record.get(FieldKey::Name).unwrap_or(""),
                id_number: result.record.get(FieldKey::IdNumber).unwrap_or(""),
                expiry_date: result.record.get(FieldKey::ExpiryDate).unwrap_or(""),
                processing_time_ms: outcome.processing_time_ms,
                error: "",
            },
            Err(message) => SummaryRow {
                filename,
                status: "error",
                fields_found: 0,
                name: "",
                id_number: "",
                expiry_date: "",
                processing_time_ms: outcome.processing_time_ms,
                error: message,
            },
        };
        wtr.serialize(row)?;
    }

    wtr.flush()?;
    Ok(())
}
