//! Process command - extract fields from a single card file.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use emid_core::models::config::{EmidConfig, Strategy};
use emid_core::pipeline::DocumentProcessor;

use super::output::{format_record, OutputFormat};
use super::{load_config, supported_extension};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (image or PDF)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Extraction strategy (overrides the config file)
    #[arg(short, long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Model directory
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Print warnings about the extracted dates and required fields
    #[arg(long)]
    validate: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum StrategyArg {
    /// Label-anchored regular expressions
    Pattern,
    /// Embedding retrieval plus a language-model query
    Semantic,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Pattern => Strategy::Pattern,
            StrategyArg::Semantic => Strategy::Semantic,
        }
    }
}

/// Apply command-line overrides on top of the loaded configuration.
pub fn apply_overrides(
    config: &mut EmidConfig,
    strategy: Option<StrategyArg>,
    model_dir: Option<&PathBuf>,
) {
    if let Some(strategy) = strategy {
        config.extraction.strategy = strategy.into();
    }
    if let Some(dir) = model_dir {
        config.ocr.model_dir = dir.clone();
    }
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    apply_overrides(&mut config, args.strategy, args.model_dir.as_ref());

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    if supported_extension(&args.input).is_none() {
        anyhow::bail!("Unsupported file format: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("Extracting fields ({})...", config.extraction.strategy));

    let input = args.input.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let processor = DocumentProcessor::from_config(&config)?;
        processor.process_file(&input)
    })
    .await?;

    let result = match outcome {
        Ok(result) => {
            pb.finish_and_clear();
            result
        }
        Err(e) => {
            pb.abandon_with_message(format!("{} Failed", style("✗").red()));
            return Err(e.into());
        }
    };

    if args.validate {
        let issues = result.record.validate(chrono::Local::now().date_naive());
        if !issues.is_empty() {
            eprintln!("{}", style("Validation issues:").yellow());
            for issue in &issues {
                eprintln!("  - {}", issue);
            }
        }
    }

    let output = format_record(&result.record, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    debug!(
        "{} fields from {}/{} lines, extraction {}ms, total {:?}",
        result.record.len(),
        result.lines_used,
        result.lines_total,
        result.processing_time_ms,
        start.elapsed()
    );

    Ok(())
}
