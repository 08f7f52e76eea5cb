//! Parse command - run extraction over recognized text lines, no OCR.

use std::fs;
use std::io::Read;
use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::info;

use emid_core::pipeline::ExtractionPipeline;

use super::load_config;
use super::output::{format_record, OutputFormat};
use super::process::{apply_overrides, StrategyArg};

/// Arguments for the parse command.
#[derive(Args)]
pub struct ParseArgs {
    /// UTF-8 file with one recognized line per line, or `-` for stdin
    #[arg(required = true)]
    input: String,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Extraction strategy (overrides the config file)
    #[arg(short, long, value_enum)]
    strategy: Option<StrategyArg>,
}

pub async fn run(args: ParseArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    apply_overrides(&mut config, args.strategy, None);

    let content = if args.input == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(&args.input)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {}", args.input, e))?
    };

    let lines: Vec<String> = content.lines().map(String::from).collect();
    info!("Read {} lines", lines.len());

    let record = tokio::task::spawn_blocking(move || {
        let pipeline = ExtractionPipeline::from_config(&config)?;
        pipeline.extract_lines(&lines)
    })
    .await??;

    let output = format_record(&record, args.format)?;

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

    Ok(())
}
