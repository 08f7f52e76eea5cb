//! Models command - download and manage OCR models.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;
use futures_util::StreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use emid_core::models::config::OcrConfig;

use super::load_config;

/// Arguments for the models command.
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    command: ModelsCommand,
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// Download the detection, recognition and dictionary files
    Download(DownloadArgs),

    /// Check which model files are present
    Status(DirArgs),

    /// Remove downloaded models
    Clean(DirArgs),
}

#[derive(Args)]
struct DownloadArgs {
    /// Output directory (default: ocr.model_dir)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Base URL the files are fetched from (default: ocr.model_base_url)
    #[arg(long)]
    base_url: Option<String>,

    /// Force re-download even if files exist
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct DirArgs {
    /// Model directory (default: ocr.model_dir)
    #[arg(short, long)]
    dir: Option<PathBuf>,
}

pub async fn run(args: ModelsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?.ocr;

    match args.command {
        ModelsCommand::Download(download_args) => download_models(&config, download_args).await,
        ModelsCommand::Status(dir_args) => {
            let dir = dir_args.dir.unwrap_or_else(|| config.model_dir.clone());
            check_status(&config, &dir).map(|_| ())
        }
        ModelsCommand::Clean(dir_args) => {
            let dir = dir_args.dir.unwrap_or_else(|| config.model_dir.clone());
            clean_models(&config, &dir)
        }
    }
}

async fn download_models(config: &OcrConfig, args: DownloadArgs) -> anyhow::Result<()> {
    let output_dir = args.output.unwrap_or_else(|| config.model_dir.clone());
    fs::create_dir_all(&output_dir)?;

    println!(
        "{} Downloading OCR models to {}",
        style("ℹ").blue(),
        output_dir.display()
    );
    println!();

    let client = reqwest::Client::builder()
        .user_agent(concat!("emid-cli/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let multi_progress = MultiProgress::new();
    let mut success_count = 0;
    let mut skip_count = 0;
    let mut error_count = 0;

    for filename in config.model_files() {
        let path = output_dir.join(filename);

        if path.exists() && !args.force && fs::metadata(&path)?.len() > 0 {
            println!(
                "  {} {} (already exists, {})",
                style("✓").green(),
                filename,
                format_size(fs::metadata(&path)?.len())
            );
            skip_count += 1;
            continue;
        }

        let pb = multi_progress.add(ProgressBar::new(0));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.green} {msg:<30} [{bar:25.cyan/blue}] {bytes}/{total_bytes}")?
                .progress_chars("=>-"),
        );
        pb.set_message(filename.to_string());

        let url = config.model_url(args.base_url.as_deref(), filename);
        match download_file(&client, &url, &path, &pb).await {
            Ok(()) => {
                pb.finish_with_message(format!("{} {}", style("✓").green(), filename));
                success_count += 1;
            }
            Err(e) => {
                pb.finish_with_message(format!("{} {} - {}", style("✗").red(), filename, e));
                error_count += 1;
            }
        }
    }

    println!();

    if error_count == 0 {
        println!("{} Models downloaded successfully!", style("✓").green().bold());
        if skip_count > 0 {
            println!(
                "   {} downloaded, {} already present",
                success_count, skip_count
            );
        }
    } else {
        println!(
            "{} Download completed with errors",
            style("⚠").yellow().bold()
        );
        println!(
            "   {} downloaded, {} skipped, {} failed",
            success_count, skip_count, error_count
        );
        println!();
        println!("Retry with: emid models download --force");
    }

    println!();
    check_status(config, &output_dir)?;

    if error_count > 0 {
        anyhow::bail!("{} model files failed to download", error_count);
    }
    Ok(())
}

async fn download_file(
    client: &reqwest::Client,
    url: &str,
    path: &Path,
    pb: &ProgressBar,
) -> anyhow::Result<()> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        anyhow::bail!("HTTP {}", response.status());
    }

    if let Some(content_length) = response.content_length() {
        pb.set_length(content_length);
    }

    // Stream into a temp file, renamed once complete.
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;

    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }

    file.flush()?;
    drop(file);

    fs::rename(&temp_path, path)?;

    Ok(())
}

/// Print the state of each model file. Returns whether all are present.
fn check_status(config: &OcrConfig, model_dir: &Path) -> anyhow::Result<bool> {
    println!("{}", style("Model Status").bold());
    println!("{}", model_dir.display());

    let mut all_present = true;
    let mut total_size: u64 = 0;

    for filename in config.model_files() {
        let path = model_dir.join(filename);
        let (status, size_str) = match fs::metadata(&path) {
            Ok(metadata) if metadata.len() > 0 => {
                total_size += metadata.len();
                (style("✓").green(), format_size(metadata.len()))
            }
            Ok(_) => {
                all_present = false;
                (style("⚠").yellow(), "empty".to_string())
            }
            Err(_) => {
                all_present = false;
                (style("✗").red(), "missing".to_string())
            }
        };

        println!("    {} {:<25} {:>10}", status, filename, size_str);
    }

    if all_present {
        println!(
            "    {} Ready ({} total)",
            style("✓").green(),
            format_size(total_size)
        );
    } else {
        println!(
            "    {} Run 'emid models download' to download",
            style("⚠").yellow()
        );
    }

    Ok(all_present)
}

fn clean_models(config: &OcrConfig, model_dir: &Path) -> anyhow::Result<()> {
    if !model_dir.exists() {
        println!("{} No model files to remove.", style("ℹ").blue());
        return Ok(());
    }

    let mut total_removed = 0;
    let mut total_freed: u64 = 0;

    for filename in config.model_files() {
        let path = model_dir.join(filename);
        if path.exists() {
            let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            fs::remove_file(&path)?;
            total_removed += 1;
            total_freed += size;
            println!("  {} Removed {}", style("✓").green(), filename);
        }
    }

    // Leftovers from interrupted downloads.
    if let Ok(entries) = fs::read_dir(model_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map(|e| e == "tmp").unwrap_or(false) {
                let _ = fs::remove_file(&path);
            }
        }
    }

    if total_removed > 0 {
        println!();
        println!(
            "{} Removed {} files, freed {}",
            style("✓").green(),
            total_removed,
            format_size(total_freed)
        );
    } else {
        println!("{} No model files to remove.", style("ℹ").blue());
    }

    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1_000_000_000 {
        format!("{:.1}GB", bytes as f64 / 1_000_000_000.0)
    } else if bytes >= 1_000_000 {
        format!("{:.1}MB", bytes as f64 / 1_000_000.0)
    } else if bytes >= 1_000 {
        format!("{:.1}KB", bytes as f64 / 1_000.0)
    } else {
        format!("{}B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(4_500_000), "4.5MB");
    }

    #[test]
    fn test_status_and_clean() {
        let dir = TempDir::new().unwrap();
        let config = OcrConfig::default();

        assert!(!check_status(&config, dir.path()).unwrap());

        for filename in config.model_files() {
            fs::write(dir.path().join(filename), b"model").unwrap();
        }
        fs::write(dir.path().join("det.tmp"), b"partial").unwrap();
        assert!(check_status(&config, dir.path()).unwrap());

        clean_models(&config, dir.path()).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
