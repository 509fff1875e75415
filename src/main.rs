//! CLI entry point for mailmark.

use std::path::PathBuf;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use mailmark::config;
use mailmark::error::ExportError;
use mailmark::output::organizer::{NameRegistry, RunLayout};
use mailmark::pipeline::{process_message, PipelineOptions};
use mailmark::pipeline::walker::walk_message;
use mailmark::source::eml::EmlDirSource;
use mailmark::source::MessageSource;

#[derive(Parser)]
#[command(name = "mailmark", version)]
#[command(about = "Convert email archives into clean Markdown documents")]
struct Cli {
    /// Directory containing raw .eml messages
    #[arg(value_name = "DIR")]
    input: PathBuf,

    /// Base directory for exports
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Label for this export run (subfolder name)
    #[arg(short, long, default_value = "export")]
    label: String,

    /// Keep quoted reply chains instead of stripping them
    #[arg(long)]
    keep_quotes: bool,

    /// Write attachments and inline images to disk
    #[arg(long)]
    save_binaries: bool,

    /// Per-file size limit for saved binaries, in megabytes
    #[arg(long, value_name = "MB")]
    max_attachment_size_mb: Option<u64>,

    /// Maximum number of messages to export
    #[arg(long, value_name = "N")]
    max_emails: Option<usize>,

    /// List messages that would be exported without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Print the dry-run listing as JSON
    #[arg(long, requires = "dry_run")]
    json: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level);

    let source = EmlDirSource::new(&cli.input)?;
    let mut ids = source.list()?;
    if let Some(max) = cli.max_emails {
        ids.truncate(max);
    }

    if ids.is_empty() {
        println!("No messages found in {}", cli.input.display());
        return Ok(());
    }

    if cli.dry_run {
        return run_dry_run(&source, &ids, cli.json);
    }

    let output_dir = cli
        .output_dir
        .unwrap_or_else(|| config.export.output_dir.clone());
    let max_mb = cli
        .max_attachment_size_mb
        .unwrap_or(config.export.max_attachment_mb);

    let opts = PipelineOptions {
        keep_quotes: cli.keep_quotes || config.export.keep_quotes,
        save_binaries: cli.save_binaries || config.export.save_binaries,
        max_attachment_bytes: max_mb * 1024 * 1024,
    };

    let layout = RunLayout::new(&output_dir, chrono::Local::now().date_naive(), &cli.label);

    // The one fatal failure: the run root itself cannot be created.
    std::fs::create_dir_all(layout.document_dir()).map_err(|e| ExportError::OutputDir {
        path: layout.document_dir().to_path_buf(),
        source: e,
    })?;

    run_export(&source, &ids, &opts, &layout)
}

fn setup_logging(level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Process every message, one at a time. A failed message degrades
/// only itself; the run continues.
fn run_export(
    source: &dyn MessageSource,
    ids: &[String],
    opts: &PipelineOptions,
    layout: &RunLayout,
) -> anyhow::Result<()> {
    let pb = ProgressBar::new(ids.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Exporting [{bar:40.cyan/blue}] {pos}/{len}")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let mut registry = NameRegistry::new();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for id in ids {
        pb.inc(1);

        let raw = match source.fetch(id) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "failed to fetch message");
                failed += 1;
                continue;
            }
        };

        let msg = walk_message(id, &raw);
        match process_message(&msg, opts, layout, &mut registry) {
            Ok(_) => successful += 1,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "failed to export message");
                failed += 1;
            }
        }
    }

    pb.finish_and_clear();

    println!();
    println!("  Export complete");
    println!("  {:<22} {}", "Exported", successful);
    if failed > 0 {
        println!("  {:<22} {}", "Failed", failed);
    }
    println!("  {:<22} {}", "Output folder", layout.document_dir().display());
    println!();

    Ok(())
}

/// List what would be exported, without writing anything.
fn run_dry_run(source: &dyn MessageSource, ids: &[String], json: bool) -> anyhow::Result<()> {
    use humansize::{format_size, BINARY};

    let mut rows = Vec::with_capacity(ids.len());
    for id in ids {
        let raw = match source.fetch(id) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "failed to fetch message");
                continue;
            }
        };
        let size = raw.len() as u64;
        let msg = walk_message(id, &raw);
        rows.push((msg.meta, size));
    }

    if json {
        let items: Vec<serde_json::Value> = rows
            .iter()
            .map(|(meta, size)| {
                serde_json::json!({
                    "id": meta.id,
                    "date": meta.date.map(|d| d.to_rfc3339()),
                    "from": meta.from,
                    "to": meta.to,
                    "subject": meta.subject,
                    "size": size,
                })
            })
            .collect();
        let output = serde_json::json!({
            "message_count": rows.len(),
            "messages": items,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("\n  {} message(s) would be exported:\n", rows.len());
    println!(
        "  {:<17} {:<28} {:<28} {:<40} {:>9}",
        "Date", "From", "To", "Subject", "Size"
    );
    println!("  {}", "-".repeat(110));

    for (meta, size) in &rows {
        let date = meta
            .date
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        println!(
            "  {:<17} {:<28} {:<28} {:<40} {:>9}",
            date,
            truncate(&meta.from, 27),
            truncate(&meta.to, 27),
            truncate(&meta.subject, 39),
            format_size(*size, BINARY)
        );
    }

    println!("\n  Remove --dry-run to export these messages to Markdown.");
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    } else {
        s.to_string()
    }
}
