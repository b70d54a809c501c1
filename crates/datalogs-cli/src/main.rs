//! datalogs CLI: list, inspect and export logs written by a datalogs Logger.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use datalogs::logs::{DATA_LOG_EXT, DICT_LOG_EXT};
use datalogs::{load_log, storage, LoadedLog};

#[derive(Parser)]
#[command(
    name = "datalogs",
    about = "datalogs: browse experiment data logs",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the logs under a directory
    List {
        /// Path to the log directory
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Print a log's data and metadata
    Inspect {
        /// Path to a .parquet or .json log
        path: PathBuf,
    },
    /// Export a log's data as JSON
    Export {
        /// Path to a .parquet or .json log
        path: PathBuf,
        /// Output file (default: stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List { dir } => cmd_list(&dir)?,
        Commands::Inspect { path } => cmd_inspect(&path)?,
        Commands::Export { path, output } => cmd_export(&path, output)?,
    }

    Ok(())
}

// ─── Command implementations ──────────────────────────────────────────────────

fn cmd_list(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("Log directory not found: {}", dir.display());
    }

    let entries = storage::list_logs(dir, &[DATA_LOG_EXT, DICT_LOG_EXT])?;
    if entries.is_empty() {
        println!("No logs found in '{}'", dir.display());
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["Log", "Kind", "Created", "Commit", "Size"]);

    for entry in &entries {
        let relative = entry.path.strip_prefix(dir).unwrap_or(&entry.path);
        match load_log(&entry.path) {
            Ok(log) => {
                let meta = log.metadata();
                let commit = meta
                    .commit_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string());
                table.add_row([
                    relative.display().to_string(),
                    log.kind().to_string(),
                    meta.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                    commit,
                    format_size(entry.size),
                ]);
            }
            Err(e) => {
                warn!(path = %entry.path.display(), error = %e, "skipping unreadable log");
            }
        }
    }

    println!("Logs in: {}", dir.display());
    println!("{table}");
    Ok(())
}

fn cmd_inspect(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("Log not found: {}", path.display());
    }
    let log = load_log(path)?;
    println!("{log}");
    Ok(())
}

fn cmd_export(path: &Path, output: Option<PathBuf>) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("Log not found: {}", path.display());
    }
    let log = load_log(path)?;
    let content = serde_json::to_string_pretty(&export_value(&log)?)?;

    match output {
        Some(out) => {
            std::fs::write(&out, content + "\n")?;
            info!(log = %path.display(), output = %out.display(), "exported log");
        }
        None => println!("{content}"),
    }
    Ok(())
}

/// Payload plus metadata, the way the log looks once loaded.
fn export_value(log: &LoadedLog) -> Result<serde_json::Value> {
    Ok(serde_json::json!({
        "kind": log.kind(),
        "data": log.data_json()?,
        "metadata": log.metadata(),
    }))
}

// ─── Utilities ────────────────────────────────────────────────────────────────

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
