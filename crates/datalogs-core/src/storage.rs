//! Storage layer: directories, collision-free names, Parquet/JSON log files,
//! YAML config.

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, FixedOffset};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::file::properties::WriterProperties;

use crate::error::{DatalogsError, Result};

// ─── Directory helpers ────────────────────────────────────────────────────────

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

/// Build a file or directory name from `stem` that does not exist yet in
/// `directory`: `[<timestamp>_]<stem>[_<n>][.<ext>]`.
pub fn unique_name(
    directory: &Path,
    stem: &str,
    timestamp: Option<(&DateTime<FixedOffset>, &str)>,
    ext: &str,
) -> String {
    let prefix = match timestamp {
        Some((ts, format)) => format!("{}_{stem}", ts.format(format)),
        None => stem.to_string(),
    };
    let with_ext = |base: &str| {
        if ext.is_empty() {
            base.to_string()
        } else {
            format!("{base}.{ext}")
        }
    };
    let mut name = with_ext(&prefix);
    let mut version = 1;
    while directory.join(&name).exists() {
        name = with_ext(&format!("{prefix}_{version}"));
        version += 1;
    }
    name
}

/// Check that `name` can be used as a single path segment.
pub fn validate_segment(name: &str, what: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DatalogsError::Configuration(format!("{what} cannot be empty")));
    }
    if name == "." || name == ".." {
        return Err(DatalogsError::Configuration(format!(
            "{what} '{name}' is not a valid name"
        )));
    }
    if name.contains(['/', '\\']) || name.contains(std::path::MAIN_SEPARATOR) {
        return Err(DatalogsError::Configuration(format!(
            "{what} '{name}' cannot contain path separators"
        )));
    }
    Ok(())
}

/// Lower-cased extension of `path`, without the dot.
pub fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Create `path` for writing, failing if it already exists.
fn create_new(path: &Path) -> Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => DatalogsError::LogExists(path.to_path_buf()),
            _ => DatalogsError::Io(e),
        })
}

// ─── Log discovery ────────────────────────────────────────────────────────────

/// A log file found under a directory tree.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LogEntry {
    pub path: PathBuf,
    pub ext: String,
    pub size: u64,
}

/// Recursively list files under `root` whose extension is one of `exts`,
/// sorted by path.
pub fn list_logs(root: &Path, exts: &[&str]) -> Result<Vec<LogEntry>> {
    let mut out = vec![];
    if root.exists() {
        collect_files(root, exts, &mut out)?;
    }
    out.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(out)
}

fn collect_files(dir: &Path, exts: &[&str], out: &mut Vec<LogEntry>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, exts, out)?;
        } else {
            let ext = extension(&path);
            if exts.contains(&ext.as_str()) {
                let size = path.metadata()?.len();
                out.push(LogEntry { path, ext, size });
            }
        }
    }
    Ok(())
}

// ─── YAML config I/O ─────────────────────────────────────────────────────────

pub fn save_yaml<T: serde::Serialize>(path: &Path, data: &T) -> Result<()> {
    let content = serde_yaml::to_string(data)?;
    fs::write(path, content)?;
    Ok(())
}

pub fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}

// ─── JSON log I/O ────────────────────────────────────────────────────────────

pub fn write_json(path: &Path, value: &serde_json::Value) -> Result<()> {
    let mut file = create_new(path)?;
    serde_json::to_writer_pretty(&mut file, value)?;
    file.write_all(b"\n")?;
    Ok(())
}

pub fn read_json(path: &Path) -> Result<serde_json::Value> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

// ─── Parquet log I/O ─────────────────────────────────────────────────────────

/// Write one record batch (schema metadata included) to a new Parquet file.
pub fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file = create_new(path)?;
    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

/// Read a whole Parquet file back as one batch plus its schema metadata.
pub fn read_parquet(path: &Path) -> Result<(RecordBatch, HashMap<String, String>)> {
    let file = fs::File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema: Arc<Schema> = builder.schema().clone();
    let metadata = schema.metadata().clone();
    let mut reader = builder.build()?;
    let mut batches = vec![];
    for batch in &mut reader {
        batches.push(batch?);
    }
    let batch = match batches.len() {
        0 => RecordBatch::new_empty(schema),
        1 => batches.remove(0),
        _ => arrow::compute::concat_batches(&schema, &batches)?,
    };
    Ok((batch, metadata))
}
