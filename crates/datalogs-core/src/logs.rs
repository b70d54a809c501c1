//! Log objects: data plus metadata, saved to and loaded from one file.
//!
//! - [`DataLog`] holds a [`Dataset`] in a Parquet file. Every variable is a
//!   `List<T>` column with a single row; names, roles, dimensions, shapes and
//!   attributes live in the schema metadata next to the log metadata.
//! - [`DictLog`] holds a JSON object, with the metadata under a reserved key.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, ListArray};
use arrow::buffer::OffsetBuffer;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::{DatalogsError, Result};
use crate::models::LogMetadata;
use crate::storage;
use crate::variables::{Dataset, Role, Variable};

/// Extension of data log files.
pub const DATA_LOG_EXT: &str = "parquet";
/// Extension of dict log files.
pub const DICT_LOG_EXT: &str = "json";
/// Reserved top-level key holding the metadata of a dict log.
pub const METADATA_KEY: &str = "__metadata";

const METADATA_PREFIX: &str = "__metadata_";
const VARIABLES_KEY: &str = "__variables";
const ATTRS_KEY: &str = "__attrs";

/// Shared behaviour of log objects.
pub trait Log: Sized {
    type Data;

    /// File extension, without the dot.
    const EXT: &'static str;
    /// Short name used in messages.
    const KIND: &'static str;

    fn metadata(&self) -> &LogMetadata;

    fn data(&self) -> &Self::Data;

    /// Path of the file, once saved or when loaded.
    fn path(&self) -> Option<&Path>;

    /// Write the log to a new file in its metadata directory.
    fn save(&mut self) -> Result<&Path>;

    /// Load a log of this type from `path`.
    fn load(path: impl AsRef<Path>) -> Result<Self>;
}

/// Pick the path on first save and write with create-new semantics.
fn save_into<'a>(
    slot: &'a mut Option<PathBuf>,
    metadata: &LogMetadata,
    ext: &str,
    kind: &str,
    write: impl FnOnce(&Path) -> Result<()>,
) -> Result<&'a Path> {
    let path = match slot.take() {
        Some(path) => path,
        None => {
            let dir = &metadata.directory;
            dir.join(storage::unique_name(dir, &metadata.description, None, ext))
        }
    };
    write(&path)?;
    info!(path = %path.display(), kind, "saved log");
    let saved: &Path = slot.insert(path);
    Ok(saved)
}

fn check_ext(path: &Path, ext: &str, expected: &'static str) -> Result<()> {
    if storage::extension(path) == ext {
        Ok(())
    } else {
        Err(mismatch(path, expected))
    }
}

fn mismatch(path: &Path, expected: &'static str) -> DatalogsError {
    DatalogsError::FormatMismatch {
        path: path.to_path_buf(),
        expected,
    }
}

// ─── Data logs ───────────────────────────────────────────────────────────────

/// Manifest entry describing one variable column.
#[derive(Debug, Serialize, Deserialize)]
struct VariableEntry {
    name: String,
    role: Role,
    dims: Vec<String>,
    shape: Vec<usize>,
    #[serde(default)]
    attrs: Map<String, Value>,
}

/// Log containing a [`Dataset`], saved to a Parquet file.
#[derive(Debug, Clone)]
pub struct DataLog {
    metadata: LogMetadata,
    dataset: Dataset,
    path: Option<PathBuf>,
}

impl DataLog {
    pub fn new(metadata: LogMetadata, dataset: Dataset) -> Self {
        Self {
            metadata,
            dataset,
            path: None,
        }
    }

    fn to_record_batch(&self) -> Result<RecordBatch> {
        let variables = self
            .dataset
            .coords()
            .iter()
            .map(|v| (Role::Coord, v))
            .chain(self.dataset.data_vars().iter().map(|v| (Role::DataVar, v)));

        let mut fields = vec![];
        let mut columns: Vec<ArrayRef> = vec![];
        let mut manifest = vec![];
        for (role, var) in variables {
            let item = Arc::new(Field::new("item", var.data_type().clone(), true));
            let list = ListArray::try_new(
                item.clone(),
                OffsetBuffer::from_lengths([var.len()]),
                var.data.clone(),
                None,
            )?;
            fields.push(Field::new(&var.name, DataType::List(item), false));
            columns.push(Arc::new(list));
            manifest.push(VariableEntry {
                name: var.name.clone(),
                role,
                dims: var.dims.clone(),
                shape: var.shape.clone(),
                attrs: var.attrs.clone(),
            });
        }

        let mut schema_metadata = metadata_to_attrs(&self.metadata)?;
        schema_metadata.insert(VARIABLES_KEY.to_string(), serde_json::to_string(&manifest)?);
        schema_metadata.insert(
            ATTRS_KEY.to_string(),
            serde_json::to_string(self.dataset.attrs())?,
        );
        let schema = Arc::new(Schema::new_with_metadata(fields, schema_metadata));
        Ok(RecordBatch::try_new(schema, columns)?)
    }
}

impl Log for DataLog {
    type Data = Dataset;

    const EXT: &'static str = DATA_LOG_EXT;
    const KIND: &'static str = "data";

    fn metadata(&self) -> &LogMetadata {
        &self.metadata
    }

    fn data(&self) -> &Dataset {
        &self.dataset
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn save(&mut self) -> Result<&Path> {
        let batch = self.to_record_batch()?;
        save_into(&mut self.path, &self.metadata, Self::EXT, Self::KIND, |path| {
            storage::write_parquet(path, &batch)
        })
    }

    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        check_ext(path, Self::EXT, Self::KIND)?;
        let (batch, mut attrs) = storage::read_parquet(path)?;

        let manifest: Vec<VariableEntry> = match attrs.remove(VARIABLES_KEY) {
            Some(raw) => serde_json::from_str(&raw)?,
            None => return Err(mismatch(path, Self::KIND)),
        };
        let global_attrs: Map<String, Value> = match attrs.remove(ATTRS_KEY) {
            Some(raw) => serde_json::from_str(&raw)?,
            None => Map::new(),
        };
        let metadata = metadata_from_attrs(&attrs).ok_or_else(|| mismatch(path, Self::KIND))??;

        let mut coords = vec![];
        let mut data_vars = vec![];
        for entry in manifest {
            let list = batch
                .column_by_name(&entry.name)
                .and_then(|col| col.as_list_opt::<i32>())
                .filter(|list| list.len() == 1)
                .ok_or_else(|| mismatch(path, Self::KIND))?;
            let var = Variable {
                data: list.value(0),
                name: entry.name,
                dims: entry.dims,
                shape: entry.shape,
                attrs: entry.attrs,
            };
            match entry.role {
                Role::Coord => coords.push(var),
                Role::DataVar => data_vars.push(var),
            }
        }

        Ok(Self {
            metadata,
            dataset: Dataset::from_parts(coords, data_vars, global_attrs),
            path: Some(path.to_path_buf()),
        })
    }
}

/// Flatten metadata into `__metadata_<field>` keys with JSON-encoded values.
fn metadata_to_attrs(metadata: &LogMetadata) -> Result<HashMap<String, String>> {
    let mut attrs = HashMap::new();
    if let Value::Object(fields) = serde_json::to_value(metadata)? {
        for (key, value) in fields {
            attrs.insert(format!("{METADATA_PREFIX}{key}"), value.to_string());
        }
    }
    Ok(attrs)
}

/// Inverse of [`metadata_to_attrs`]. `None` if no metadata keys are present.
fn metadata_from_attrs(attrs: &HashMap<String, String>) -> Option<Result<LogMetadata>> {
    let mut fields = Map::new();
    for (key, raw) in attrs {
        if let Some(field) = key.strip_prefix(METADATA_PREFIX) {
            match serde_json::from_str(raw) {
                Ok(value) => {
                    fields.insert(field.to_string(), value);
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
    if fields.is_empty() {
        return None;
    }
    Some(serde_json::from_value(Value::Object(fields)).map_err(Into::into))
}

// ─── Dict logs ───────────────────────────────────────────────────────────────

/// Log containing a JSON object, saved to a JSON file.
#[derive(Debug, Clone)]
pub struct DictLog {
    metadata: LogMetadata,
    data: Map<String, Value>,
    path: Option<PathBuf>,
}

impl DictLog {
    /// Fails if `data` uses the reserved metadata key.
    pub fn new(metadata: LogMetadata, data: Map<String, Value>) -> Result<Self> {
        Self::check_data(&metadata.description, &data)?;
        Ok(Self {
            metadata,
            data,
            path: None,
        })
    }
}

impl DictLog {
    /// Check a payload for dict log `name` before anything is written.
    pub fn check_data(name: &str, data: &Map<String, Value>) -> Result<()> {
        if data.contains_key(METADATA_KEY) {
            return Err(DatalogsError::Validation(format!(
                "dict log '{name}' cannot contain the reserved key '{METADATA_KEY}'"
            )));
        }
        Ok(())
    }
}

impl Log for DictLog {
    type Data = Map<String, Value>;

    const EXT: &'static str = DICT_LOG_EXT;
    const KIND: &'static str = "dict";

    fn metadata(&self) -> &LogMetadata {
        &self.metadata
    }

    fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn save(&mut self) -> Result<&Path> {
        let mut document = self.data.clone();
        document.insert(METADATA_KEY.to_string(), serde_json::to_value(&self.metadata)?);
        let document = Value::Object(document);
        save_into(&mut self.path, &self.metadata, Self::EXT, Self::KIND, |path| {
            storage::write_json(path, &document)
        })
    }

    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        check_ext(path, Self::EXT, Self::KIND)?;
        let Value::Object(document) = storage::read_json(path)? else {
            return Err(mismatch(path, Self::KIND));
        };

        let mut metadata = None;
        let mut data = Map::new();
        for (key, value) in document {
            if key == METADATA_KEY {
                metadata = Some(value);
            } else {
                data.insert(key, value);
            }
        }
        let metadata = metadata.ok_or_else(|| mismatch(path, Self::KIND))?;

        Ok(Self {
            metadata: serde_json::from_value(metadata)?,
            data,
            path: Some(path.to_path_buf()),
        })
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// A log loaded by [`load_log`].
#[derive(Debug, Clone)]
pub enum LoadedLog {
    Data(DataLog),
    Dict(DictLog),
}

impl LoadedLog {
    pub fn metadata(&self) -> &LogMetadata {
        match self {
            LoadedLog::Data(log) => log.metadata(),
            LoadedLog::Dict(log) => log.metadata(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            LoadedLog::Data(log) => log.path(),
            LoadedLog::Dict(log) => log.path(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LoadedLog::Data(_) => DataLog::KIND,
            LoadedLog::Dict(_) => DictLog::KIND,
        }
    }

    /// Payload as JSON, without metadata.
    pub fn data_json(&self) -> Result<Value> {
        match self {
            LoadedLog::Data(log) => log.data().to_json(),
            LoadedLog::Dict(log) => Ok(Value::Object(log.data().clone())),
        }
    }
}

/// Load the log at `path`, choosing the log type from the file extension.
pub fn load_log(path: impl AsRef<Path>) -> Result<LoadedLog> {
    let path = path.as_ref();
    let ext = storage::extension(path);
    match ext.as_str() {
        DATA_LOG_EXT => DataLog::load(path).map(LoadedLog::Data),
        DICT_LOG_EXT => DictLog::load(path).map(LoadedLog::Dict),
        "" => Err(DatalogsError::UnsupportedFormat(String::new())),
        _ => Err(DatalogsError::UnsupportedFormat(format!(".{ext}"))),
    }
}

// ─── Display ─────────────────────────────────────────────────────────────────

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn write_log(
    f: &mut fmt::Formatter<'_>,
    name: &str,
    path: Option<&Path>,
    data: &str,
    metadata: &LogMetadata,
) -> fmt::Result {
    let path = path.map_or_else(|| "<unsaved>".to_string(), |p| p.display().to_string());
    writeln!(f, "<{name} '{path}'>")?;
    writeln!(f, "Data:\n{}", indent(data))?;
    write!(f, "Metadata:\n{}", indent(&metadata.to_string()))
}

impl fmt::Display for DataLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_log(f, "DataLog", self.path(), &self.dataset.to_string(), &self.metadata)
    }
}

impl fmt::Display for DictLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = serde_json::to_string_pretty(&self.data).map_err(|_| fmt::Error)?;
        write_log(f, "DictLog", self.path(), &data, &self.metadata)
    }
}

impl fmt::Display for LoadedLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadedLog::Data(log) => fmt::Display::fmt(log, f),
            LoadedLog::Dict(log) => fmt::Display::fmt(log, f),
        }
    }
}
