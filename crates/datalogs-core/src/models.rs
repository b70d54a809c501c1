//! Data models for datalogs: log metadata and loggable values.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::{ArrayRef, Scalar};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Metadata written alongside every log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMetadata {
    /// Directory the log was created in.
    pub directory: PathBuf,
    /// When the log was created.
    pub timestamp: DateTime<FixedOffset>,
    /// Name the caller gave the log.
    pub description: String,
    /// Commit the log is tagged with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<u64>,
    /// Location of the commit store that supplied `commit_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_store: Option<String>,
}

impl LogMetadata {
    pub fn new(
        directory: impl Into<PathBuf>,
        timestamp: DateTime<FixedOffset>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            directory: directory.into(),
            timestamp,
            description: description.into(),
            commit_id: None,
            commit_store: None,
        }
    }

    pub fn with_commit(mut self, commit_id: Option<u64>, commit_store: Option<String>) -> Self {
        self.commit_id = commit_id;
        self.commit_store = commit_store;
        self
    }
}

impl fmt::Display for LogMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<15}{}", "directory", self.directory.display())?;
        write!(f, "\n{:<15}{}", "timestamp", self.timestamp)?;
        write!(f, "\n{:<15}{}", "description", self.description)?;
        if let Some(id) = self.commit_id {
            write!(f, "\n{:<15}{}", "commit_id", id)?;
        }
        if let Some(store) = &self.commit_store {
            write!(f, "\n{:<15}{}", "commit_store", store)?;
        }
        Ok(())
    }
}

/// A value that can be handed to [`Logger::log_dict`](crate::Logger::log_dict).
///
/// Dictionary logs only hold JSON, so every `LogValue` goes through
/// [`convert_to_json`](crate::convert::convert_to_json) before it is written.
#[derive(Debug, Clone)]
pub enum LogValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    List(Vec<LogValue>),
    /// Ordered key/value pairs. Keys must be text or trivially coercible to text.
    Map(Vec<(LogValue, LogValue)>),
    /// Arrow array, converted to a (nested) list.
    Array(ArrayRef),
    /// Single arrow value, converted to its element.
    Scalar(Scalar<ArrayRef>),
    /// Tabular frame, converted to `{column: [values]}`.
    Frame(RecordBatch),
    /// Any other Rust value. Only a conversion hook can make it loggable.
    Opaque(Opaque),
}

impl LogValue {
    /// Build a map value from ordered pairs.
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<LogValue>,
        V: Into<LogValue>,
    {
        LogValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Wrap an arbitrary value.
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        LogValue::Opaque(Opaque::new(value))
    }

    /// Short name of the value's type, used in error messages.
    pub fn type_name(&self) -> &str {
        match self {
            LogValue::Null => "null",
            LogValue::Bool(_) => "bool",
            LogValue::Int(_) => "int",
            LogValue::UInt(_) => "uint",
            LogValue::Float(_) => "float",
            LogValue::Text(_) => "text",
            LogValue::List(_) => "list",
            LogValue::Map(_) => "map",
            LogValue::Array(_) => "array",
            LogValue::Scalar(_) => "scalar",
            LogValue::Frame(_) => "frame",
            LogValue::Opaque(o) => o.type_name(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            LogValue::Int(i) => Some(*i),
            LogValue::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            LogValue::Opaque(o) => o.downcast_ref(),
            _ => None,
        }
    }
}

/// Type-erased value that has no built-in JSON representation.
#[derive(Clone)]
pub struct Opaque {
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl Opaque {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            value: Arc::new(value),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.type_name)
    }
}

impl From<bool> for LogValue {
    fn from(v: bool) -> Self {
        LogValue::Bool(v)
    }
}
impl From<i8> for LogValue {
    fn from(v: i8) -> Self {
        LogValue::Int(v as i64)
    }
}
impl From<i16> for LogValue {
    fn from(v: i16) -> Self {
        LogValue::Int(v as i64)
    }
}
impl From<i32> for LogValue {
    fn from(v: i32) -> Self {
        LogValue::Int(v as i64)
    }
}
impl From<i64> for LogValue {
    fn from(v: i64) -> Self {
        LogValue::Int(v)
    }
}
impl From<u8> for LogValue {
    fn from(v: u8) -> Self {
        LogValue::UInt(v as u64)
    }
}
impl From<u16> for LogValue {
    fn from(v: u16) -> Self {
        LogValue::UInt(v as u64)
    }
}
impl From<u32> for LogValue {
    fn from(v: u32) -> Self {
        LogValue::UInt(v as u64)
    }
}
impl From<u64> for LogValue {
    fn from(v: u64) -> Self {
        LogValue::UInt(v)
    }
}
impl From<usize> for LogValue {
    fn from(v: usize) -> Self {
        LogValue::UInt(v as u64)
    }
}
impl From<f32> for LogValue {
    fn from(v: f32) -> Self {
        LogValue::Float(v as f64)
    }
}
impl From<f64> for LogValue {
    fn from(v: f64) -> Self {
        LogValue::Float(v)
    }
}
impl From<String> for LogValue {
    fn from(v: String) -> Self {
        LogValue::Text(v)
    }
}
impl From<&str> for LogValue {
    fn from(v: &str) -> Self {
        LogValue::Text(v.to_string())
    }
}
impl<T: Into<LogValue>> From<Option<T>> for LogValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(LogValue::Null)
    }
}
impl<T: Into<LogValue>> From<Vec<T>> for LogValue {
    fn from(v: Vec<T>) -> Self {
        LogValue::List(v.into_iter().map(Into::into).collect())
    }
}
impl<K: Into<LogValue>, V: Into<LogValue>> From<BTreeMap<K, V>> for LogValue {
    fn from(v: BTreeMap<K, V>) -> Self {
        LogValue::map(v)
    }
}
impl<K: Into<LogValue>, V: Into<LogValue>> From<HashMap<K, V>> for LogValue {
    fn from(v: HashMap<K, V>) -> Self {
        LogValue::map(v)
    }
}
impl From<ArrayRef> for LogValue {
    fn from(v: ArrayRef) -> Self {
        LogValue::Array(v)
    }
}
impl From<Scalar<ArrayRef>> for LogValue {
    fn from(v: Scalar<ArrayRef>) -> Self {
        LogValue::Scalar(v)
    }
}
impl From<RecordBatch> for LogValue {
    fn from(v: RecordBatch) -> Self {
        LogValue::Frame(v)
    }
}
impl From<Opaque> for LogValue {
    fn from(v: Opaque) -> Self {
        LogValue::Opaque(v)
    }
}
impl From<serde_json::Value> for LogValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => LogValue::Null,
            serde_json::Value::Bool(b) => LogValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    LogValue::UInt(u)
                } else if let Some(i) = n.as_i64() {
                    LogValue::Int(i)
                } else {
                    LogValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => LogValue::Text(s),
            serde_json::Value::Array(items) => {
                LogValue::List(items.into_iter().map(Into::into).collect())
            }
            serde_json::Value::Object(map) => map.into(),
        }
    }
}
impl From<serde_json::Map<String, serde_json::Value>> for LogValue {
    fn from(v: serde_json::Map<String, serde_json::Value>) -> Self {
        LogValue::map(v)
    }
}
