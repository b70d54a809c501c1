//! The [`Logger`]: a directory that creates logs and sub-loggers.
//!
//! A root logger owns a directory on disk and, optionally, a [`CommitStore`]
//! used to tag every log with the id of the most recent commit. Sub-loggers
//! nest inside their parent and share its settings. Timestamped sub-loggers
//! only pick their directory name (and create it) on first use.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Local;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::LoggerConfig;
use crate::convert::{convert_to_json, ConvertFn};
use crate::error::{DatalogsError, Result};
use crate::logs::{DataLog, DictLog, Log};
use crate::models::{LogMetadata, LogValue};
use crate::props::LoggedProps;
use crate::storage;
use crate::variables::{Coord, DataVar, Dataset};

/// External store of numbered commits, e.g. a parameter database.
pub trait CommitStore: Send + Sync {
    /// Id of the most recent commit, `None` if nothing was committed yet.
    fn latest_commit_id(&self) -> Result<Option<u64>>;

    /// Human-readable location, recorded in log metadata.
    fn location(&self) -> String;
}

/// Per-call options of the `log_*_with` methods.
#[derive(Default)]
pub struct LogOptions<'a> {
    commit_id: Option<u64>,
    convert: Option<&'a ConvertFn<'a>>,
    attrs: Map<String, Value>,
}

impl<'a> LogOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag the log with this commit instead of the store's latest.
    pub fn commit_id(mut self, commit_id: u64) -> Self {
        self.commit_id = Some(commit_id);
        self
    }

    /// Conversion hook tried before the built-in rules (dict and props logs).
    pub fn convert(mut self, convert: &'a ConvertFn<'a>) -> Self {
        self.convert = Some(convert);
        self
    }

    /// Global attributes of the dataset (data logs).
    pub fn attrs(mut self, attrs: Map<String, Value>) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }
}

struct Settings {
    commit_store: Option<Arc<dyn CommitStore>>,
    timestamp_format: String,
}

enum Origin {
    Root(PathBuf),
    Child {
        parent: Logger,
        name: String,
        timestamp: bool,
    },
}

enum DirState {
    Uncreated,
    Created(PathBuf),
}

struct LoggerNode {
    origin: Origin,
    settings: Arc<Settings>,
    dir: Mutex<DirState>,
}

/// Handle to a log directory. Clones share the same directory.
#[derive(Clone)]
pub struct Logger {
    node: Arc<LoggerNode>,
}

impl Logger {
    /// Root logger at `root`, without a commit store.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        Self::from_config(LoggerConfig::new(root), None)
    }

    /// Root logger at `root` that tags logs with commits from `commit_store`.
    pub fn with_commit_store(
        root: impl Into<PathBuf>,
        commit_store: Arc<dyn CommitStore>,
    ) -> Result<Self> {
        Self::from_config(LoggerConfig::new(root), Some(commit_store))
    }

    /// Root logger from a [`LoggerConfig`]. The root directory is created now.
    pub fn from_config(
        config: LoggerConfig,
        commit_store: Option<Arc<dyn CommitStore>>,
    ) -> Result<Self> {
        config.validate()?;
        storage::ensure_dir(&config.root_directory)?;
        debug!(directory = %config.root_directory.display(), "created root logger");
        let settings = Settings {
            commit_store,
            timestamp_format: config.timestamp_format,
        };
        Ok(Self {
            node: Arc::new(LoggerNode {
                dir: Mutex::new(DirState::Created(config.root_directory.clone())),
                origin: Origin::Root(config.root_directory),
                settings: Arc::new(settings),
            }),
        })
    }

    /// Logger for the directory `name` (or `<timestamp>_name`) inside this one.
    ///
    /// Without a timestamp the directory is created right away and reused if
    /// it exists. With one, the name is fixed on first use and made unique.
    pub fn sub_logger(&self, name: &str, timestamp: bool) -> Result<Logger> {
        storage::validate_segment(name, "sub-logger name")?;
        let child = Logger {
            node: Arc::new(LoggerNode {
                origin: Origin::Child {
                    parent: self.clone(),
                    name: name.to_string(),
                    timestamp,
                },
                settings: Arc::clone(&self.node.settings),
                dir: Mutex::new(DirState::Uncreated),
            }),
        };
        if !timestamp {
            child.directory()?;
        }
        Ok(child)
    }

    /// Directory of this logger, created (with its ancestors) on first access.
    pub fn directory(&self) -> Result<PathBuf> {
        let mut state = self.node.dir.lock().unwrap_or_else(PoisonError::into_inner);
        if let DirState::Created(path) = &*state {
            return Ok(path.clone());
        }
        let path = match &self.node.origin {
            Origin::Root(path) => path.clone(),
            Origin::Child {
                parent,
                name,
                timestamp,
            } => {
                let parent_dir = parent.directory()?;
                let segment = if *timestamp {
                    let now = Local::now().fixed_offset();
                    let format = self.node.settings.timestamp_format.as_str();
                    storage::unique_name(&parent_dir, name, Some((&now, format)), "")
                } else {
                    name.clone()
                };
                parent_dir.join(segment)
            }
        };
        storage::ensure_dir(&path)?;
        debug!(directory = %path.display(), "created log directory");
        *state = DirState::Created(path.clone());
        Ok(path)
    }

    /// Path of `name` inside this logger's directory.
    pub fn file_path(&self, name: &str) -> Result<PathBuf> {
        Ok(self.directory()?.join(name))
    }

    /// Location of the bound commit store, if any.
    pub fn commit_store(&self) -> Option<String> {
        self.node.settings.commit_store.as_ref().map(|s| s.location())
    }

    pub fn log_data(
        &self,
        name: &str,
        coords: impl IntoIterator<Item = Coord>,
        data_vars: impl IntoIterator<Item = DataVar>,
    ) -> Result<DataLog> {
        self.log_data_with(name, coords, data_vars, &LogOptions::default())
    }

    /// Save coordinates and data variables as a data log `<name>.parquet`.
    pub fn log_data_with(
        &self,
        name: &str,
        coords: impl IntoIterator<Item = Coord>,
        data_vars: impl IntoIterator<Item = DataVar>,
        options: &LogOptions<'_>,
    ) -> Result<DataLog> {
        storage::validate_segment(name, "log name")?;
        let dataset = Dataset::from_variables(coords, data_vars)?.with_attrs(options.attrs.clone());
        let mut log = DataLog::new(self.metadata(name, options)?, dataset);
        log.save()?;
        Ok(log)
    }

    pub fn log_dict(&self, name: &str, data: impl Into<LogValue>) -> Result<DictLog> {
        self.log_dict_with(name, data, &LogOptions::default())
    }

    /// Convert `data` to a JSON object and save it as a dict log `<name>.json`.
    pub fn log_dict_with(
        &self,
        name: &str,
        data: impl Into<LogValue>,
        options: &LogOptions<'_>,
    ) -> Result<DictLog> {
        storage::validate_segment(name, "log name")?;
        let value = data.into();
        let data = match convert_to_json(&value, options.convert)? {
            Value::Object(data) => data,
            _ => {
                return Err(DatalogsError::Validation(format!(
                    "'{}' data given for dict log '{name}'",
                    value.type_name()
                )))
            }
        };
        DictLog::check_data(name, &data)?;
        let metadata = self.metadata(name, options)?;
        let mut log = DictLog::new(metadata, data)?;
        log.save()?;
        Ok(log)
    }

    pub fn log_props(&self, name: &str, obj: &impl LoggedProps) -> Result<DictLog> {
        self.log_props_with(name, obj, &LogOptions::default())
    }

    /// Save the properties `obj` declares through [`LoggedProps`] as a dict log.
    pub fn log_props_with(
        &self,
        name: &str,
        obj: &impl LoggedProps,
        options: &LogOptions<'_>,
    ) -> Result<DictLog> {
        self.log_dict_with(name, obj.logged_props(), options)
    }

    /// Pick the commit, then resolve the directory and stamp metadata for a new log.
    fn metadata(&self, name: &str, options: &LogOptions<'_>) -> Result<LogMetadata> {
        let (commit_id, commit_store) = self.commit(name, options)?;
        let directory = self.directory()?;
        Ok(LogMetadata::new(directory, Local::now().fixed_offset(), name)
            .with_commit(commit_id, commit_store))
    }

    fn commit(
        &self,
        name: &str,
        options: &LogOptions<'_>,
    ) -> Result<(Option<u64>, Option<String>)> {
        let Some(store) = &self.node.settings.commit_store else {
            return Ok((options.commit_id, None));
        };
        let location = store.location();
        let commit_id = match options.commit_id {
            Some(id) => id,
            None => store
                .latest_commit_id()?
                .ok_or_else(|| DatalogsError::EmptyCommitStore {
                    log: name.to_string(),
                    store: location.clone(),
                })?,
        };
        Ok((Some(commit_id), Some(location)))
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.node.dir.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out = f.debug_struct("Logger");
        match (&*state, &self.node.origin) {
            (DirState::Created(path), _) => out.field("directory", path),
            (DirState::Uncreated, Origin::Child { name, .. }) => out.field("pending", name),
            (DirState::Uncreated, Origin::Root(path)) => out.field("pending", path),
        };
        out.field("commit_store", &self.commit_store()).finish()
    }
}
