//! datalogs-core: Core storage and logging engine for datalogs.
//!
//! A [`Logger`] owns a directory. Numeric results go into data logs (one
//! Parquet file per [`Dataset`] of labelled coordinates and data variables),
//! everything else into JSON dict logs after [`convert_to_json`]. Every log
//! carries [`LogMetadata`]: when, where, what, and which commit of an
//! optional [`CommitStore`] it belongs to.

pub mod config;
pub mod convert;
pub mod error;
pub mod logger;
pub mod logs;
pub mod models;
pub mod props;
pub mod storage;
pub mod variables;

pub use config::LoggerConfig;
pub use convert::{convert_to_json, ConvertFn};
pub use error::{DatalogsError, Result};
pub use logger::{CommitStore, LogOptions, Logger};
pub use logs::{load_log, DataLog, DictLog, LoadedLog, Log};
pub use models::{LogMetadata, LogValue, Opaque};
pub use props::{LoggedProps, Props};
pub use storage::{list_logs, LogEntry};
pub use variables::{Coord, DataVar, Dataset, Variable};
