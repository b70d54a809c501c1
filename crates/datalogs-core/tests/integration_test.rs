//! Integration tests for datalogs-core.

use std::sync::{Arc, Mutex};

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::Local;
use datalogs_core::{
    convert_to_json, load_log, CommitStore, Coord, DataLog, DataVar, DatalogsError, DictLog,
    LoadedLog, Log, LogOptions, LogValue, LoggedProps, Logger, LoggerConfig, Props, Result,
};
use serde_json::{json, Value};
use tempfile::TempDir;

/// Commit store backed by a list of ids, newest last.
struct MemoryStore {
    commits: Mutex<Vec<u64>>,
}

impl MemoryStore {
    fn new(commits: Vec<u64>) -> Arc<Self> {
        Arc::new(Self {
            commits: Mutex::new(commits),
        })
    }

    fn commit(&self, id: u64) {
        self.commits.lock().unwrap().push(id);
    }
}

impl CommitStore for MemoryStore {
    fn latest_commit_id(&self) -> Result<Option<u64>> {
        Ok(self.commits.lock().unwrap().last().copied())
    }

    fn location(&self) -> String {
        "memory://params".to_string()
    }
}

fn as_object(value: Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

#[test]
fn test_dict_log_round_trip_under_fresh_root() {
    let tmp = TempDir::new().unwrap();
    let logger = Logger::new(tmp.path()).unwrap();

    let before = Local::now().fixed_offset();
    logger.log_dict("x", json!({"a": 1, "b": [1, 2, 3]})).unwrap();
    let after = Local::now().fixed_offset();

    let path = tmp.path().join("x.json");
    assert!(path.exists());
    let LoadedLog::Dict(log) = load_log(&path).unwrap() else {
        panic!("expected a dict log");
    };
    assert_eq!(Value::Object(log.data().clone()), json!({"a": 1, "b": [1, 2, 3]}));
    assert!(!log.data().contains_key("__metadata"));
    assert!(before <= log.metadata().timestamp && log.metadata().timestamp <= after);
    assert_eq!(log.metadata().directory, tmp.path());
    assert_eq!(log.metadata().description, "x");
}

#[test]
fn test_data_log_round_trip_through_load_log() {
    let tmp = TempDir::new().unwrap();
    let logger = Logger::new(tmp.path()).unwrap();
    logger
        .log_data(
            "x",
            [Coord::new("t", vec![1i64, 2, 3])],
            [DataVar::new("v", "t", vec![4i64, 5, 6])],
        )
        .unwrap();

    let LoadedLog::Data(log) = load_log(tmp.path().join("x.parquet")).unwrap() else {
        panic!("expected a data log");
    };
    let t = log.data().coord("t").unwrap();
    let v = log.data().data_var("v").unwrap();
    assert_eq!(t.values_json().unwrap(), vec![json!(1), json!(2), json!(3)]);
    assert_eq!(v.values_json().unwrap(), vec![json!(4), json!(5), json!(6)]);
    assert_eq!(v.dims, vec!["t"]);
}

#[test]
fn test_two_dimensional_data_log_round_trip() {
    let tmp = TempDir::new().unwrap();
    let logger = Logger::new(tmp.path()).unwrap();
    let options = LogOptions::new().attr("qubit", "q3");
    let saved = logger
        .log_data_with(
            "rabi",
            [
                Coord::new("amplitude", vec![0.0, 0.5, 1.0]).units("V"),
                Coord::new("repeat", vec![0i64, 1]),
            ],
            [
                DataVar::new("i", ["amplitude", "repeat"], vec![1.0, 1.1, 0.2, 0.3, 0.9, 1.0])
                    .long_name("In-phase"),
                DataVar::new("label", "repeat", vec!["first", "second"]),
            ],
            &options,
        )
        .unwrap();

    let loaded = DataLog::load(saved.path().unwrap()).unwrap();
    assert_eq!(loaded.data(), saved.data());
    assert_eq!(loaded.metadata(), saved.metadata());
    assert_eq!(loaded.data().data_var("i").unwrap().shape, vec![3, 2]);
    assert_eq!(loaded.data().attrs()["qubit"], json!("q3"));
    assert_eq!(
        loaded.data().data_var("i").unwrap().attrs["long_name"],
        json!("In-phase")
    );
}

#[test]
fn test_data_log_validation_errors() {
    let tmp = TempDir::new().unwrap();
    let logger = Logger::new(tmp.path()).unwrap();

    let missing_coord = logger.log_data(
        "x",
        [Coord::new("t", vec![1i64, 2])],
        [DataVar::new("v", "f", vec![1i64, 2])],
    );
    assert!(matches!(missing_coord, Err(DatalogsError::Validation(_))));

    let shared_name = logger.log_data(
        "x",
        [Coord::new("t", vec![1i64, 2])],
        [DataVar::new("t", "t", vec![1i64, 2])],
    );
    assert!(matches!(shared_name, Err(DatalogsError::Validation(_))));

    let wrong_length = logger.log_data(
        "x",
        [Coord::new("t", vec![1i64, 2])],
        [DataVar::new("v", "t", vec![1i64, 2, 3])],
    );
    assert!(matches!(wrong_length, Err(DatalogsError::Validation(_))));

    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[test]
fn test_unsupported_value_creates_no_file() {
    let tmp = TempDir::new().unwrap();
    let logger = Logger::new(tmp.path()).unwrap();
    let file = std::fs::File::open(tmp.path()).unwrap();
    let data = LogValue::map([
        ("ok", LogValue::from(1)),
        ("handle", LogValue::opaque(Arc::new(file))),
    ]);

    let err = logger.log_dict("x", data).unwrap_err();
    match err {
        DatalogsError::UnsupportedType { path, .. } => assert_eq!(path, "$.handle"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!tmp.path().join("x.json").exists());
}

#[test]
fn test_load_log_rejects_unknown_extension() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("x.csv");
    std::fs::write(&path, "a,b\n").unwrap();
    assert!(matches!(
        load_log(&path),
        Err(DatalogsError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_sub_logger_directory_creation() {
    let tmp = TempDir::new().unwrap();
    let logger = Logger::new(tmp.path()).unwrap();

    let eager = logger.sub_logger("eager", false).unwrap();
    assert!(tmp.path().join("eager").is_dir());

    let lazy = logger.sub_logger("lazy", true).unwrap();
    let entries = || {
        std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect::<Vec<_>>()
    };
    assert_eq!(entries(), vec!["eager"]);

    lazy.log_dict("x", json!({"a": 1})).unwrap();
    assert_eq!(entries().len(), 2);
    assert!(lazy.directory().unwrap().join("x.json").exists());
    assert_eq!(eager.directory().unwrap(), tmp.path().join("eager"));
}

#[test]
fn test_timestamped_sub_loggers_get_distinct_directories() {
    let tmp = TempDir::new().unwrap();
    let logger = Logger::new(tmp.path()).unwrap();
    let first = logger.sub_logger("run", true).unwrap();
    let second = logger.sub_logger("run", true).unwrap();

    let a = first.directory().unwrap();
    let b = second.directory().unwrap();
    assert_ne!(a, b);
    assert!(a.is_dir() && b.is_dir());
}

#[test]
fn test_timestamp_format_from_config() {
    let tmp = TempDir::new().unwrap();
    let config = LoggerConfig::new(tmp.path()).with_timestamp_format("%Y");
    let logger = Logger::from_config(config, None).unwrap();
    let dir = logger.sub_logger("run", true).unwrap().directory().unwrap();
    let expected = format!("{}_run", Local::now().format("%Y"));
    assert_eq!(dir.file_name().unwrap().to_str().unwrap(), expected);
}

#[test]
fn test_repeated_log_names_do_not_overwrite() {
    let tmp = TempDir::new().unwrap();
    let logger = Logger::new(tmp.path()).unwrap();
    logger.log_dict("fit", json!({"run": 1})).unwrap();
    let second = logger.log_dict("fit", json!({"run": 2})).unwrap();

    assert_eq!(second.path().unwrap(), tmp.path().join("fit_1.json"));
    let first = DictLog::load(tmp.path().join("fit.json")).unwrap();
    assert_eq!(first.data()["run"], json!(1));
}

#[test]
fn test_logs_are_tagged_with_latest_commit() {
    let tmp = TempDir::new().unwrap();
    let store = MemoryStore::new(vec![1, 2]);
    let logger = Logger::with_commit_store(tmp.path(), store.clone()).unwrap();
    let sub = logger.sub_logger("calibration", false).unwrap();

    let first = sub.log_dict("a", json!({"x": 1})).unwrap();
    store.commit(5);
    let second = sub.log_dict("b", json!({"x": 2})).unwrap();

    assert_eq!(first.metadata().commit_id, Some(2));
    assert_eq!(second.metadata().commit_id, Some(5));
    assert_eq!(
        second.metadata().commit_store.as_deref(),
        Some("memory://params")
    );

    let reloaded = DictLog::load(second.path().unwrap()).unwrap();
    assert_eq!(reloaded.metadata().commit_id, Some(5));
}

#[test]
fn test_empty_commit_store_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let logger = Logger::with_commit_store(tmp.path(), MemoryStore::new(vec![])).unwrap();
    let err = logger.log_dict("x", json!({"a": 1})).unwrap_err();
    assert!(matches!(err, DatalogsError::EmptyCommitStore { .. }));

    let log = logger
        .log_dict_with("x", json!({"a": 1}), &LogOptions::new().commit_id(9))
        .unwrap();
    assert_eq!(log.metadata().commit_id, Some(9));
}

#[test]
fn test_convert_hook_is_tried_first() {
    let tmp = TempDir::new().unwrap();
    let logger = Logger::new(tmp.path()).unwrap();

    #[derive(Debug)]
    struct Point {
        x: f64,
        y: f64,
    }

    let hook = |value: &LogValue| {
        value
            .downcast_ref::<Point>()
            .map(|p| json!({"x": p.x, "y": p.y}))
    };
    let data = LogValue::map([
        ("origin", LogValue::opaque(Point { x: 0.0, y: 1.5 })),
        ("count", LogValue::from(2)),
    ]);
    let log = logger
        .log_dict_with("points", data, &LogOptions::new().convert(&hook))
        .unwrap();
    assert_eq!(
        Value::Object(log.data().clone()),
        json!({"origin": {"x": 0.0, "y": 1.5}, "count": 2})
    );
}

struct Experiment {
    qubit: String,
    frequency: f64,
    points: u32,
    scratch: Vec<u8>,
}

impl LoggedProps for Experiment {
    fn logged_props(&self) -> Props {
        Props::new()
            .prop("qubit", self.qubit.clone())
            .prop("frequency", self.frequency)
            .prop("points", self.points)
    }
}

#[test]
fn test_log_props_only_declared_fields() {
    let tmp = TempDir::new().unwrap();
    let logger = Logger::new(tmp.path()).unwrap();
    let experiment = Experiment {
        qubit: "q1".to_string(),
        frequency: 5.1e9,
        points: 101,
        scratch: vec![1, 2, 3],
    };
    assert_eq!(experiment.scratch.len(), 3);

    let log = logger.log_props("experiment", &experiment).unwrap();
    let keys: Vec<_> = log.data().keys().cloned().collect();
    assert_eq!(keys, ["qubit", "frequency", "points"]);

    let loaded = DictLog::load(log.path().unwrap()).unwrap();
    assert_eq!(loaded.data()["points"], json!(101));
}

#[test]
fn test_convert_is_idempotent_on_frames_and_arrays() {
    let schema = Arc::new(Schema::new(vec![
        Field::new("time", DataType::Int64, false),
        Field::new("signal", DataType::Float64, true),
        Field::new("label", DataType::Utf8, true),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(vec![1, 2])),
        Arc::new(Float64Array::from(vec![Some(0.5), None])),
        Arc::new(StringArray::from(vec!["a", "b"])),
    ];
    let frame = RecordBatch::try_new(schema, columns).unwrap();
    let value = LogValue::map([
        ("frame", LogValue::from(frame)),
        ("nan", LogValue::from(f64::NAN)),
    ]);

    let once = convert_to_json(&value, None).unwrap();
    assert_eq!(
        once,
        json!({
            "frame": {"time": [1, 2], "signal": [0.5, null], "label": ["a", "b"]},
            "nan": null
        })
    );
    let twice = convert_to_json(&LogValue::from(once.clone()), None).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_config_yaml_drives_logger() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("datalogs.yaml");
    let root = tmp.path().join("logs");
    LoggerConfig::new(&root).save_yaml_file(&config_path).unwrap();

    let config = LoggerConfig::from_yaml_file(&config_path).unwrap();
    let logger = Logger::from_config(config, None).unwrap();
    assert!(root.is_dir());
    let log = logger.log_dict("x", as_object(json!({"a": 1}))).unwrap();
    assert!(log.path().unwrap().starts_with(&root));
}
