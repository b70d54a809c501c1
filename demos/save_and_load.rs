//! Example of logging an experiment with datalogs from Rust.

use std::sync::{Arc, Mutex};

use datalogs::{
    load_log, CommitStore, Coord, DataVar, DatalogsError, Log, LogOptions, LoggedProps, Logger,
    Props, Result,
};

/// Stand-in for a parameter database that records commits.
struct Commits(Mutex<u64>);

impl CommitStore for Commits {
    fn latest_commit_id(&self) -> Result<Option<u64>> {
        let latest = self
            .0
            .lock()
            .map_err(|e| DatalogsError::CommitStore(e.to_string()))?;
        Ok(Some(*latest))
    }

    fn location(&self) -> String {
        "params.db".to_string()
    }
}

struct PowerRabi {
    qubit: String,
    max_amplitude: f64,
    points: usize,
}

impl LoggedProps for PowerRabi {
    fn logged_props(&self) -> Props {
        Props::new()
            .prop("qubit", self.qubit.clone())
            .prop("max_amplitude", self.max_amplitude)
            .prop("points", self.points)
    }
}

fn main() -> Result<()> {
    // 1. A root logger tagged with the current commit
    let logger = Logger::with_commit_store("./data_logs", Arc::new(Commits(Mutex::new(1))))?;
    let run = logger.sub_logger("power_rabi", true)?;

    // 2. Experiment settings
    let experiment = PowerRabi {
        qubit: "q1".to_string(),
        max_amplitude: 0.8,
        points: 21,
    };
    run.log_props("experiment", &experiment)?;

    // 3. Measured data
    let amplitudes: Vec<f64> = (0..experiment.points)
        .map(|i| experiment.max_amplitude * i as f64 / (experiment.points - 1) as f64)
        .collect();
    let signal: Vec<f64> = amplitudes
        .iter()
        .map(|a| (std::f64::consts::PI * a / 0.5).cos())
        .collect();
    let data = run.log_data_with(
        "rabi",
        [Coord::new("amplitude", amplitudes).units("V")],
        [DataVar::new("signal", "amplitude", signal).long_name("Population")],
        &LogOptions::new().attr("qubit", experiment.qubit.as_str()),
    )?;

    // 4. Read everything back
    if let Some(path) = data.path() {
        println!("{}\n", load_log(path)?);
    }
    println!("{}", load_log(run.file_path("experiment.json")?)?);

    Ok(())
}
