use std::io;
use std::path::PathBuf;

use arit_core::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConditionsError {
    #[error("failed to open condition table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed condition table {table}: {source}")]
    Csv {
        table: String,
        #[source]
        source: csv::Error,
    },
    #[error("row {row} of {table}: {source}")]
    Row {
        table: String,
        row: usize,
        #[source]
        source: ConfigError,
    },
    #[error("condition table {0} has no trials")]
    Empty(String),
    #[error("no condition table loaded for {0}")]
    Missing(&'static str),
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to open output file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write trial record: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush output: {0}")]
    Io(#[from] io::Error),
    #[error("failed to write session summary: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Conditions(#[from] ConditionsError),
    #[error(transparent)]
    Output(#[from] OutputError),
}
