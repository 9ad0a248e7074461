use thiserror::Error;

use crate::pipeline::Phase;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Required columns not found: {0}")]
    MissingColumns(String),

    #[error("Input contains no usable rows")]
    EmptyInput,

    #[error("Process state not found for '{0}'; restart the pipeline")]
    StateNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{phase} phase failed: {message}")]
    PhaseFailed { phase: Phase, message: String },

    #[error("{0}")]
    Other(String),
}
