use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HazardError {
    #[error("Invalid file name {path:?}: expected {expected}")]
    InvalidFilename {
        path: PathBuf,
        expected: &'static str,
    },

    #[error("Status flag meanings {0:?} do not include 'stranded'")]
    MissingStrandedFlag(String),

    #[error("ESI code {value} (from {raw:?}) outside valid range [1, 10]")]
    EsiCodeOutOfRange { raw: String, value: i64 },

    #[error("No AIS snapshot for vessel type '{vessel_type}' covering {date}")]
    MissingAisSnapshot {
        vessel_type: String,
        date: NaiveDate,
    },

    #[error("Empty catalog: {0}")]
    EmptyCatalog(&'static str),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("InvalidData: {0}")]
    InvalidData(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = HazardError> = std::result::Result<T, E>;
