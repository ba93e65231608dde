//! Table-related types and error definitions

use thiserror::Error;

use crate::resolve::InputRow;

/// Errors that can occur when reading or writing tables
#[derive(Debug, Error)]
pub enum TableError {
    #[error("Missing column in input table: {0}")]
    MissingColumn(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Names of the input columns holding coordinates and the optional row id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinateColumns {
    pub ap: String,
    pub dv: String,
    pub ml: String,
    /// Column copied through to the output (e.g. `cell.id`)
    pub id: Option<String>,
}

impl Default for CoordinateColumns {
    fn default() -> Self {
        Self {
            ap: "CCF.AllenAP".to_string(),
            dv: "CCF.AllenDV".to_string(),
            ml: "CCF.AllenML".to_string(),
            id: None,
        }
    }
}

/// A row excluded from resolution because its coordinates were unusable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    pub index: usize,
    pub reason: String,
}

/// Rows read from an input table
#[derive(Debug, Clone, Default)]
pub struct PointTable {
    pub rows: Vec<InputRow>,
    pub skipped: Vec<SkippedRow>,
}
