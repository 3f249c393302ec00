//! Error type shared by every operation in the crate.

use thiserror::Error;

/// Which axis of a matrix a label sequence annotates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Rows,
    Cols,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::Rows => f.write_str("row"),
            Axis::Cols => f.write_str("column"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PopsimError {
    #[error("{context}: matrix is not square ({rows}x{cols})")]
    NotSquare {
        context: &'static str,
        rows: usize,
        cols: usize,
    },

    #[error("{axis} label count mismatch: expected {expected}, got {got}")]
    LabelLengthMismatch {
        axis: Axis,
        expected: usize,
        got: usize,
    },

    #[error("covariance matrix is not symmetric at ({row}, {col}); |a_ij - a_ji| = {delta:e}")]
    NotSymmetric { row: usize, col: usize, delta: f64 },

    #[error("covariance is not positive semi-definite (eigenvalue {index} = {eigenvalue:e})")]
    NotPositiveSemiDefinite { index: usize, eigenvalue: f64 },

    #[error("{name} must be finite and non-negative, got {value}")]
    InvalidSettings { name: &'static str, value: f64 },

    #[error("invalid sample count: {samples} draws of dimension {dimension}; both must be >= 1")]
    InvalidSampleCount { samples: usize, dimension: usize },

    #[error("{context}: non-finite entry at ({row}, {col})")]
    NonFiniteEntry {
        context: &'static str,
        row: usize,
        col: usize,
    },

    #[error("negative variance {value} on diagonal entry {index}")]
    NegativeVariance { index: usize, value: f64 },

    #[error("column index {index} is out of range for a table with {columns} columns")]
    ColumnOutOfRange { index: usize, columns: usize },

    #[error("{context}: expected {expected} values, got {got}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{context}: {rows} x {cols} entries overflow the addressable size")]
    ExtentOverflow {
        context: &'static str,
        rows: usize,
        cols: usize,
    },

    #[error("{values} values do not fill whole rows of {columns} columns")]
    RaggedTable { columns: usize, values: usize },

    #[error("column \"{name}\" not found")]
    MissingColumn { name: String },

    #[error("invalid dose record in row {row}: {reason}")]
    InvalidDoseRecord { row: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, PopsimError>;
