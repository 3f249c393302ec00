//! Serde payloads exchanged with the JS host.
//!
//! Matrices and tables travel as row-major `data` plus their extents and
//! optional labels.

use nalgebra::DMatrix;
use popsim_core::{EventTable, LabeledMatrix, PopsimError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixPayload {
    pub nrows: usize,
    pub ncols: usize,
    pub data: Vec<f64>,
    #[serde(default)]
    pub row_labels: Option<Vec<String>>,
    #[serde(default)]
    pub col_labels: Option<Vec<String>>,
}

impl MatrixPayload {
    pub fn into_matrix(self) -> Result<LabeledMatrix, PopsimError> {
        let values = LabeledMatrix::from_row_slice(self.nrows, self.ncols, &self.data)?;
        LabeledMatrix::with_labels(values.into_values(), self.row_labels, self.col_labels)
    }

    pub fn from_values(values: &DMatrix<f64>) -> Self {
        Self::from(&LabeledMatrix::new(values.clone()))
    }
}

impl From<&LabeledMatrix> for MatrixPayload {
    fn from(matrix: &LabeledMatrix) -> Self {
        Self {
            nrows: matrix.nrows(),
            ncols: matrix.ncols(),
            data: matrix.to_row_major(),
            row_labels: matrix.row_labels().map(|l| l.to_vec()),
            col_labels: matrix.col_labels().map(|l| l.to_vec()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePayload {
    pub columns: Vec<String>,
    pub data: Vec<f64>,
    #[serde(default)]
    pub row_labels: Option<Vec<String>>,
}

impl TablePayload {
    pub fn into_table(self) -> Result<EventTable, PopsimError> {
        let table = EventTable::from_row_slice(self.columns, &self.data)?;
        match self.row_labels {
            Some(labels) => table.with_row_labels(labels),
            None => Ok(table),
        }
    }
}

impl From<&EventTable> for TablePayload {
    fn from(table: &EventTable) -> Self {
        Self {
            columns: table.columns().to_vec(),
            data: table.to_row_major(),
            row_labels: table.row_labels().map(|l| l.to_vec()),
        }
    }
}
