//! Labelled dense matrices.
//!
//! A [`LabeledMatrix`] pairs a `DMatrix<f64>` with optional row and column
//! label sequences. Label lengths are checked on construction, so a label
//! sequence that is present always matches the extent of its axis.

use nalgebra::DMatrix;

use crate::error::{Axis, PopsimError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledMatrix {
    values: DMatrix<f64>,
    row_labels: Option<Vec<String>>,
    col_labels: Option<Vec<String>>,
}

impl LabeledMatrix {
    /// Wraps a matrix without labels.
    pub fn new(values: DMatrix<f64>) -> Self {
        Self {
            values,
            row_labels: None,
            col_labels: None,
        }
    }

    /// Wraps a matrix with optional row and column labels.
    ///
    /// Fails with [`PopsimError::LabelLengthMismatch`] if a label sequence does
    /// not have one entry per row (or column).
    pub fn with_labels(
        values: DMatrix<f64>,
        row_labels: Option<Vec<String>>,
        col_labels: Option<Vec<String>>,
    ) -> Result<Self> {
        check_label_len(Axis::Rows, values.nrows(), row_labels.as_deref())?;
        check_label_len(Axis::Cols, values.ncols(), col_labels.as_deref())?;
        Ok(Self {
            values,
            row_labels,
            col_labels,
        })
    }

    /// Builds an unlabelled matrix from row-major data.
    pub fn from_row_slice(nrows: usize, ncols: usize, data: &[f64]) -> Result<Self> {
        let expected = nrows
            .checked_mul(ncols)
            .ok_or(PopsimError::ExtentOverflow {
                context: "row-major matrix data",
                rows: nrows,
                cols: ncols,
            })?;
        if data.len() != expected {
            return Err(PopsimError::ShapeMismatch {
                context: "row-major matrix data",
                expected,
                got: data.len(),
            });
        }
        Ok(Self::new(DMatrix::from_row_slice(nrows, ncols, data)))
    }

    pub fn identity(dim: usize) -> Self {
        Self::new(DMatrix::identity(dim, dim))
    }

    /// An empty 0x0 matrix.
    pub fn empty() -> Self {
        Self::new(DMatrix::zeros(0, 0))
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    pub fn is_square(&self) -> bool {
        self.values.nrows() == self.values.ncols()
    }

    /// A matrix with no rows contributes nothing to a block assembly.
    pub fn is_empty(&self) -> bool {
        self.values.nrows() == 0
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    pub(crate) fn values_mut(&mut self) -> &mut DMatrix<f64> {
        &mut self.values
    }

    pub fn into_values(self) -> DMatrix<f64> {
        self.values
    }

    pub fn row_labels(&self) -> Option<&[String]> {
        self.row_labels.as_deref()
    }

    pub fn col_labels(&self) -> Option<&[String]> {
        self.col_labels.as_deref()
    }

    pub fn has_labels(&self) -> bool {
        self.row_labels.is_some() || self.col_labels.is_some()
    }

    /// Drops both label sequences.
    pub fn strip_labels(mut self) -> Self {
        self.row_labels = None;
        self.col_labels = None;
        self
    }

    /// Row-major copy of the values.
    pub fn to_row_major(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.nrows() * self.ncols());
        for i in 0..self.nrows() {
            for j in 0..self.ncols() {
                out.push(self.values[(i, j)]);
            }
        }
        out
    }

    pub(crate) fn require_square(&self, context: &'static str) -> Result<usize> {
        if !self.is_square() {
            return Err(PopsimError::NotSquare {
                context,
                rows: self.nrows(),
                cols: self.ncols(),
            });
        }
        Ok(self.nrows())
    }

    pub(crate) fn require_finite(&self, context: &'static str) -> Result<()> {
        require_finite(&self.values, context)
    }
}

impl From<DMatrix<f64>> for LabeledMatrix {
    fn from(values: DMatrix<f64>) -> Self {
        Self::new(values)
    }
}

pub(crate) fn require_finite(values: &DMatrix<f64>, context: &'static str) -> Result<()> {
    for j in 0..values.ncols() {
        for i in 0..values.nrows() {
            if !values[(i, j)].is_finite() {
                return Err(PopsimError::NonFiniteEntry {
                    context,
                    row: i,
                    col: j,
                });
            }
        }
    }
    Ok(())
}

fn check_label_len(axis: Axis, expected: usize, labels: Option<&[String]>) -> Result<()> {
    match labels {
        Some(labels) if labels.len() != expected => Err(PopsimError::LabelLengthMismatch {
            axis,
            expected,
            got: labels.len(),
        }),
        _ => Ok(()),
    }
}
