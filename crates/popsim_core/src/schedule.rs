//! Event tables and their expansion across subjects.
//!
//! A template dosing/observation schedule is written once and copied for every
//! simulated subject, each copy stamped with that subject's identifier.

use std::ops::Range;

use log::debug;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{Axis, PopsimError, Result};
use crate::lookup::find_position;

pub const DEFAULT_ID_COLUMN: &str = "ID";

/// A numeric table with one name per column and optional row labels.
#[derive(Debug, Clone, PartialEq)]
pub struct EventTable {
    columns: Vec<String>,
    data: DMatrix<f64>,
    row_labels: Option<Vec<String>>,
}

impl EventTable {
    pub fn new(columns: Vec<String>, data: DMatrix<f64>) -> Result<Self> {
        if columns.len() != data.ncols() {
            return Err(PopsimError::LabelLengthMismatch {
                axis: Axis::Cols,
                expected: data.ncols(),
                got: columns.len(),
            });
        }
        Ok(Self {
            columns,
            data,
            row_labels: None,
        })
    }

    /// Builds a table from row-major values; the row count is inferred.
    pub fn from_row_slice(columns: Vec<String>, values: &[f64]) -> Result<Self> {
        let ncols = columns.len();
        let ragged = match ncols {
            0 => !values.is_empty(),
            _ => values.len() % ncols != 0,
        };
        if ragged {
            return Err(PopsimError::RaggedTable {
                columns: ncols,
                values: values.len(),
            });
        }
        let nrows = if ncols == 0 { 0 } else { values.len() / ncols };
        Self::new(columns, DMatrix::from_row_slice(nrows, ncols, values))
    }

    pub fn with_row_labels(mut self, labels: Vec<String>) -> Result<Self> {
        if labels.len() != self.data.nrows() {
            return Err(PopsimError::LabelLengthMismatch {
                axis: Axis::Rows,
                expected: self.data.nrows(),
                got: labels.len(),
            });
        }
        self.row_labels = Some(labels);
        Ok(self)
    }

    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }

    pub fn row_labels(&self) -> Option<&[String]> {
        self.row_labels.as_deref()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        find_position(name, &self.columns)
    }

    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.data[(row, col)]
    }

    /// Row-major copy of the values.
    pub fn to_row_major(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.nrows() * self.ncols());
        for row in self.data.row_iter() {
            out.extend(row.iter().copied());
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSettings {
    /// Name looked up by [`expand_events_by_name`], and the name given to the
    /// identifier column when the template has none.
    pub id_column_name: String,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            id_column_name: DEFAULT_ID_COLUMN.to_string(),
        }
    }
}

/// A template schedule expanded across subjects.
///
/// Rows are grouped by subject in input order; each block repeats the template
/// rows in their original order.
#[derive(Debug, Clone, PartialEq)]
pub struct EventTableSet {
    table: EventTable,
    id_column: usize,
    rows_per_subject: usize,
    subjects: usize,
}

impl EventTableSet {
    pub fn table(&self) -> &EventTable {
        &self.table
    }

    pub fn into_table(self) -> EventTable {
        self.table
    }

    pub fn id_column(&self) -> usize {
        self.id_column
    }

    pub fn subjects(&self) -> usize {
        self.subjects
    }

    pub fn rows_per_subject(&self) -> usize {
        self.rows_per_subject
    }

    /// Rows belonging to the `subject`-th identifier.
    pub fn subject_rows(&self, subject: usize) -> Option<Range<usize>> {
        if subject >= self.subjects {
            return None;
        }
        let start = subject * self.rows_per_subject;
        Some(start..start + self.rows_per_subject)
    }
}

/// Copies `template` once per identifier in `ids`.
///
/// `id_column` is the 0-based identifier column of the template, or `None` if
/// the template has none; a column named `settings.id_column_name` is then
/// appended. Identifiers are not checked for uniqueness or order. The output
/// carries no row labels.
pub fn expand_events(
    template: &EventTable,
    id_column: Option<usize>,
    ids: &[f64],
    settings: &ScheduleSettings,
) -> Result<EventTableSet> {
    let template_cols = template.ncols();
    if let Some(index) = id_column {
        if index >= template_cols {
            return Err(PopsimError::ColumnOutOfRange {
                index,
                columns: template_cols,
            });
        }
    }

    let mut columns = template.columns.clone();
    let id_column = match id_column {
        Some(index) => index,
        None => {
            columns.push(settings.id_column_name.clone());
            template_cols
        }
    };

    let rows = template.nrows();
    debug!(
        "expanding {}-row schedule across {} subjects (id column {})",
        rows,
        ids.len(),
        id_column
    );

    let total = rows
        .checked_mul(ids.len())
        .ok_or(PopsimError::ExtentOverflow {
            context: "expanded schedule",
            rows,
            cols: ids.len(),
        })?;
    let mut data = DMatrix::<f64>::zeros(total, columns.len());
    for (subject, &id) in ids.iter().enumerate() {
        let start = subject * rows;
        data.view_mut((start, 0), (rows, template_cols))
            .copy_from(&template.data);
        data.view_mut((start, id_column), (rows, 1)).fill(id);
    }

    Ok(EventTableSet {
        table: EventTable::new(columns, data)?,
        id_column,
        rows_per_subject: rows,
        subjects: ids.len(),
    })
}

/// Resolves the identifier column by `settings.id_column_name` and expands.
pub fn expand_events_by_name(
    template: &EventTable,
    ids: &[f64],
    settings: &ScheduleSettings,
) -> Result<EventTableSet> {
    let id_column = template.column_index(&settings.id_column_name);
    expand_events(template, id_column, ids, settings)
}
