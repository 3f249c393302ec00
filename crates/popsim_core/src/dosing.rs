//! Realisation of compact dose records into explicit events.
//!
//! A dose row may stand for a train of doses (`addl` additional doses every
//! `ii` time units) and for an infusion (`rate > 0`), whose end becomes its
//! own event carrying the negated amount at `time + amt / rate`. An optional
//! observation block is stamped with the subject identifier and appended after
//! each subject's last dose record.

use log::debug;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{PopsimError, Result};
use crate::schedule::EventTable;

/// Names of the columns a dose table is read through.
///
/// `addl` and `ii` are optional: a name that is `None`, or that the table does
/// not contain, means no additional doses are generated from it. `id` is only
/// looked up when observations are merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DoseColumns {
    pub id: String,
    pub time: String,
    pub amt: String,
    pub rate: String,
    pub addl: Option<String>,
    pub ii: Option<String>,
}

impl Default for DoseColumns {
    fn default() -> Self {
        Self {
            id: "ID".to_string(),
            time: "time".to_string(),
            amt: "amt".to_string(),
            rate: "rate".to_string(),
            addl: Some("addl".to_string()),
            ii: Some("ii".to_string()),
        }
    }
}

/// Largest `addl` a single record may carry.
pub const MAX_ADDITIONAL_DOSES: f64 = 1.0e9;

struct Resolved {
    time: usize,
    amt: usize,
    rate: usize,
    addl: Option<usize>,
    ii: Option<usize>,
}

impl DoseColumns {
    fn resolve(&self, table: &EventTable) -> Result<Resolved> {
        let optional = |name: &Option<String>| name.as_deref().and_then(|n| table.column_index(n));
        Ok(Resolved {
            time: required(table, self.time.as_str())?,
            amt: required(table, self.amt.as_str())?,
            rate: required(table, self.rate.as_str())?,
            addl: optional(&self.addl),
            ii: optional(&self.ii),
        })
    }
}

fn required(table: &EventTable, name: &str) -> Result<usize> {
    table
        .column_index(name)
        .ok_or_else(|| PopsimError::MissingColumn {
            name: name.to_string(),
        })
}

/// Observation rows laid out in the dose table's columns.
struct ObservationBlock {
    id: usize,
    rows: DMatrix<f64>,
}

impl ObservationBlock {
    fn build(doses: &EventTable, observations: &EventTable, columns: &DoseColumns) -> Result<Self> {
        let id = required(doses, columns.id.as_str())?;
        let mut rows = DMatrix::<f64>::zeros(observations.nrows(), doses.ncols());
        for (src, name) in observations.columns().iter().enumerate() {
            let dest = required(doses, name)?;
            rows.column_mut(dest).copy_from(&observations.data().column(src));
        }
        if let Some(addl) = columns.addl.as_deref().and_then(|n| doses.column_index(n)) {
            rows.column_mut(addl).fill(0.0);
        }
        Ok(Self { id, rows })
    }
}

/// Expands every dose row into the dose itself, its additional doses and,
/// for infusions, the matching end-of-infusion events.
///
/// Rows are emitted in input order: the dose, its infusion end, then each
/// additional dose followed by its own infusion end. When `observations` is
/// given, its rows follow the last dose record of every subject (a run of
/// equal `columns.id` values) with the identifier column set to that subject.
/// Observation columns are matched to dose columns by name; dose columns the
/// observations lack are zero. The `addl` column of every emitted row is zero.
/// Row labels are cleared.
pub fn realize_doses(
    doses: &EventTable,
    observations: Option<&EventTable>,
    columns: &DoseColumns,
) -> Result<EventTable> {
    let cols = columns.resolve(doses)?;
    let observations = observations
        .map(|obs| ObservationBlock::build(doses, obs, columns))
        .transpose()?;

    let overflow = |rows: usize| PopsimError::ExtentOverflow {
        context: "realised dose events",
        rows,
        cols: doses.ncols(),
    };
    let mut total = 0usize;
    let mut plans = Vec::with_capacity(doses.nrows());
    for row in 0..doses.nrows() {
        let plan = plan_row(doses, &cols, row)?;
        let mut count = plan.event_count().ok_or_else(|| overflow(total))?;
        if let Some(block) = &observations {
            if closes_subject(doses, block.id, row) {
                count = count
                    .checked_add(block.rows.nrows())
                    .ok_or_else(|| overflow(total))?;
            }
        }
        total = total.checked_add(count).ok_or_else(|| overflow(total))?;
        plans.push(plan);
    }
    if total.checked_mul(doses.ncols()).is_none() {
        return Err(overflow(total));
    }
    debug!(
        "realising {} dose records into {} events",
        doses.nrows(),
        total
    );

    let ncols = doses.ncols();
    let mut data = DMatrix::<f64>::zeros(total, ncols);
    let mut out_row = 0usize;
    for (row, plan) in plans.iter().enumerate() {
        for k in 0..=plan.addl {
            let start = plan.time + k as f64 * plan.ii;
            write_event(&mut data, doses, row, out_row, &cols, start, plan.amt);
            out_row += 1;
            if plan.rate > 0.0 {
                let end = start + plan.amt / plan.rate;
                write_event(&mut data, doses, row, out_row, &cols, end, -plan.amt);
                out_row += 1;
            }
        }
        if let Some(block) = &observations {
            if closes_subject(doses, block.id, row) {
                let n = block.rows.nrows();
                data.rows_mut(out_row, n).copy_from(&block.rows);
                data.view_mut((out_row, block.id), (n, 1))
                    .fill(doses.value(row, block.id));
                out_row += n;
            }
        }
    }

    EventTable::new(doses.columns().to_vec(), data)
}

fn closes_subject(doses: &EventTable, id: usize, row: usize) -> bool {
    row + 1 == doses.nrows() || doses.value(row + 1, id) != doses.value(row, id)
}

struct RowPlan {
    time: f64,
    amt: f64,
    rate: f64,
    addl: usize,
    ii: f64,
}

impl RowPlan {
    fn event_count(&self) -> Option<usize> {
        let per_dose = if self.rate > 0.0 { 2 } else { 1 };
        self.addl.checked_add(1)?.checked_mul(per_dose)
    }
}

fn plan_row(doses: &EventTable, cols: &Resolved, row: usize) -> Result<RowPlan> {
    let invalid = |reason: String| PopsimError::InvalidDoseRecord { row, reason };

    let time = doses.value(row, cols.time);
    let amt = doses.value(row, cols.amt);
    let rate = doses.value(row, cols.rate);
    for (name, value) in [("time", time), ("amt", amt), ("rate", rate)] {
        if !value.is_finite() {
            return Err(invalid(format!("{name} is not finite")));
        }
    }

    let addl = match cols.addl {
        Some(col) => doses.value(row, col),
        None => 0.0,
    };
    if !addl.is_finite() || addl < 0.0 || addl.fract() != 0.0 {
        return Err(invalid(format!(
            "addl must be a non-negative whole number, got {addl}"
        )));
    }
    if addl > MAX_ADDITIONAL_DOSES {
        return Err(invalid(format!(
            "addl {addl} exceeds the limit of {MAX_ADDITIONAL_DOSES}"
        )));
    }
    let addl = addl as usize;

    let ii = match cols.ii {
        Some(col) => doses.value(row, col),
        None => 0.0,
    };
    if addl > 0 {
        if cols.ii.is_none() {
            return Err(invalid("addl > 0 requires an ii column".to_string()));
        }
        if !ii.is_finite() || ii <= 0.0 {
            return Err(invalid(format!("ii must be positive when addl > 0, got {ii}")));
        }
    }

    Ok(RowPlan {
        time,
        amt,
        rate,
        addl,
        ii,
    })
}

fn write_event(
    data: &mut DMatrix<f64>,
    doses: &EventTable,
    src: usize,
    dest: usize,
    cols: &Resolved,
    time: f64,
    amt: f64,
) {
    data.row_mut(dest).copy_from(&doses.data().row(src));
    data[(dest, cols.time)] = time;
    data[(dest, cols.amt)] = amt;
    if let Some(addl) = cols.addl {
        data[(dest, addl)] = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn rows(table: &EventTable) -> Vec<Vec<f64>> {
        table
            .data()
            .row_iter()
            .map(|row| row.iter().copied().collect())
            .collect()
    }

    #[test]
    fn bolus_with_additional_doses() {
        let doses = EventTable::from_row_slice(
            names(&["ID", "time", "amt", "rate", "addl", "ii"]),
            &[1.0, 0.0, 100.0, 0.0, 2.0, 12.0],
        )
        .expect("doses");
        let out = realize_doses(&doses, None, &DoseColumns::default()).expect("realised");
        assert_eq!(
            rows(&out),
            vec![
                vec![1.0, 0.0, 100.0, 0.0, 0.0, 12.0],
                vec![1.0, 12.0, 100.0, 0.0, 0.0, 12.0],
                vec![1.0, 24.0, 100.0, 0.0, 0.0, 12.0],
            ]
        );
        assert_eq!(out.columns(), doses.columns());
    }

    #[test]
    fn infusion_gets_end_events() {
        let doses = EventTable::from_row_slice(
            names(&["time", "amt", "rate", "addl", "ii"]),
            &[0.0, 100.0, 50.0, 1.0, 24.0],
        )
        .expect("doses");
        let out = realize_doses(&doses, None, &DoseColumns::default()).expect("realised");
        let times: Vec<f64> = out.data().column(0).iter().copied().collect();
        let amts: Vec<f64> = out.data().column(1).iter().copied().collect();
        assert_eq!(times, vec![0.0, 2.0, 24.0, 26.0]);
        assert_eq!(amts, vec![100.0, -100.0, 100.0, -100.0]);
    }

    #[test]
    fn missing_optional_columns_mean_single_doses() {
        let doses = EventTable::from_row_slice(
            names(&["time", "amt", "rate"]),
            &[0.0, 10.0, 0.0, 6.0, 20.0, 0.0],
        )
        .expect("doses")
        .with_row_labels(names(&["d1", "d2"]))
        .expect("labels");
        let out = realize_doses(&doses, None, &DoseColumns::default()).expect("realised");
        assert_eq!(out.nrows(), 2);
        assert_eq!(out.to_row_major(), doses.to_row_major());
        assert!(out.row_labels().is_none());
    }

    #[test]
    fn missing_required_column_is_reported() {
        let doses =
            EventTable::from_row_slice(names(&["time", "amt"]), &[0.0, 10.0]).expect("doses");
        let err = realize_doses(&doses, None, &DoseColumns::default()).expect_err("no rate");
        assert_eq!(
            err,
            PopsimError::MissingColumn {
                name: "rate".to_string()
            }
        );
    }

    #[test]
    fn invalid_addl_and_ii_are_rejected() {
        let columns = names(&["time", "amt", "rate", "addl", "ii"]);
        let fractional = EventTable::from_row_slice(columns.clone(), &[0.0, 1.0, 0.0, 1.5, 12.0])
            .expect("doses");
        let err = realize_doses(&fractional, None, &DoseColumns::default()).expect_err("addl 1.5");
        assert!(matches!(err, PopsimError::InvalidDoseRecord { row: 0, .. }));

        let zero_ii = EventTable::from_row_slice(
            columns,
            &[0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 3.0, 0.0],
        )
        .expect("doses");
        let err = realize_doses(&zero_ii, None, &DoseColumns::default()).expect_err("ii 0");
        assert!(format!("{err}").contains("row 1"));
        assert!(format!("{err}").contains("ii must be positive"));
    }

    #[test]
    fn addl_without_ii_column_is_rejected() {
        let doses = EventTable::from_row_slice(
            names(&["time", "amt", "rate", "addl"]),
            &[0.0, 1.0, 0.0, 2.0],
        )
        .expect("doses");
        let err = realize_doses(&doses, None, &DoseColumns::default()).expect_err("no ii");
        assert!(format!("{err}").contains("requires an ii column"));
    }

    #[test]
    fn huge_addl_is_rejected_before_allocation() {
        let doses = EventTable::from_row_slice(
            names(&["time", "amt", "rate", "addl", "ii"]),
            &[0.0, 100.0, 0.0, 1e20, 12.0],
        )
        .expect("doses");
        let err = realize_doses(&doses, None, &DoseColumns::default()).expect_err("addl 1e20");
        assert!(matches!(err, PopsimError::InvalidDoseRecord { row: 0, .. }));
        assert!(format!("{err}").contains("exceeds the limit"));
    }

    #[test]
    fn observations_follow_each_subject() {
        let doses = EventTable::from_row_slice(
            names(&["ID", "time", "amt", "rate", "addl", "ii", "evid"]),
            &[
                1.0, 0.0, 100.0, 0.0, 1.0, 12.0, 1.0, //
                1.0, 48.0, 50.0, 0.0, 0.0, 0.0, 1.0, //
                2.0, 0.0, 80.0, 40.0, 0.0, 0.0, 1.0,
            ],
        )
        .expect("doses");
        let observations =
            EventTable::from_row_slice(names(&["time", "evid"]), &[1.0, 0.0, 24.0, 0.0])
                .expect("observations");

        let out = realize_doses(&doses, Some(&observations), &DoseColumns::default())
            .expect("realised");
        assert_eq!(
            rows(&out),
            vec![
                vec![1.0, 0.0, 100.0, 0.0, 0.0, 12.0, 1.0],
                vec![1.0, 12.0, 100.0, 0.0, 0.0, 12.0, 1.0],
                vec![1.0, 48.0, 50.0, 0.0, 0.0, 0.0, 1.0],
                vec![1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                vec![1.0, 24.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                vec![2.0, 0.0, 80.0, 40.0, 0.0, 0.0, 1.0],
                vec![2.0, 2.0, -80.0, 40.0, 0.0, 0.0, 1.0],
                vec![2.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                vec![2.0, 24.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            ]
        );
    }

    #[test]
    fn observations_need_id_and_known_columns() {
        let doses = EventTable::from_row_slice(names(&["time", "amt", "rate"]), &[0.0, 1.0, 0.0])
            .expect("doses");
        let observations =
            EventTable::from_row_slice(names(&["time"]), &[1.0]).expect("observations");
        let err = realize_doses(&doses, Some(&observations), &DoseColumns::default())
            .expect_err("no id column");
        assert_eq!(
            err,
            PopsimError::MissingColumn {
                name: "ID".to_string()
            }
        );

        let doses = EventTable::from_row_slice(
            names(&["ID", "time", "amt", "rate"]),
            &[1.0, 0.0, 1.0, 0.0],
        )
        .expect("doses");
        let observations =
            EventTable::from_row_slice(names(&["time", "dv"]), &[1.0, 3.5]).expect("observations");
        let err = realize_doses(&doses, Some(&observations), &DoseColumns::default())
            .expect_err("unknown column");
        assert_eq!(
            err,
            PopsimError::MissingColumn {
                name: "dv".to_string()
            }
        );
    }
}
