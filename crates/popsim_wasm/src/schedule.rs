//! Event-table bindings: per-subject expansion, dose realisation and label
//! lookups.

use crate::payload::TablePayload;
use crate::to_js_error;
use popsim_core::dosing::{realize_doses as core_realize_doses, DoseColumns};
use popsim_core::lookup;
use popsim_core::schedule::{expand_events as core_expand_events, ScheduleSettings};
use popsim_core::PopsimError;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

/// `id_column` is 0-based; a negative value means the template has no
/// identifier column and one named `ID` is appended.
#[wasm_bindgen]
pub fn expand_events(template: JsValue, id_column: i32, ids: Vec<f64>) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();
    let template: TablePayload = from_value(template)
        .map_err(|e| JsValue::from_str(&format!("Invalid template: {}", e)))?;
    let result = expand_table(template, id_column, &ids)
        .map_err(|e| to_js_error("Event expansion failed", e))?;
    to_value(&result).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// `observations` and `columns` may be `undefined` or `null`; the latter then
/// falls back to the default column names.
#[wasm_bindgen]
pub fn realize_doses(
    doses: JsValue,
    observations: JsValue,
    columns: JsValue,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();
    let doses: TablePayload = from_value(doses)
        .map_err(|e| JsValue::from_str(&format!("Invalid dose table: {}", e)))?;
    let observations: Option<TablePayload> = if is_absent(&observations) {
        None
    } else {
        Some(
            from_value(observations)
                .map_err(|e| JsValue::from_str(&format!("Invalid observations: {}", e)))?,
        )
    };
    let columns: DoseColumns = if is_absent(&columns) {
        DoseColumns::default()
    } else {
        from_value(columns)
            .map_err(|e| JsValue::from_str(&format!("Invalid dose columns: {}", e)))?
    };
    let result = realize_table(doses, observations, &columns)
        .map_err(|e| to_js_error("Dose realisation failed", e))?;
    to_value(&result).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

fn is_absent(value: &JsValue) -> bool {
    value.is_undefined() || value.is_null()
}

/// 0-based position of `what` in `table`, or -1.
#[wasm_bindgen]
pub fn find_position(what: &str, table: Vec<String>) -> i32 {
    lookup::find_position(what, &table).map_or(-1, |pos| pos as i32)
}

#[wasm_bindgen]
pub fn match_labels(a: Vec<String>, b: Vec<String>) -> Result<JsValue, JsValue> {
    let alignment = lookup::match_labels(&a, &b);
    to_value(&alignment).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

pub(crate) fn expand_table(
    template: TablePayload,
    id_column: i32,
    ids: &[f64],
) -> Result<TablePayload, PopsimError> {
    let template = template.into_table()?;
    let id_column = usize::try_from(id_column).ok();
    let set = core_expand_events(&template, id_column, ids, &ScheduleSettings::default())?;
    Ok(TablePayload::from(set.table()))
}

pub(crate) fn realize_table(
    doses: TablePayload,
    observations: Option<TablePayload>,
    columns: &DoseColumns,
) -> Result<TablePayload, PopsimError> {
    let doses = doses.into_table()?;
    let observations = observations.map(TablePayload::into_table).transpose()?;
    let realised = core_realize_doses(&doses, observations.as_ref(), columns)?;
    Ok(TablePayload::from(&realised))
}
