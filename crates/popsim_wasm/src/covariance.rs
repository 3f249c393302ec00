//! Random-effect covariance bindings: block assembly, correlation expansion
//! and multivariate normal draws.

use crate::payload::MatrixPayload;
use crate::to_js_error;
use js_sys::Float64Array;
use popsim_core::block::{block_diagonal, BlockSettings};
use popsim_core::correlation::correlation_to_covariance;
use popsim_core::sampler::{sample_mvn_seeded, EigenvaluePolicy, SamplerSettings};
use popsim_core::LabeledMatrix;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub fn supermatrix(blocks: JsValue, keep_labels: bool) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();
    let blocks: Vec<MatrixPayload> = from_value(blocks)
        .map_err(|e| JsValue::from_str(&format!("Invalid blocks: {}", e)))?;
    let result = assemble_blocks(blocks, keep_labels)
        .map_err(|e| to_js_error("Block assembly failed", e))?;
    to_value(&result).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

#[wasm_bindgen]
pub fn decorr(matrix: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();
    let matrix: MatrixPayload = from_value(matrix)
        .map_err(|e| JsValue::from_str(&format!("Invalid matrix: {}", e)))?;
    let result =
        expand_correlations(matrix).map_err(|e| to_js_error("Correlation expansion failed", e))?;
    to_value(&result).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

#[wasm_bindgen]
pub fn mvgauss(omega: JsValue, n: u32, seed: u32, strict: bool) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();
    let omega: MatrixPayload = from_value(omega)
        .map_err(|e| JsValue::from_str(&format!("Invalid covariance: {}", e)))?;
    let result = draw_variates(omega, n as usize, seed as u64, strict)
        .map_err(|e| to_js_error("Sampling failed", e))?;
    to_value(&result).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Row-major variates as a typed array, for hosts that only need the numbers.
#[wasm_bindgen]
pub fn mvgauss_flat(
    omega: JsValue,
    n: u32,
    seed: u32,
    strict: bool,
) -> Result<Float64Array, JsValue> {
    console_error_panic_hook::set_once();
    let omega: MatrixPayload = from_value(omega)
        .map_err(|e| JsValue::from_str(&format!("Invalid covariance: {}", e)))?;
    let result = draw_variates(omega, n as usize, seed as u64, strict)
        .map_err(|e| to_js_error("Sampling failed", e))?;
    Ok(Float64Array::from(result.data.as_slice()))
}

pub(crate) fn assemble_blocks(
    blocks: Vec<MatrixPayload>,
    keep_labels: bool,
) -> Result<MatrixPayload, popsim_core::PopsimError> {
    let blocks = blocks
        .into_iter()
        .map(MatrixPayload::into_matrix)
        .collect::<Result<Vec<LabeledMatrix>, _>>()?;
    let settings = BlockSettings {
        keep_labels,
        ..BlockSettings::default()
    };
    let assembled = block_diagonal(&blocks, &settings)?;
    Ok(MatrixPayload::from(&assembled))
}

pub(crate) fn expand_correlations(
    matrix: MatrixPayload,
) -> Result<MatrixPayload, popsim_core::PopsimError> {
    let matrix = matrix.into_matrix()?;
    let expanded = correlation_to_covariance(&matrix)?;
    Ok(MatrixPayload::from(&expanded))
}

pub(crate) fn draw_variates(
    omega: MatrixPayload,
    n: usize,
    seed: u64,
    strict: bool,
) -> Result<MatrixPayload, popsim_core::PopsimError> {
    let omega = omega.into_matrix()?;
    let settings = SamplerSettings {
        negative_eigenvalues: if strict {
            EigenvaluePolicy::Strict
        } else {
            EigenvaluePolicy::ClampWithinTolerance
        },
        ..SamplerSettings::default()
    };
    let draws = sample_mvn_seeded(omega.values(), n, seed, settings)?;
    let mut payload = MatrixPayload::from_values(&draws);
    payload.col_labels = omega.col_labels().map(|l| l.to_vec());
    Ok(payload)
}
