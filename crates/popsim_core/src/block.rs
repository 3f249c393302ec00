//! Block-diagonal assembly of independently estimated covariance matrices.

use log::{debug, trace};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::matrix::LabeledMatrix;

pub const DEFAULT_PLACEHOLDER: &str = ".";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSettings {
    /// Carry row/column labels through to the assembled matrix.
    pub keep_labels: bool,
    /// Emitted once per row/column of a block that carries no labels.
    pub placeholder: String,
}

impl Default for BlockSettings {
    fn default() -> Self {
        Self {
            keep_labels: true,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
        }
    }
}

impl BlockSettings {
    pub fn without_labels() -> Self {
        Self {
            keep_labels: false,
            ..Self::default()
        }
    }
}

/// Places every non-empty block along the diagonal of one larger matrix.
///
/// Blocks occupy `[offset, offset + dim)` in input order, where `offset` is the
/// summed dimension of the earlier non-empty blocks. Entries outside the blocks
/// are zero. Blocks with no rows are skipped and contribute no labels.
///
/// All blocks are checked for squareness before the output is allocated.
pub fn block_diagonal(blocks: &[LabeledMatrix], settings: &BlockSettings) -> Result<LabeledMatrix> {
    let mut total = 0usize;
    for block in blocks.iter().filter(|b| !b.is_empty()) {
        total += block.require_square("block-diagonal assembly")?;
    }
    debug!(
        "assembling {} blocks into a {}x{} matrix",
        blocks.len(),
        total,
        total
    );

    let mut values = DMatrix::<f64>::zeros(total, total);
    let mut offset = 0usize;
    for (idx, block) in blocks.iter().enumerate() {
        if block.is_empty() {
            continue;
        }
        let dim = block.nrows();
        trace!("block {} of size {} at offset {}", idx, dim, offset);
        values
            .view_mut((offset, offset), (dim, dim))
            .copy_from(block.values());
        offset += dim;
    }

    if !settings.keep_labels {
        return Ok(LabeledMatrix::new(values));
    }

    let (row_labels, col_labels) = collect_labels(blocks, total, &settings.placeholder);
    LabeledMatrix::with_labels(values, Some(row_labels), Some(col_labels))
}

fn collect_labels(
    blocks: &[LabeledMatrix],
    total: usize,
    placeholder: &str,
) -> (Vec<String>, Vec<String>) {
    let mut rows = Vec::with_capacity(total);
    let mut cols = Vec::with_capacity(total);
    for block in blocks.iter().filter(|b| !b.is_empty()) {
        extend_labels(&mut rows, block.row_labels(), block.nrows(), placeholder);
        extend_labels(&mut cols, block.col_labels(), block.ncols(), placeholder);
    }
    (rows, cols)
}

fn extend_labels(out: &mut Vec<String>, labels: Option<&[String]>, len: usize, placeholder: &str) {
    match labels {
        Some(labels) => out.extend(labels.iter().cloned()),
        None => out.extend(std::iter::repeat(placeholder.to_string()).take(len)),
    }
}
