//! Label lookups used to resolve column and compartment names to positions.

use serde::{Deserialize, Serialize};

/// First 0-based position of `what` in `table`.
pub fn find_position<S: AsRef<str>>(what: &str, table: &[S]) -> Option<usize> {
    table.iter().position(|entry| entry.as_ref() == what)
}

/// Matched positions between two label sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelAlignment {
    /// Positions in `a` of the labels of `b`, in `b` order, without repeats.
    pub a_index: Vec<usize>,
    /// Positions in `b` of the labels of `a`, sorted ascending, without repeats.
    pub b_index: Vec<usize>,
}

/// Aligns two label sequences, e.g. model compartments against the columns of
/// an initial-condition table. Unmatched labels are dropped from both sides
/// and a repeated label resolves to its first occurrence.
pub fn match_labels<S: AsRef<str>, T: AsRef<str>>(a: &[S], b: &[T]) -> LabelAlignment {
    let mut a_index: Vec<usize> = Vec::new();
    for pos in b.iter().filter_map(|label| find_position(label.as_ref(), a)) {
        if !a_index.contains(&pos) {
            a_index.push(pos);
        }
    }
    let mut b_index: Vec<usize> = a
        .iter()
        .filter_map(|label| find_position(label.as_ref(), b))
        .collect();
    b_index.sort_unstable();
    b_index.dedup();
    LabelAlignment { a_index, b_index }
}
