//! The `popsim_core` crate prepares the stochastic and dosing inputs of a
//! population simulation. Every operation owns or borrows its inputs for the
//! duration of the call and keeps no state between calls.
//!
//! Key components:
//! - **Block**: block-diagonal assembly of independent covariance matrices, with labels.
//! - **Correlation**: variance/correlation matrices rewritten as covariance matrices.
//! - **Sampler**: mean-zero multivariate normal draws through an eigendecomposition.
//! - **Schedule**: a template event table copied and stamped once per subject.
//! - **Dosing**: additional-dose and infusion-end events realised from dose records.
pub mod block;
pub mod correlation;
pub mod dosing;
pub mod error;
pub mod lookup;
pub mod matrix;
pub mod sampler;
pub mod schedule;
pub mod util;

pub use error::{PopsimError, Result};
pub use matrix::LabeledMatrix;
pub use schedule::{EventTable, EventTableSet};
