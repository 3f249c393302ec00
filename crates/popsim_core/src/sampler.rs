//! Multivariate normal draws with mean zero.
//!
//! The covariance is factored as `Ω = V · D · Vᵗ` with `SymmetricEigen`, and a
//! block of independent standard-normal draws `X` (N×K) is mapped to
//! `X · Zᵗ` with `Z = V · diag(√D)`. The eigen route tolerates singular and
//! near-singular Ω where a Cholesky factor would fail.
//!
//! Rounding can leave a PSD matrix with tiny negative eigenvalues. Those are
//! clamped to zero when they sit inside the tolerance band; anything more
//! negative is reported as [`PopsimError::NotPositiveSemiDefinite`] instead of
//! producing NaN draws.

use log::{debug, warn};
use nalgebra::{DMatrix, SymmetricEigen};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::error::{PopsimError, Result};
use crate::matrix::require_finite;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EigenvaluePolicy {
    /// Clamp eigenvalues in `[-tol * max(1, |λ_max|), 0)` to zero; fail below.
    ClampWithinTolerance,
    /// Fail on any negative eigenvalue.
    Strict,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SamplerSettings {
    /// Relative tolerance for `|a_ij - a_ji|`.
    pub symmetry_tolerance: f64,
    /// Relative width of the band in which negative eigenvalues are clamped.
    pub eigenvalue_tolerance: f64,
    pub negative_eigenvalues: EigenvaluePolicy,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            symmetry_tolerance: 1e-8,
            eigenvalue_tolerance: 1e-10,
            negative_eigenvalues: EigenvaluePolicy::ClampWithinTolerance,
        }
    }
}

impl SamplerSettings {
    /// Both tolerances must be finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("symmetry_tolerance", self.symmetry_tolerance),
            ("eigenvalue_tolerance", self.eigenvalue_tolerance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PopsimError::InvalidSettings { name, value });
            }
        }
        Ok(())
    }
}

/// Draws `n` rows from `N(0, omega)` using the supplied generator.
///
/// The result is `n` x `K` where `K` is the dimension of `omega`.
pub fn sample_mvn<R: Rng + ?Sized>(
    omega: &DMatrix<f64>,
    n: usize,
    settings: SamplerSettings,
    rng: &mut R,
) -> Result<DMatrix<f64>> {
    if n == 0 {
        return Err(PopsimError::InvalidSampleCount {
            samples: n,
            dimension: omega.nrows(),
        });
    }
    let z = eigen_transform(omega, settings)?;
    sample_with_transform(&z, n, rng)
}

/// Same as [`sample_mvn`] with a `StdRng` seeded from `seed`.
pub fn sample_mvn_seeded(
    omega: &DMatrix<f64>,
    n: usize,
    seed: u64,
    settings: SamplerSettings,
) -> Result<DMatrix<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    sample_mvn(omega, n, settings, &mut rng)
}

/// Computes `Z = V · diag(√D)` for `omega`.
///
/// `Z · Zᵗ` reproduces `omega` up to the clamped eigenvalues, so the transform
/// can be computed once and reused across repeated draws.
pub fn eigen_transform(omega: &DMatrix<f64>, settings: SamplerSettings) -> Result<DMatrix<f64>> {
    settings.validate()?;
    let k = omega.nrows();
    if k == 0 {
        return Err(PopsimError::InvalidSampleCount {
            samples: 0,
            dimension: 0,
        });
    }
    if omega.ncols() != k {
        return Err(PopsimError::NotSquare {
            context: "multivariate normal covariance",
            rows: k,
            cols: omega.ncols(),
        });
    }
    require_finite(omega, "multivariate normal covariance")?;
    check_symmetric(omega, settings.symmetry_tolerance)?;

    let eig = SymmetricEigen::new(omega.clone());
    let roots = clamped_roots(eig.eigenvalues.as_slice(), settings)?;

    let mut z = eig.eigenvectors;
    for (j, mut column) in z.column_iter_mut().enumerate() {
        column *= roots[j];
    }
    debug!("built {}x{} eigen transform", k, k);
    Ok(z)
}

/// Maps an `n` x `K` block of standard-normal draws through `z`.
pub fn sample_with_transform<R: Rng + ?Sized>(
    z: &DMatrix<f64>,
    n: usize,
    rng: &mut R,
) -> Result<DMatrix<f64>> {
    let k = z.ncols();
    if n == 0 || k == 0 {
        return Err(PopsimError::InvalidSampleCount {
            samples: n,
            dimension: k,
        });
    }
    debug!("drawing {} samples of dimension {}", n, k);
    let x = DMatrix::from_fn(n, k, |_, _| rng.sample::<f64, _>(StandardNormal));
    Ok(x * z.transpose())
}

fn check_symmetric(omega: &DMatrix<f64>, tolerance: f64) -> Result<()> {
    let k = omega.nrows();
    for i in 0..k {
        for j in (i + 1)..k {
            let a = omega[(i, j)];
            let b = omega[(j, i)];
            let delta = (a - b).abs();
            let scale = 1.0_f64.max(a.abs()).max(b.abs());
            if delta > tolerance * scale {
                return Err(PopsimError::NotSymmetric {
                    row: i,
                    col: j,
                    delta,
                });
            }
        }
    }
    Ok(())
}

fn clamped_roots(eigenvalues: &[f64], settings: SamplerSettings) -> Result<Vec<f64>> {
    let largest = eigenvalues.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let floor = match settings.negative_eigenvalues {
        EigenvaluePolicy::ClampWithinTolerance => -settings.eigenvalue_tolerance * largest.max(1.0),
        EigenvaluePolicy::Strict => 0.0,
    };

    let mut clamped = 0usize;
    let mut most_negative = 0.0_f64;
    let mut roots = Vec::with_capacity(eigenvalues.len());
    for (index, &eigenvalue) in eigenvalues.iter().enumerate() {
        if !eigenvalue.is_finite() || eigenvalue < floor {
            return Err(PopsimError::NotPositiveSemiDefinite { index, eigenvalue });
        }
        if eigenvalue < 0.0 {
            clamped += 1;
            most_negative = most_negative.min(eigenvalue);
            roots.push(0.0);
        } else {
            roots.push(eigenvalue.sqrt());
        }
    }
    if clamped > 0 {
        warn!(
            "clamped {} slightly negative eigenvalue(s) to zero (most negative {:e})",
            clamped, most_negative
        );
    }
    Ok(roots)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empirical_covariance(x: &DMatrix<f64>) -> DMatrix<f64> {
        x.transpose() * x / x.nrows() as f64
    }

    #[test]
    fn identity_covariance_is_recovered() {
        let omega = DMatrix::<f64>::identity(3, 3);
        let x = sample_mvn_seeded(&omega, 100_000, 42, SamplerSettings::default())
            .expect("draws");
        assert_eq!(x.nrows(), 100_000);
        assert_eq!(x.ncols(), 3);
        let deviation = (empirical_covariance(&x) - omega).norm();
        assert!(deviation < 0.05, "Frobenius deviation {deviation}");
    }

    #[test]
    fn correlated_covariance_is_recovered() {
        let omega = DMatrix::from_row_slice(2, 2, &[0.09, 0.024, 0.024, 0.04]);
        let x = sample_mvn_seeded(&omega, 200_000, 7, SamplerSettings::default())
            .expect("draws");
        let cov = empirical_covariance(&x);
        for i in 0..2 {
            for j in 0..2 {
                assert!(
                    (cov[(i, j)] - omega[(i, j)]).abs() < 5e-3,
                    "entry ({i}, {j}): {} vs {}",
                    cov[(i, j)],
                    omega[(i, j)]
                );
            }
        }
    }

    #[test]
    fn seeded_draws_are_reproducible() {
        let omega = DMatrix::from_row_slice(2, 2, &[1.0, 0.3, 0.3, 2.0]);
        let a = sample_mvn_seeded(&omega, 10, 99, SamplerSettings::default()).expect("draws");
        let b = sample_mvn_seeded(&omega, 10, 99, SamplerSettings::default()).expect("draws");
        assert_eq!(a, b);
    }

    #[test]
    fn transform_reproduces_covariance() {
        let omega = DMatrix::from_row_slice(
            3,
            3,
            &[0.2, 0.05, 0.0, 0.05, 0.1, 0.01, 0.0, 0.01, 0.3],
        );
        let z = eigen_transform(&omega, SamplerSettings::default()).expect("transform");
        let rebuilt = &z * z.transpose();
        assert!((rebuilt - omega).norm() < 1e-12);
    }

    #[test]
    fn indefinite_matrix_is_rejected() {
        // eigenvalues 3 and -1
        let omega = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        let err = sample_mvn_seeded(&omega, 100, 1, SamplerSettings::default())
            .expect_err("indefinite");
        match err {
            PopsimError::NotPositiveSemiDefinite { eigenvalue, .. } => {
                assert!((eigenvalue + 1.0).abs() < 1e-10)
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn tiny_negative_eigenvalue_is_clamped_by_default() {
        let omega = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, -1e-13]);
        let x = sample_mvn_seeded(&omega, 50, 3, SamplerSettings::default()).expect("draws");
        assert!(x.iter().all(|v| v.is_finite()));
        assert!(x.column(1).iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn strict_policy_rejects_tiny_negative_eigenvalue() {
        let omega = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, -1e-13]);
        let settings = SamplerSettings {
            negative_eigenvalues: EigenvaluePolicy::Strict,
            ..SamplerSettings::default()
        };
        let err = sample_mvn_seeded(&omega, 50, 3, settings).expect_err("strict");
        assert!(matches!(
            err,
            PopsimError::NotPositiveSemiDefinite { eigenvalue, .. } if eigenvalue < 0.0
        ));
    }

    #[test]
    fn singular_covariance_gives_perfectly_correlated_draws() {
        let omega = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let x = sample_mvn_seeded(&omega, 200, 11, SamplerSettings::default()).expect("draws");
        for row in x.row_iter() {
            assert!(row[0].is_finite());
            assert!((row[0] - row[1]).abs() < 1e-6);
        }
    }

    #[test]
    fn nan_tolerances_do_not_disable_checks() {
        let indefinite = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        let settings = SamplerSettings {
            eigenvalue_tolerance: f64::NAN,
            ..SamplerSettings::default()
        };
        let err = sample_mvn_seeded(&indefinite, 10, 1, settings).expect_err("nan tolerance");
        assert!(matches!(
            err,
            PopsimError::InvalidSettings {
                name: "eigenvalue_tolerance",
                ..
            }
        ));

        let settings = SamplerSettings {
            symmetry_tolerance: -1.0,
            ..SamplerSettings::default()
        };
        let err = eigen_transform(&DMatrix::identity(2, 2), settings).expect_err("negative");
        assert!(format!("{err}").contains("symmetry_tolerance"));
    }

    #[test]
    fn asymmetric_matrix_is_rejected() {
        let omega = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.4, 1.0]);
        let err = sample_mvn_seeded(&omega, 10, 1, SamplerSettings::default())
            .expect_err("asymmetric");
        assert!(matches!(err, PopsimError::NotSymmetric { row: 0, col: 1, .. }));
    }

    #[test]
    fn invalid_counts_are_rejected() {
        let omega = DMatrix::<f64>::identity(2, 2);
        let err = sample_mvn_seeded(&omega, 0, 1, SamplerSettings::default()).expect_err("n = 0");
        assert_eq!(
            err,
            PopsimError::InvalidSampleCount {
                samples: 0,
                dimension: 2
            }
        );

        let empty = DMatrix::<f64>::zeros(0, 0);
        let err = sample_mvn_seeded(&empty, 5, 1, SamplerSettings::default()).expect_err("k = 0");
        assert!(matches!(err, PopsimError::InvalidSampleCount { dimension: 0, .. }));
    }

    #[test]
    fn non_square_and_non_finite_are_rejected() {
        let rect = DMatrix::<f64>::zeros(2, 3);
        let err = sample_mvn_seeded(&rect, 5, 1, SamplerSettings::default()).expect_err("2x3");
        assert!(matches!(err, PopsimError::NotSquare { rows: 2, cols: 3, .. }));

        let nan = DMatrix::from_row_slice(2, 2, &[1.0, f64::NAN, f64::NAN, 1.0]);
        let err = sample_mvn_seeded(&nan, 5, 1, SamplerSettings::default()).expect_err("nan");
        assert!(matches!(err, PopsimError::NonFiniteEntry { .. }));
    }
}
