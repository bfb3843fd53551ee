//! Search distributions over the policy-parameter space.
//!
//! A search distribution is immutable: updaters never modify one in place,
//! they construct the next distribution from scratch. The optimization loop
//! owns the current distribution and swaps it wholesale after each update.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;

use crate::rng_util::standard_normal;
use crate::{Error, Result};

/// Relative tolerance for symmetry and positive semi-definiteness checks.
const TOLERANCE: f64 = 1e-9;

/// A probability law over parameter vectors of a fixed dimension.
pub trait SearchDistribution: Clone {
    /// Dimension `D` of the parameter space.
    fn dim(&self) -> usize;

    /// The center of the distribution; the loop tracks the cost at this point.
    fn mean(&self) -> &DVector<f64>;

    /// Draw `n_samples` independent samples, one per row of the returned
    /// `n_samples × D` matrix.
    ///
    /// The result depends only on the distribution and the state of `rng`:
    /// two generators seeded identically produce identical samples.
    fn generate_samples(&self, n_samples: usize, rng: &mut StdRng) -> DMatrix<f64>;

    /// The largest eigenvalue of the covariance, a proxy for how widely the
    /// distribution explores.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Numerical`] if the covariance cannot be diagonalized.
    fn max_eigen_value(&self) -> Result<f64>;
}

/// Multivariate normal distribution `N(mean, covar)`.
///
/// The covariance must be symmetric positive semi-definite; singular
/// covariances (a fully converged search) are valid. The eigendecomposition
/// is computed once at construction and reused for sampling.
///
/// # Examples
///
/// ```
/// use bbo::{DistributionGaussian, SearchDistribution};
/// use nalgebra::{DMatrix, DVector};
/// use rand::SeedableRng;
/// use rand::rngs::StdRng;
///
/// let distribution =
///     DistributionGaussian::new(DVector::from_vec(vec![1.0, 2.0]), DMatrix::identity(2, 2) * 4.0)
///         .unwrap();
/// assert!((distribution.max_eigen_value().unwrap() - 4.0).abs() < 1e-12);
///
/// let mut rng = StdRng::seed_from_u64(7);
/// let samples = distribution.generate_samples(3, &mut rng);
/// assert_eq!(samples.shape(), (3, 2));
/// ```
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(into = "GaussianParameters", try_from = "GaussianParameters")
)]
pub struct DistributionGaussian {
    mean: DVector<f64>,
    covar: DMatrix<f64>,
    /// Eigenvectors of the covariance (columns).
    eigenvectors: DMatrix<f64>,
    /// Eigenvalues of the covariance, clamped at zero.
    eigenvalues: DVector<f64>,
}

impl DistributionGaussian {
    /// Create a Gaussian from its mean and covariance.
    ///
    /// The covariance is symmetrized before use, removing rounding noise.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfiguration`] if the mean is empty, any entry is
    ///   not finite, the covariance is not symmetric, or it has a clearly
    ///   negative eigenvalue.
    /// - [`Error::DimensionMismatch`] if the covariance is not `D × D`.
    /// - [`Error::Numerical`] if the eigendecomposition fails.
    pub fn new(mean: DVector<f64>, covar: DMatrix<f64>) -> Result<Self> {
        let dim = mean.len();
        if dim == 0 {
            return Err(Error::InvalidConfiguration(
                "distribution mean must have at least one dimension".to_string(),
            ));
        }
        if covar.nrows() != dim {
            return Err(Error::DimensionMismatch {
                context: "covariance rows",
                expected: dim,
                got: covar.nrows(),
            });
        }
        if covar.ncols() != dim {
            return Err(Error::DimensionMismatch {
                context: "covariance columns",
                expected: dim,
                got: covar.ncols(),
            });
        }
        if mean.iter().chain(covar.iter()).any(|v| !v.is_finite()) {
            return Err(Error::InvalidConfiguration(
                "distribution parameters must be finite".to_string(),
            ));
        }
        if !is_symmetric(&covar) {
            return Err(Error::InvalidConfiguration(
                "covariance matrix must be symmetric".to_string(),
            ));
        }

        let covar = symmetrize(&covar);
        let eigen = covar.clone().symmetric_eigen();
        if eigen.eigenvalues.iter().any(|v| !v.is_finite())
            || eigen.eigenvectors.iter().any(|v| !v.is_finite())
        {
            return Err(Error::Numerical(
                "covariance eigendecomposition produced non-finite values".to_string(),
            ));
        }
        if !eigenvalues_are_nonnegative(&eigen.eigenvalues) {
            return Err(Error::InvalidConfiguration(format!(
                "covariance matrix must be positive semi-definite (smallest eigenvalue {})",
                eigen.eigenvalues.min()
            )));
        }

        let eigenvalues = eigen.eigenvalues.map(|v| v.max(0.0));
        Ok(Self {
            mean,
            covar,
            eigenvectors: eigen.eigenvectors,
            eigenvalues,
        })
    }

    /// Create an isotropic Gaussian with covariance `sigma² · I`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`new`](Self::new); additionally `sigma` must be
    /// finite.
    pub fn isotropic(mean: DVector<f64>, sigma: f64) -> Result<Self> {
        let dim = mean.len();
        Self::new(mean, DMatrix::identity(dim, dim) * (sigma * sigma))
    }

    /// The covariance matrix.
    #[must_use]
    pub fn covar(&self) -> &DMatrix<f64> {
        &self.covar
    }

    /// Eigenvalues of the covariance (clamped at zero), in no particular order.
    #[must_use]
    pub fn eigenvalues(&self) -> &DVector<f64> {
        &self.eigenvalues
    }
}

impl SearchDistribution for DistributionGaussian {
    fn dim(&self) -> usize {
        self.mean.len()
    }

    fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    fn generate_samples(&self, n_samples: usize, rng: &mut StdRng) -> DMatrix<f64> {
        let dim = self.dim();
        let scale = self.eigenvalues.map(f64::sqrt);
        let mut samples = DMatrix::zeros(n_samples, dim);
        for i in 0..n_samples {
            // x = mean + B * sqrt(Λ) * z where z ~ N(0, I)
            let z = DVector::from_fn(dim, |_, _| standard_normal(rng));
            let x = &self.mean + &self.eigenvectors * scale.component_mul(&z);
            samples.row_mut(i).copy_from(&x.transpose());
        }
        samples
    }

    fn max_eigen_value(&self) -> Result<f64> {
        let max = self.eigenvalues.max();
        if max.is_finite() {
            Ok(max)
        } else {
            Err(Error::Numerical(format!("largest eigenvalue is {max}")))
        }
    }
}

/// Whether a square matrix is symmetric positive semi-definite within
/// tolerance.
pub(crate) fn is_positive_semi_definite(covar: &DMatrix<f64>) -> bool {
    if !covar.is_square() || !is_symmetric(covar) {
        return false;
    }
    let eigenvalues = symmetrize(covar).symmetric_eigenvalues();
    eigenvalues.iter().all(|v| v.is_finite()) && eigenvalues_are_nonnegative(&eigenvalues)
}

/// `(C + Cᵀ) / 2`.
pub(crate) fn symmetrize(covar: &DMatrix<f64>) -> DMatrix<f64> {
    (covar + covar.transpose()) / 2.0
}

fn is_symmetric(covar: &DMatrix<f64>) -> bool {
    let scale = covar.amax().max(1.0);
    covar.relative_eq(&covar.transpose(), TOLERANCE * scale, TOLERANCE)
}

fn eigenvalues_are_nonnegative(eigenvalues: &DVector<f64>) -> bool {
    let scale = eigenvalues.amax();
    eigenvalues.iter().all(|&v| v >= -TOLERANCE * scale)
}

/// Plain-vector form of a [`DistributionGaussian`] used for serialization.
#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct GaussianParameters {
    mean: Vec<f64>,
    /// Covariance, one inner vector per row.
    covar: Vec<Vec<f64>>,
}

#[cfg(feature = "serde")]
impl From<DistributionGaussian> for GaussianParameters {
    fn from(distribution: DistributionGaussian) -> Self {
        Self {
            mean: distribution.mean.iter().copied().collect(),
            covar: distribution
                .covar
                .row_iter()
                .map(|row| row.iter().copied().collect())
                .collect(),
        }
    }
}

#[cfg(feature = "serde")]
impl TryFrom<GaussianParameters> for DistributionGaussian {
    type Error = Error;

    fn try_from(parameters: GaussianParameters) -> Result<Self> {
        let dim = parameters.mean.len();
        if let Some(row) = parameters.covar.iter().find(|row| row.len() != dim) {
            return Err(Error::DimensionMismatch {
                context: "covariance row length",
                expected: dim,
                got: row.len(),
            });
        }
        let covar = DMatrix::from_row_iterator(
            parameters.covar.len(),
            dim,
            parameters.covar.into_iter().flatten(),
        );
        Self::new(DVector::from_vec(parameters.mean), covar)
    }
}
