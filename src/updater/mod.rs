//! Distribution updaters.
//!
//! An updater turns one batch of evaluated samples into a new search
//! distribution. All updaters share the same first step: total costs are
//! mapped to weights by a [`WeightingMethod`] and the new mean is the
//! weighted average of the samples. They differ in what happens to the
//! covariance.
//!
//! Updaters are stateless apart from their configuration, so the same
//! updater can be reused across runs.

mod covar_adaptation;
mod covar_decay;
mod mean;
pub mod weighting;

pub use covar_adaptation::{UpdaterCovarAdaptation, UpdaterCovarAdaptationBuilder};
pub use covar_decay::UpdaterCovarDecay;
pub use mean::UpdaterMean;
pub use weighting::WeightingMethod;

use nalgebra::{DMatrix, DVector};

use crate::distribution::DistributionGaussian;
use crate::{CostVector, Error, Result, SearchDistribution};

/// Computes the next search distribution from a batch of samples and costs.
pub trait Updater<D: SearchDistribution = DistributionGaussian> {
    /// Weight the samples and build the next distribution.
    ///
    /// `samples` holds one sample per row (`n × D`), `costs[i]` belongs to
    /// row `i`. Only the total cost is used for weighting.
    ///
    /// Returns the new distribution and the weights (length `n`, summing to
    /// one).
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyBatch`] for zero samples.
    /// - [`Error::DimensionMismatch`] if the sample width differs from the
    ///   distribution's dimension or the number of costs from the number of
    ///   samples.
    /// - [`Error::Numerical`] for non-finite costs or a degenerate result.
    fn update_distribution(
        &self,
        distribution: &D,
        samples: &DMatrix<f64>,
        costs: &[CostVector],
    ) -> Result<(D, DVector<f64>)>;
}

/// Check batch shapes and extract the total costs.
pub(crate) fn validate_batch(
    dim: usize,
    samples: &DMatrix<f64>,
    costs: &[CostVector],
) -> Result<Vec<f64>> {
    if samples.nrows() == 0 || costs.is_empty() {
        return Err(Error::EmptyBatch);
    }
    if samples.ncols() != dim {
        return Err(Error::DimensionMismatch {
            context: "sample dimension",
            expected: dim,
            got: samples.ncols(),
        });
    }
    if costs.len() != samples.nrows() {
        return Err(Error::DimensionMismatch {
            context: "costs per sample",
            expected: samples.nrows(),
            got: costs.len(),
        });
    }
    Ok(costs.iter().map(CostVector::total).collect())
}

/// Weighted average of the sample rows.
pub(crate) fn weighted_mean(samples: &DMatrix<f64>, weights: &DVector<f64>) -> DVector<f64> {
    samples.transpose() * weights
}

/// Weights and new mean, shared by every Gaussian updater.
pub(crate) fn weighted_batch(
    distribution: &DistributionGaussian,
    samples: &DMatrix<f64>,
    costs: &[CostVector],
    weighting: WeightingMethod,
) -> Result<(DVector<f64>, DVector<f64>)> {
    let totals = validate_batch(distribution.dim(), samples, costs)?;
    let weights = weighting.weights(&totals)?;
    let mean = weighted_mean(samples, &weights);
    trace_debug!(
        n_samples = samples.nrows(),
        best = totals.iter().copied().fold(f64::INFINITY, f64::min),
        "weighted batch"
    );
    Ok((weights, mean))
}
