use nalgebra::{DMatrix, DVector};

use super::{Updater, WeightingMethod, weighted_batch};
use crate::distribution::{DistributionGaussian, is_positive_semi_definite, symmetrize};
use crate::{CostVector, Error, Result, SearchDistribution};

/// Moves the mean and re-estimates the covariance from the weighted samples.
///
/// The estimate is `Σ wᵢ (xᵢ − μ)(xᵢ − μ)ᵀ`, where `μ` is the mean the
/// samples were drawn around. It is blended with the previous covariance by
/// the learning rate, optionally reduced to its diagonal, and its eigenvalues
/// are floored at `max(base_level, relative_lower_bound · λ_max)`, with
/// `λ_max` the largest eigenvalue of the covariance being updated.
///
/// Without a floor the covariance may collapse to a singular matrix once the
/// weights concentrate on one sample; that is a converged search, not an
/// error.
///
/// # Examples
///
/// ```
/// use bbo::{UpdaterCovarAdaptation, WeightingMethod};
///
/// let updater = UpdaterCovarAdaptation::builder()
///     .weighting(WeightingMethod::CmaEs { mu: 5 })
///     .learning_rate(0.5)
///     .relative_lower_bound(0.01)
///     .build()
///     .unwrap();
/// assert_eq!(updater.learning_rate(), 0.5);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UpdaterCovarAdaptation {
    weighting: WeightingMethod,
    learning_rate: f64,
    diagonal_only: bool,
    relative_lower_bound: f64,
    base_level: f64,
}

impl UpdaterCovarAdaptation {
    /// Start configuring an adaptation updater.
    #[must_use]
    pub fn builder() -> UpdaterCovarAdaptationBuilder {
        UpdaterCovarAdaptationBuilder::new()
    }

    /// The configured weighting method.
    #[must_use]
    pub fn weighting(&self) -> WeightingMethod {
        self.weighting
    }

    /// Blend factor between the estimated and the previous covariance.
    #[must_use]
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Whether off-diagonal covariance entries are discarded.
    #[must_use]
    pub fn diagonal_only(&self) -> bool {
        self.diagonal_only
    }

    /// Eigenvalue floor relative to the largest eigenvalue.
    #[must_use]
    pub fn relative_lower_bound(&self) -> f64 {
        self.relative_lower_bound
    }

    /// Absolute eigenvalue floor.
    #[must_use]
    pub fn base_level(&self) -> f64 {
        self.base_level
    }

    fn estimate_covariance(
        &self,
        distribution: &DistributionGaussian,
        samples: &DMatrix<f64>,
        weights: &DVector<f64>,
    ) -> Result<DMatrix<f64>> {
        let dim = distribution.dim();
        let mut estimate = DMatrix::zeros(dim, dim);
        for (row, &weight) in samples.row_iter().zip(weights.iter()) {
            if weight > 0.0 {
                let deviation = row.transpose() - distribution.mean();
                estimate += weight * &deviation * deviation.transpose();
            }
        }

        let mut covar =
            distribution.covar() * (1.0 - self.learning_rate) + estimate * self.learning_rate;
        if self.diagonal_only {
            covar = DMatrix::from_diagonal(&covar.diagonal());
        }
        let covar = symmetrize(&covar);

        let floor = self
            .base_level
            .max(self.relative_lower_bound * distribution.max_eigen_value()?);
        apply_eigenvalue_floor(covar, floor)
    }
}

/// Raise every eigenvalue below `floor` to `floor` (and any rounding-noise
/// negative eigenvalue to zero), rebuilding `B Λ Bᵀ` only when needed.
fn apply_eigenvalue_floor(covar: DMatrix<f64>, floor: f64) -> Result<DMatrix<f64>> {
    let floor = floor.max(0.0);
    let eigen = covar.clone().symmetric_eigen();
    if eigen.eigenvalues.iter().any(|v| !v.is_finite()) {
        return Err(Error::Numerical(
            "adapted covariance has non-finite eigenvalues".to_string(),
        ));
    }
    if eigen.eigenvalues.iter().all(|&v| v >= floor) {
        return Ok(covar);
    }
    trace_debug!(floor, min = eigen.eigenvalues.min(), "flooring covariance eigenvalues");
    let floored = eigen.eigenvalues.map(|v| v.max(floor));
    let rebuilt =
        &eigen.eigenvectors * DMatrix::from_diagonal(&floored) * eigen.eigenvectors.transpose();
    Ok(symmetrize(&rebuilt))
}

impl Updater<DistributionGaussian> for UpdaterCovarAdaptation {
    fn update_distribution(
        &self,
        distribution: &DistributionGaussian,
        samples: &DMatrix<f64>,
        costs: &[CostVector],
    ) -> Result<(DistributionGaussian, DVector<f64>)> {
        let (weights, mean) = weighted_batch(distribution, samples, costs, self.weighting)?;
        let covar = self.estimate_covariance(distribution, samples, &weights)?;
        debug_assert!(is_positive_semi_definite(&covar));
        let updated = DistributionGaussian::new(mean, covar)?;
        Ok((updated, weights))
    }
}

/// Builder for [`UpdaterCovarAdaptation`].
///
/// Defaults:
/// - `weighting`: [`WeightingMethod::default`]
/// - `learning_rate`: `1.0` (the previous covariance is discarded)
/// - `diagonal_only`: `false`
/// - `relative_lower_bound`: `0.0`
/// - `base_level`: `0.0`
#[derive(Clone, Debug)]
pub struct UpdaterCovarAdaptationBuilder {
    weighting: WeightingMethod,
    learning_rate: f64,
    diagonal_only: bool,
    relative_lower_bound: f64,
    base_level: f64,
}

impl Default for UpdaterCovarAdaptationBuilder {
    fn default() -> Self {
        Self {
            weighting: WeightingMethod::default(),
            learning_rate: 1.0,
            diagonal_only: false,
            relative_lower_bound: 0.0,
            base_level: 0.0,
        }
    }
}

impl UpdaterCovarAdaptationBuilder {
    /// Creates a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how costs are turned into weights.
    #[must_use]
    pub fn weighting(mut self, weighting: WeightingMethod) -> Self {
        self.weighting = weighting;
        self
    }

    /// Sets the blend factor in `(0, 1]`. Smaller values keep more of the
    /// previous covariance.
    #[must_use]
    pub fn learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Keep only the diagonal of the adapted covariance.
    #[must_use]
    pub fn diagonal_only(mut self, diagonal_only: bool) -> Self {
        self.diagonal_only = diagonal_only;
        self
    }

    /// Sets the eigenvalue floor as a fraction in `[0, 1]` of the largest
    /// eigenvalue of the covariance being updated.
    #[must_use]
    pub fn relative_lower_bound(mut self, relative_lower_bound: f64) -> Self {
        self.relative_lower_bound = relative_lower_bound;
        self
    }

    /// Sets a non-negative absolute eigenvalue floor.
    #[must_use]
    pub fn base_level(mut self, base_level: f64) -> Self {
        self.base_level = base_level;
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if any parameter is out of
    /// range or the weighting method is invalid.
    pub fn build(self) -> Result<UpdaterCovarAdaptation> {
        self.weighting.validate()?;
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(Error::InvalidConfiguration(format!(
                "learning rate must be in (0, 1], got {}",
                self.learning_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.relative_lower_bound) {
            return Err(Error::InvalidConfiguration(format!(
                "relative lower bound must be in [0, 1], got {}",
                self.relative_lower_bound
            )));
        }
        if !(self.base_level.is_finite() && self.base_level >= 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "base level must be non-negative, got {}",
                self.base_level
            )));
        }
        Ok(UpdaterCovarAdaptation {
            weighting: self.weighting,
            learning_rate: self.learning_rate,
            diagonal_only: self.diagonal_only,
            relative_lower_bound: self.relative_lower_bound,
            base_level: self.base_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> (DistributionGaussian, DMatrix<f64>, Vec<CostVector>) {
        let distribution = DistributionGaussian::isotropic(DVector::zeros(2), 1.0).unwrap();
        let samples = DMatrix::from_row_slice(4, 2, &[1.0, 1.0, -1.0, -1.0, 1.0, -1.0, 2.0, 0.0]);
        let costs = [0.0, 0.0, 5.0, 9.0].map(CostVector::scalar).to_vec();
        (distribution, samples, costs)
    }

    #[test]
    fn estimates_weighted_outer_products() {
        let (distribution, samples, costs) = batch();
        let updater = UpdaterCovarAdaptation::builder()
            .weighting(WeightingMethod::Cem { mu: 2 })
            .build()
            .unwrap();
        let (updated, weights) = updater
            .update_distribution(&distribution, &samples, &costs)
            .unwrap();

        assert_eq!(weights.as_slice(), &[0.5, 0.5, 0.0, 0.0]);
        assert!(updated.mean().norm() < 1e-12);
        // ½[1 1;1 1] + ½[1 1;1 1]
        let expected = DMatrix::from_element(2, 2, 1.0);
        assert!((updated.covar() - expected).amax() < 1e-12);
    }

    #[test]
    fn learning_rate_blends_with_previous() {
        let (distribution, samples, costs) = batch();
        let updater = UpdaterCovarAdaptation::builder()
            .weighting(WeightingMethod::Cem { mu: 2 })
            .learning_rate(0.5)
            .build()
            .unwrap();
        let (updated, _) = updater
            .update_distribution(&distribution, &samples, &costs)
            .unwrap();
        let expected = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.5, 1.0]);
        assert!((updated.covar() - expected).amax() < 1e-12);
    }

    #[test]
    fn diagonal_only_drops_correlations() {
        let (distribution, samples, costs) = batch();
        let updater = UpdaterCovarAdaptation::builder()
            .weighting(WeightingMethod::Cem { mu: 2 })
            .diagonal_only(true)
            .build()
            .unwrap();
        let (updated, _) = updater
            .update_distribution(&distribution, &samples, &costs)
            .unwrap();
        assert!((updated.covar() - DMatrix::identity(2, 2)).amax() < 1e-12);
    }

    #[test]
    fn collapse_is_allowed_without_floor() {
        let (distribution, samples, costs) = batch();
        let updater = UpdaterCovarAdaptation::builder()
            .weighting(WeightingMethod::Cem { mu: 1 })
            .build()
            .unwrap();
        let costs: Vec<CostVector> = costs
            .iter()
            .enumerate()
            .map(|(i, c)| if i == 0 { CostVector::scalar(-1.0) } else { c.clone() })
            .collect();
        let (updated, _) = updater
            .update_distribution(&distribution, &samples, &costs)
            .unwrap();
        // Rank one: (1, 1)(1, 1)ᵀ.
        let eigenvalues = updated.eigenvalues();
        assert!(eigenvalues.min().abs() < 1e-9);
        assert!((eigenvalues.max() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn eigenvalue_floor() {
        let (distribution, samples, costs) = batch();
        let updater = UpdaterCovarAdaptation::builder()
            .weighting(WeightingMethod::Cem { mu: 2 })
            .relative_lower_bound(0.25)
            .base_level(0.1)
            .build()
            .unwrap();
        let (updated, _) = updater
            .update_distribution(&distribution, &samples, &costs)
            .unwrap();
        // Estimate has eigenvalues {0, 2}; floor is max(0.1, 0.25 · 1).
        let mut eigenvalues: Vec<f64> = updated.eigenvalues().iter().copied().collect();
        eigenvalues.sort_by(f64::total_cmp);
        assert!((eigenvalues[0] - 0.25).abs() < 1e-9);
        assert!((eigenvalues[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn builder_validation() {
        assert!(UpdaterCovarAdaptation::builder().learning_rate(0.0).build().is_err());
        assert!(UpdaterCovarAdaptation::builder().learning_rate(1.1).build().is_err());
        assert!(UpdaterCovarAdaptation::builder().relative_lower_bound(-0.1).build().is_err());
        assert!(UpdaterCovarAdaptation::builder().base_level(f64::NAN).build().is_err());
        assert!(
            UpdaterCovarAdaptation::builder()
                .weighting(WeightingMethod::Cem { mu: 0 })
                .build()
                .is_err()
        );

        let defaults = UpdaterCovarAdaptation::builder().build().unwrap();
        assert_eq!(defaults.learning_rate(), 1.0);
        assert!(!defaults.diagonal_only());
        assert_eq!(defaults.weighting(), WeightingMethod::default());
    }
}
