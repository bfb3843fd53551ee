use nalgebra::{DMatrix, DVector};

use super::{Updater, WeightingMethod, weighted_batch};
use crate::distribution::{DistributionGaussian, is_positive_semi_definite};
use crate::{CostVector, Error, Result};

/// Moves the mean and shrinks the covariance by a constant factor.
///
/// After `k` updates the covariance is `decay^k` times the initial one,
/// independent of the costs observed.
///
/// # Examples
///
/// ```
/// use bbo::{UpdaterCovarDecay, WeightingMethod};
///
/// assert!(UpdaterCovarDecay::new(WeightingMethod::default(), 0.95).is_ok());
/// assert!(UpdaterCovarDecay::new(WeightingMethod::default(), 1.5).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UpdaterCovarDecay {
    weighting: WeightingMethod,
    decay: f64,
}

impl UpdaterCovarDecay {
    /// Create a decaying updater.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if `decay` is not in `(0, 1]`
    /// or the weighting method is invalid.
    pub fn new(weighting: WeightingMethod, decay: f64) -> Result<Self> {
        weighting.validate()?;
        if !(decay > 0.0 && decay <= 1.0) {
            return Err(Error::InvalidConfiguration(format!(
                "covariance decay must be in (0, 1], got {decay}"
            )));
        }
        Ok(Self { weighting, decay })
    }

    /// The configured weighting method.
    #[must_use]
    pub fn weighting(&self) -> WeightingMethod {
        self.weighting
    }

    /// Factor applied to the covariance each update.
    #[must_use]
    pub fn decay(&self) -> f64 {
        self.decay
    }
}

impl Updater<DistributionGaussian> for UpdaterCovarDecay {
    fn update_distribution(
        &self,
        distribution: &DistributionGaussian,
        samples: &DMatrix<f64>,
        costs: &[CostVector],
    ) -> Result<(DistributionGaussian, DVector<f64>)> {
        let (weights, mean) = weighted_batch(distribution, samples, costs, self.weighting)?;
        let covar = distribution.covar() * self.decay;
        debug_assert!(is_positive_semi_definite(&covar));
        let updated = DistributionGaussian::new(mean, covar)?;
        Ok((updated, weights))
    }
}
