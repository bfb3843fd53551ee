use nalgebra::{DMatrix, DVector};

use super::{Updater, WeightingMethod, weighted_batch};
use crate::distribution::{DistributionGaussian, is_positive_semi_definite};
use crate::{CostVector, Result};

/// Moves only the mean; the covariance stays as it is.
///
/// Exploration never shrinks, so this updater suits problems where the
/// exploration magnitude is tuned by hand.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UpdaterMean {
    weighting: WeightingMethod,
}

impl UpdaterMean {
    /// Create a mean-only updater.
    #[must_use]
    pub fn new(weighting: WeightingMethod) -> Self {
        Self { weighting }
    }

    /// The configured weighting method.
    #[must_use]
    pub fn weighting(&self) -> WeightingMethod {
        self.weighting
    }
}

impl Updater<DistributionGaussian> for UpdaterMean {
    fn update_distribution(
        &self,
        distribution: &DistributionGaussian,
        samples: &DMatrix<f64>,
        costs: &[CostVector],
    ) -> Result<(DistributionGaussian, DVector<f64>)> {
        let (weights, mean) = weighted_batch(distribution, samples, costs, self.weighting)?;
        debug_assert!(is_positive_semi_definite(distribution.covar()));
        let updated = DistributionGaussian::new(mean, distribution.covar().clone())?;
        Ok((updated, weights))
    }
}
