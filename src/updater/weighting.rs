//! Mapping total costs to sample weights.
//!
//! Every method returns non-negative weights that sum to one, assigns a
//! lower-cost sample at least the weight of any sample with equal or higher
//! cost, and gives samples with identical costs identical weights.

use nalgebra::DVector;

use crate::{Error, Result};

/// How costs are converted into weights.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WeightingMethod {
    /// PI-BB: `exp(-eliteness · (c - c_min) / (c_max - c_min))`.
    ///
    /// Larger eliteness concentrates the weight on the best samples. All
    /// samples weigh the same when all costs are equal.
    PiBb {
        /// Exponent scale `h`; must be positive.
        eliteness: f64,
    },
    /// CMA-ES recombination weights `ln(mu + 0.5) - ln(rank + 1)` for the
    /// `mu` best samples, zero for the rest.
    CmaEs {
        /// Number of samples receiving weight; clamped to the batch size.
        mu: usize,
    },
    /// Cross-entropy method: the `mu` best samples share the weight equally.
    Cem {
        /// Number of samples receiving weight; clamped to the batch size.
        mu: usize,
    },
}

impl Default for WeightingMethod {
    fn default() -> Self {
        Self::PiBb { eliteness: 10.0 }
    }
}

impl WeightingMethod {
    /// Check the method's parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] for a non-positive or
    /// non-finite eliteness, or `mu == 0`.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::PiBb { eliteness } if !(eliteness.is_finite() && eliteness > 0.0) => Err(
                Error::InvalidConfiguration(format!("eliteness must be positive, got {eliteness}")),
            ),
            Self::CmaEs { mu: 0 } | Self::Cem { mu: 0 } => Err(Error::InvalidConfiguration(
                "mu must be at least 1".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Compute normalized weights for a batch of total costs.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyBatch`] if `costs` is empty.
    /// - [`Error::Numerical`] if any cost is not finite.
    /// - [`Error::InvalidConfiguration`] if the method is misconfigured.
    pub fn weights(&self, costs: &[f64]) -> Result<DVector<f64>> {
        costs_to_weights(costs, *self)
    }
}

/// Compute normalized weights for a batch of total costs.
///
/// # Errors
///
/// See [`WeightingMethod::weights`].
///
/// # Examples
///
/// ```
/// use bbo::updater::weighting::costs_to_weights;
/// use bbo::WeightingMethod;
///
/// let weights = costs_to_weights(&[3.0, 1.0, 2.0, 1.0], WeightingMethod::Cem { mu: 2 }).unwrap();
/// assert_eq!(weights.as_slice(), &[0.0, 0.5, 0.0, 0.5]);
/// ```
#[allow(clippy::cast_precision_loss)]
pub fn costs_to_weights(costs: &[f64], method: WeightingMethod) -> Result<DVector<f64>> {
    method.validate()?;
    if costs.is_empty() {
        return Err(Error::EmptyBatch);
    }
    if let Some(bad) = costs.iter().find(|c| !c.is_finite()) {
        return Err(Error::Numerical(format!("cannot weight non-finite cost {bad}")));
    }

    let weights = match method {
        WeightingMethod::PiBb { eliteness } => pi_bb(costs, eliteness),
        WeightingMethod::CmaEs { mu } => {
            let mu = mu.min(costs.len());
            let log_mu = (mu as f64 + 0.5).ln();
            rank_based(costs, |rank| {
                if rank < mu {
                    log_mu - ((rank + 1) as f64).ln()
                } else {
                    0.0
                }
            })
        }
        WeightingMethod::Cem { mu } => {
            let mu = mu.min(costs.len());
            rank_based(costs, |rank| if rank < mu { 1.0 } else { 0.0 })
        }
    };

    let sum = weights.sum();
    if sum > 0.0 && sum.is_finite() {
        Ok(weights / sum)
    } else {
        Err(Error::Numerical(format!("weights sum to {sum}")))
    }
}

fn pi_bb(costs: &[f64], eliteness: f64) -> DVector<f64> {
    let min = costs.iter().copied().fold(f64::INFINITY, f64::min);
    let max = costs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range > 0.0 {
        DVector::from_iterator(
            costs.len(),
            costs.iter().map(|c| (-eliteness * (c - min) / range).exp()),
        )
    } else {
        DVector::from_element(costs.len(), 1.0)
    }
}

/// Weights from ranks (0 = lowest cost). Samples with equal costs share the
/// mean of the weights their ranks would receive.
fn rank_based(costs: &[f64], weight_of_rank: impl Fn(usize) -> f64) -> DVector<f64> {
    let mut order: Vec<usize> = (0..costs.len()).collect();
    // Stable: ties keep sample order.
    order.sort_by(|&a, &b| costs[a].total_cmp(&costs[b]));

    let mut weights = DVector::zeros(costs.len());
    let mut start = 0;
    while start < order.len() {
        let tied = costs[order[start]];
        let end = start + order[start..].iter().take_while(|&&i| costs[i] == tied).count();
        #[allow(clippy::cast_precision_loss)]
        let shared = (start..end).map(&weight_of_rank).sum::<f64>() / (end - start) as f64;
        for &i in &order[start..end] {
            weights[i] = shared;
        }
        start = end;
    }
    weights
}
