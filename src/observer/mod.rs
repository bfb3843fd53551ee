//! Read-only hooks into the optimization loop.
//!
//! Observers see every update (the distribution, the samples, their costs
//! and weights, and the distribution that replaces it) and the final curves.
//! They receive shared references only, so they cannot influence the run;
//! an error returned from an observer is logged and otherwise ignored.

#[cfg(feature = "serde")]
mod directory;

#[cfg(feature = "serde")]
pub use directory::{DirectoryRecorder, UpdateRecord, load_curves};

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use parking_lot::Mutex;

use crate::optimization::{ExplorationCurve, ExplorationCurveRow, LearningCurve, LearningCurveRow};
use crate::{CostVector, Result};

/// Everything that happened in one update.
#[derive(Debug)]
pub struct UpdateSummary<'a, D> {
    /// Zero-based update index.
    pub update: usize,
    /// Samples evaluated before this update (`update · n_samples_per_update`).
    pub n_samples: usize,
    /// Exploration magnitude of `distribution`: the square root of its
    /// largest covariance eigenvalue.
    pub exploration: f64,
    /// The distribution the samples were drawn from.
    pub distribution: &'a D,
    /// Cost at the mean of `distribution`.
    pub cost_eval: &'a CostVector,
    /// Samples, one per row.
    pub samples: &'a DMatrix<f64>,
    /// Costs, one per sample row.
    pub costs: &'a [CostVector],
    /// Weights assigned by the updater, one per sample row.
    pub weights: &'a DVector<f64>,
    /// The distribution that replaces `distribution`.
    pub distribution_new: &'a D,
}

/// Receives the data of every update and the final curves.
pub trait UpdateObserver<D> {
    /// Called once per update, after the updater ran.
    ///
    /// # Errors
    ///
    /// Errors are logged by the loop and otherwise ignored.
    fn on_update(&mut self, summary: &UpdateSummary<'_, D>) -> Result<()>;

    /// Called once after the last update.
    ///
    /// # Errors
    ///
    /// Errors are logged by the loop and otherwise ignored.
    fn on_finish(
        &mut self,
        learning_curve: &[LearningCurveRow],
        exploration_curve: &[ExplorationCurveRow],
    ) -> Result<()> {
        let _ = (learning_curve, exploration_curve);
        Ok(())
    }
}

/// Data collected by a [`CurveRecorder`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordedCurves {
    /// Exploration magnitude per update, filled as the run progresses.
    pub exploration_curve: ExplorationCurve,
    /// Cost at the mean per update, filled as the run progresses.
    pub learning_curve: LearningCurve,
    /// Costs of every sample, one inner vector per update.
    pub all_costs: Vec<Vec<CostVector>>,
    /// Whether the run finished.
    pub finished: bool,
}

/// Records the learning and exploration curves and all sample costs.
///
/// The recorder is a cheap handle: clone it, hand one clone to the
/// optimization, and read the curves from the other one afterwards.
///
/// # Examples
///
/// ```
/// use bbo::prelude::*;
/// use nalgebra::DVector;
///
/// let recorder = CurveRecorder::new();
/// let mut optimization = Optimization::builder(UpdaterMean::default())
///     .n_updates(3)
///     .n_samples_per_update(4)
///     .seed(1)
///     .observer(recorder.clone())
///     .build()
///     .unwrap();
///
/// let cost = |x: &DVector<f64>| -> bbo::Result<CostVector> { Ok(CostVector::scalar(x.norm())) };
/// optimization
///     .run(&cost, DistributionGaussian::isotropic(DVector::zeros(2), 1.0).unwrap())
///     .unwrap();
///
/// let curves = recorder.snapshot();
/// assert!(curves.finished);
/// assert_eq!(curves.exploration_curve.len(), 3);
/// assert_eq!(curves.all_costs[0].len(), 4);
/// ```
#[derive(Clone, Debug, Default)]
pub struct CurveRecorder {
    curves: Arc<Mutex<RecordedCurves>>,
}

impl CurveRecorder {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of everything recorded so far.
    #[must_use]
    pub fn snapshot(&self) -> RecordedCurves {
        self.curves.lock().clone()
    }

    /// The exploration curve recorded so far.
    #[must_use]
    pub fn exploration_curve(&self) -> ExplorationCurve {
        self.curves.lock().exploration_curve.clone()
    }

    /// The learning curve recorded so far.
    #[must_use]
    pub fn learning_curve(&self) -> LearningCurve {
        self.curves.lock().learning_curve.clone()
    }

    /// Sample costs per update.
    #[must_use]
    pub fn all_costs(&self) -> Vec<Vec<CostVector>> {
        self.curves.lock().all_costs.clone()
    }

    /// Number of updates recorded.
    #[must_use]
    pub fn n_updates(&self) -> usize {
        self.curves.lock().learning_curve.len()
    }

    /// Forget everything, e.g. before reusing the recorder for another run.
    pub fn clear(&self) {
        *self.curves.lock() = RecordedCurves::default();
    }
}

impl<D> UpdateObserver<D> for CurveRecorder {
    fn on_update(&mut self, summary: &UpdateSummary<'_, D>) -> Result<()> {
        let mut curves = self.curves.lock();
        curves.learning_curve.push(LearningCurveRow {
            n_samples: summary.n_samples,
            costs: summary.cost_eval.clone(),
        });
        curves.exploration_curve.push(ExplorationCurveRow {
            n_samples: summary.n_samples,
            exploration: summary.exploration,
        });
        curves.all_costs.push(summary.costs.to_vec());
        Ok(())
    }

    fn on_finish(
        &mut self,
        learning_curve: &[LearningCurveRow],
        exploration_curve: &[ExplorationCurveRow],
    ) -> Result<()> {
        let mut curves = self.curves.lock();
        learning_curve.clone_into(&mut curves.learning_curve);
        exploration_curve.clone_into(&mut curves.exploration_curve);
        curves.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_collects_updates() {
        let mut recorder = CurveRecorder::new();
        let handle = recorder.clone();
        let distribution = 0_u8;
        let costs = vec![CostVector::scalar(2.0), CostVector::scalar(3.0)];
        let cost_eval = CostVector::scalar(1.0);
        let samples = DMatrix::zeros(2, 1);
        let weights = DVector::from_vec(vec![0.5, 0.5]);

        for update in 0..2 {
            let summary = UpdateSummary {
                update,
                n_samples: update * 2,
                exploration: 1.0,
                distribution: &distribution,
                cost_eval: &cost_eval,
                samples: &samples,
                costs: &costs,
                weights: &weights,
                distribution_new: &distribution,
            };
            recorder.on_update(&summary).unwrap();
        }

        let curves = handle.snapshot();
        assert_eq!(handle.n_updates(), 2);
        assert_eq!(curves.learning_curve[1].n_samples, 2);
        assert_eq!(curves.all_costs[1], costs);
        assert!(!curves.finished);

        UpdateObserver::<u8>::on_finish(
            &mut recorder,
            &curves.learning_curve,
            &curves.exploration_curve,
        )
        .unwrap();
        assert!(handle.snapshot().finished);

        handle.clear();
        assert_eq!(recorder.n_updates(), 0);
    }
}
