//! The optimization loop.
//!
//! Each update evaluates the cost at the current mean (for tracking only),
//! draws a batch of samples, evaluates them, asks the updater for the next
//! distribution, and records one learning-curve and one exploration-curve
//! row. The loop runs for exactly `n_updates` updates; there is no early
//! stopping.

#[cfg(feature = "async")]
mod async_impl;

use nalgebra::DMatrix;

use crate::distribution::DistributionGaussian;
use crate::observer::{UpdateObserver, UpdateSummary};
use crate::rng_util::make_rng;
use crate::{CostFunction, CostVector, Error, Result, SearchDistribution, Updater};

/// Cost at the distribution mean after a number of evaluated samples.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LearningCurveRow {
    /// Samples evaluated before this row's update.
    pub n_samples: usize,
    /// Cost at the mean, total first.
    pub costs: CostVector,
}

impl LearningCurveRow {
    /// The row as `[n_samples, total, c_1, ..., c_K]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_row(&self) -> Vec<f64> {
        let mut row = Vec::with_capacity(1 + self.costs.as_slice().len());
        row.push(self.n_samples as f64);
        row.extend_from_slice(self.costs.as_slice());
        row
    }
}

/// Exploration magnitude after a number of evaluated samples.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExplorationCurveRow {
    /// Samples evaluated before this row's update.
    pub n_samples: usize,
    /// Square root of the largest covariance eigenvalue.
    pub exploration: f64,
}

impl ExplorationCurveRow {
    /// The row as `[n_samples, exploration]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_row(&self) -> Vec<f64> {
        vec![self.n_samples as f64, self.exploration]
    }
}

/// One row per update.
pub type LearningCurve = Vec<LearningCurveRow>;

/// One row per update.
pub type ExplorationCurve = Vec<ExplorationCurveRow>;

type BoxedObserver<D> = Box<dyn UpdateObserver<D> + Send>;

/// A configured optimization: an updater, the iteration budget and the
/// observers to notify.
///
/// Runs are reproducible: with a seed, every call to [`run`](Self::run)
/// (and `run_parallel` with the `async` feature) draws the same samples.
pub struct Optimization<U, D = DistributionGaussian> {
    updater: U,
    n_updates: usize,
    n_samples_per_update: usize,
    seed: Option<u64>,
    observers: Vec<BoxedObserver<D>>,
}

/// Per-run state: the current distribution and the curves so far.
struct RunState<D> {
    distribution: D,
    learning_curve: LearningCurve,
    exploration_curve: ExplorationCurve,
}

impl<D> RunState<D> {
    fn new(distribution: D, n_updates: usize) -> Self {
        Self {
            distribution,
            learning_curve: Vec::with_capacity(n_updates),
            exploration_curve: Vec::with_capacity(n_updates),
        }
    }
}

impl<U, D> Optimization<U, D>
where
    U: Updater<D>,
    D: SearchDistribution,
{
    /// Start configuring an optimization around `updater`.
    #[must_use]
    pub fn builder(updater: U) -> OptimizationBuilder<U, D> {
        OptimizationBuilder::new(updater)
    }

    /// The updater.
    #[must_use]
    pub fn updater(&self) -> &U {
        &self.updater
    }

    /// Number of updates per run.
    #[must_use]
    pub fn n_updates(&self) -> usize {
        self.n_updates
    }

    /// Number of samples evaluated per update.
    #[must_use]
    pub fn n_samples_per_update(&self) -> usize {
        self.n_samples_per_update
    }

    /// Optimize from `initial` and return the learning curve: one row per
    /// update with the cost at the mean of the distribution used in it.
    ///
    /// Samples are evaluated one after another in sample order.
    ///
    /// # Errors
    ///
    /// Any error from the cost function or the updater aborts the run.
    /// Observer errors never do.
    pub fn run<C>(&mut self, cost_function: &C, initial: D) -> Result<LearningCurve>
    where
        C: CostFunction + ?Sized,
    {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!(
            "run_optimization",
            n_updates = self.n_updates,
            n_samples_per_update = self.n_samples_per_update
        )
        .entered();

        let mut rng = make_rng(self.seed);
        let mut state = RunState::new(initial, self.n_updates);

        for update in 0..self.n_updates {
            let cost_eval = cost_function.evaluate(state.distribution.mean())?;
            let samples = state
                .distribution
                .generate_samples(self.n_samples_per_update, &mut rng);
            let costs = samples
                .row_iter()
                .map(|row| cost_function.evaluate(&row.transpose()))
                .collect::<Result<Vec<_>>>()?;
            self.conclude_update(&mut state, update, cost_eval, &samples, &costs)?;
        }

        Ok(self.finish(state))
    }

    /// Run the updater on an evaluated batch, notify observers, append the
    /// curve rows and swap in the new distribution.
    fn conclude_update(
        &mut self,
        state: &mut RunState<D>,
        update: usize,
        cost_eval: CostVector,
        samples: &DMatrix<f64>,
        costs: &[CostVector],
    ) -> Result<()> {
        let (distribution_new, weights) =
            self.updater
                .update_distribution(&state.distribution, samples, costs)?;
        let n_samples = update * self.n_samples_per_update;
        let exploration = state.distribution.max_eigen_value()?.max(0.0).sqrt();

        trace_info!(
            update,
            n_samples,
            cost = cost_eval.total(),
            exploration,
            "update completed"
        );

        let summary = UpdateSummary {
            update,
            n_samples,
            exploration,
            distribution: &state.distribution,
            cost_eval: &cost_eval,
            samples,
            costs,
            weights: &weights,
            distribution_new: &distribution_new,
        };
        for observer in &mut self.observers {
            report_observer_error(observer.on_update(&summary));
        }

        state.learning_curve.push(LearningCurveRow {
            n_samples,
            costs: cost_eval,
        });
        state.exploration_curve.push(ExplorationCurveRow {
            n_samples,
            exploration,
        });
        state.distribution = distribution_new;
        Ok(())
    }

    fn finish(&mut self, state: RunState<D>) -> LearningCurve {
        for observer in &mut self.observers {
            report_observer_error(
                observer.on_finish(&state.learning_curve, &state.exploration_curve),
            );
        }
        state.learning_curve
    }
}

#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
fn report_observer_error(result: Result<()>) {
    if let Err(error) = result {
        trace_warn!(%error, "observer failed; continuing");
    }
}

/// Builder for [`Optimization`].
///
/// Defaults:
/// - `n_updates`: `10`
/// - `n_samples_per_update`: `10`
/// - `seed`: random
/// - no observers
pub struct OptimizationBuilder<U, D = DistributionGaussian> {
    updater: U,
    n_updates: usize,
    n_samples_per_update: usize,
    seed: Option<u64>,
    observers: Vec<BoxedObserver<D>>,
}

impl<U, D> OptimizationBuilder<U, D>
where
    U: Updater<D>,
    D: SearchDistribution,
{
    /// Creates a new builder with default settings.
    #[must_use]
    pub fn new(updater: U) -> Self {
        Self {
            updater,
            n_updates: 10,
            n_samples_per_update: 10,
            seed: None,
            observers: Vec::new(),
        }
    }

    /// Sets the number of updates per run (at least 1).
    #[must_use]
    pub fn n_updates(mut self, n_updates: usize) -> Self {
        self.n_updates = n_updates;
        self
    }

    /// Sets the number of samples drawn and evaluated per update (at
    /// least 1).
    #[must_use]
    pub fn n_samples_per_update(mut self, n_samples_per_update: usize) -> Self {
        self.n_samples_per_update = n_samples_per_update;
        self
    }

    /// Sets the random seed for reproducibility.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Adds an observer, notified in the order observers were added.
    #[must_use]
    pub fn observer(mut self, observer: impl UpdateObserver<D> + Send + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    /// Builds the configured [`Optimization`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if `n_updates` or
    /// `n_samples_per_update` is zero.
    pub fn build(self) -> Result<Optimization<U, D>> {
        if self.n_updates == 0 {
            return Err(Error::InvalidConfiguration(
                "n_updates must be at least 1".to_string(),
            ));
        }
        if self.n_samples_per_update == 0 {
            return Err(Error::InvalidConfiguration(
                "n_samples_per_update must be at least 1".to_string(),
            ));
        }
        Ok(Optimization {
            updater: self.updater,
            n_updates: self.n_updates,
            n_samples_per_update: self.n_samples_per_update,
            seed: self.seed,
            observers: self.observers,
        })
    }
}

#[cfg(feature = "serde")]
impl<U, D> OptimizationBuilder<U, D>
where
    U: Updater<D>,
    D: SearchDistribution + serde::Serialize,
{
    /// Writes every update and the final curves into `dir`; see
    /// [`DirectoryRecorder`](crate::observer::DirectoryRecorder).
    #[must_use]
    pub fn directory(self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.observer(crate::observer::DirectoryRecorder::new(dir))
    }
}

/// Optimize `cost_function` from `initial_distribution` in one call.
///
/// Equivalent to building an [`Optimization`] with the given settings and
/// observers and calling [`run`](Optimization::run) once.
///
/// # Errors
///
/// Returns [`Error::InvalidConfiguration`] for zero updates or samples, and
/// any error from the cost function or the updater.
///
/// # Examples
///
/// ```
/// use bbo::prelude::*;
/// use nalgebra::DVector;
///
/// let cost = |x: &DVector<f64>| -> bbo::Result<CostVector> {
///     Ok(CostVector::from_components([x[0].abs(), x[1].abs()]))
/// };
/// let initial = DistributionGaussian::isotropic(DVector::from_vec(vec![2.0, -2.0]), 1.0).unwrap();
///
/// let learning_curve =
///     run_optimization(&cost, initial, UpdaterMean::default(), 5, 8, Some(3), Vec::new())
///         .unwrap();
/// assert_eq!(learning_curve.len(), 5);
/// assert_eq!(learning_curve[4].n_samples, 32);
/// assert_eq!(learning_curve[0].to_row(), vec![0.0, 4.0, 2.0, 2.0]);
/// ```
pub fn run_optimization<C, U, D>(
    cost_function: &C,
    initial_distribution: D,
    updater: U,
    n_updates: usize,
    n_samples_per_update: usize,
    seed: Option<u64>,
    observers: Vec<Box<dyn UpdateObserver<D> + Send>>,
) -> Result<LearningCurve>
where
    C: CostFunction + ?Sized,
    U: Updater<D>,
    D: SearchDistribution,
{
    let mut builder = Optimization::builder(updater)
        .n_updates(n_updates)
        .n_samples_per_update(n_samples_per_update);
    if let Some(seed) = seed {
        builder = builder.seed(seed);
    }
    builder.observers.extend(observers);
    builder.build()?.run(cost_function, initial_distribution)
}
