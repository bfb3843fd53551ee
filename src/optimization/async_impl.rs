use std::sync::Arc;

use nalgebra::DMatrix;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::{LearningCurve, Optimization, RunState};
use crate::rng_util::make_rng;
use crate::{CostFunction, CostVector, Error, Result, SearchDistribution, Updater};

impl<U, D> Optimization<U, D>
where
    U: Updater<D>,
    D: SearchDistribution,
{
    /// Like [`run`](Self::run), but the samples of each update are evaluated
    /// concurrently on tokio's blocking pool, at most `concurrency` at a time.
    ///
    /// The updater only runs once every sample of the batch has been
    /// evaluated, and costs are matched to samples by index, so with a seed
    /// the learning curve is identical to the one from [`run`](Self::run).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if `concurrency` is zero,
    /// [`Error::TaskError`] if an evaluation task panics, and any error from
    /// the cost function or the updater.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use bbo::prelude::*;
    /// use nalgebra::DVector;
    ///
    /// # #[cfg(feature = "async")]
    /// # async fn example() -> bbo::Result<()> {
    /// let cost = Arc::new(|x: &DVector<f64>| -> bbo::Result<CostVector> {
    ///     Ok(CostVector::scalar(x.norm_squared()))
    /// });
    /// let mut optimization = Optimization::builder(UpdaterMean::default())
    ///     .n_updates(5)
    ///     .seed(42)
    ///     .build()?;
    ///
    /// let initial = DistributionGaussian::isotropic(DVector::zeros(3), 1.0)?;
    /// let learning_curve = optimization.run_parallel(cost, initial, 4).await?;
    /// assert_eq!(learning_curve.len(), 5);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run_parallel<C>(
        &mut self,
        cost_function: Arc<C>,
        initial: D,
        concurrency: usize,
    ) -> Result<LearningCurve>
    where
        C: CostFunction + Send + Sync + 'static,
    {
        if concurrency == 0 {
            return Err(Error::InvalidConfiguration(
                "concurrency must be at least 1".to_string(),
            ));
        }

        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!(
            "run_parallel",
            n_updates = self.n_updates,
            n_samples_per_update = self.n_samples_per_update,
            concurrency
        )
        .entered();

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut rng = make_rng(self.seed);
        let mut state = RunState::new(initial, self.n_updates);

        for update in 0..self.n_updates {
            let mean = state.distribution.mean().clone();
            let evaluator = Arc::clone(&cost_function);
            let cost_eval = tokio::task::spawn_blocking(move || evaluator.evaluate(&mean))
                .await
                .map_err(|e| Error::TaskError(e.to_string()))??;

            let samples = state
                .distribution
                .generate_samples(self.n_samples_per_update, &mut rng);
            let costs = evaluate_batch(&cost_function, &samples, &semaphore).await?;
            self.conclude_update(&mut state, update, cost_eval, &samples, &costs)?;
        }

        Ok(self.finish(state))
    }
}

/// Evaluate every sample row concurrently and return the costs in row order.
async fn evaluate_batch<C>(
    cost_function: &Arc<C>,
    samples: &DMatrix<f64>,
    semaphore: &Arc<Semaphore>,
) -> Result<Vec<CostVector>>
where
    C: CostFunction + Send + Sync + 'static,
{
    let n_samples = samples.nrows();
    let mut join_set: JoinSet<(usize, Result<CostVector>)> = JoinSet::new();

    for index in 0..n_samples {
        let permit = Arc::clone(semaphore)
            .acquire_owned()
            .await
            .map_err(|e| Error::TaskError(e.to_string()))?;
        let sample = samples.row(index).transpose();
        let evaluator = Arc::clone(cost_function);
        join_set.spawn_blocking(move || {
            let result = evaluator.evaluate(&sample);
            drop(permit);
            (index, result)
        });
    }

    let mut costs: Vec<Option<CostVector>> = vec![None; n_samples];
    while let Some(joined) = join_set.join_next().await {
        let (index, result) = joined.map_err(|e| Error::TaskError(e.to_string()))?;
        trace_debug!(index, "sample evaluated");
        costs[index] = Some(result?);
    }

    costs
        .into_iter()
        .map(|cost| cost.ok_or(Error::Internal("sample evaluation result missing")))
        .collect()
}
