//! Cost functions and the rollout/scoring split.
//!
//! The optimization loop only sees a [`CostFunction`]. For policies whose
//! evaluation involves simulation, the work is split in two:
//!
//! - a [`TaskSolver`] performs the expensive rollout for a sample, and
//! - a [`Task`] scores the rollout cheaply.
//!
//! Keeping them apart lets one rollout be re-scored under different cost
//! weights or targets without simulating again. [`TaskSolverCostFunction`]
//! glues the two into a cost function.
//!
//! Plain closures are cost functions too:
//!
//! ```
//! use bbo::{CostFunction, CostVector};
//! use nalgebra::DVector;
//!
//! let sphere = |x: &DVector<f64>| -> bbo::Result<CostVector> {
//!     Ok(CostVector::scalar(x.norm_squared()))
//! };
//! let costs = sphere.evaluate(&DVector::from_vec(vec![1.0, 2.0])).unwrap();
//! assert_eq!(costs.total(), 5.0);
//! ```

pub mod viapoint;

use nalgebra::DVector;

use crate::{CostVector, Error, Result};

/// Maps a parameter sample to its costs.
///
/// Implementations must be deterministic in the sample: the loop may
/// evaluate samples in any order, or concurrently.
pub trait CostFunction {
    /// Evaluate the costs of `sample`.
    ///
    /// # Errors
    ///
    /// Any error aborts the optimization run; there is no retry.
    fn evaluate(&self, sample: &DVector<f64>) -> Result<CostVector>;
}

impl<F> CostFunction for F
where
    F: Fn(&DVector<f64>) -> Result<CostVector>,
{
    fn evaluate(&self, sample: &DVector<f64>) -> Result<CostVector> {
        self(sample)
    }
}

/// Performs rollouts: executes the policy parameterized by a sample and
/// records whatever the cost computation needs.
pub trait TaskSolver {
    /// The record produced by one rollout.
    type Rollout;

    /// Simulate the policy for `sample`.
    ///
    /// Must be a deterministic function of the sample and the solver's
    /// configuration.
    ///
    /// # Errors
    ///
    /// Implementation-defined; typically [`Error::Evaluation`].
    fn perform_rollout(&self, sample: &DVector<f64>) -> Result<Self::Rollout>;
}

/// Scores rollouts of type `R`.
pub trait Task<R> {
    /// Compute the costs of a rollout; the first entry is the total.
    ///
    /// # Errors
    ///
    /// Implementation-defined, e.g. [`Error::DimensionMismatch`] when the
    /// rollout does not fit the task.
    fn evaluate_rollout(&self, rollout: &R, sample: &DVector<f64>) -> Result<CostVector>;

    /// Names of the cost components, for reporting only.
    fn cost_labels(&self) -> Vec<String> {
        Vec::new()
    }
}

/// A [`CostFunction`] that performs a rollout and scores it.
///
/// `evaluate(sample)` is exactly
/// `task.evaluate_rollout(&task_solver.perform_rollout(sample)?, sample)`.
///
/// When assembled with [`builder`](Self::builder), either half may be
/// missing; evaluation then fails with [`Error::Unimplemented`].
pub struct TaskSolverCostFunction<S, T> {
    task_solver: Option<S>,
    task: Option<T>,
}

impl<S, T> TaskSolverCostFunction<S, T>
where
    S: TaskSolver,
    T: Task<S::Rollout>,
{
    /// Compose a solver and a task.
    pub fn new(task_solver: S, task: T) -> Self {
        Self {
            task_solver: Some(task_solver),
            task: Some(task),
        }
    }

    /// Start assembling a cost function piece by piece.
    #[must_use]
    pub fn builder() -> TaskSolverCostFunctionBuilder<S, T> {
        TaskSolverCostFunctionBuilder {
            task_solver: None,
            task: None,
        }
    }

    /// The rollout producer, if one was supplied.
    pub fn task_solver(&self) -> Option<&S> {
        self.task_solver.as_ref()
    }

    /// The scorer, if one was supplied.
    pub fn task(&self) -> Option<&T> {
        self.task.as_ref()
    }

    /// Component names reported by the task (empty without a task).
    pub fn cost_labels(&self) -> Vec<String> {
        self.task
            .as_ref()
            .map(|task| task.cost_labels())
            .unwrap_or_default()
    }

    /// Perform only the rollout for `sample`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unimplemented`] without a solver, or the solver's
    /// own error.
    pub fn perform_rollout(&self, sample: &DVector<f64>) -> Result<S::Rollout> {
        self.task_solver
            .as_ref()
            .ok_or(Error::Unimplemented {
                capability: "perform_rollout",
            })?
            .perform_rollout(sample)
    }

    /// Score an existing rollout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unimplemented`] without a task, or the task's own
    /// error.
    pub fn evaluate_rollout(
        &self,
        rollout: &S::Rollout,
        sample: &DVector<f64>,
    ) -> Result<CostVector> {
        self.task
            .as_ref()
            .ok_or(Error::Unimplemented {
                capability: "evaluate_rollout",
            })?
            .evaluate_rollout(rollout, sample)
    }
}

impl<S, T> CostFunction for TaskSolverCostFunction<S, T>
where
    S: TaskSolver,
    T: Task<S::Rollout>,
{
    fn evaluate(&self, sample: &DVector<f64>) -> Result<CostVector> {
        let rollout = self.perform_rollout(sample)?;
        self.evaluate_rollout(&rollout, sample)
    }
}

/// Builder for [`TaskSolverCostFunction`].
pub struct TaskSolverCostFunctionBuilder<S, T> {
    task_solver: Option<S>,
    task: Option<T>,
}

impl<S, T> TaskSolverCostFunctionBuilder<S, T>
where
    S: TaskSolver,
    T: Task<S::Rollout>,
{
    /// Set the rollout producer.
    #[must_use]
    pub fn task_solver(mut self, task_solver: S) -> Self {
        self.task_solver = Some(task_solver);
        self
    }

    /// Set the scorer.
    #[must_use]
    pub fn task(mut self, task: T) -> Self {
        self.task = Some(task);
        self
    }

    /// Build the cost function. Missing pieces surface as
    /// [`Error::Unimplemented`] on the first evaluation.
    #[must_use]
    pub fn build(self) -> TaskSolverCostFunction<S, T> {
        TaskSolverCostFunction {
            task_solver: self.task_solver,
            task: self.task,
        }
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::*;

    /// Rollout: the sample scaled by two. Counts how often it ran.
    struct Doubler {
        calls: Cell<usize>,
    }

    impl TaskSolver for Doubler {
        type Rollout = DVector<f64>;

        fn perform_rollout(&self, sample: &DVector<f64>) -> Result<DVector<f64>> {
            self.calls.set(self.calls.get() + 1);
            Ok(sample * 2.0)
        }
    }

    /// Scores the rollout's squared norm and the sample's squared norm.
    struct Norms;

    impl Task<DVector<f64>> for Norms {
        fn evaluate_rollout(
            &self,
            rollout: &DVector<f64>,
            sample: &DVector<f64>,
        ) -> Result<CostVector> {
            Ok(CostVector::from_components([
                rollout.norm_squared(),
                sample.norm_squared(),
            ]))
        }

        fn cost_labels(&self) -> Vec<String> {
            vec!["rollout".to_string(), "sample".to_string()]
        }
    }

    #[test]
    fn composite_equals_two_stages() {
        let cost_function = TaskSolverCostFunction::new(
            Doubler {
                calls: Cell::new(0),
            },
            Norms,
        );
        let sample = DVector::from_vec(vec![0.3, -1.7]);

        let composite = cost_function.evaluate(&sample).unwrap();
        let rollout = cost_function.perform_rollout(&sample).unwrap();
        let staged = cost_function.evaluate_rollout(&rollout, &sample).unwrap();
        assert_eq!(composite, staged);
        assert_eq!(cost_function.task_solver().unwrap().calls.get(), 2);
        assert_eq!(cost_function.cost_labels(), vec!["rollout", "sample"]);
    }

    #[test]
    fn rescoring_does_not_rerun_rollout() {
        let cost_function = TaskSolverCostFunction::new(
            Doubler {
                calls: Cell::new(0),
            },
            Norms,
        );
        let sample = DVector::from_vec(vec![1.0]);
        let rollout = cost_function.perform_rollout(&sample).unwrap();
        for _ in 0..3 {
            cost_function.evaluate_rollout(&rollout, &sample).unwrap();
        }
        assert_eq!(cost_function.task_solver().unwrap().calls.get(), 1);
    }

    #[test]
    fn missing_solver_is_unimplemented() {
        let cost_function = TaskSolverCostFunction::<Doubler, Norms>::builder()
            .task(Norms)
            .build();
        let err = cost_function.evaluate(&DVector::zeros(1)).unwrap_err();
        assert!(matches!(
            err,
            Error::Unimplemented {
                capability: "perform_rollout"
            }
        ));
    }

    #[test]
    fn missing_task_is_unimplemented() {
        let cost_function = TaskSolverCostFunction::<Doubler, Norms>::builder()
            .task_solver(Doubler {
                calls: Cell::new(0),
            })
            .build();
        let err = cost_function.evaluate(&DVector::zeros(1)).unwrap_err();
        assert!(matches!(
            err,
            Error::Unimplemented {
                capability: "evaluate_rollout"
            }
        ));
        assert!(cost_function.cost_labels().is_empty());
    }

    #[test]
    fn closure_is_cost_function() {
        let cost = |x: &DVector<f64>| -> Result<CostVector> { Ok(CostVector::scalar(x.sum())) };
        assert_eq!(cost.evaluate(&DVector::from_vec(vec![1.0, 2.0])).unwrap().total(), 3.0);
    }
}
