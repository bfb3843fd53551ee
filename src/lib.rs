#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]

//! Episodic black-box optimization of parametric policies. Each update
//! samples candidate parameter vectors from a search distribution, scores
//! them through a rollout and a cost function, and moves the distribution
//! toward low-cost regions using cost-derived weights. No gradient of the
//! cost with respect to the parameters is ever needed.
//!
//! # Getting Started
//!
//! ```
//! use bbo::prelude::*;
//! use nalgebra::{DMatrix, DVector};
//!
//! let initial = DistributionGaussian::new(DVector::zeros(2), DMatrix::identity(2, 2)).unwrap();
//! let cost = |x: &DVector<f64>| -> bbo::Result<CostVector> {
//!     Ok(CostVector::scalar((x[0] - 1.0).powi(2) + (x[1] - 1.0).powi(2)))
//! };
//!
//! let updater = UpdaterCovarDecay::new(WeightingMethod::default(), 0.9).unwrap();
//! let mut optimization = Optimization::builder(updater)
//!     .n_updates(20)
//!     .n_samples_per_update(10)
//!     .seed(42)
//!     .build()
//!     .unwrap();
//!
//! let learning_curve = optimization.run(&cost, initial).unwrap();
//! assert_eq!(learning_curve.len(), 20);
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`SearchDistribution`] | Law over the parameter space that samples are drawn from. |
//! | [`CostFunction`] | Maps a sample to a [`CostVector`] (total plus named components). |
//! | [`TaskSolver`] / [`Task`] | Split an evaluation into an expensive rollout and a cheap scoring step. |
//! | [`Updater`] | Turns a batch of samples and costs into weights and a new distribution. |
//! | [`Optimization`] | Drives the update loop and records the learning curve. |
//! | [`UpdateObserver`] | Read-only hooks for plotting, logging and persistence. |
//!
//! # Updaters
//!
//! | Updater | Covariance update |
//! |---------|-------------------|
//! | [`UpdaterMean`] | Unchanged; only the mean moves. |
//! | [`UpdaterCovarDecay`] | Scaled by a constant decay factor each update. |
//! | [`UpdaterCovarAdaptation`] | Reconstructed from weighted sample deviations, with eigenvalue floor. |
//!
//! Weights come from a [`WeightingMethod`]: PI-BB exponentiated costs,
//! CMA-ES log-rank weights, or CEM truncation.
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `async` | [`Optimization::run_parallel`]: sample evaluations dispatched to tokio's blocking pool | off |
//! | `serde` | `Serialize`/`Deserialize` on public data types and the [`DirectoryRecorder`](observer::DirectoryRecorder) | off |
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) at each update | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::warn!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { tracing::warn!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}

mod cost;
pub mod distribution;
mod error;
mod export;
pub mod observer;
mod optimization;
mod rng_util;
pub mod task;
mod trajectory;
pub mod updater;

pub use cost::CostVector;
pub use distribution::{DistributionGaussian, SearchDistribution};
pub use error::{Error, Result};
pub use export::{write_exploration_curve_csv, write_learning_curve_csv};
pub use observer::{CurveRecorder, RecordedCurves, UpdateObserver, UpdateSummary};
pub use optimization::{
    ExplorationCurve, ExplorationCurveRow, LearningCurve, LearningCurveRow, Optimization,
    OptimizationBuilder, run_optimization,
};
pub use task::{CostFunction, Task, TaskSolver, TaskSolverCostFunction};
pub use trajectory::Trajectory;
pub use updater::{
    Updater, UpdaterCovarAdaptation, UpdaterCovarDecay, UpdaterMean, WeightingMethod,
};

/// Convenient wildcard import for the most common types.
///
/// ```
/// use bbo::prelude::*;
/// ```
pub mod prelude {
    pub use crate::cost::CostVector;
    pub use crate::distribution::{DistributionGaussian, SearchDistribution};
    pub use crate::error::{Error, Result};
    pub use crate::observer::{CurveRecorder, UpdateObserver, UpdateSummary};
    #[cfg(feature = "serde")]
    pub use crate::observer::{DirectoryRecorder, UpdateRecord};
    pub use crate::optimization::{
        ExplorationCurveRow, LearningCurve, LearningCurveRow, Optimization, run_optimization,
    };
    pub use crate::task::viapoint::TaskViapoint;
    pub use crate::task::{CostFunction, Task, TaskSolver, TaskSolverCostFunction};
    pub use crate::trajectory::Trajectory;
    pub use crate::updater::{
        Updater, UpdaterCovarAdaptation, UpdaterCovarDecay, UpdaterMean, WeightingMethod,
    };
}
