//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use bbo::{CostVector, Error, Result, TaskSolver, Trajectory};
use nalgebra::{DMatrix, DVector};

/// A critically damped spring-damper system started at rest at `y_init`.
/// The sample is the attractor the system is pulled toward, so a rollout is
/// a smooth approach from `y_init` to the sample.
pub struct SpringDamperSolver {
    pub y_init: DVector<f64>,
    pub duration: f64,
    pub n_time_steps: usize,
    pub damping: f64,
}

impl SpringDamperSolver {
    pub fn new(n_dims: usize) -> Self {
        Self {
            y_init: DVector::zeros(n_dims),
            duration: 1.0,
            n_time_steps: 101,
            damping: 20.0,
        }
    }
}

impl TaskSolver for SpringDamperSolver {
    type Rollout = Trajectory;

    #[allow(clippy::cast_precision_loss)]
    fn perform_rollout(&self, sample: &DVector<f64>) -> Result<Trajectory> {
        let n_dims = self.y_init.len();
        if sample.len() != n_dims {
            return Err(Error::DimensionMismatch {
                context: "attractor",
                expected: n_dims,
                got: sample.len(),
            });
        }
        let dt = self.duration / (self.n_time_steps - 1) as f64;
        let spring = self.damping * self.damping / 4.0;

        let ts = DVector::from_fn(self.n_time_steps, |i, _| i as f64 * dt);
        let mut ys = DMatrix::zeros(self.n_time_steps, n_dims);
        let mut yds = DMatrix::zeros(self.n_time_steps, n_dims);
        let mut ydds = DMatrix::zeros(self.n_time_steps, n_dims);

        let mut y = self.y_init.clone();
        let mut yd = DVector::zeros(n_dims);
        for i in 0..self.n_time_steps {
            let ydd = -spring * (&y - sample) - self.damping * &yd;
            ys.set_row(i, &y.transpose());
            yds.set_row(i, &yd.transpose());
            ydds.set_row(i, &ydd.transpose());
            y += dt * &yd;
            yd += dt * ydd;
        }
        Trajectory::new(ts, ys, yds, ydds)
    }
}

/// `(x - 1)ᵀ(x - 1)`: minimum 0 at the all-ones vector.
pub fn shifted_quadratic(x: &DVector<f64>) -> Result<CostVector> {
    Ok(CostVector::scalar(x.map(|v| (v - 1.0).powi(2)).sum()))
}

/// Per-dimension squared distances to the all-ones vector as separate
/// components.
pub fn shifted_quadratic_components(x: &DVector<f64>) -> Result<CostVector> {
    Ok(CostVector::from_components(
        x.iter().map(|v| (v - 1.0).powi(2)).collect::<Vec<_>>(),
    ))
}

pub fn tempdir(prefix: &str) -> std::path::PathBuf {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let id = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("bbo_{prefix}_{}_{id}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
