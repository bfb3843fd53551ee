//! Time-indexed trajectories produced by rollouts.

use nalgebra::{DMatrix, DVector};

use crate::{Error, Result};

/// A trajectory of `T` time steps in `n_dims` dimensions: times, positions,
/// velocities and accelerations.
///
/// Rows of `ys`, `yds` and `ydds` correspond to the entries of `ts`.
/// Trajectories are read-only once built.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
    ts: DVector<f64>,
    ys: DMatrix<f64>,
    yds: DMatrix<f64>,
    ydds: DMatrix<f64>,
}

impl Trajectory {
    /// Create a trajectory from all of its parts.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfiguration`] if there are no time steps or the
    ///   times are not non-decreasing.
    /// - [`Error::DimensionMismatch`] if the row or column counts disagree.
    pub fn new(
        ts: DVector<f64>,
        ys: DMatrix<f64>,
        yds: DMatrix<f64>,
        ydds: DMatrix<f64>,
    ) -> Result<Self> {
        let n_time_steps = ts.len();
        if n_time_steps == 0 {
            return Err(Error::InvalidConfiguration(
                "a trajectory needs at least one time step".to_string(),
            ));
        }
        if ts.as_slice().windows(2).any(|w| w[1] < w[0]) {
            return Err(Error::InvalidConfiguration(
                "trajectory times must be non-decreasing".to_string(),
            ));
        }
        let n_dims = ys.ncols();
        for (context, m) in [("positions", &ys), ("velocities", &yds), ("accelerations", &ydds)] {
            if m.nrows() != n_time_steps {
                return Err(Error::DimensionMismatch {
                    context,
                    expected: n_time_steps,
                    got: m.nrows(),
                });
            }
            if m.ncols() != n_dims {
                return Err(Error::DimensionMismatch {
                    context,
                    expected: n_dims,
                    got: m.ncols(),
                });
            }
        }
        Ok(Self { ts, ys, yds, ydds })
    }

    /// Create a trajectory from positions only, differentiating numerically
    /// to obtain velocities and accelerations.
    ///
    /// Interior steps use central differences, the end points one-sided
    /// differences. A single time step has zero derivatives.
    ///
    /// # Errors
    ///
    /// Same conditions as [`new`](Self::new).
    pub fn from_positions(ts: DVector<f64>, ys: DMatrix<f64>) -> Result<Self> {
        if ys.nrows() != ts.len() {
            return Err(Error::DimensionMismatch {
                context: "positions",
                expected: ts.len(),
                got: ys.nrows(),
            });
        }
        let yds = differentiate(&ts, &ys);
        let ydds = differentiate(&ts, &yds);
        Self::new(ts, ys, yds, ydds)
    }

    /// Parse the flat `T × (1 + 3·n_dims)` layout `[t, y.., yd.., ydd..]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if the column count does not
    /// match `n_dims`, plus the conditions of [`new`](Self::new).
    pub fn from_cost_vars(cost_vars: &DMatrix<f64>, n_dims: usize) -> Result<Self> {
        let expected = 1 + 3 * n_dims;
        if cost_vars.ncols() != expected {
            return Err(Error::DimensionMismatch {
                context: "cost vars columns",
                expected,
                got: cost_vars.ncols(),
            });
        }
        Self::new(
            cost_vars.column(0).into_owned(),
            cost_vars.columns(1, n_dims).into_owned(),
            cost_vars.columns(1 + n_dims, n_dims).into_owned(),
            cost_vars.columns(1 + 2 * n_dims, n_dims).into_owned(),
        )
    }

    /// The flat `T × (1 + 3·n_dims)` layout `[t, y.., yd.., ydd..]`.
    #[must_use]
    pub fn to_cost_vars(&self) -> DMatrix<f64> {
        let n_dims = self.dim();
        let mut cost_vars = DMatrix::zeros(self.length(), 1 + 3 * n_dims);
        cost_vars.set_column(0, &self.ts);
        cost_vars.columns_mut(1, n_dims).copy_from(&self.ys);
        cost_vars.columns_mut(1 + n_dims, n_dims).copy_from(&self.yds);
        cost_vars
            .columns_mut(1 + 2 * n_dims, n_dims)
            .copy_from(&self.ydds);
        cost_vars
    }

    /// Number of time steps `T`.
    #[must_use]
    pub fn length(&self) -> usize {
        self.ts.len()
    }

    /// Number of spatial dimensions.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.ys.ncols()
    }

    /// Time of the last step.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.ts[self.ts.len() - 1]
    }

    /// Time stamps.
    #[must_use]
    pub fn ts(&self) -> &DVector<f64> {
        &self.ts
    }

    /// Positions, one row per time step.
    #[must_use]
    pub fn ys(&self) -> &DMatrix<f64> {
        &self.ys
    }

    /// Velocities, one row per time step.
    #[must_use]
    pub fn yds(&self) -> &DMatrix<f64> {
        &self.yds
    }

    /// Accelerations, one row per time step.
    #[must_use]
    pub fn ydds(&self) -> &DMatrix<f64> {
        &self.ydds
    }
}

fn differentiate(ts: &DVector<f64>, values: &DMatrix<f64>) -> DMatrix<f64> {
    let n = ts.len();
    let mut derivative = DMatrix::zeros(n, values.ncols());
    if n < 2 {
        return derivative;
    }
    for i in 0..n {
        let (lo, hi) = match i {
            0 => (0, 1),
            i if i == n - 1 => (n - 2, n - 1),
            i => (i - 1, i + 1),
        };
        let dt = ts[hi] - ts[lo];
        if dt > 0.0 {
            let row = (values.row(hi) - values.row(lo)) / dt;
            derivative.row_mut(i).copy_from(&row);
        }
    }
    derivative
}
