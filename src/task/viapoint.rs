//! Viapoint task: pass close to a point, move smoothly, settle at a goal.
//!
//! Three cost components are computed from a [`Trajectory`]:
//!
//! | Component | Measurement |
//! |---|---|
//! | `viapoint` | Distance to the viapoint: the minimum over the trajectory, or at the first step with `t >= viapoint_time`. A positive radius is subtracted and the result clamped at zero. |
//! | `acceleration` | Sum of squared accelerations divided by the number of time steps. |
//! | `goal` | Mean distance to the goal over all steps with `t >= goal_time`. |
//!
//! Each component is multiplied by its weight. A zero weight skips the
//! measurement and contributes exactly zero.
//!
//! # Examples
//!
//! ```
//! use bbo::prelude::*;
//! use nalgebra::{DMatrix, DVector};
//!
//! let task = TaskViapoint::builder(DVector::from_vec(vec![0.5, 0.5]))
//!     .viapoint_radius(0.1)
//!     .acceleration_weight(0.0)
//!     .build()
//!     .unwrap();
//!
//! let ts = DVector::from_vec(vec![0.0, 0.5, 1.0]);
//! let ys = DMatrix::from_row_slice(3, 2, &[0.0, 0.0, 0.5, 0.55, 1.0, 1.0]);
//! let trajectory = Trajectory::from_positions(ts, ys).unwrap();
//!
//! let costs = task.evaluate_rollout(&trajectory, &DVector::zeros(2)).unwrap();
//! assert_eq!(costs.total(), 0.0);
//! assert_eq!(task.cost_labels(), vec!["viapoint", "acceleration", "goal"]);
//! ```

use nalgebra::{DMatrix, DVector};

use crate::task::Task;
use crate::trajectory::Trajectory;
use crate::{CostVector, Error, Result};

/// Scores trajectories against a viapoint, an acceleration penalty and a goal.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskViapoint {
    viapoint: DVector<f64>,
    viapoint_time: Option<f64>,
    viapoint_radius: f64,
    goal: DVector<f64>,
    goal_time: Option<f64>,
    viapoint_weight: f64,
    acceleration_weight: f64,
    goal_weight: f64,
}

impl TaskViapoint {
    /// Create a task with default weights (see [`TaskViapointBuilder`]).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the viapoint is empty or
    /// not finite.
    pub fn new(viapoint: DVector<f64>) -> Result<Self> {
        Self::builder(viapoint).build()
    }

    /// Creates a builder for configuring a `TaskViapoint`.
    #[must_use]
    pub fn builder(viapoint: DVector<f64>) -> TaskViapointBuilder {
        TaskViapointBuilder::new(viapoint)
    }

    /// The point the trajectory should pass through.
    #[must_use]
    pub fn viapoint(&self) -> &DVector<f64> {
        &self.viapoint
    }

    /// Time at which the viapoint should be reached, if fixed.
    #[must_use]
    pub fn viapoint_time(&self) -> Option<f64> {
        self.viapoint_time
    }

    /// Radius around the viapoint within which the distance costs nothing.
    #[must_use]
    pub fn viapoint_radius(&self) -> f64 {
        self.viapoint_radius
    }

    /// Where the trajectory should settle.
    #[must_use]
    pub fn goal(&self) -> &DVector<f64> {
        &self.goal
    }

    /// Time from which the trajectory should be at the goal.
    #[must_use]
    pub fn goal_time(&self) -> Option<f64> {
        self.goal_time
    }

    /// Weights of the `viapoint`, `acceleration` and `goal` components.
    #[must_use]
    pub fn weights(&self) -> [f64; 3] {
        [
            self.viapoint_weight,
            self.acceleration_weight,
            self.goal_weight,
        ]
    }

    fn distance_to_viapoint(&self, trajectory: &Trajectory) -> f64 {
        let ys = trajectory.ys();
        let distance = match self.viapoint_time {
            None => (0..ys.nrows())
                .map(|i| row_distance(ys, i, &self.viapoint))
                .fold(f64::INFINITY, f64::min),
            Some(viapoint_time) => {
                let step = trajectory
                    .ts()
                    .iter()
                    .position(|&t| t >= viapoint_time)
                    .unwrap_or_else(|| {
                        trace_warn!(
                            viapoint_time,
                            duration = trajectory.duration(),
                            "viapoint time lies beyond the trajectory; using the first step"
                        );
                        0
                    });
                row_distance(ys, step, &self.viapoint)
            }
        };

        if self.viapoint_radius > 0.0 {
            (distance - self.viapoint_radius).max(0.0)
        } else {
            distance
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn mean_distance_to_goal(&self, trajectory: &Trajectory, goal_time: f64) -> f64 {
        let ys = trajectory.ys();
        let (sum, count) = trajectory
            .ts()
            .iter()
            .enumerate()
            .filter(|&(_, &t)| t >= goal_time)
            .fold((0.0, 0_usize), |(sum, count), (i, _)| {
                (sum + row_distance(ys, i, &self.goal), count + 1)
            });
        if count == 0 { 0.0 } else { sum / count as f64 }
    }
}

impl Task<Trajectory> for TaskViapoint {
    #[allow(clippy::cast_precision_loss)]
    fn evaluate_rollout(
        &self,
        trajectory: &Trajectory,
        _sample: &DVector<f64>,
    ) -> Result<CostVector> {
        if trajectory.dim() != self.viapoint.len() {
            return Err(Error::DimensionMismatch {
                context: "trajectory dimensions",
                expected: self.viapoint.len(),
                got: trajectory.dim(),
            });
        }

        let viapoint_cost = if self.viapoint_weight > 0.0 {
            self.viapoint_weight * self.distance_to_viapoint(trajectory)
        } else {
            0.0
        };

        let acceleration_cost = if self.acceleration_weight > 0.0 {
            let sum_ydd = trajectory.ydds().norm_squared();
            self.acceleration_weight * sum_ydd / trajectory.length() as f64
        } else {
            0.0
        };

        let goal_cost = match self.goal_time {
            Some(goal_time) if self.goal_weight > 0.0 => {
                self.goal_weight * self.mean_distance_to_goal(trajectory, goal_time)
            }
            _ => 0.0,
        };

        Ok(CostVector::from_components([
            viapoint_cost,
            acceleration_cost,
            goal_cost,
        ]))
    }

    fn cost_labels(&self) -> Vec<String> {
        vec![
            "viapoint".to_string(),
            "acceleration".to_string(),
            "goal".to_string(),
        ]
    }
}

/// Builder for configuring a [`TaskViapoint`].
///
/// Defaults:
/// - `viapoint_time`: none (minimum distance over the whole trajectory)
/// - `viapoint_radius`: `0.0`
/// - `goal`: the origin, `goal_time`: none (goal cost disabled)
/// - weights: viapoint `1.0`, acceleration `0.0001`, goal `0.0`
#[derive(Clone, Debug)]
pub struct TaskViapointBuilder {
    viapoint: DVector<f64>,
    viapoint_time: Option<f64>,
    viapoint_radius: f64,
    goal: Option<DVector<f64>>,
    goal_time: Option<f64>,
    viapoint_weight: f64,
    acceleration_weight: f64,
    goal_weight: f64,
}

impl TaskViapointBuilder {
    /// Creates a new builder for the given viapoint.
    #[must_use]
    pub fn new(viapoint: DVector<f64>) -> Self {
        Self {
            viapoint,
            viapoint_time: None,
            viapoint_radius: 0.0,
            goal: None,
            goal_time: None,
            viapoint_weight: 1.0,
            acceleration_weight: 0.0001,
            goal_weight: 0.0,
        }
    }

    /// Measure the viapoint distance at this time instead of taking the
    /// minimum over the trajectory.
    #[must_use]
    pub fn viapoint_time(mut self, viapoint_time: f64) -> Self {
        self.viapoint_time = Some(viapoint_time);
        self
    }

    /// Distances within this radius of the viapoint cost nothing.
    #[must_use]
    pub fn viapoint_radius(mut self, viapoint_radius: f64) -> Self {
        self.viapoint_radius = viapoint_radius;
        self
    }

    /// Goal the trajectory should settle at; must match the viapoint's
    /// dimensionality.
    #[must_use]
    pub fn goal(mut self, goal: DVector<f64>) -> Self {
        self.goal = Some(goal);
        self
    }

    /// Time from which the trajectory should be at the goal.
    #[must_use]
    pub fn goal_time(mut self, goal_time: f64) -> Self {
        self.goal_time = Some(goal_time);
        self
    }

    /// Weight of the viapoint component.
    #[must_use]
    pub fn viapoint_weight(mut self, weight: f64) -> Self {
        self.viapoint_weight = weight;
        self
    }

    /// Weight of the acceleration component.
    #[must_use]
    pub fn acceleration_weight(mut self, weight: f64) -> Self {
        self.acceleration_weight = weight;
        self
    }

    /// Weight of the goal component.
    #[must_use]
    pub fn goal_weight(mut self, weight: f64) -> Self {
        self.goal_weight = weight;
        self
    }

    /// Builds the configured [`TaskViapoint`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the viapoint is empty, the
    /// goal's dimensionality differs from the viapoint's, or any weight,
    /// radius, time or coordinate is negative or not finite.
    pub fn build(self) -> Result<TaskViapoint> {
        let n_dims = self.viapoint.len();
        if n_dims == 0 {
            return Err(Error::InvalidConfiguration(
                "viapoint must have at least one dimension".to_string(),
            ));
        }
        let goal = self.goal.unwrap_or_else(|| DVector::zeros(n_dims));
        if goal.len() != n_dims {
            return Err(Error::InvalidConfiguration(format!(
                "goal has {} dimensions but viapoint has {n_dims}",
                goal.len()
            )));
        }
        if self.viapoint.iter().chain(goal.iter()).any(|v| !v.is_finite()) {
            return Err(Error::InvalidConfiguration(
                "viapoint and goal must be finite".to_string(),
            ));
        }
        for (name, value) in [
            ("viapoint_radius", self.viapoint_radius),
            ("viapoint_weight", self.viapoint_weight),
            ("acceleration_weight", self.acceleration_weight),
            ("goal_weight", self.goal_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfiguration(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        for (name, value) in [
            ("viapoint_time", self.viapoint_time),
            ("goal_time", self.goal_time),
        ] {
            if let Some(t) = value
                && !t.is_finite()
            {
                return Err(Error::InvalidConfiguration(format!(
                    "{name} must be finite, got {t}"
                )));
            }
        }

        Ok(TaskViapoint {
            viapoint: self.viapoint,
            viapoint_time: self.viapoint_time,
            viapoint_radius: self.viapoint_radius,
            goal,
            goal_time: self.goal_time,
            viapoint_weight: self.viapoint_weight,
            acceleration_weight: self.acceleration_weight,
            goal_weight: self.goal_weight,
        })
    }
}

/// Euclidean distance between row `row` of `ys` and `point`.
fn row_distance(ys: &DMatrix<f64>, row: usize, point: &DVector<f64>) -> f64 {
    ys.row(row)
        .iter()
        .zip(point.iter())
        .map(|(y, p)| (y - p).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Straight line from the origin to (1, 1) with constant velocity.
    #[allow(clippy::cast_precision_loss)]
    fn diagonal_line(n: usize) -> Trajectory {
        let ts = DVector::from_fn(n, |i, _| i as f64 / (n - 1) as f64);
        let ys = DMatrix::from_fn(n, 2, |i, _| ts[i]);
        Trajectory::from_positions(ts, ys).unwrap()
    }

    fn sample() -> DVector<f64> {
        DVector::zeros(2)
    }

    #[test]
    fn minimum_distance_over_trajectory() {
        let task = TaskViapoint::builder(DVector::from_vec(vec![0.5, 0.7]))
            .acceleration_weight(0.0)
            .build()
            .unwrap();
        let costs = task.evaluate_rollout(&diagonal_line(11), &sample()).unwrap();
        // Closest point is (0.6, 0.6).
        let expected = (0.1_f64.powi(2) + 0.1_f64.powi(2)).sqrt();
        assert!((costs.components()[0] - expected).abs() < 1e-9);
        assert_eq!(costs.total(), costs.components()[0]);
    }

    #[test]
    fn distance_at_viapoint_time() {
        let task = TaskViapoint::builder(DVector::from_vec(vec![0.0, 1.0]))
            .viapoint_time(0.5)
            .acceleration_weight(0.0)
            .build()
            .unwrap();
        let costs = task.evaluate_rollout(&diagonal_line(11), &sample()).unwrap();
        // At t = 0.5 the trajectory is at (0.5, 0.5).
        let expected = 0.5_f64.hypot(0.5);
        assert!((costs.components()[0] - expected).abs() < 1e-9);
    }

    #[test]
    fn viapoint_time_past_end_uses_first_step() {
        let task = TaskViapoint::builder(DVector::from_vec(vec![1.0, 1.0]))
            .viapoint_time(5.0)
            .acceleration_weight(0.0)
            .build()
            .unwrap();
        let costs = task.evaluate_rollout(&diagonal_line(11), &sample()).unwrap();
        assert!((costs.components()[0] - 2.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn within_radius_costs_nothing() {
        let task = TaskViapoint::builder(DVector::from_vec(vec![0.5, 0.6]))
            .viapoint_radius(0.2)
            .acceleration_weight(0.0)
            .build()
            .unwrap();
        let costs = task.evaluate_rollout(&diagonal_line(11), &sample()).unwrap();
        assert_eq!(costs.components()[0], 0.0);
    }

    #[test]
    fn radius_boundary_is_linear() {
        let radius = 0.3;
        let epsilon = 0.05;
        let weight = 2.0;
        // At t = 0 the trajectory is at the origin; the viapoint lies r + ε above it.
        let task = TaskViapoint::builder(DVector::from_vec(vec![0.0, radius + epsilon]))
            .viapoint_time(0.0)
            .viapoint_radius(radius)
            .viapoint_weight(weight)
            .acceleration_weight(0.0)
            .build()
            .unwrap();
        let costs = task.evaluate_rollout(&diagonal_line(11), &sample()).unwrap();
        assert!((costs.components()[0] - weight * epsilon).abs() < 1e-12);
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn acceleration_is_mean_squared() {
        // y = t² has ydd = 2 in the interior.
        let ts = DVector::from_fn(21, |i, _| i as f64 * 0.05);
        let ys = DMatrix::from_fn(21, 1, |i, _| ts[i] * ts[i]);
        let trajectory = Trajectory::from_positions(ts, ys).unwrap();

        let task = TaskViapoint::builder(DVector::from_vec(vec![0.0]))
            .viapoint_weight(0.0)
            .acceleration_weight(0.5)
            .build()
            .unwrap();
        let costs = task.evaluate_rollout(&trajectory, &DVector::zeros(1)).unwrap();
        let expected = 0.5 * trajectory.ydds().norm_squared() / 21.0;
        assert!((costs.components()[1] - expected).abs() < 1e-12);
        assert!(costs.components()[1] > 0.0);
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn zero_weights_contribute_nothing() {
        let ts = DVector::from_fn(21, |i, _| i as f64 * 0.05);
        let ys = DMatrix::from_fn(21, 2, |i, j| (ts[i] * 7.0 + j as f64).sin());
        let trajectory = Trajectory::from_positions(ts, ys).unwrap();
        assert!(trajectory.ydds().norm_squared() > 0.0);

        let task = TaskViapoint::builder(DVector::from_vec(vec![3.0, 3.0]))
            .viapoint_weight(0.0)
            .acceleration_weight(0.0)
            .goal(DVector::from_vec(vec![-3.0, -3.0]))
            .goal_time(0.5)
            .goal_weight(0.0)
            .build()
            .unwrap();
        let costs = task.evaluate_rollout(&trajectory, &sample()).unwrap();
        assert_eq!(costs.as_slice(), &[0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn goal_cost_averages_after_goal_time() {
        let task = TaskViapoint::builder(DVector::from_vec(vec![0.0, 0.0]))
            .viapoint_weight(0.0)
            .acceleration_weight(0.0)
            .goal(DVector::from_vec(vec![1.0, 1.0]))
            .goal_time(0.8)
            .goal_weight(1.0)
            .build()
            .unwrap();
        let costs = task.evaluate_rollout(&diagonal_line(11), &sample()).unwrap();
        // Steps at t = 0.8, 0.9, 1.0 are 0.2√2, 0.1√2 and 0 away from the goal.
        let expected = (0.2 + 0.1 + 0.0) * 2.0_f64.sqrt() / 3.0;
        assert!((costs.components()[2] - expected).abs() < 1e-9);
    }

    #[test]
    fn goal_cost_requires_goal_time() {
        let task = TaskViapoint::builder(DVector::from_vec(vec![0.0, 0.0]))
            .viapoint_weight(0.0)
            .acceleration_weight(0.0)
            .goal(DVector::from_vec(vec![5.0, 5.0]))
            .goal_weight(1.0)
            .build()
            .unwrap();
        let costs = task.evaluate_rollout(&diagonal_line(11), &sample()).unwrap();
        assert_eq!(costs.total(), 0.0);
    }

    #[test]
    fn total_is_sum_of_components() {
        let task = TaskViapoint::builder(DVector::from_vec(vec![0.2, 0.9]))
            .acceleration_weight(0.01)
            .goal(DVector::from_vec(vec![1.0, 0.0]))
            .goal_time(0.5)
            .goal_weight(0.3)
            .build()
            .unwrap();
        let costs = task.evaluate_rollout(&diagonal_line(11), &sample()).unwrap();
        let sum: f64 = costs.components().iter().sum();
        assert_eq!(costs.total(), sum);
    }

    #[test]
    fn goal_dimension_mismatch_fails_fast() {
        let result = TaskViapoint::builder(DVector::from_vec(vec![0.0, 0.0]))
            .goal(DVector::from_vec(vec![1.0, 1.0, 1.0]))
            .build();
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn negative_weight_rejected() {
        let result = TaskViapoint::builder(DVector::from_vec(vec![0.0]))
            .acceleration_weight(-1.0)
            .build();
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
        let result = TaskViapoint::builder(DVector::from_vec(vec![0.0]))
            .viapoint_radius(f64::NAN)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn trajectory_dimension_mismatch() {
        let task = TaskViapoint::new(DVector::from_vec(vec![0.0, 0.0, 0.0])).unwrap();
        let result = task.evaluate_rollout(&diagonal_line(5), &DVector::zeros(3));
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
    }
}
