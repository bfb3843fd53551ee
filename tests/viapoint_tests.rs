mod common;

use bbo::prelude::*;
use bbo::write_learning_curve_csv;
use nalgebra::DVector;

use common::SpringDamperSolver;

fn viapoint_cost_function() -> TaskSolverCostFunction<SpringDamperSolver, TaskViapoint> {
    TaskSolverCostFunction::new(
        SpringDamperSolver::new(2),
        TaskViapoint::new(DVector::from_vec(vec![1.0, 0.5])).unwrap(),
    )
}

#[test]
fn composite_evaluation_equals_rollout_then_scoring() {
    let cost_function = viapoint_cost_function();
    for sample in [
        DVector::from_vec(vec![0.0, 0.0]),
        DVector::from_vec(vec![1.2, 0.4]),
        DVector::from_vec(vec![-0.3, 2.0]),
    ] {
        let composite = cost_function.evaluate(&sample).unwrap();
        let rollout = cost_function.perform_rollout(&sample).unwrap();
        let staged = cost_function.evaluate_rollout(&rollout, &sample).unwrap();
        assert_eq!(composite, staged);
        assert_eq!(composite.n_components(), 3);
    }
}

#[test]
fn rollout_can_be_rescored_under_another_task() {
    let cost_function = viapoint_cost_function();
    let sample = DVector::from_vec(vec![1.0, 0.5]);
    let rollout = cost_function.perform_rollout(&sample).unwrap();

    let strict = TaskViapoint::builder(DVector::from_vec(vec![1.0, 0.5]))
        .viapoint_time(0.2)
        .acceleration_weight(0.0)
        .build()
        .unwrap();
    let default_costs = cost_function.evaluate_rollout(&rollout, &sample).unwrap();
    let strict_costs = strict.evaluate_rollout(&rollout, &sample).unwrap();

    // At t = 0.2 the system is still far from its attractor.
    assert!(strict_costs.components()[0] > default_costs.components()[0]);
    assert_eq!(strict_costs.components()[1], 0.0);
}

#[test]
fn rollout_cost_vars_round_trip() {
    let rollout = SpringDamperSolver::new(2)
        .perform_rollout(&DVector::from_vec(vec![0.7, -0.2]))
        .unwrap();
    let cost_vars = rollout.to_cost_vars();
    assert_eq!(cost_vars.shape(), (101, 7));
    assert_eq!(Trajectory::from_cost_vars(&cost_vars, 2).unwrap(), rollout);
}

#[test]
fn optimization_passes_through_viapoint() {
    let cost_function = viapoint_cost_function();
    let updater = UpdaterCovarDecay::new(WeightingMethod::default(), 0.9).unwrap();
    let initial = DistributionGaussian::isotropic(DVector::zeros(2), 1.0).unwrap();

    let curve =
        run_optimization(&cost_function, initial, updater, 30, 10, Some(7), Vec::new()).unwrap();

    assert_eq!(curve.len(), 30);
    let first = curve[0].costs.total();
    let last = curve[29].costs.total();
    // Starting at rest on the origin the viapoint is |(1, 0.5)| away.
    assert!((first - 1.25_f64.sqrt()).abs() < 1e-12);
    assert!(last < 0.5 * first, "cost went from {first} to {last}");
}

#[test]
fn learning_curve_exports_with_task_labels() {
    let cost_function = viapoint_cost_function();
    let curve = run_optimization(
        &cost_function,
        DistributionGaussian::isotropic(DVector::zeros(2), 0.5).unwrap(),
        UpdaterMean::default(),
        3,
        4,
        Some(12),
        Vec::new(),
    )
    .unwrap();

    let mut buf = Vec::new();
    write_learning_curve_csv(&mut buf, &curve, &cost_function.cost_labels()).unwrap();
    let csv = String::from_utf8(buf).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("n_samples,total,viapoint,acceleration,goal"));
    assert_eq!(lines.count(), 3);
}
