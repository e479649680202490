// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! Black-box end-to-end coverage of the public facade, exercised entirely
//! through `tensal::api`'s re-export surface rather than any crate's
//! internal module paths.

use tensal::api::{
    Approximation, DeterministicShocks, EvalMethod, ModelDerivatives, ModelPartition, SolverConfig, StackLayout,
    TlContext,
};
use tensal_core::linalg::Matrix;
use tensal_core::seq::IntSequence;
use tensal_core::sparse::SparseTensor;
use tensal_faa::sparse_faa::SparseOuterDerivatives;

/// `y_t - 0.9 y*_{t-1} - u_t = 0`, a linear toy model restricted to a
/// purely-predetermined state so the first-order `A` matrix is exactly
/// `f_y` (no `y**` block, no Sylvester term at all).
fn linear_toy_model() -> (ModelDerivatives, Vec<f64>) {
    let partition = ModelPartition {
        nstat: 0,
        npred: 1,
        nboth: 0,
        nforw: 0,
    };
    let layout = StackLayout {
        nyss: 0,
        ny: 1,
        nys: 1,
        nu: 1,
    };
    let mut f1 = SparseTensor::new(3, 1);
    f1.insert(0, IntSequence::from_slice(&[0]), 1.0);
    f1.insert(0, IntSequence::from_slice(&[1]), -0.9);
    f1.insert(0, IntSequence::from_slice(&[2]), -1.0);
    let mut f = SparseOuterDerivatives::new();
    f.set(1, f1);

    let model = ModelDerivatives {
        partition,
        layout,
        nu: 1,
        f,
        g_y: Matrix::from_rows(1, 1, vec![0.9]),
        g_u: Matrix::from_rows(1, 1, vec![1.0]),
        sigma: Matrix::from_rows(1, 1, vec![1.0]),
    };
    (model, vec![0.0])
}

#[test]
fn solves_and_simulates_the_linear_toy_model() {
    let ctx = TlContext::new();
    let (model, ybar) = linear_toy_model();
    let config = SolverConfig {
        order: 1,
        ..SolverConfig::default()
    };
    let result = Approximation::solve(ctx, model, &ybar, &config).expect("solve should succeed");

    assert!(result.stoch.is_none(), "ns = 0 should skip the stochastic walk");
    assert!(result.deterministic_residuals.is_empty());

    let ctx2 = TlContext::new();
    let mut shocks = DeterministicShocks::new(vec![vec![1.0], vec![0.0], vec![0.0]], 1);
    let path = tensal_decision::simulate(&ctx2, &result.rule, &mut shocks, &[0.0], 3, EvalMethod::Direct)
        .expect("simulation should succeed");

    assert_eq!(path.len(), 4);
    // y_0 = 0, u_1 = 1 => y_1 = 0.9*0 + 1 = 1.
    assert!((path[1][0] - 1.0).abs() < 1e-10);
    // y_2 = 0.9 * y_1 + 0 = 0.9.
    assert!((path[2][0] - 0.9).abs() < 1e-10);
    // y_3 = 0.9 * y_2 + 0 = 0.81.
    assert!((path[3][0] - 0.81).abs() < 1e-10);
}

#[test]
fn zero_order_config_is_rejected_before_any_solving() {
    let ctx = TlContext::new();
    let (model, ybar) = linear_toy_model();
    let config = SolverConfig {
        order: 0,
        ..SolverConfig::default()
    };
    let err = Approximation::solve(ctx, model, &ybar, &config).unwrap_err();
    assert!(matches!(err, tensal::PerturbationError::PreconditionFailed(_)));
}

#[test]
fn ybar_length_mismatch_is_a_precondition_failure() {
    let ctx = TlContext::new();
    let (model, _) = linear_toy_model();
    let config = SolverConfig::default();
    let err = Approximation::solve(ctx, model, &[0.0, 0.0], &config).unwrap_err();
    assert!(matches!(err, tensal::PerturbationError::PreconditionFailed(_)));
}

/// `y_t - 0.8 y*_{t-1} - 0.1 (y*_{t-1})^2 - u_t = 0`, the same quadratic
/// toy as `tensal_korder::korder`'s unit tests, rebuilt here against the
/// public facade so the order-2 solve is also exercised end-to-end through
/// `Approximation::solve` rather than only through `KOrder` directly.
fn quadratic_ar_model() -> (ModelDerivatives, Vec<f64>) {
    let partition = ModelPartition {
        nstat: 0,
        npred: 1,
        nboth: 0,
        nforw: 0,
    };
    let layout = StackLayout {
        nyss: 0,
        ny: 1,
        nys: 1,
        nu: 1,
    };
    let mut f1 = SparseTensor::new(3, 1);
    f1.insert(0, IntSequence::from_slice(&[0]), 1.0);
    f1.insert(0, IntSequence::from_slice(&[1]), -0.8);
    f1.insert(0, IntSequence::from_slice(&[2]), -1.0);
    let mut f2 = SparseTensor::new(3, 2);
    f2.insert(0, IntSequence::from_slice(&[1, 1]), -0.2);
    let mut f = SparseOuterDerivatives::new();
    f.set(1, f1);
    f.set(2, f2);

    let model = ModelDerivatives {
        partition,
        layout,
        nu: 1,
        f,
        g_y: Matrix::from_rows(1, 1, vec![0.8]),
        g_u: Matrix::from_rows(1, 1, vec![1.0]),
        sigma: Matrix::from_rows(1, 1, vec![1.0]),
    };
    (model, vec![0.0])
}

/// A forward-looking model (`nboth = 1`, so `y**` is non-empty and `A`/`S`
/// genuinely embed the Sylvester term) with a quadratic shock term, so the
/// stochastic walk's moment-correction machinery has something nonzero to
/// propagate instead of the purely-predetermined toy models above, where
/// `y**` is empty and the sigma correction is trivially zero.
fn forward_looking_quadratic_model() -> (ModelDerivatives, Vec<f64>) {
    let partition = ModelPartition {
        nstat: 0,
        npred: 0,
        nboth: 1,
        nforw: 0,
    };
    let layout = StackLayout {
        nyss: 1,
        ny: 1,
        nys: 1,
        nu: 1,
    };
    // z = (y**_{t+1}, y_t, y*_{t-1}, u_t), total width 4.
    let mut f1 = SparseTensor::new(4, 1);
    f1.insert(0, IntSequence::from_slice(&[0]), -0.4); // df/dy**_{t+1}
    f1.insert(0, IntSequence::from_slice(&[1]), 1.0); // df/dy_t
    f1.insert(0, IntSequence::from_slice(&[2]), -0.3); // df/dy*_{t-1}
    f1.insert(0, IntSequence::from_slice(&[3]), -1.0); // df/du_t
    let mut f2 = SparseTensor::new(4, 2);
    f2.insert(0, IntSequence::from_slice(&[3, 3]), -0.1); // d^2f/du_t^2
    let mut f = SparseOuterDerivatives::new();
    f.set(1, f1);
    f.set(2, f2);

    let model = ModelDerivatives {
        partition,
        layout,
        nu: 1,
        f,
        g_y: Matrix::from_rows(1, 1, vec![0.4]),
        g_u: Matrix::from_rows(1, 1, vec![1.0]),
        sigma: Matrix::from_rows(1, 1, vec![1.0]),
    };
    (model, vec![0.0])
}

#[test]
fn order_two_solve_reaches_an_exact_fixed_point_on_the_quadratic_model() {
    let ctx = TlContext::new();
    let (model, ybar) = quadratic_ar_model();
    let config = SolverConfig {
        order: 2,
        ..SolverConfig::default()
    };
    let result = Approximation::solve(ctx, model, &ybar, &config).expect("order-2 solve should succeed");

    assert_eq!(result.deterministic_residuals.len(), 1);
    assert!(
        result.deterministic_residuals[0] < 1e-8,
        "order-2 residual should vanish at an exact fixed point, got {}",
        result.deterministic_residuals[0]
    );

    // g_yy = 0.2 by hand; the rule's second-order contribution to y at
    // dy = 0.1 is 0.5 * g_yy * dy^2 = 0.001.
    let direct = result
        .rule
        .evaluate_direct(&TlContext::new(), &[0.1], &[0.0])
        .expect("evaluate_direct should succeed");
    let linear_only = 0.8 * 0.1;
    assert!((direct[0] - linear_only - 0.001).abs() < 1e-9);
}

/// Scenario: the stochastic-steady walk's final rule should not depend on
/// how many intermediate sigma-steps it takes to get from 0 to 1 — `ns =
/// 10` and `ns = 1` both re-solve exactly at the target `sigma`, so the two
/// walks must agree regardless of step count.
#[test]
fn stochastic_walk_agrees_between_ns_one_and_ns_ten() {
    let ctx1 = TlContext::new();
    let (model1, ybar1) = forward_looking_quadratic_model();
    let config1 = SolverConfig {
        order: 2,
        ns: 1,
        ..SolverConfig::default()
    };
    let result1 = Approximation::solve(ctx1, model1, &ybar1, &config1).expect("ns=1 walk should succeed");

    let ctx2 = TlContext::new();
    let (model2, ybar2) = forward_looking_quadratic_model();
    let config2 = SolverConfig {
        order: 2,
        ns: 10,
        ..SolverConfig::default()
    };
    let result2 = Approximation::solve(ctx2, model2, &ybar2, &config2).expect("ns=10 walk should succeed");

    let stoch1 = result1.stoch.expect("ns=1 should run the walk");
    let stoch2 = result2.stoch.expect("ns=10 should run the walk");
    assert!((stoch1.sigma - 1.0).abs() < 1e-10);
    assert!((stoch2.sigma - 1.0).abs() < 1e-10);
    for (a, b) in stoch1.steady.iter().zip(stoch2.steady.iter()) {
        assert!((a - b).abs() < 1e-8, "steady states should agree: {a} vs {b}");
    }

    let eval1 = result1
        .rule
        .evaluate_direct(&TlContext::new(), &[0.05], &[0.0])
        .unwrap();
    let eval2 = result2
        .rule
        .evaluate_direct(&TlContext::new(), &[0.05], &[0.0])
        .unwrap();
    assert!((eval1[0] - eval2[0]).abs() < 1e-8);
}

/// Scenario: the two evaluation strategies the decision rule supports over
/// its shared folded-tensor storage — `evaluate_direct`'s Kronecker-power
/// unfolding and `evaluate_horner`'s per-order merge-then-fold — must agree
/// pointwise on an order-2 rule across a spread of states, not just at the
/// hand-picked point the other tests use.
#[test]
fn direct_and_horner_evaluation_agree_across_many_states() {
    let ctx = TlContext::new();
    let (model, ybar) = quadratic_ar_model();
    let config = SolverConfig {
        order: 2,
        ..SolverConfig::default()
    };
    let result = Approximation::solve(ctx, model, &ybar, &config).expect("solve should succeed");

    for step in 0..100 {
        let dy = (step as f64 - 50.0) / 100.0;
        let u = (step as f64 * 0.37).sin() * 0.2;
        let direct = result
            .rule
            .evaluate_direct(&TlContext::new(), &[dy], &[u])
            .expect("evaluate_direct should succeed");
        let horner = result
            .rule
            .evaluate_horner(&TlContext::new(), &[dy], &[u])
            .expect("evaluate_horner should succeed");
        assert!(
            (direct[0] - horner[0]).abs() < 1e-9,
            "direct and horner disagree at dy={dy}, u={u}: {} vs {}",
            direct[0],
            horner[0]
        );
    }
}
