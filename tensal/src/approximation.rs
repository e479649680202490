// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! `Approximation`: the public entry point. Takes a caller-supplied
//! [`ModelDerivatives`] and a [`SolverConfig`], drives [`KOrder`] through
//! orders `2..=k`, then (if `ns > 0`) the stochastic-steady walk, then (if
//! `centralize`) recentres, and returns a [`DecisionRule`] plus optional
//! diagnostic artifacts (residuals, the stochastic-steady state, the
//! unconditional covariance).

use tensal_core::context::TlContext;
use tensal_core::linalg::{sylvester_solve, Matrix};
use tensal_decision::DecisionRule;
use tensal_korder::{walk, KOrder, ModelDerivatives, StochSteadyState};
use tensal_moments::NormalMoments;

use crate::config::SolverConfig;
use crate::error::{PerturbationError, Result};

/// Everything `Approximation::solve` hands back: the policy function plus
/// its optional diagnostic artifacts.
pub struct ApproximationResult {
    pub rule: DecisionRule,
    /// `check(order)`'s max-abs residual for every order `2..=k`, in order.
    pub deterministic_residuals: Vec<f64>,
    /// `None` when `config.ns == 0` (no stochastic walk was run).
    pub stoch: Option<StochSteadyState>,
    /// `V` solving `V = G.V.G^T + g_u.Sigma.g_u^T`, `G` the `ny x ny`
    /// embedding of `g_y` at the predetermined-state columns.
    pub unconditional_covariance: Matrix,
}

pub struct Approximation;

impl Approximation {
    /// Runs the whole pipeline once. `ybar` is the deterministic steady
    /// state (length `ny`); it is not part of `ModelDerivatives` since it
    /// is the first-order solver's output, not one of its derivative
    /// blocks.
    #[tracing::instrument(skip(ctx, model, ybar, config))]
    pub fn solve(
        ctx: TlContext,
        model: ModelDerivatives,
        ybar: &[f64],
        config: &SolverConfig,
    ) -> Result<ApproximationResult> {
        config.validate()?;

        let partition = model.partition;
        let ny = partition.ny();
        let nys = partition.nys();
        let nyss = partition.nyss();
        let nu = model.nu;
        let nstat = partition.nstat;

        if ybar.len() != ny {
            return Err(PerturbationError::PreconditionFailed(format!(
                "ybar has length {}, expected ny={ny}",
                ybar.len()
            )));
        }

        let sigma = model.sigma.clone();
        let g_y = model.g_y.clone();
        let g_u = model.g_u.clone();
        let g_starstar_y = g_starstar_y_block(&g_y, ny, nys, nyss);
        let model_for_walk = model.clone();

        let mut korder = KOrder::new(ctx, model, g_starstar_y, config.max_parallel_threads)?;
        let moments = NormalMoments::new(korder.ctx(), sigma.clone(), config.order)?;

        let mut deterministic_residuals = Vec::with_capacity(config.order.saturating_sub(1));
        for order in 2..=config.order {
            korder.perform_step(order, &moments)?;
            let max_abs = korder.check(order)?;
            tracing::info!(order, max_abs, "deterministic order solved");
            deterministic_residuals.push(max_abs);
        }

        let stoch = if config.ns > 0 {
            let aux_ctx = TlContext::new();
            Some(walk(&aux_ctx, &mut korder, &model_for_walk, ybar, config.ns)?)
        } else {
            None
        };

        let (final_ybar, final_sigma) = match &stoch {
            Some(s) => (s.steady.clone(), s.sigma),
            None => (ybar.to_vec(), 0.0),
        };

        let max_order = korder.max_order();
        let mut rule = DecisionRule::from_raw_derivatives(
            korder.g(),
            final_ybar,
            nstat,
            nys,
            nu,
            max_order,
            final_sigma,
        );

        if config.centralize {
            let aux_ctx = TlContext::new();
            rule = rule.centralize(&aux_ctx)?;
        }

        let unconditional_covariance = unconditional_covariance(&g_y, &g_u, &sigma, nstat, ny)?;

        Ok(ApproximationResult {
            rule,
            deterministic_residuals,
            stoch,
            unconditional_covariance,
        })
    }
}

/// `g**_{y*}`: the `nyss x nys` sub-block of `g_y` restricted to the `y**`
/// output rows, seeding `PreFactored::build` before anything has been
/// solved beyond order 1.
fn g_starstar_y_block(g_y: &Matrix, ny: usize, nys: usize, nyss: usize) -> Matrix {
    let mut m = Matrix::zeros(nyss, nys);
    for r in 0..nyss {
        for c in 0..nys {
            m.set(r, c, g_y.get(ny - nyss + r, c));
        }
    }
    m
}

/// `V = G.V.G^T + g_u.Sigma.g_u^T`, solved as a degenerate (order-1, no
/// extra Kronecker factor) generalized Sylvester equation `I.V + (-G).V.G^T
/// = Q`, reusing the same solver the k-order recursion's pure-state blocks
/// use rather than a dedicated discrete-Lyapunov routine.
fn unconditional_covariance(g_y: &Matrix, g_u: &Matrix, sigma: &Matrix, nstat: usize, ny: usize) -> Result<Matrix> {
    let nys = g_y.cols();
    let mut big_g = Matrix::zeros(ny, ny);
    for r in 0..ny {
        for c in 0..nys {
            big_g.set(r, nstat + c, g_y.get(r, c));
        }
    }
    let q = g_u.mul(sigma)?.mul(&g_u.transpose())?;
    let identity = Matrix::identity(ny);
    let neg_g = big_g.scale(-1.0);
    let g_t = big_g.transpose();
    let v = sylvester_solve(&identity, &neg_g, &g_t, &q, 1)?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensal_core::seq::IntSequence;
    use tensal_core::sparse::SparseTensor;
    use tensal_faa::sparse_faa::SparseOuterDerivatives;
    use tensal_korder::{ModelPartition, StackLayout};

    /// `y_t - 0.9 y*_{t-1} - u_t = 0`, a purely-predetermined single-state
    /// model with an externally-supplied first-order rule `g_y = 0.9, g_u =
    /// 1` that already satisfies it exactly (`nboth = nforw = 0`, so `y**`
    /// is empty and `A` degenerates to the scalar `f_y`).
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
        // z = (y**_{t+1} [width 0], y_t, y*_{t-1}, u_t), total width 3.
        let mut f1 = SparseTensor::new(3, 1);
        f1.insert(0, IntSequence::from_slice(&[0]), 1.0); // df/dy_t
        f1.insert(0, IntSequence::from_slice(&[1]), -0.9); // df/dy*_{t-1}
        f1.insert(0, IntSequence::from_slice(&[2]), -1.0); // df/du_t
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
    fn linear_toy_model_rule_and_covariance_match_by_hand() {
        let ctx = TlContext::new();
        let (model, ybar) = linear_toy_model();
        let config = SolverConfig {
            order: 1,
            ..SolverConfig::default()
        };
        let result = Approximation::solve(ctx, model, &ybar, &config).unwrap();
        assert_eq!(result.rule.ny(), 1);
        assert!(result.deterministic_residuals.is_empty());

        let y = result
            .rule
            .evaluate_direct(&TlContext::new(), &[0.1], &[0.0])
            .unwrap();
        assert!((y[0] - 0.09).abs() < 1e-10);

        // V (1 - 0.9^2) = sigma^2 = 1 => V = 1 / 0.19.
        let expected_v = 1.0 / 0.19;
        assert!((result.unconditional_covariance.get(0, 0) - expected_v).abs() < 1e-8);
    }
}
