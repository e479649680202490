// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! Shock sources and the simulation loop that drives a [`DecisionRule`]
//! forward: maintain `y_{t-1}`, form `s_t = (y*_{t-1} - ybar*; u_t; 1)`,
//! evaluate, store `y_t`.

use tensal_core::context::TlContext;
use tensal_core::linalg::{cholesky, Matrix};

use crate::error::Result;
use crate::rng::{inverse_normal_cdf, MersenneTwister};
use crate::rule::DecisionRule;

/// A source of shock draws `u_t` (length `nu`) for one simulation step.
pub trait ShockRealization {
    fn next_shock(&mut self) -> Vec<f64>;
}

/// Replays a fixed, caller-supplied sequence of shocks (e.g. an impulse
/// response's unit shock followed by zeros).
pub struct DeterministicShocks {
    shocks: std::vec::IntoIter<Vec<f64>>,
    nu: usize,
}

impl DeterministicShocks {
    pub fn new(shocks: Vec<Vec<f64>>, nu: usize) -> Self {
        DeterministicShocks {
            shocks: shocks.into_iter(),
            nu,
        }
    }
}

impl ShockRealization for DeterministicShocks {
    fn next_shock(&mut self) -> Vec<f64> {
        self.shocks.next().unwrap_or_else(|| vec![0.0; self.nu])
    }
}

/// Draws `u_t = L z_t` with `L Lᵀ = Sigma` and `z_t` standard-normal, via a
/// seeded Mersenne Twister and the inverse-CDF transform.
pub struct GaussianShocks {
    l: Matrix,
    nu: usize,
    rng: MersenneTwister,
}

impl GaussianShocks {
    pub fn new(sigma: &Matrix, seed: u32) -> Result<Self> {
        let l = cholesky(sigma)?;
        Ok(GaussianShocks {
            nu: sigma.rows(),
            l,
            rng: MersenneTwister::new(seed),
        })
    }
}

impl ShockRealization for GaussianShocks {
    fn next_shock(&mut self) -> Vec<f64> {
        let z: Vec<f64> = (0..self.nu)
            .map(|_| inverse_normal_cdf(self.rng.next_f64()))
            .collect();
        (0..self.nu)
            .map(|r| (0..self.nu).map(|c| self.l.get(r, c) * z[c]).sum())
            .collect()
    }
}

/// Evaluation method the simulation loop uses at each step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvalMethod {
    Direct,
    Horner,
}

/// Runs `rule` forward for `periods` steps from `y0` (length `ny`, the
/// initial state in *levels*), drawing shocks from `shocks`. Returns the
/// full path of `y_t` including `y0` as row 0.
#[tracing::instrument(skip(ctx, rule, shocks, y0))]
pub fn simulate(
    ctx: &TlContext,
    rule: &DecisionRule,
    shocks: &mut dyn ShockRealization,
    y0: &[f64],
    periods: usize,
    method: EvalMethod,
) -> Result<Vec<Vec<f64>>> {
    let nstat = rule.nstat;
    let nys = rule.nys;
    let mut path = Vec::with_capacity(periods + 1);
    path.push(y0.to_vec());

    let mut y_prev = y0.to_vec();
    for t in 0..periods {
        let dy: Vec<f64> = (0..nys)
            .map(|r| y_prev[nstat + r] - rule.ybar[nstat + r])
            .collect();
        let u = shocks.next_shock();
        let y_t = match method {
            EvalMethod::Direct => rule.evaluate_direct(ctx, &dy, &u)?,
            EvalMethod::Horner => rule.evaluate_horner(ctx, &dy, &u)?,
        };
        tracing::debug!(step = t, "simulated one period");
        path.push(y_t.clone());
        y_prev = y_t;
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensal_core::container::Container;
    use tensal_core::dims::TensorDimens;
    use tensal_core::seq::IntSequence;
    use tensal_core::symmetry::Symmetry;
    use tensal_core::tensor::{Folded, Tensor};

    #[test]
    fn deterministic_shocks_replay_then_repeat_zero() {
        let mut s = DeterministicShocks::new(vec![vec![1.0], vec![0.5]], 1);
        assert_eq!(s.next_shock(), vec![1.0]);
        assert_eq!(s.next_shock(), vec![0.5]);
        assert_eq!(s.next_shock(), vec![0.0]);
    }

    #[test]
    fn gaussian_shocks_reproduce_with_same_seed() {
        let sigma = Matrix::identity(2);
        let mut a = GaussianShocks::new(&sigma, 7).unwrap();
        let mut b = GaussianShocks::new(&sigma, 7).unwrap();
        assert_eq!(a.next_shock(), b.next_shock());
    }

    #[test]
    fn simulate_tracks_a_linear_ar1_rule() {
        let ctx = TlContext::new();
        let mut raw: Container<Folded> = Container::new();
        let dims = TensorDimens::new(Symmetry::new(vec![1, 0, 0]), IntSequence::from_slice(&[1, 1, 1]));
        let mut t = Tensor::<Folded>::zeros(&ctx, 1, dims);
        t.set_col(0, &[0.5]);
        raw.insert(Symmetry::new(vec![1, 0, 0]), t);
        let rule = DecisionRule::from_raw_derivatives(&raw, vec![0.0], 0, 1, 0, 1, 0.0);

        let mut shocks = DeterministicShocks::new(vec![], 0);
        let path = simulate(&ctx, &rule, &mut shocks, &[1.0], 3, EvalMethod::Direct).unwrap();
        assert_eq!(path.len(), 4);
        assert!((path[1][0] - 0.5).abs() < 1e-12);
        assert!((path[2][0] - 0.25).abs() < 1e-12);
    }
}
