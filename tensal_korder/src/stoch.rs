// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! The stochastic-steady walk: starting from the deterministic-steady
//! derivatives `KOrder` recovers at `sigma = 0`, this
//! module shifts them, one `delta = 1/ns` step at a time, toward the
//! stochastic steady state at `sigma = 1`.
//!
//! Each step:
//! 1. finds the new fixed point `ybar(sigma + delta)` of the current rule
//!    by a damped Newton iteration ([`find_fixed_point`]);
//! 2. extrapolates `h(y, sigma) = E_t g**(y, u', sigma)` from `g**`'s
//!    derivatives at the *old* steady/sigma ([`IntegDerivs::extrapolate`]);
//! 3. recentres `h` about the new steady by a directional Taylor shift
//!    ([`recentre`]), producing `StochForwardDerivs`;
//! 4. re-solves every order with that `h` as an explicit input rather than
//!    an unknown, which collapses every sub-step's Sylvester equation to a
//!    plain `A^{-1}`/`S^{-1}` solve ([`KOrder::stoch_recover`]).
//!
//! Tensors throughout this module hold raw (unscaled) directional
//! derivatives, not Taylor coefficients: evaluating a block of total order
//! `d` at a displacement `x` contributes `(1/d!) * T(x^{⊗d})`, matching the
//! convention `tensal_decision`'s rule evaluator uses.

use tensal_core::container::Container;
use tensal_core::context::TlContext;
use tensal_core::dims::TensorDimens;
use tensal_core::linalg::Matrix;
use tensal_core::pascal::noverk;
use tensal_core::seq::IntSequence;
use tensal_core::symmetry::Symmetry;
use tensal_core::tensor::{Folded, Tensor, Unfolded};
use tensal_moments::NormalMoments;

use crate::error::{Result, SolverError};
use crate::korder::KOrder;
use crate::model::ModelDerivatives;

fn factorial(n: usize) -> f64 {
    (1..=n).fold(1.0_f64, |acc, v| acc * v as f64)
}

/// `h(y, sigma) = E_t g**(y, u', sigma)`'s derivatives, stored with the
/// same 3-group `(y*, u, sigma)` symmetry `g` uses (always with a
/// zero-size `u` group, since the expectation has integrated `u'` out).
pub struct IntegDerivs {
    h: Container<Folded>,
}

impl IntegDerivs {
    pub fn into_container(self) -> Container<Folded> {
        self.h
    }

    /// The moment-extrapolation step:
    ///
    /// `h_{y^i sigma^p} = sum_{n,m,k: n+k=p, n+m even} (sigma_old^m *
    /// C(p,n)/m!) * contract(g_{y^i u^{m+n} sigma^k}, Sigma^{(m+n)/2})`
    ///
    /// where `contract(T, Sigma^{j})` contracts `T`'s `u`-block (dimension
    /// `2j`) against the `2j`-th normal moment of `u' ~ N(0, Sigma)`.
    pub fn extrapolate(
        ctx: &TlContext,
        g: &Container<Folded>,
        nys: usize,
        nu: usize,
        moments: &NormalMoments,
        sigma_old: f64,
        cur_max_order: usize,
    ) -> Result<Self> {
        let mut h = Container::new();
        let nvs = IntSequence::from_slice(&[nys, nu, 1]);

        for total in 0..=cur_max_order {
            for i in 0..=total {
                let p = total - i;
                let mut acc: Option<Tensor<Folded>> = None;
                for n in 0..=p {
                    let k = p - n;
                    if i + n + k > cur_max_order {
                        continue;
                    }
                    let mut m = if n % 2 == 0 { 0 } else { 1 };
                    while i + n + m + k <= cur_max_order {
                        let u = n + m;
                        let sym = Symmetry::new(vec![i, u, k]);
                        if let Ok(gt) = g.get(&sym) {
                            if let Some(moment) = moments.get(u) {
                                let weight =
                                    sigma_old.powi(m as i32) * (noverk(p, n) as f64) / factorial(m);
                                if weight != 0.0 {
                                    let contracted =
                                        contract_u_against_moment(ctx, gt, i, 0, u, k, nys, nu, moment)?;
                                    let scaled = contracted.with_matrix(contracted.matrix().scale(weight));
                                    acc = Some(match acc {
                                        None => scaled,
                                        Some(prev) => prev.with_matrix(prev.matrix().add(scaled.matrix())?),
                                    });
                                }
                            }
                        }
                        m += 2;
                    }
                }
                let sym_h = Symmetry::new(vec![i, 0, p]);
                let dims = TensorDimens::new(sym_h.clone(), nvs.clone());
                let t = acc.unwrap_or_else(|| {
                    let rows = g.iter().next().map(|(_, t)| t.rows()).unwrap_or(0);
                    Tensor::<Folded>::zeros(ctx, rows, dims)
                });
                h.insert(sym_h, t);
            }
        }
        Ok(IntegDerivs { h })
    }
}

/// Contracts `m_contract` of `g`'s middle (`u`) group's raw indices against
/// the fully-symmetric `moment` tensor (of dimension `m_contract`), leaving
/// `j_keep` of that group's indices free — since `g`'s `u` group is a single
/// symmetric block, which raw positions are "kept" versus "contracted" is
/// arbitrary; the last `m_contract` are chosen here. Produces a 3-group
/// `(y*, u, sigma)` tensor with `u`-width `j_keep`. Works entirely in raw
/// (unfolded) storage: the brute-force sum over every raw multi-index is
/// unambiguous, which avoids having to reconcile fold multiplicities across
/// two independently-sized symmetric groups.
pub(crate) fn contract_u_against_moment(
    ctx: &TlContext,
    g: &Tensor<Folded>,
    i: usize,
    j_keep: usize,
    m_contract: usize,
    k: usize,
    nys: usize,
    nu: usize,
    moment: &Tensor<Folded>,
) -> Result<Tensor<Folded>> {
    let rows = g.rows();
    let out_sym = Symmetry::new(vec![i, j_keep, k]);
    let out_nvs = IntSequence::from_slice(&[nys, nu, 1]);
    let out_dims = TensorDimens::new(out_sym, out_nvs);
    let mut out_unfolded = Tensor::<Unfolded>::zeros(rows, out_dims.clone());

    let g_unfolded = g.unfold(ctx)?;
    let moment_unfolded = moment.unfold(ctx)?;

    let mut v = IntSequence::zeros(i + j_keep + m_contract + k);
    loop {
        let m_part = v.subsequence(i + j_keep, m_contract);
        let weight = if m_contract == 0 {
            1.0
        } else {
            moment_unfolded.get(&m_part)?[0]
        };
        if weight != 0.0 {
            let col = g_unfolded.get(&v)?;
            let mut out_idx = Vec::with_capacity(i + j_keep + k);
            out_idx.extend_from_slice(v.subsequence(0, i + j_keep).as_slice());
            out_idx.extend_from_slice(v.subsequence(i + j_keep + m_contract, k).as_slice());
            let out_v = IntSequence::from_slice(&out_idx);
            let off = out_dims.calc_unfold_offset(&out_v)?;
            for r in 0..rows {
                out_unfolded.matrix_mut().add_in_place(r, off, weight * col[r]);
            }
        }
        if v.is_empty() || !v.increment_general(g.dims().nvmax()) {
            break;
        }
    }
    out_unfolded.fold(ctx)
}

/// Contracts the last raw index of `group` in `t` against `c`, producing
/// an unfolded tensor with that group's size reduced by one. Repeated
/// application implements the directional-derivative shift `recentre`
/// needs; by symmetry it does not matter which index of the group is
/// contracted.
fn contract_last_of_group(
    t: &Tensor<Unfolded>,
    group: usize,
    c: &[f64],
) -> Result<Tensor<Unfolded>> {
    let dims = t.dims().clone();
    let mut new_groups = dims.sym().group_sizes().to_vec();
    new_groups[group] -= 1;
    let new_dims = TensorDimens::new(Symmetry::new(new_groups), dims.nvs().clone());
    let mut out = Tensor::<Unfolded>::zeros(t.rows(), new_dims.clone());

    let group_start: usize = dims.sym().group_sizes()[..group].iter().sum();
    let group_size = dims.sym().group_sizes()[group];
    let last_pos = group_start + group_size - 1;

    let mut v = IntSequence::zeros(dims.dimen());
    loop {
        let weight = c[v[last_pos]];
        if weight != 0.0 {
            let reduced: Vec<usize> = v
                .as_slice()
                .iter()
                .enumerate()
                .filter(|&(idx, _)| idx != last_pos)
                .map(|(_, &x)| x)
                .collect();
            let off = new_dims.calc_unfold_offset(&IntSequence::from_slice(&reduced))?;
            let col = t.get(&v)?;
            for r in 0..col.len() {
                out.matrix_mut().add_in_place(r, off, weight * col[r]);
            }
        }
        if !v.increment_general(dims.nvmax()) {
            break;
        }
    }
    Ok(out)
}

/// `StochForwardDerivs`: `h` re-expressed about the new `(ybar, sigma)`
/// base point, via the directional-derivative Taylor shift
///
/// `new_T_{i,k} = sum_{m,n>=0} (1/(m! n!)) * contract(T_{i+m,k+n}, dy^{⊗m}, dsigma^{⊗n})`
pub struct StochForwardDerivs {
    pub h: Container<Folded>,
}

pub fn recentre(
    ctx: &TlContext,
    h: &Container<Folded>,
    nys: usize,
    dy: &[f64],
    dsigma: f64,
    max_order: usize,
) -> Result<StochForwardDerivs> {
    let nvs = IntSequence::from_slice(&[nys, 0, 1]);
    let mut out = Container::new();
    for total in 0..=max_order {
        for i in 0..=total {
            let k = total - i;
            let mut acc: Option<Tensor<Unfolded>> = None;
            for m in 0..=(max_order - total) {
                for n in 0..=(max_order - total - m) {
                    let src_sym = Symmetry::new(vec![i + m, 0, k + n]);
                    let Ok(src) = h.get(&src_sym) else { continue };
                    let mut t = src.unfold(ctx)?;
                    for _ in 0..m {
                        t = contract_last_of_group(&t, 0, dy)?;
                    }
                    for _ in 0..n {
                        t = contract_last_of_group(&t, 2, &[dsigma])?;
                    }
                    let weight = 1.0 / (factorial(m) * factorial(n));
                    let scaled = t.with_matrix(t.matrix().scale(weight));
                    acc = Some(match acc {
                        None => scaled,
                        Some(prev) => prev.with_matrix(prev.matrix().add(scaled.matrix())?),
                    });
                }
            }
            let sym_out = Symmetry::new(vec![i, 0, k]);
            let rows = h.iter().next().map(|(_, t)| t.rows()).unwrap_or(0);
            let folded = match acc {
                Some(t) => t.fold(ctx)?,
                None => Tensor::<Folded>::zeros(ctx, rows, TensorDimens::new(sym_out.clone(), nvs.clone())),
            };
            out.insert(sym_out, folded);
        }
    }
    Ok(StochForwardDerivs { h: out })
}

/// Evaluates `sum_{i,k present} (1/(i! k!)) * T_{i,0,k}(x^{⊗i}, sigma^{⊗k})`
/// — the decision rule's zero-shock restriction `g(x, 0, sigma)`, via the
/// unfolded "Direct" method (raw Kronecker powers against raw storage).
fn evaluate_zero_shock(
    ctx: &TlContext,
    g: &Container<Folded>,
    x: &[f64],
    sigma: f64,
    out_rows: usize,
) -> Result<Vec<f64>> {
    let mut total = vec![0.0; out_rows];
    for (sym, t) in g.iter() {
        let gs = sym.group_sizes();
        if gs.len() < 3 || gs[1] != 0 {
            continue;
        }
        let i = gs[0];
        let k = gs[2];
        let unfolded = t.unfold(ctx)?;
        let xvec = Matrix::from_rows(x.len(), 1, x.to_vec());
        let xi = xvec.kron_power(i);
        let sk = sigma.powi(k as i32);
        let scale = sk / (factorial(i) * factorial(k));
        for r in 0..out_rows.min(t.rows()) {
            let mut acc = 0.0;
            for c in 0..xi.rows() {
                acc += unfolded.matrix().get(r, c) * xi.get(c, 0);
            }
            total[r] += acc * scale;
        }
    }
    Ok(total)
}

/// Damped Newton iteration for the fixed point `x* = g_restricted(x*, 0,
/// sigma)` of the predetermined-state sub-vector, using the order-1 `g_y`
/// block (its top-left `nys x nys` sub-block) as a fixed approximate
/// Jacobian rather than recomputing a full higher-order Jacobian every
/// iteration — adequate since perturbation solutions are, by construction,
/// local around a state of modest displacement.
fn find_fixed_point(
    ctx: &TlContext,
    g: &Container<Folded>,
    jac: &Matrix,
    nys: usize,
    sigma: f64,
    start: &[f64],
) -> Result<Vec<f64>> {
    let identity = Matrix::identity(nys);
    let mut resid_jac = Matrix::zeros(nys, nys);
    for r in 0..nys {
        for c in 0..nys {
            resid_jac.set(r, c, identity.get(r, c) - jac.get(r, c));
        }
    }
    let lu = tensal_core::linalg::PluFactorization::factorize(&resid_jac)
        .map_err(|e| SolverError::Precondition(format!("fixed-point Jacobian is singular: {e}")))?;

    let mut x = start.to_vec();
    for _ in 0..50 {
        let gx = evaluate_zero_shock(ctx, g, &x, sigma, nys)?;
        let residual: Vec<f64> = (0..nys).map(|r| gx[r] - x[r]).collect();
        let max_abs = residual.iter().fold(0.0_f64, |acc, &v| acc.max(v.abs()));
        if max_abs < 1e-10 {
            return Ok(x);
        }
        let step = lu.solve_vec(&residual)?;
        for r in 0..nys {
            x[r] += step[r];
        }
    }
    Err(SolverError::Precondition(
        "stochastic-steady fixed point did not converge within 50 Newton iterations".into(),
    ))
}

/// Result of the whole `ns`-step walk: the final steady state and sigma
/// (always 1.0 unless `ns == 0`, in which case the walk is a no-op and the
/// deterministic steady is returned unchanged) plus the per-step residual
/// norms `KOrder::check` reports, for diagnostics.
pub struct StochSteadyState {
    pub steady: Vec<f64>,
    pub sigma: f64,
    pub residuals: Vec<f64>,
}

/// Drives `KOrder` through `ns` sigma-steps from `sigma = 0` toward
/// `sigma = 1`, in place. `ybar` is the deterministic steady state; `nys`
/// rows of it are the predetermined-state sub-vector the fixed point is
/// solved over.
#[tracing::instrument(skip(ctx, korder, model, ybar))]
pub fn walk(
    ctx: &TlContext,
    korder: &mut KOrder,
    model: &ModelDerivatives,
    ybar: &[f64],
    ns: usize,
) -> Result<StochSteadyState> {
    if ns == 0 {
        return Ok(StochSteadyState {
            steady: ybar.to_vec(),
            sigma: 0.0,
            residuals: Vec::new(),
        });
    }
    let nys = model.partition.nys();
    let nstat = model.partition.nstat;
    let delta = 1.0 / ns as f64;
    let max_order = korder.max_order();
    let moments = NormalMoments::new(ctx, model.sigma.clone(), max_order)?;

    let jac = g_star_y_block(korder.g(), nstat, nys)?;
    let mut steady_state = ybar[nstat..nstat + nys].to_vec();
    let mut sigma_old = 0.0_f64;
    let mut residuals = Vec::with_capacity(ns);

    for step in 1..=ns {
        tracing::info!(step, ns, "stochastic-steady step");
        let sigma_new = step as f64 * delta;

        let new_state = find_fixed_point(ctx, korder.g(), &jac, nys, sigma_new, &steady_state)?;
        let dy: Vec<f64> = new_state
            .iter()
            .zip(steady_state.iter())
            .map(|(a, b)| a - b)
            .collect();

        let extrapolated = IntegDerivs::extrapolate(
            ctx,
            korder.g(),
            nys,
            model.nu,
            &moments,
            sigma_old,
            max_order,
        )?
        .into_container();
        let forward = recentre(ctx, &extrapolated, nys, &dy, delta, max_order)?;

        for order in 2..=max_order {
            korder.stoch_recover(order, &forward.h, &moments)?;
        }
        let max_abs = korder.check(max_order)?;
        residuals.push(max_abs);

        steady_state = new_state;
        sigma_old = sigma_new;
    }

    let mut steady = ybar.to_vec();
    steady[nstat..nstat + nys].copy_from_slice(&steady_state);

    Ok(StochSteadyState {
        steady,
        sigma: sigma_old,
        residuals,
    })
}

/// `g*_{y*}`: the `nys x nys` sub-block of `g`'s order-1 derivative
/// restricted to the predetermined-state output rows (`[nstat, nstat +
/// nys)` of the full `ny`-row output, per the `(nstat, npred, nboth,
/// nforw)` variable ordering).
fn g_star_y_block(g: &Container<Folded>, nstat: usize, nys: usize) -> Result<Matrix> {
    let sym = Symmetry::new(vec![1, 0, 0]);
    let t = g.get(&sym)?;
    let mut m = Matrix::zeros(nys, nys);
    for r in 0..nys {
        for c in 0..nys {
            m.set(r, c, t.matrix().get(nstat + r, c));
        }
    }
    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensal_core::tensor::Folded;

    #[test]
    fn factorial_matches_known_values() {
        assert_eq!(factorial(0), 1.0);
        assert_eq!(factorial(4), 24.0);
    }

    #[test]
    fn contract_u_against_moment_with_zero_u_is_identity() {
        let ctx = TlContext::new();
        let dims = TensorDimens::new(Symmetry::new(vec![1, 0, 0]), IntSequence::from_slice(&[2, 1, 1]));
        let mut g = Tensor::<Folded>::zeros(&ctx, 1, dims);
        g.set_col(0, &[3.0]);
        g.set_col(1, &[5.0]);
        let moment_dims = TensorDimens::full(1, 0);
        let mut moment = Tensor::<Folded>::zeros(&ctx, 1, moment_dims);
        moment.set_col(0, &[1.0]);
        let out = contract_u_against_moment(&ctx, &g, 1, 0, 0, 0, 2, 1, &moment).unwrap();
        assert_eq!(out.matrix().data(), g.matrix().data());
    }

    /// `g` has symmetry `(0, 2, 0)` over two shocks with `Sigma =
    /// diag(2, 3)`; contracting both `u`s against the second moment should
    /// reduce to `sum_i g[i,i] * Sigma[i,i]` (the off-diagonal raw entries
    /// contribute zero moment weight), a hand-checkable cross-shock case
    /// the old scalar-moment shortcut could not express.
    #[test]
    fn contract_u_against_moment_sums_diagonal_variances_for_two_shocks() {
        let ctx = TlContext::new();
        let dims = TensorDimens::new(Symmetry::new(vec![0, 2, 0]), IntSequence::from_slice(&[1, 2, 1]));
        let mut g = Tensor::<Unfolded>::zeros(1, dims.clone());
        let off00 = dims.calc_unfold_offset(&IntSequence::from_slice(&[0, 0])).unwrap();
        let off11 = dims.calc_unfold_offset(&IntSequence::from_slice(&[1, 1])).unwrap();
        g.set_col(off00, &[5.0]);
        g.set_col(off11, &[7.0]);
        let g_folded = g.fold(&ctx).unwrap();

        let sigma = Matrix::from_rows(2, 2, vec![2.0, 0.0, 0.0, 3.0]);
        let moments = NormalMoments::new(&ctx, sigma, 2).unwrap();
        let moment2 = moments.get(2).unwrap();

        let out = contract_u_against_moment(&ctx, &g_folded, 0, 0, 2, 0, 1, 2, moment2).unwrap();
        // E[u0^2] g[0,0] + E[u1^2] g[1,1] = 2*5 + 3*7 = 31.
        assert!((out.matrix().get(0, 0) - 31.0).abs() < 1e-10);
    }
}
