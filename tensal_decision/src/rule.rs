// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! `DecisionRule`: a polynomial policy function over `s = [y* - ybar*; u;
//! sigma]`, stored as one dense folded tensor per `(i, j, k)` symmetry —
//! the number of `y*`, `u`, and `sigma` factors contracted, respectively.
//!
//! Unlike the solver's `Container<Folded>`, which holds raw (unscaled)
//! directional derivatives, a rule's tensors are pre-divided by `i! j! k!`
//! at construction time: this is what lets both evaluation methods below
//! treat a stored tensor as a literal polynomial coefficient, with no
//! further scaling at evaluation time.

use std::collections::HashMap;

use tensal_core::container::Container;
use tensal_core::context::TlContext;
use tensal_core::dims::TensorDimens;
use tensal_core::linalg::{Matrix, PluFactorization};
use tensal_core::pascal::noverk;
use tensal_core::seq::IntSequence;
use tensal_core::symmetry::Symmetry;
use tensal_core::tensor::{Folded, Tensor, Unfolded};

use crate::error::{DecisionError, Result};

fn factorial(n: usize) -> f64 {
    (1..=n).fold(1.0_f64, |acc, v| acc * v as f64)
}

/// A policy function `y = ybar + sum_{i+j+k>=1} T_{i,j,k}(dy*^{i}, u^{j}, sigma^{k})`,
/// centred on `ybar` (length `ny`) at the scalar `sigma` it was solved for.
pub struct DecisionRule {
    coeffs: Container<Folded>,
    pub ybar: Vec<f64>,
    pub nstat: usize,
    pub nys: usize,
    pub nu: usize,
    pub max_order: usize,
    pub sigma: f64,
}

impl DecisionRule {
    /// Builds a rule from the solver's raw-derivative container, dividing
    /// each `(i, j, k)` block by `i! j! k!` once up front.
    pub fn from_raw_derivatives(
        raw: &Container<Folded>,
        ybar: Vec<f64>,
        nstat: usize,
        nys: usize,
        nu: usize,
        max_order: usize,
        sigma: f64,
    ) -> Self {
        let mut coeffs = Container::new();
        for (sym, t) in raw.iter() {
            let gs = sym.group_sizes();
            if gs.len() != 3 {
                continue;
            }
            let (i, j, k) = (gs[0], gs[1], gs[2]);
            if i + j + k == 0 || i + j + k > max_order {
                continue;
            }
            let scale = 1.0 / (factorial(i) * factorial(j) * factorial(k));
            coeffs.insert(sym.clone(), t.with_matrix(t.matrix().scale(scale)));
        }
        DecisionRule {
            coeffs,
            ybar,
            nstat,
            nys,
            nu,
            max_order,
            sigma,
        }
    }

    pub fn ny(&self) -> usize {
        self.ybar.len()
    }

    /// Evaluates via the "Direct" method: one Kronecker power of each of
    /// `dy`/`u` per block, summed against every stored coefficient tensor.
    pub fn evaluate_direct(&self, ctx: &TlContext, dy: &[f64], u: &[f64]) -> Result<Vec<f64>> {
        if dy.len() != self.nys {
            return Err(DecisionError::Precondition(format!(
                "dy has length {}, expected nys={}",
                dy.len(),
                self.nys
            )));
        }
        if u.len() != self.nu {
            return Err(DecisionError::Precondition(format!(
                "u has length {}, expected nu={}",
                u.len(),
                self.nu
            )));
        }
        let rows = self.ny();
        let mut total = self.ybar.clone();
        let dy_vec = Matrix::from_rows(self.nys, 1, dy.to_vec());
        let u_vec = Matrix::from_rows(self.nu, 1, u.to_vec());

        for (sym, t) in self.coeffs.iter() {
            let gs = sym.group_sizes();
            let (i, j) = (gs[0], gs[1]);
            let xi = dy_vec.kron_power(i);
            let xj = u_vec.kron_power(j);
            let combined = if i == 0 {
                xj.clone()
            } else if j == 0 {
                xi.clone()
            } else {
                xi.kron(&xj)
            };
            let unfolded = t.unfold(ctx)?;
            for r in 0..rows.min(t.rows()) {
                let mut acc = 0.0;
                for c in 0..combined.rows() {
                    acc += unfolded.matrix().get(r, c) * combined.get(c, 0);
                }
                total[r] += acc;
            }
        }
        Ok(total)
    }

    /// Evaluates via the "Horner" method: merges each total order's
    /// `(i, j, k)` blocks into a single tensor over the combined variable
    /// space `[y*; u; 1]`, then folds from the highest order down, adding
    /// the next-lower block and contracting once against `s` each step.
    pub fn evaluate_horner(&self, ctx: &TlContext, dy: &[f64], u: &[f64]) -> Result<Vec<f64>> {
        if dy.len() != self.nys {
            return Err(DecisionError::Precondition(format!(
                "dy has length {}, expected nys={}",
                dy.len(),
                self.nys
            )));
        }
        if u.len() != self.nu {
            return Err(DecisionError::Precondition(format!(
                "u has length {}, expected nu={}",
                u.len(),
                self.nu
            )));
        }
        let rows = self.ny();
        let n = self.nys + self.nu + 1;
        let mut s_full = Vec::with_capacity(n);
        s_full.extend_from_slice(dy);
        s_full.extend_from_slice(u);
        s_full.push(1.0);

        let mut acc: Option<Tensor<Unfolded>> = None;
        for order in (1..=self.max_order).rev() {
            let block = merge_order_tensor(ctx, &self.coeffs, self.nys, self.nu, rows, order)?;
            acc = Some(match acc {
                None => block,
                Some(prev) => {
                    let contracted = contract_full_last(&prev, &s_full)?;
                    contracted.with_matrix(contracted.matrix().add(block.matrix())?)
                }
            });
        }
        let tail = match acc {
            Some(t) => {
                let reduced = contract_full_last(&t, &s_full)?;
                (0..rows).map(|r| reduced.matrix().get(r, 0)).collect::<Vec<_>>()
            }
            None => vec![0.0; rows],
        };
        Ok(tail.iter().zip(&self.ybar).map(|(v, yb)| v + yb).collect())
    }

    /// Recentres the rule about its own fixed point: solves for `dy*` with
    /// `dy* = evaluate(dy*, 0)|_{y* rows} - ybar*`, then shifts every
    /// coefficient tensor by the standard binomial Taylor-shift formula (a
    /// coefficient-storage analogue of `tensal_korder::stoch::recentre`,
    /// restricted to the `y*` group since `sigma` stays fixed).
    pub fn centralize(&self, ctx: &TlContext) -> Result<DecisionRule> {
        let dy_star = self.find_fixed_point(ctx)?;
        let zero_u = vec![0.0; self.nu];
        let new_y = self.evaluate_direct(ctx, &dy_star, &zero_u)?;

        let mut new_coeffs = Container::new();
        for total in 0..=self.max_order {
            for j in 0..=total {
                for i in 0..=(total - j) {
                    let k = total - j - i;
                    if i + j + k == 0 {
                        continue;
                    }
                    let mut acc: Option<Tensor<Unfolded>> = None;
                    for m in 0..=(self.max_order - i - j - k) {
                        let src_sym = Symmetry::new(vec![i + m, j, k]);
                        let Ok(src) = self.coeffs.get(&src_sym) else {
                            continue;
                        };
                        let mut t = src.unfold(ctx)?;
                        for _ in 0..m {
                            t = contract_last_of_group(&t, 0, &dy_star)?;
                        }
                        let weight = noverk(i + m, m) as f64;
                        let scaled = t.with_matrix(t.matrix().scale(weight));
                        acc = Some(match acc {
                            None => scaled,
                            Some(prev) => prev.with_matrix(prev.matrix().add(scaled.matrix())?),
                        });
                    }
                    if let Some(t) = acc {
                        let sym = Symmetry::new(vec![i, j, k]);
                        new_coeffs.insert(sym, t.fold(ctx)?);
                    }
                }
            }
        }

        Ok(DecisionRule {
            coeffs: new_coeffs,
            ybar: new_y,
            nstat: self.nstat,
            nys: self.nys,
            nu: self.nu,
            max_order: self.max_order,
            sigma: self.sigma,
        })
    }

    fn find_fixed_point(&self, ctx: &TlContext) -> Result<Vec<f64>> {
        let nys = self.nys;
        let sym1 = Symmetry::new(vec![1, 0, 0]);
        let t1 = self.coeffs.get(&sym1)?;
        let mut jac = Matrix::zeros(nys, nys);
        for r in 0..nys {
            for c in 0..nys {
                jac.set(r, c, t1.matrix().get(self.nstat + r, c));
            }
        }
        let identity = Matrix::identity(nys);
        let mut resid_jac = Matrix::zeros(nys, nys);
        for r in 0..nys {
            for c in 0..nys {
                resid_jac.set(r, c, identity.get(r, c) - jac.get(r, c));
            }
        }
        let lu = PluFactorization::factorize(&resid_jac)
            .map_err(|e| DecisionError::Precondition(format!("centralizing Jacobian is singular: {e}")))?;

        let zero_u = vec![0.0; self.nu];
        let mut dy = vec![0.0; nys];
        for iter in 0..50 {
            let y = self.evaluate_direct(ctx, &dy, &zero_u)?;
            let residual: Vec<f64> = (0..nys)
                .map(|r| y[self.nstat + r] - self.ybar[self.nstat + r] - dy[r])
                .collect();
            let max_abs = residual.iter().fold(0.0_f64, |acc, &v| acc.max(v.abs()));
            if max_abs < 1e-10 {
                return Ok(dy);
            }
            let step = lu.solve_vec(&residual)?;
            for r in 0..nys {
                dy[r] += step[r];
            }
            if iter == 49 {
                return Err(DecisionError::FixPointNotConverged { iterations: 50 });
            }
        }
        Err(DecisionError::FixPointNotConverged { iterations: 50 })
    }
}

/// Merges every `(i, j, k)` block with `i + j + k == order` into a single
/// fully-symmetric tensor over the combined alphabet `[0, nys) = y*`,
/// `[nys, nys+nu) = u`, `{nys+nu} =` the constant `1`. A raw multi-index's
/// block assignment falls out of which sub-range each entry lands in.
fn merge_order_tensor(
    ctx: &TlContext,
    coeffs: &Container<Folded>,
    nys: usize,
    nu: usize,
    rows: usize,
    order: usize,
) -> Result<Tensor<Unfolded>> {
    let n = nys + nu + 1;
    let dims = TensorDimens::full(n, order);
    let mut out = Tensor::<Unfolded>::zeros(rows, dims.clone());

    let mut unfolded_blocks: HashMap<(usize, usize, usize), Tensor<Unfolded>> = HashMap::new();
    for (sym, t) in coeffs.iter() {
        let gs = sym.group_sizes();
        if gs.iter().sum::<usize>() == order {
            unfolded_blocks.insert((gs[0], gs[1], gs[2]), t.unfold(ctx)?);
        }
    }
    if unfolded_blocks.is_empty() {
        return Ok(out);
    }

    let mut v = IntSequence::zeros(order);
    loop {
        let mut y_idx = Vec::new();
        let mut u_idx = Vec::new();
        let mut k = 0usize;
        for &x in v.as_slice() {
            if x < nys {
                y_idx.push(x);
            } else if x < nys + nu {
                u_idx.push(x - nys);
            } else {
                k += 1;
            }
        }
        let (i, j) = (y_idx.len(), u_idx.len());
        if let Some(block) = unfolded_blocks.get(&(i, j, k)) {
            let mut combined = Vec::with_capacity(order);
            combined.extend(y_idx);
            combined.extend(u_idx);
            combined.extend(std::iter::repeat(0).take(k));
            let col = block.get(&IntSequence::from_slice(&combined))?;
            let off = dims.calc_unfold_offset(&v)?;
            for r in 0..rows {
                out.matrix_mut().set(r, off, col[r]);
            }
        }
        if !v.increment_general(dims.nvmax()) {
            break;
        }
    }
    Ok(out)
}

/// Contracts the last raw index of a fully-symmetric tensor against `c`,
/// reducing its dimension by one; by symmetry it does not matter which
/// index is contracted.
fn contract_full_last(t: &Tensor<Unfolded>, c: &[f64]) -> Result<Tensor<Unfolded>> {
    contract_last_of_group(t, 0, c)
}

fn contract_last_of_group(t: &Tensor<Unfolded>, group: usize, c: &[f64]) -> Result<Tensor<Unfolded>> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use tensal_core::tensor::Folded;

    #[test]
    fn linear_rule_matches_direct_evaluation() {
        let ctx = TlContext::new();
        let mut raw = Container::new();
        let dims = TensorDimens::new(Symmetry::new(vec![1, 0, 0]), IntSequence::from_slice(&[2, 1, 1]));
        let mut t = Tensor::<Folded>::zeros(&ctx, 2, dims);
        t.set_col(0, &[0.5, 0.1]);
        t.set_col(1, &[0.2, 0.7]);
        raw.insert(Symmetry::new(vec![1, 0, 0]), t);

        let rule = DecisionRule::from_raw_derivatives(&raw, vec![1.0, 2.0], 0, 2, 1, 1, 0.0);
        let y = rule.evaluate_direct(&ctx, &[1.0, -1.0], &[]).unwrap();
        assert!((y[0] - (1.0 + 0.5 * 1.0 + 0.2 * -1.0)).abs() < 1e-12);
        assert!((y[1] - (2.0 + 0.1 * 1.0 + 0.7 * -1.0)).abs() < 1e-12);
    }

    #[test]
    fn horner_and_direct_agree_on_a_quadratic_rule() {
        let ctx = TlContext::new();
        let mut raw = Container::new();
        let dims1 = TensorDimens::new(Symmetry::new(vec![1, 0, 0]), IntSequence::from_slice(&[1, 1, 1]));
        let mut t1 = Tensor::<Folded>::zeros(&ctx, 1, dims1);
        t1.set_col(0, &[2.0]);
        raw.insert(Symmetry::new(vec![1, 0, 0]), t1);

        let dims2 = TensorDimens::new(Symmetry::new(vec![2, 0, 0]), IntSequence::from_slice(&[1, 1, 1]));
        let mut t2 = Tensor::<Folded>::zeros(&ctx, 1, dims2);
        t2.set_col(0, &[6.0]); // raw second derivative; coefficient form divides by 2! = 3.0
        raw.insert(Symmetry::new(vec![2, 0, 0]), t2);

        let rule = DecisionRule::from_raw_derivatives(&raw, vec![0.0], 0, 1, 0, 2, 0.0);
        let direct = rule.evaluate_direct(&ctx, &[1.5], &[]).unwrap();
        let horner = rule.evaluate_horner(&ctx, &[1.5], &[]).unwrap();
        assert!((direct[0] - horner[0]).abs() < 1e-10);
        // 2*1.5 + 3*1.5^2 = 3 + 6.75 = 9.75
        assert!((direct[0] - 9.75).abs() < 1e-10);
    }
}
