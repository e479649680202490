// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! Smolyak sparse-grid quadrature: a signed combination of tensor-product
//! grids `Q_{k_1} ⊗ ... ⊗ Q_{k_d}` over multi-indices `k` with
//! `l - d <= |k| - d <= l - 1`, which grows far more slowly in `d` than the
//! full product grid while retaining the same polynomial exactness at a
//! given level.

use crate::{OneDRule, ParameterSignal, Quadrature1D};
use tensal_core::pascal::noverk;

pub struct SmolyakQuadrature {
    dim: usize,
    level: usize,
    kind: Quadrature1D,
}

impl SmolyakQuadrature {
    pub fn new(kind: Quadrature1D, dim: usize, level: usize) -> Self {
        assert!(level >= 1 && dim >= 1);
        SmolyakQuadrature { dim, level, kind }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn level(&self) -> usize {
        self.level
    }

    /// Multi-indices `k` (one 1-D level per dimension, each `>= 1`) with
    /// `level - dim <= |k| - dim <= level - 1`, i.e. `|k|` ranging over
    /// `[level, level + dim - 1]`.
    fn summands(&self) -> Vec<(Vec<usize>, i64)> {
        let lo = self.level;
        let hi = self.level + self.dim - 1;
        let mut out = Vec::new();
        let mut k = vec![1usize; self.dim];
        loop {
            let total: usize = k.iter().sum();
            if total >= lo && total <= hi {
                // j = |k| - (level + dim - 1), so |k| = level+dim-1-j;
                // weight = (-1)^j * C(dim-1, j).
                let j = hi - total;
                let weight = if j % 2 == 0 { 1i64 } else { -1i64 }
                    * noverk(self.dim - 1, j) as i64;
                if weight != 0 {
                    out.push((k.clone(), weight));
                }
            }
            if !advance(&mut k, hi) {
                break;
            }
        }
        out
    }

    /// Highest level whose total evaluation count (summed over all
    /// summands' point counts) stays within `max_evals`.
    pub fn design_level_for_evals(kind: Quadrature1D, dim: usize, max_evals: usize) -> usize {
        let mut level = 1;
        loop {
            let q = SmolyakQuadrature::new(kind, dim, level + 1);
            if q.total_evals() > max_evals {
                return level;
            }
            level += 1;
        }
    }

    fn total_evals(&self) -> usize {
        self.summands()
            .iter()
            .map(|(k, _)| k.iter().map(|&lv| self.kind.rule(lv).nodes.len()).product::<usize>())
            .sum()
    }

    /// Iterates every `(point, signed weight, signal)` across all summands.
    /// Points repeat across summands (the sparse grid is a signed *sum*,
    /// not a deduplicated point set); callers accumulate the integrand
    /// value times the signed weight directly, as the combination
    /// technique requires.
    pub fn iter(&self) -> impl Iterator<Item = (Vec<f64>, f64, ParameterSignal)> + '_ {
        self.summands().into_iter().flat_map(move |(levels, sign)| {
            let rules: Vec<OneDRule> = levels.iter().map(|&lv| self.kind.rule(lv)).collect();
            GridWalk::new(rules, sign as f64)
        })
    }
}

/// Advances `k` as an odometer over `1..=max_possible_per_dim` where
/// `max_possible_per_dim` is bounded by `hi - (dim-1)` (since every other
/// coordinate is at least 1); stops once the whole vector would exceed
/// `hi` in every position, using `hi` itself as a generous per-slot cap.
fn advance(k: &mut [usize], hi: usize) -> bool {
    let mut i = k.len();
    loop {
        if i == 0 {
            return false;
        }
        i -= 1;
        k[i] += 1;
        if k[i] <= hi {
            return true;
        }
        k[i] = 1;
    }
}

struct GridWalk {
    rules: Vec<OneDRule>,
    index: Vec<usize>,
    sign: f64,
    first: bool,
    done: bool,
}

impl GridWalk {
    fn new(rules: Vec<OneDRule>, sign: f64) -> Self {
        let dim = rules.len();
        GridWalk {
            rules,
            index: vec![0; dim],
            sign,
            first: true,
            done: dim == 0,
        }
    }
}

impl Iterator for GridWalk {
    type Item = (Vec<f64>, f64, ParameterSignal);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.first {
            self.first = false;
        } else {
            let mut i = self.rules.len();
            loop {
                if i == 0 {
                    self.done = true;
                    return None;
                }
                i -= 1;
                self.index[i] += 1;
                if self.index[i] < self.rules[i].nodes.len() {
                    break;
                }
                self.index[i] = 0;
            }
        }
        let point: Vec<f64> = self
            .index
            .iter()
            .zip(&self.rules)
            .map(|(&i, r)| r.nodes[i])
            .collect();
        let weight: f64 = self.sign
            * self
                .index
                .iter()
                .zip(&self.rules)
                .map(|(&i, r)| r.weights[i])
                .product::<f64>();
        Some((point, weight, ParameterSignal::all_changed(self.rules.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_one() {
        let q = SmolyakQuadrature::new(Quadrature1D::GaussHermite, 3, 3);
        let total: f64 = q.iter().map(|(_, w, _)| w).sum();
        assert!((total - 1.0).abs() < 1e-6, "total={total}");
    }

    #[test]
    fn design_level_stays_within_budget() {
        let level = SmolyakQuadrature::design_level_for_evals(Quadrature1D::GaussHermite, 4, 500);
        let q = SmolyakQuadrature::new(Quadrature1D::GaussHermite, 4, level);
        assert!(q.total_evals() <= 500);
    }

    #[test]
    fn agrees_with_product_quadrature_on_low_degree_polynomial() {
        use crate::product::ProductQuadrature;
        let prod = ProductQuadrature::new(Quadrature1D::GaussHermite, 2, 5);
        let smol = SmolyakQuadrature::new(Quadrature1D::GaussHermite, 2, 4);
        let f = |x: &[f64]| (x[0] * x[0] + x[1] * x[1]);
        let prod_val: f64 = prod.iter().map(|(x, w, _)| f(&x) * w).sum();
        let smol_val: f64 = smol.iter().map(|(x, w, _)| f(&x) * w).sum();
        assert!((prod_val - smol_val).abs() < 1e-6);
    }

    /// A non-polynomial (but entire, hence geometrically convergent under
    /// Gauss–Hermite) integrand over a 4-dimensional standard normal: the
    /// full product grid and the sparse Smolyak grid should still agree to
    /// high precision even though neither is exact here, since both
    /// converge to the same `E[prod cos(x_i)]` as the level grows.
    #[test]
    fn product_and_smolyak_agree_on_a_four_dimensional_cosine_product() {
        use crate::product::ProductQuadrature;
        let prod = ProductQuadrature::new(Quadrature1D::GaussHermite, 4, 8);
        let smol = SmolyakQuadrature::new(Quadrature1D::GaussHermite, 4, 7);
        let f = |x: &[f64]| x.iter().map(|&xi| xi.cos()).product::<f64>();
        let prod_val: f64 = prod.iter().map(|(x, w, _)| f(&x) * w).sum();
        let smol_val: f64 = smol.iter().map(|(x, w, _)| f(&x) * w).sum();
        assert!(
            (prod_val - smol_val).abs() < 1e-6,
            "product={prod_val} smolyak={smol_val}"
        );
        // E[cos(Z)] = exp(-1/2) for Z ~ N(0,1), independent across the 4
        // shocks, so the exact value is exp(-1/2)^4 = exp(-2).
        let exact = (-2.0_f64).exp();
        assert!((prod_val - exact).abs() < 1e-6, "product={prod_val} exact={exact}");
    }
}
