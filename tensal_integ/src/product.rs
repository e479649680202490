// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! Tensor (full Cartesian) product quadrature: the same 1-D level applied
//! independently in each of `d` dimensions, iterated in odometer order so
//! that only the fastest-moving dimension's node changes between
//! consecutive points.

use crate::{OneDRule, ParameterSignal, Quadrature1D};

pub struct ProductQuadrature {
    dim: usize,
    rule: OneDRule,
    level: usize,
}

impl ProductQuadrature {
    pub fn new(kind: Quadrature1D, dim: usize, level: usize) -> Self {
        ProductQuadrature {
            dim,
            rule: kind.rule(level),
            level,
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn num_points(&self) -> usize {
        self.rule.nodes.len().pow(self.dim as u32)
    }

    /// Highest level whose full grid (`level^dim` points) stays within
    /// `max_evals`, i.e. the largest `level` with `level^dim <= max_evals`.
    pub fn design_level_for_evals(dim: usize, max_evals: usize) -> usize {
        let mut level = 1;
        loop {
            let next = level + 1;
            let points = (next as u128).pow(dim as u32);
            if points > max_evals as u128 {
                return level;
            }
            level = next;
        }
    }

    /// Iterates every grid point `(multi-index, point, weight, signal)` in
    /// odometer order (last dimension fastest).
    pub fn iter(&self) -> ProductIter<'_> {
        ProductIter {
            quad: self,
            index: vec![0; self.dim],
            first: true,
            done: self.dim == 0 && false,
        }
    }
}

pub struct ProductIter<'a> {
    quad: &'a ProductQuadrature,
    index: Vec<usize>,
    first: bool,
    done: bool,
}

impl<'a> Iterator for ProductIter<'a> {
    type Item = (Vec<f64>, f64, ParameterSignal);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let n = self.quad.rule.nodes.len();
        // `carry_from`: the leftmost position whose node changed this step
        // (everything from here to the end of the index is "changed";
        // positions to its left kept the same node as the previous point).
        let carry_from;
        if self.first {
            self.first = false;
            carry_from = 0;
        } else {
            let mut i = self.quad.dim;
            loop {
                if i == 0 {
                    self.done = true;
                    return None;
                }
                i -= 1;
                self.index[i] += 1;
                if self.index[i] < n {
                    break;
                }
                self.index[i] = 0;
            }
            carry_from = i;
        }
        let mut signal = vec![false; self.quad.dim];
        for s in signal.iter_mut().skip(carry_from) {
            *s = true;
        }

        let point: Vec<f64> = self.index.iter().map(|&i| self.quad.rule.nodes[i]).collect();
        let weight: f64 = self.index.iter().map(|&i| self.quad.rule.weights[i]).product();
        Some((point, weight, ParameterSignal(signal)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_one_for_hermite_product() {
        let q = ProductQuadrature::new(Quadrature1D::GaussHermite, 2, 4);
        let total: f64 = q.iter().map(|(_, w, _)| w).sum();
        assert!((total - 1.0).abs() < 1e-8);
        assert_eq!(q.iter().count(), q.num_points());
    }

    #[test]
    fn design_level_respects_budget() {
        let level = ProductQuadrature::design_level_for_evals(3, 100);
        assert!(level.pow(3) <= 100);
        assert!((level + 1).pow(3) > 100);
    }

    #[test]
    fn integrates_quadratic_exactly_in_one_dimension() {
        let q = ProductQuadrature::new(Quadrature1D::GaussHermite, 1, 3);
        let second_moment: f64 = q.iter().map(|(x, w, _)| x[0] * x[0] * w).sum();
        assert!((second_moment - 1.0).abs() < 1e-8);
    }
}
