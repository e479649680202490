// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

#![forbid(unsafe_code)]

//! Even moments of `u ~ N(0, Sigma)`: all odd moments are zero, and the
//! `2n`-th moment is the sum, over all pairings of `2n` indices into `n`
//! pairs, of the products of the corresponding `Sigma` entries.

use tensal_core::context::TlContext;
use tensal_core::dims::TensorDimens;
use tensal_core::equivalence::EquivalenceSet;
use tensal_core::error::Result;
use tensal_core::linalg::Matrix;
use tensal_core::seq::IntSequence;
use tensal_core::tensor::{Folded, Tensor, Unfolded};

/// Keeps one folded tensor per even dimension `0, 2, 4, ...` up to a
/// configured maximum.
pub struct NormalMoments {
    sigma: Matrix,
    moments: Vec<Option<Tensor<Folded>>>,
}

impl NormalMoments {
    /// Precomputes moments of every even dimension `0..=max_dimen`.
    pub fn new(ctx: &TlContext, sigma: Matrix, max_dimen: usize) -> Result<Self> {
        let mut moments = Vec::with_capacity(max_dimen + 1);
        for d in 0..=max_dimen {
            if d % 2 != 0 {
                moments.push(None);
                continue;
            }
            moments.push(Some(moment_tensor(ctx, &sigma, d)?));
        }
        Ok(NormalMoments { sigma, moments })
    }

    pub fn sigma(&self) -> &Matrix {
        &self.sigma
    }

    /// `moment(d)`: `None` for odd `d` (the moment is identically zero).
    pub fn get(&self, d: usize) -> Option<&Tensor<Folded>> {
        self.moments.get(d).and_then(|m| m.as_ref())
    }
}

/// Builds the fully symmetric, 1-row moment tensor of dimension `d` by
/// first computing the (already index-permutation-invariant) value at
/// every raw unfolded multi-index, then folding — which both produces the
/// canonical storage and gives the symmetry invariant "for free" via
/// [`Tensor::fold`].
fn moment_tensor(ctx: &TlContext, sigma: &Matrix, d: usize) -> Result<Tensor<Folded>> {
    let nvar = sigma.rows();
    let dims = TensorDimens::full(nvar, d);
    let mut unfolded = Tensor::<Unfolded>::zeros(1, dims.clone());
    if d == 0 {
        unfolded.set_col(0, &[1.0]);
        return unfolded.fold(ctx);
    }
    let pairings = EquivalenceSet::all_pairs(d);
    let mut v = IntSequence::zeros(d);
    loop {
        let mut value = 0.0;
        for pairing in &pairings {
            let mut prod = 1.0;
            for pair in pairing.classes() {
                prod *= sigma.get(v[pair[0]], v[pair[1]]);
            }
            value += prod;
        }
        let off = unfolded.dims().calc_unfold_offset(&v)?;
        unfolded.set_col(off, &[value]);
        if !v.increment_general(unfolded.dims().nvmax()) {
            break;
        }
    }
    unfolded.fold(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensal_core::symmetry::Symmetry;

    #[test]
    fn fourth_moment_of_identity_covariance_matches_known_values() {
        let ctx = TlContext::new();
        let sigma = Matrix::identity(2);
        let moments = NormalMoments::new(&ctx, sigma, 4).unwrap();
        let m4 = moments.get(4).unwrap();

        let get = |v: [usize; 4]| -> f64 {
            m4.get(&ctx, &IntSequence::from_slice(&v)).unwrap()[0]
        };
        // Four copies of the same index: value 3 (3 pairings, each contributing 1).
        assert!((get([0, 0, 0, 0]) - 3.0).abs() < 1e-12);
        // Two distinct pairs (i,i,j,j): value 1.
        assert!((get([0, 0, 1, 1]) - 1.0).abs() < 1e-12);
        // Any index touching an off-diagonal combination with an odd split: 0.
        assert!((get([0, 0, 0, 1])).abs() < 1e-12);
    }

    #[test]
    fn odd_moments_are_absent() {
        let ctx = TlContext::new();
        let moments = NormalMoments::new(&ctx, Matrix::identity(2), 3).unwrap();
        assert!(moments.get(1).is_none());
        assert!(moments.get(3).is_none());
        assert!(moments.get(0).is_some());
        assert!(moments.get(2).is_some());
    }

    #[test]
    fn moment_is_symmetric_under_permutation() {
        let ctx = TlContext::new();
        let sigma = Matrix::from_rows(2, 2, vec![2.0, 0.3, 0.3, 1.0]);
        let moments = NormalMoments::new(&ctx, sigma, 4).unwrap();
        let m4 = moments.get(4).unwrap();
        let a = m4
            .get(&ctx, &IntSequence::from_slice(&[0, 0, 1, 1]))
            .unwrap();
        let b = m4
            .get(&ctx, &IntSequence::from_slice(&[0, 1, 0, 1]).sorted())
            .unwrap();
        assert!((a[0] - b[0]).abs() < 1e-12);
        let _ = Symmetry::full(4);
    }
}
