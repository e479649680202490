// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! Dimensions of a general-symmetry tensor: per-group variable counts plus
//! the symmetry itself, with folded/unfolded column-count and offset
//! arithmetic.

use crate::context::TlContext;
use crate::error::{Result, TensorError};
use crate::seq::IntSequence;
use crate::symmetry::Symmetry;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TensorDimens {
    nvs: IntSequence,
    sym: Symmetry,
    nvmax: IntSequence,
}

impl TensorDimens {
    pub fn new(sym: Symmetry, nvs: IntSequence) -> Self {
        let nvmax = sym.expand_nvmax(&nvs);
        TensorDimens { nvs, sym, nvmax }
    }

    /// A single fully-symmetric group of `dimen` indices over `nvar`
    /// variables.
    pub fn full(nvar: usize, dimen: usize) -> Self {
        Self::new(Symmetry::full(dimen), IntSequence::from_slice(&[nvar]))
    }

    pub fn dimen(&self) -> usize {
        self.sym.dimen()
    }

    pub fn nvx(&self, i: usize) -> usize {
        self.nvmax[i]
    }

    pub fn nvs(&self) -> &IntSequence {
        &self.nvs
    }

    pub fn nvmax(&self) -> &IntSequence {
        &self.nvmax
    }

    pub fn sym(&self) -> &Symmetry {
        &self.sym
    }

    pub fn calc_unfold_max_offset(&self) -> usize {
        self.nvmax.product()
    }

    fn group_fold_count(&self, ctx: &TlContext, group: usize) -> usize {
        let nv = self.nvs[group];
        let s = self.sym.group_sizes()[group];
        if s == 0 {
            return 1;
        }
        ctx.pascal().noverk(nv + s - 1, s) as usize
    }

    pub fn calc_fold_max_offset(&self, ctx: &TlContext) -> usize {
        (0..self.sym.num_groups())
            .map(|g| self.group_fold_count(ctx, g))
            .product()
    }

    /// Offset of the canonical (within-group non-decreasing) multi-index
    /// `v` in folded storage: composes, per group, the Pascal-triangle
    /// recursion of `FTensor::getOffsetRecurse`, then combines the groups
    /// mixed-radix (last group fastest), since groups are not symmetric
    /// with each other.
    pub fn calc_fold_offset(&self, ctx: &TlContext, v: &IntSequence) -> Result<usize> {
        if v.len() != self.dimen() {
            return Err(TensorError::PreconditionFailed(format!(
                "index of length {} does not match tensor dimension {}",
                v.len(),
                self.dimen()
            )));
        }
        let mut offset = 0usize;
        let mut pos = 0usize;
        for (g, &size) in self.sym.group_sizes().iter().enumerate() {
            let slice = v.subsequence(pos, size);
            if !slice.is_sorted_nondecreasing() {
                return Err(TensorError::PreconditionFailed(format!(
                    "group {g} of index {v:?} is not canonical (non-decreasing)"
                )));
            }
            let local = offset_recurse(ctx, slice.as_slice(), self.nvs[g]);
            offset = offset * self.group_fold_count(ctx, g) + local;
            pos += size;
        }
        Ok(offset)
    }

    pub fn calc_unfold_offset(&self, v: &IntSequence) -> Result<usize> {
        if v.len() != self.dimen() {
            return Err(TensorError::PreconditionFailed(format!(
                "index of length {} does not match tensor dimension {}",
                v.len(),
                self.dimen()
            )));
        }
        Ok(v.offset_general_unfolded(&self.nvmax))
    }
}

/// `FTensor::getOffsetRecurse`: offset of a non-decreasing index `v` (radix
/// `nv`) within one fully-symmetric group, via
/// `offset(v,n) = C(n+k-1,k) - C(n-m+k-1,k) + offset(v[prefix..]-m, n-m)`.
fn offset_recurse(ctx: &TlContext, v: &[usize], nv: usize) -> usize {
    if v.is_empty() {
        return 0;
    }
    let prefix = v.iter().take_while(|&&x| x == v[0]).count();
    let m = v[0];
    let k = v.len();
    let s1 = ctx.pascal().noverk(nv + k - 1, k) - ctx.pascal().noverk(nv - m + k - 1, k);
    let subv: Vec<usize> = v[prefix..].iter().map(|&x| x - m).collect();
    let s2 = offset_recurse(ctx, &subv, nv - m);
    s1 as usize + s2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symmetry::Symmetry;

    #[test]
    fn fold_max_offset_matches_combinations_with_repetition() {
        let ctx = TlContext::new();
        let td = TensorDimens::full(4, 3);
        // C(4+3-1,3) = C(6,3) = 20
        assert_eq!(td.calc_fold_max_offset(&ctx), 20);
        assert_eq!(td.calc_unfold_max_offset(), 64);
    }

    #[test]
    fn fold_offset_of_all_zero_and_all_max_are_extremes() {
        let ctx = TlContext::new();
        let td = TensorDimens::full(4, 3);
        let zero = IntSequence::zeros(3);
        assert_eq!(td.calc_fold_offset(&ctx, &zero).unwrap(), 0);
        let last = IntSequence::from_slice(&[3, 3, 3]);
        assert_eq!(td.calc_fold_offset(&ctx, &last).unwrap(), 19);
    }

    #[test]
    fn general_symmetry_is_mixed_radix_across_groups() {
        let ctx = TlContext::new();
        let td = TensorDimens::new(Symmetry::new(vec![2, 1]), IntSequence::from_slice(&[3, 2]));
        // group 0: C(3+2-1,2)=6 folded columns, group 1: C(2+1-1,1)=2.
        assert_eq!(td.calc_fold_max_offset(&ctx), 12);
    }
}
