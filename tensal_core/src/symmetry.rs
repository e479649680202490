// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! A `Symmetry` is a composition `(s_1, ..., s_g)` of non-negative integers:
//! the tensor it describes is symmetric within each group of `s_i`
//! consecutive indices, but not across groups.

use crate::equivalence::Equivalence;
use crate::seq::IntSequence;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Symmetry {
    groups: Vec<usize>,
}

impl Symmetry {
    pub fn new(groups: Vec<usize>) -> Self {
        Symmetry { groups }
    }

    /// The fully symmetric tensor of dimension `d` over a single group.
    pub fn full(d: usize) -> Self {
        Symmetry { groups: vec![d] }
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn group_sizes(&self) -> &[usize] {
        &self.groups
    }

    /// `d = sum(s_i)`, the total dimension of the symmetry.
    pub fn dimen(&self) -> usize {
        self.groups.iter().sum()
    }

    /// True if at most one group is non-zero, i.e. the tensor is fully
    /// symmetric in all its (non-trivial) indices.
    pub fn is_full(&self) -> bool {
        self.groups.iter().filter(|&&s| s != 0).count() <= 1
    }

    /// The group `g` that flat position `i` (0-based, across all groups)
    /// belongs to.
    pub fn find_class(&self, i: usize) -> usize {
        let mut acc = 0;
        for (g, &size) in self.groups.iter().enumerate() {
            acc += size;
            if i < acc {
                return g;
            }
        }
        panic!("index {i} exceeds symmetry dimension {}", self.dimen());
    }

    /// `InducedSymmetries(e, s)`: one symmetry per equivalence class of `e`,
    /// each entry being the sum over that class's members of `s`'s
    /// contribution at that position (i.e. how many of the positions that
    /// collapsed into this equivalence class belonged to each original
    /// group).
    pub fn induced_by_equivalence(&self, equiv: &Equivalence) -> Vec<Symmetry> {
        equiv
            .classes()
            .iter()
            .map(|class| {
                let mut groups = vec![0usize; self.groups.len()];
                for &idx in class {
                    groups[self.find_class(idx)] += 1;
                }
                Symmetry::new(groups)
            })
            .collect()
    }

    /// `nvmax`: expand `nvs` (one variable count per group) into one entry
    /// per flat position, according to this symmetry's group sizes.
    pub fn expand_nvmax(&self, nvs: &IntSequence) -> IntSequence {
        let mut out = Vec::with_capacity(self.dimen());
        for (g, &size) in self.groups.iter().enumerate() {
            for _ in 0..size {
                out.push(nvs[g]);
            }
        }
        IntSequence::from_slice(&out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_class_maps_positions_to_groups() {
        let s = Symmetry::new(vec![2, 3]);
        assert_eq!(s.find_class(0), 0);
        assert_eq!(s.find_class(1), 0);
        assert_eq!(s.find_class(2), 1);
        assert_eq!(s.find_class(4), 1);
    }

    #[test]
    fn full_detects_single_nonzero_group() {
        assert!(Symmetry::full(3).is_full());
        assert!(!Symmetry::new(vec![2, 1]).is_full());
        assert!(Symmetry::new(vec![0, 4, 0]).is_full());
    }

    #[test]
    fn expand_nvmax_repeats_per_group() {
        let s = Symmetry::new(vec![2, 1]);
        let nvs = IntSequence::from_slice(&[10, 5]);
        assert_eq!(s.expand_nvmax(&nvs), IntSequence::from_slice(&[10, 10, 5]));
    }
}
