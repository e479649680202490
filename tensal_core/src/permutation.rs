// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! Permutations of tensor index positions, used to move equivalence-induced
//! orderings into canonical order and to convert between the solver's
//! internal (partition-sorted) and external (declaration) variable order.

use crate::equivalence::Equivalence;
use crate::seq::IntSequence;

/// A permutation of `{0, ..., n-1}`, stored as `perm[new_position] =
/// original_position`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Permutation {
    perm: Vec<usize>,
}

impl Permutation {
    pub fn identity(n: usize) -> Self {
        Permutation {
            perm: (0..n).collect(),
        }
    }

    pub fn from_mapping(perm: Vec<usize>) -> Self {
        debug_assert!(Self::is_valid(&perm), "not a permutation of 0..n");
        Permutation { perm }
    }

    fn is_valid(perm: &[usize]) -> bool {
        let mut seen = vec![false; perm.len()];
        for &p in perm {
            if p >= perm.len() || seen[p] {
                return false;
            }
            seen[p] = true;
        }
        true
    }

    pub fn len(&self) -> usize {
        self.perm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.perm.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.perm
    }

    /// The permutation that lays an equivalence's classes out contiguously:
    /// new position `j` holds whichever original index is the `j`-th
    /// element when all classes are concatenated in order.
    pub fn from_equivalence(equiv: &Equivalence) -> Self {
        let perm = equiv.classes().iter().flatten().copied().collect();
        Permutation { perm }
    }

    /// The permutation `p` with `sorted(s)[i] == s[p[i]]`, i.e. applying it
    /// to `s` yields the non-decreasing rearrangement of `s`.
    pub fn sorting_of(s: &IntSequence) -> Self {
        let mut idx: Vec<usize> = (0..s.len()).collect();
        idx.sort_by_key(|&i| s[i]);
        Permutation { perm: idx }
    }

    /// Applies the permutation: `out[i] = v[perm[i]]`.
    pub fn apply(&self, v: &IntSequence) -> IntSequence {
        let data: Vec<usize> = self.perm.iter().map(|&p| v[p]).collect();
        IntSequence::from_slice(&data)
    }

    pub fn inverse(&self) -> Permutation {
        let mut inv = vec![0usize; self.perm.len()];
        for (new_pos, &orig_pos) in self.perm.iter().enumerate() {
            inv[orig_pos] = new_pos;
        }
        Permutation { perm: inv }
    }

    /// `(self ∘ other)[i] = other[self[i]]` — apply `self` first to pick a
    /// position, then `other` to relabel it.
    pub fn compose(&self, other: &Permutation) -> Permutation {
        let perm = self.perm.iter().map(|&p| other.perm[p]).collect();
        Permutation { perm }
    }
}
