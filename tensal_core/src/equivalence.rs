// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! Ordered set partitions ("equivalences") of `{0, ..., n-1}`, used to
//! enumerate Faà di Bruno terms and, restricted to all-pairs partitions,
//! Gaussian moment pairings.

/// An ordered partition of `{0, ..., n-1}` into non-empty classes. Each
/// class is stored as an increasing sequence of indices; classes are
/// ordered by their first (smallest) element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Equivalence {
    classes: Vec<Vec<usize>>,
}

impl Equivalence {
    pub fn new(mut classes: Vec<Vec<usize>>) -> Self {
        for class in &mut classes {
            class.sort_unstable();
        }
        classes.sort_by_key(|c| c[0]);
        Equivalence { classes }
    }

    pub fn classes(&self) -> &[Vec<usize>] {
        &self.classes
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// True when every class has exactly `size` elements (the "all-pairs"
    /// restriction used by normal moments is `size == 2`).
    pub fn all_classes_of_size(&self, size: usize) -> bool {
        self.classes.iter().all(|c| c.len() == size)
    }
}

/// Enumerates every ordered set partition of `{0, ..., n-1}` exactly once
/// (there are `Bell(n)` of them), via the standard restricted-growth-string
/// recursion.
pub struct EquivalenceSet;

impl EquivalenceSet {
    pub fn all(n: usize) -> Vec<Equivalence> {
        if n == 0 {
            return vec![Equivalence::new(Vec::new())];
        }
        let mut out = Vec::new();
        let mut rgs = vec![0usize; n];
        Self::grow(&mut rgs, 1, n, &mut out);
        out
    }

    fn grow(rgs: &mut [usize], pos: usize, n: usize, out: &mut Vec<Equivalence>) {
        if pos == n {
            out.push(Self::from_rgs(rgs));
            return;
        }
        let max_so_far = rgs[..pos].iter().copied().max().unwrap_or(0);
        for class in 0..=max_so_far + 1 {
            rgs[pos] = class;
            Self::grow(rgs, pos + 1, n, out);
        }
    }

    fn from_rgs(rgs: &[usize]) -> Equivalence {
        let num_classes = rgs.iter().max().map(|m| m + 1).unwrap_or(0);
        let mut classes = vec![Vec::new(); num_classes];
        for (i, &c) in rgs.iter().enumerate() {
            classes[c].push(i);
        }
        Equivalence::new(classes)
    }

    /// Enumerates only the perfect-matching partitions of `{0, ..., n-1}`
    /// (every class has exactly two elements); `n` must be even. There are
    /// `(n-1)!!` of them, far fewer than `Bell(n)`, which is what makes the
    /// normal-moment computation tractable at the orders this solver uses.
    pub fn all_pairs(n: usize) -> Vec<Equivalence> {
        assert!(n % 2 == 0, "all-pairs equivalence requires an even count");
        if n == 0 {
            return vec![Equivalence::new(Vec::new())];
        }
        let mut out = Vec::new();
        let remaining: Vec<usize> = (0..n).collect();
        Self::pair_up(&remaining, &mut Vec::new(), &mut out);
        out
    }

    fn pair_up(remaining: &[usize], acc: &mut Vec<Vec<usize>>, out: &mut Vec<Equivalence>) {
        if remaining.is_empty() {
            out.push(Equivalence::new(acc.clone()));
            return;
        }
        let first = remaining[0];
        for (k, &partner) in remaining.iter().enumerate().skip(1) {
            let mut rest: Vec<usize> = remaining[1..].to_vec();
            rest.remove(k - 1);
            acc.push(vec![first, partner]);
            Self::pair_up(&rest, acc, out);
            acc.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bell_numbers() {
        assert_eq!(EquivalenceSet::all(0).len(), 1);
        assert_eq!(EquivalenceSet::all(1).len(), 1);
        assert_eq!(EquivalenceSet::all(2).len(), 2);
        assert_eq!(EquivalenceSet::all(3).len(), 5);
        assert_eq!(EquivalenceSet::all(4).len(), 15);
    }

    #[test]
    fn double_factorial_pairings() {
        assert_eq!(EquivalenceSet::all_pairs(2).len(), 1);
        assert_eq!(EquivalenceSet::all_pairs(4).len(), 3);
        assert_eq!(EquivalenceSet::all_pairs(6).len(), 15);
        for eq in EquivalenceSet::all_pairs(6) {
            assert!(eq.all_classes_of_size(2));
        }
    }

    #[test]
    fn classes_are_ordered_and_sorted() {
        let eqs = EquivalenceSet::all(3);
        for eq in eqs {
            let firsts: Vec<usize> = eq.classes().iter().map(|c| c[0]).collect();
            assert!(firsts.windows(2).all(|w| w[0] < w[1]));
            for c in eq.classes() {
                assert!(c.windows(2).all(|w| w[0] < w[1]));
            }
        }
    }
}
