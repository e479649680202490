// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! The sparse entry point for Faà di Bruno composition: the outer factor
//! `F_{z^l}` is a [`SparseTensor`] rather than a dense container, which
//! matters when the model's own derivatives are large but overwhelmingly
//! zero (the usual case past first order). Rather than unfolding `F` and
//! running the full Kronecker contraction, this walks `F`'s nonzero
//! entries directly — the "column-wise" loop the dense tensor's
//! [`SparseTensor::mult_column_and_add`] generalises, extended here to the
//! multi-factor stack contraction the dense engine performs.

use std::sync::Mutex;
use std::thread;

use tensal_core::context::TlContext;
use tensal_core::dims::TensorDimens;
use tensal_core::equivalence::{Equivalence, EquivalenceSet};
use tensal_core::error::Result;
use tensal_core::seq::IntSequence;
use tensal_core::sparse::SparseTensor;
use tensal_core::tensor::{Folded, Storage, Tensor};
use tensal_kron::stack::StackContainer;

use crate::{advance_radix, sort_within_groups, stacked_unfolded_matrix};

/// The outer factor's derivatives in sparse form, one entry per order
/// `l = 1..=k`. Mirrors [`crate::OuterDerivatives`] but keeps `F` as
/// triples instead of materialising the unfolded dense tensor, since a
/// sparse outer factor is exactly the case where that materialisation is
/// the thing worth avoiding.
#[derive(Default, Clone)]
pub struct SparseOuterDerivatives {
    by_order: Vec<Option<SparseTensor>>,
}

impl SparseOuterDerivatives {
    pub fn new() -> Self {
        SparseOuterDerivatives::default()
    }

    pub fn set(&mut self, order: usize, tensor: SparseTensor) {
        if self.by_order.len() <= order {
            self.by_order.resize_with(order + 1, || None);
        }
        self.by_order[order] = Some(tensor);
    }

    pub fn order(&self, l: usize) -> Option<&SparseTensor> {
        self.by_order.get(l).and_then(|o| o.as_ref())
    }

    pub fn max_order(&self) -> usize {
        self.by_order.len().saturating_sub(1)
    }
}

/// Sparse counterpart of [`crate::compose`]: dispatches one worker thread
/// per chunk of equivalences, bounded by `max_parallel_threads`, mirroring
/// the dense path's "coarse lock on the output tensor" design. A sparse `F`
/// has few enough nonzero entries that the per-chunk work is lighter than
/// the dense path's, but the solver still runs this at every `(i, j, k)`
/// sub-step of every order, so the same thread cap applies here rather than
/// only to the rarely-used dense engine.
pub fn compose_sparse(
    ctx: &TlContext,
    outer: &SparseOuterDerivatives,
    stack: &StackContainer<Folded>,
    target: &TensorDimens,
    output_rows: usize,
    max_parallel_threads: usize,
) -> Result<Tensor<Folded>> {
    let k = target.dimen();
    let equivalences = EquivalenceSet::all(k);
    let budget = equivalences.len().max(1);
    let threads = max_parallel_threads.max(1).min(budget);
    let out = Mutex::new(Tensor::<Folded>::zeros(ctx, output_rows, target.clone()));

    let chunk_size = budget.div_ceil(threads);
    thread::scope(|scope| -> Result<()> {
        let mut handles = Vec::new();
        for chunk in equivalences.chunks(chunk_size) {
            let out_ref = &out;
            handles.push(scope.spawn(move || -> Result<()> {
                for eq in chunk {
                    compose_sparse_equivalence(ctx, outer, stack, target, eq, out_ref)?;
                }
                Ok(())
            }));
        }
        for h in handles {
            h.join().expect("sparse faa di bruno worker panicked")?;
        }
        Ok(())
    })?;

    Ok(out.into_inner().expect("mutex not poisoned"))
}

/// One equivalence's contribution to `compose_sparse`'s output, scattered
/// into the shared, mutex-guarded output tensor.
fn compose_sparse_equivalence(
    ctx: &TlContext,
    outer: &SparseOuterDerivatives,
    stack: &StackContainer<Folded>,
    target: &TensorDimens,
    eq: &Equivalence,
    out: &Mutex<Tensor<Folded>>,
) -> Result<()> {
    let k = target.dimen();
    let l = eq.num_classes();
    let Some(f_l) = outer.order(l) else { return Ok(()) };
    let induced = target.sym().induced_by_equivalence(eq);
    let mut factors = Vec::with_capacity(l);
    for (class_idx, sym) in induced.iter().enumerate() {
        let class_dims = TensorDimens::new(sym.clone(), target.nvs().clone());
        factors.push((eq.classes()[class_idx].clone(), class_dims));
    }
    let mut matrices = Vec::with_capacity(factors.len());
    for (_, dims) in &factors {
        matrices.push(stacked_unfolded_matrix(ctx, stack, dims)?);
    }
    let cols: Vec<usize> = factors.iter().map(|(_, d)| d.calc_unfold_max_offset()).collect();
    if cols.iter().any(|&c| c == 0) {
        return Ok(());
    }

    for entry in f_l.entries() {
        for perm in distinct_permutations(entry.key.as_slice()) {
            let mut w = vec![0usize; l];
            loop {
                let mut v = vec![0usize; k];
                let mut prod = entry.value;
                for (m, (positions, dims)) in factors.iter().enumerate() {
                    let col_local = crate::unfold_local_index(w[m], dims);
                    prod *= matrices[m].get(perm[m], w[m]);
                    for (pos_in_class, &orig_pos) in positions.iter().enumerate() {
                        v[orig_pos] = col_local[pos_in_class];
                    }
                }
                if prod != 0.0 {
                    let v_seq = IntSequence::from_slice(&v);
                    let canonical = sort_within_groups(target, &v_seq);
                    let fold_off = target.calc_fold_offset(ctx, &canonical)?;
                    let mut guard = out.lock().expect("mutex not poisoned");
                    guard.matrix_mut().add_in_place(entry.row, fold_off, prod);
                    drop(guard);
                }
                if !advance_radix(&mut w, &cols) {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Every distinct assignment of `key`'s (possibly repeated) values to `key.len()`
/// ordered slots — the sparse analogue of unfolding a canonical, sorted
/// multi-index into every raw tuple that shares it.
fn distinct_permutations(key: &[usize]) -> Vec<Vec<usize>> {
    let mut sorted = key.to_vec();
    sorted.sort_unstable();
    let mut results = Vec::new();
    let mut current = Vec::with_capacity(sorted.len());
    let mut used = vec![false; sorted.len()];
    permute_rec(&sorted, &mut used, &mut current, &mut results);
    results
}

fn permute_rec(
    sorted: &[usize],
    used: &mut [bool],
    current: &mut Vec<usize>,
    results: &mut Vec<Vec<usize>>,
) {
    if current.len() == sorted.len() {
        results.push(current.clone());
        return;
    }
    for i in 0..sorted.len() {
        if used[i] {
            continue;
        }
        if i > 0 && sorted[i] == sorted[i - 1] && !used[i - 1] {
            continue;
        }
        used[i] = true;
        current.push(sorted[i]);
        permute_rec(sorted, used, current, results);
        current.pop();
        used[i] = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensal_kron::stack::StackMember;

    #[test]
    fn distinct_permutations_dedupes_repeated_values() {
        let perms = distinct_permutations(&[1, 1, 2]);
        assert_eq!(perms.len(), 3);
    }

    /// f(z) = z^2 (scalar), F_{z^2} given as a one-entry sparse tensor.
    /// Expect the same result as the dense `compose` test for the same
    /// scenario: the composed second derivative w.r.t. y equals 2.
    #[test]
    fn sparse_scalar_square_matches_dense_hand_derivative() {
        let ctx = TlContext::new();
        let mut outer = SparseOuterDerivatives::new();
        let mut f2 = SparseTensor::new(1, 2);
        f2.insert(0, IntSequence::from_slice(&[0, 0]), 2.0);
        outer.set(2, f2);

        let member = StackMember::<Folded>::Unit { coordinate: 0, width: 1 };
        let stack = StackContainer::new(vec![member]);
        let target = TensorDimens::full(1, 2);
        let result = compose_sparse(&ctx, &outer, &stack, &target, 1, 2).unwrap();
        let v = IntSequence::from_slice(&[0, 0]);
        let value = result.get(&ctx, &v).unwrap();
        assert!((value[0] - 2.0).abs() < 1e-10);
    }
}
