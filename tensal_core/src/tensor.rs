// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! Dense tensors for symmetric multilinear forms, in both folded (one
//! column per equivalence class) and unfolded (one column per raw
//! multi-index) storage, threaded through a sealed `Storage` marker so the
//! two representations share code at monomorphisation time rather than via
//! a runtime tag.

use std::marker::PhantomData;

use crate::context::TlContext;
use crate::dims::TensorDimens;
use crate::error::{Result, TensorError};
use crate::linalg::Matrix;
use crate::seq::IntSequence;

mod sealed {
    pub trait Sealed {}
}

/// Marker distinguishing folded from unfolded column layout at the type
/// level (the redesign note's "sealed variant threaded through generic
/// code").
pub trait Storage: sealed::Sealed + Clone + Copy + std::fmt::Debug + 'static {
    const IS_FOLDED: bool;
}

#[derive(Clone, Copy, Debug)]
pub struct Folded;
#[derive(Clone, Copy, Debug)]
pub struct Unfolded;

impl sealed::Sealed for Folded {}
impl sealed::Sealed for Unfolded {}
impl Storage for Folded {
    const IS_FOLDED: bool = true;
}
impl Storage for Unfolded {
    const IS_FOLDED: bool = false;
}

/// A dense tensor of `rows` "β" rows by one column per multi-index in the
/// declared storage.
#[derive(Clone, Debug)]
pub struct Tensor<S: Storage> {
    dims: TensorDimens,
    matrix: Matrix,
    _marker: PhantomData<S>,
}

impl Tensor<Unfolded> {
    pub fn zeros(rows: usize, dims: TensorDimens) -> Self {
        let cols = dims.calc_unfold_max_offset();
        Tensor {
            dims,
            matrix: Matrix::zeros(rows, cols),
            _marker: PhantomData,
        }
    }

    /// Converts to folded storage by projecting each canonical column
    /// through to its (already canonical) raw position. Inverse of
    /// [`Tensor::<Folded>::unfold`] when `self` arose from one.
    pub fn fold(&self, ctx: &TlContext) -> Result<Tensor<Folded>> {
        let mut out = Tensor::<Folded>::zeros(ctx, self.matrix.rows(), self.dims.clone());
        let mut v = IntSequence::zeros(self.dims.dimen());
        loop {
            let canonical = sort_within_groups(&self.dims, &v);
            if canonical == v {
                let raw_off = self.dims.calc_unfold_offset(&v)?;
                let fold_off = self.dims.calc_fold_offset(ctx, &canonical)?;
                for r in 0..self.matrix.rows() {
                    out.matrix.set(r, fold_off, self.matrix.get(r, raw_off));
                }
            }
            if !v.increment_general(self.dims.nvmax()) {
                break;
            }
        }
        Ok(out)
    }

    pub fn get(&self, v: &IntSequence) -> Result<Vec<f64>> {
        let off = self.dims.calc_unfold_offset(v)?;
        Ok((0..self.matrix.rows()).map(|r| self.matrix.get(r, off)).collect())
    }

    pub fn set_col(&mut self, off: usize, col: &[f64]) {
        for (r, &v) in col.iter().enumerate() {
            self.matrix.set(r, off, v);
        }
    }

    pub fn add_col(&mut self, off: usize, col: &[f64]) {
        for (r, &v) in col.iter().enumerate() {
            self.matrix.add_in_place(r, off, v);
        }
    }
}

impl Tensor<Folded> {
    pub fn zeros(ctx: &TlContext, rows: usize, dims: TensorDimens) -> Self {
        let cols = dims.calc_fold_max_offset(ctx);
        Tensor {
            dims,
            matrix: Matrix::zeros(rows, cols),
            _marker: PhantomData,
        }
    }

    /// Converts to unfolded storage by replicating each folded value to
    /// every raw multi-index sharing its canonical representative.
    pub fn unfold(&self, ctx: &TlContext) -> Result<Tensor<Unfolded>> {
        let mut out = Tensor::<Unfolded>::zeros(self.matrix.rows(), self.dims.clone());
        let mut v = IntSequence::zeros(self.dims.dimen());
        loop {
            let canonical = sort_within_groups(&self.dims, &v);
            let fold_off = self.dims.calc_fold_offset(ctx, &canonical)?;
            let raw_off = self.dims.calc_unfold_offset(&v)?;
            for r in 0..self.matrix.rows() {
                out.matrix.set(r, raw_off, self.matrix.get(r, fold_off));
            }
            if !v.increment_general(self.dims.nvmax()) {
                break;
            }
        }
        Ok(out)
    }

    pub fn get(&self, ctx: &TlContext, v: &IntSequence) -> Result<Vec<f64>> {
        let off = self.dims.calc_fold_offset(ctx, v)?;
        Ok((0..self.matrix.rows()).map(|r| self.matrix.get(r, off)).collect())
    }

    pub fn set_col(&mut self, off: usize, col: &[f64]) {
        for (r, &v) in col.iter().enumerate() {
            self.matrix.set(r, off, v);
        }
    }

    pub fn add_col(&mut self, off: usize, col: &[f64]) {
        for (r, &v) in col.iter().enumerate() {
            self.matrix.add_in_place(r, off, v);
        }
    }

    /// Contracts a size-1 group (dimension `group`, which must have group
    /// size 1) against a column vector `c` of length `nv` of that group,
    /// adding the r-row result into `out`'s (dimension-minus-one) folded
    /// tensor. This covers the common case of contracting E_t against a
    /// single future-shock or moment index; contracting a multi-index
    /// group at once is not required by any caller in this solver.
    pub fn contract_and_add(
        &self,
        ctx: &TlContext,
        group: usize,
        out: &mut Tensor<Folded>,
        c: &[f64],
    ) -> Result<()> {
        if self.dims.sym().group_sizes()[group] != 1 {
            return Err(TensorError::PreconditionFailed(
                "contract_and_add only supports contracting a size-1 group".into(),
            ));
        }
        let nv = self.dims.nvs()[group];
        if c.len() != nv {
            return Err(TensorError::PreconditionFailed(format!(
                "contraction vector has length {}, expected {nv}",
                c.len()
            )));
        }
        let reduced_dim = self.dims.dimen() - 1;
        let group_start: usize = self.dims.sym().group_sizes()[..group].iter().sum();

        let mut v = IntSequence::zeros(self.dims.dimen());
        loop {
            let canonical = sort_within_groups(&self.dims, &v);
            if canonical == v {
                let mult = multiplicity(&self.dims, &v);
                let value = self.get(ctx, &v)?;
                let contracted_index = v[group_start];
                let weight = c[contracted_index] * mult as f64;
                if weight != 0.0 {
                    let mut reduced = Vec::with_capacity(reduced_dim);
                    for (i, &x) in v.as_slice().iter().enumerate() {
                        if i != group_start {
                            reduced.push(x);
                        }
                    }
                    let reduced_seq = IntSequence::from_slice(&reduced);
                    // `out`'s dims must describe the reduced symmetry; callers
                    // are responsible for constructing it with one fewer
                    // group-of-size-1 than `self`.
                    let reduced_canonical = sort_within_groups(out.dims(), &reduced_seq);
                    let off = out.dims.calc_fold_offset(ctx, &reduced_canonical)?;
                    for r in 0..value.len() {
                        out.matrix.add_in_place(r, off, weight * value[r]);
                    }
                }
            }
            if !v.increment_general(self.dims.nvmax()) {
                break;
            }
        }
        Ok(())
    }
}

impl<S: Storage> Tensor<S> {
    pub fn rows(&self) -> usize {
        self.matrix.rows()
    }
    pub fn cols(&self) -> usize {
        self.matrix.cols()
    }
    pub fn dims(&self) -> &TensorDimens {
        &self.dims
    }
    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }
    pub fn matrix_mut(&mut self) -> &mut Matrix {
        &mut self.matrix
    }

    /// A copy of `self` with its matrix replaced by `matrix` (which must
    /// share `self`'s column count — row count, i.e. the tensor's "beta"
    /// dimension, is free to differ). Used to build row-restricted views,
    /// e.g. a `g**` sub-block sliced out of a `g` container's tensors.
    pub fn with_matrix(&self, matrix: Matrix) -> Self {
        Tensor {
            dims: self.dims.clone(),
            matrix,
            _marker: PhantomData,
        }
    }
}

/// Sorts the sub-slice of `v` belonging to each symmetry group
/// independently, producing the canonical representative of `v`'s
/// equivalence class.
fn sort_within_groups(dims: &TensorDimens, v: &IntSequence) -> IntSequence {
    let mut out = v.as_slice().to_vec();
    let mut pos = 0;
    for &size in dims.sym().group_sizes() {
        out[pos..pos + size].sort_unstable();
        pos += size;
    }
    IntSequence::from_slice(&out)
}

/// Number of raw (unfolded) multi-indices sharing `v`'s canonical
/// representative: the product, over groups, of the multinomial
/// coefficient `s_g! / prod(run_length!)`.
fn multiplicity(dims: &TensorDimens, v: &IntSequence) -> u128 {
    let mut total = 1u128;
    let mut pos = 0;
    for &size in dims.sym().group_sizes() {
        let slice = &v.as_slice()[pos..pos + size];
        total *= multinomial(slice);
        pos += size;
    }
    total
}

fn multinomial(slice: &[usize]) -> u128 {
    fn fact(n: usize) -> u128 {
        (1..=n as u128).product::<u128>().max(1)
    }
    let mut result = fact(slice.len());
    let mut i = 0;
    while i < slice.len() {
        let mut run = 1;
        while i + run < slice.len() && slice[i + run] == slice[i] {
            run += 1;
        }
        result /= fact(run);
        i += run;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symmetry::Symmetry;

    fn full_dims(nvar: usize, dimen: usize) -> TensorDimens {
        TensorDimens::full(nvar, dimen)
    }

    #[test]
    fn fold_unfold_round_trip() {
        let ctx = TlContext::new();
        let dims = full_dims(3, 2);
        let mut u = Tensor::<Unfolded>::zeros(1, dims);
        // Build a symmetric unfolded tensor: value depends only on the
        // sorted index, as a genuine symmetric tensor would.
        let mut v = IntSequence::zeros(2);
        loop {
            let val = (v[0] + 2 * v[1]) as f64 + (v[1] + 2 * v[0]) as f64;
            let off = u.dims().calc_unfold_offset(&v).unwrap();
            u.set_col(off, &[val]);
            if !v.increment_general(u.dims().nvmax()) {
                break;
            }
        }
        let folded = u.fold(&ctx).unwrap();
        let unfolded_again = folded.unfold(&ctx).unwrap();
        assert_eq!(unfolded_again.matrix().data(), u.matrix().data());

        let refolded = unfolded_again.fold(&ctx).unwrap();
        assert_eq!(refolded.matrix().data(), folded.matrix().data());
    }

    #[test]
    fn folded_column_count_matches_combinations() {
        let ctx = TlContext::new();
        let dims = full_dims(4, 3);
        let t = Tensor::<Folded>::zeros(&ctx, 2, dims);
        assert_eq!(t.cols(), 20);
    }

    #[test]
    fn multiplicity_of_all_distinct_is_factorial() {
        let dims = full_dims(5, 3);
        let v = IntSequence::from_slice(&[0, 1, 2]);
        assert_eq!(multiplicity(&dims, &v), 6);
        let v2 = IntSequence::from_slice(&[1, 1, 1]);
        assert_eq!(multiplicity(&dims, &v2), 1);
    }
}
