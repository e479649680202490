// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! `StackContainer` represents the stacked argument `z = [z_1; ...; z_n]`
//! of the outer function being differentiated. Each member is classified,
//! per symmetry, as holding a real derivative (`Matrix`), as structurally
//! `Zero`, or as `Unit` (the member is itself one of the raw stacked
//! variables, so its first derivative is a one-hot row and every higher
//! derivative vanishes).

use tensal_core::context::TlContext;
use tensal_core::dims::TensorDimens;
use tensal_core::error::Result;
use tensal_core::linalg::Matrix;
use tensal_core::symmetry::Symmetry;
use tensal_core::tensor::{Folded, Storage, Tensor, Unfolded};

pub enum StackEntry<'a, S: Storage> {
    Matrix(&'a Tensor<S>),
    Zero,
    Unit { coordinate: usize },
}

pub enum StackMember<S: Storage> {
    /// A real function of (y*, u, u', sigma) with derivatives stored per
    /// symmetry, e.g. `g**`, `g`, or the model's own `f`.
    Explicit(tensal_core::container::Container<S>),
    /// A raw stacked variable (`y`, `u`, ...): first derivative is a
    /// one-hot row at `coordinate`, everything past order 1 is zero.
    Unit { coordinate: usize, width: usize },
}

impl<S: Storage> StackMember<S> {
    pub fn row_size(&self) -> usize {
        match self {
            StackMember::Explicit(c) => c
                .iter()
                .next()
                .map(|(_, t)| t.rows())
                .unwrap_or(0),
            StackMember::Unit { width, .. } => *width,
        }
    }
}

pub struct StackContainer<S: Storage> {
    members: Vec<StackMember<S>>,
}

impl<S: Storage> StackContainer<S> {
    pub fn new(members: Vec<StackMember<S>>) -> Self {
        StackContainer { members }
    }

    pub fn num_members(&self) -> usize {
        self.members.len()
    }

    pub fn stack_sizes(&self) -> Vec<usize> {
        self.members.iter().map(|m| m.row_size()).collect()
    }

    pub fn total_rows(&self) -> usize {
        self.stack_sizes().iter().sum()
    }

    pub fn classify(&self, member: usize, sym: &Symmetry) -> StackEntry<'_, S> {
        match &self.members[member] {
            StackMember::Explicit(c) => {
                if c.check(sym) {
                    StackEntry::Matrix(c.get(sym).expect("checked present"))
                } else {
                    StackEntry::Zero
                }
            }
            StackMember::Unit { coordinate, .. } => {
                if sym.dimen() == 1 {
                    StackEntry::Unit {
                        coordinate: *coordinate,
                    }
                } else {
                    StackEntry::Zero
                }
            }
        }
    }

    /// The derivative matrix for `member` at `sym`, synthesising the unit
    /// row for `Unit` members and `None` for structural zeros.
    pub fn matrix_for(&self, member: usize, sym: &Symmetry, width: usize) -> Option<Matrix> {
        match self.classify(member, sym) {
            StackEntry::Matrix(t) => Some(t.matrix().clone()),
            StackEntry::Zero => None,
            StackEntry::Unit { coordinate } => {
                let mut m = Matrix::zeros(width, 1);
                m.set(coordinate, 0, 1.0);
                Some(m)
            }
        }
    }
}

impl StackContainer<Folded> {
    /// Like [`StackContainer::matrix_for`], but unfolds an `Explicit`
    /// member's tensor first so the result's columns are raw (unfolded)
    /// multi-indices of `dims` — the layout the Kronecker contraction in
    /// `tensal_faa` needs its factor matrices in.
    pub fn unfolded_matrix_for(
        &self,
        ctx: &TlContext,
        member: usize,
        dims: &TensorDimens,
    ) -> Result<Option<Matrix>> {
        match self.classify(member, dims.sym()) {
            StackEntry::Matrix(t) => Ok(Some(t.unfold(ctx)?.matrix().clone())),
            StackEntry::Zero => Ok(None),
            StackEntry::Unit { coordinate } => {
                let width = dims.nvx(0);
                let mut m = Matrix::zeros(width, 1);
                m.set(coordinate, 0, 1.0);
                Ok(Some(m))
            }
        }
    }
}

pub type FoldedStackContainer = StackContainer<Folded>;
pub type UnfoldedStackContainer = StackContainer<Unfolded>;

/// Builds an explicit member whose tensor of order 1 is the identity over
/// `width` rows and whose higher orders are implicitly zero — the folded
/// realisation of a raw stacked variable, when a concrete `Tensor` (rather
/// than the lighter-weight `Unit` classification) is needed by a caller.
pub fn identity_member(ctx: &TlContext, width: usize) -> StackMember<Folded> {
    let dims = TensorDimens::full(width, 1);
    let mut t = Tensor::<Folded>::zeros(ctx, width, dims);
    for i in 0..width {
        t.set_col(i, &{
            let mut col = vec![0.0; width];
            col[i] = 1.0;
            col
        });
    }
    let mut c = tensal_core::container::Container::new();
    c.insert(Symmetry::full(1), t);
    StackMember::Explicit(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_member_classifies_order_one_as_unit_and_higher_as_zero() {
        let member = StackMember::<Folded>::Unit {
            coordinate: 2,
            width: 5,
        };
        let stack = StackContainer::new(vec![member]);
        assert!(matches!(
            stack.classify(0, &Symmetry::full(1)),
            StackEntry::Unit { coordinate: 2 }
        ));
        assert!(matches!(
            stack.classify(0, &Symmetry::full(2)),
            StackEntry::Zero
        ));
    }
}
