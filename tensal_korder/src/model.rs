// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! The solver's inputs: the model's partition into state types, its sparse
//! derivatives `f_{z^l}`, and the externally-supplied first-order decision
//! rule (`g_y`, `g_u`) the k-order recursion builds on top of. None of this
//! is derived here — a Blanchard–Kahn/QZ first-order solver is a Non-goal,
//! same as a `.mod` parser.

use tensal_core::linalg::Matrix;
use tensal_core::sparse::SparseTensor;
use tensal_faa::sparse_faa::SparseOuterDerivatives;

use crate::error::{Result, SolverError};

/// `(nstat, npred, nboth, nforw)`: the four structural classes of
/// endogenous variables. `y* = npred + nboth` is the predetermined state;
/// `y** = nboth + nforw` is the subset whose future value the model
/// constrains (the "forward-looking" block).
#[derive(Clone, Copy, Debug)]
pub struct ModelPartition {
    pub nstat: usize,
    pub npred: usize,
    pub nboth: usize,
    pub nforw: usize,
}

impl ModelPartition {
    pub fn ny(&self) -> usize {
        self.nstat + self.npred + self.nboth + self.nforw
    }

    pub fn nys(&self) -> usize {
        self.npred + self.nboth
    }

    pub fn nyss(&self) -> usize {
        self.nboth + self.nforw
    }
}

/// The four blocks of the stacked argument `z = (y**_{t+1}, y_t, y*_{t-1},
/// u_t)` that `f`'s sparse derivatives are indexed over, in stacking order.
#[derive(Clone, Copy, Debug)]
pub struct StackLayout {
    pub nyss: usize,
    pub ny: usize,
    pub nys: usize,
    pub nu: usize,
}

impl StackLayout {
    pub fn sizes(&self) -> [usize; 4] {
        [self.nyss, self.ny, self.nys, self.nu]
    }

    pub fn total(&self) -> usize {
        self.sizes().iter().sum()
    }
}

#[derive(Clone)]
pub struct ModelDerivatives {
    pub partition: ModelPartition,
    pub layout: StackLayout,
    pub nu: usize,
    /// `f_{z^l}`, sparse, `l = 1..=k`.
    pub f: SparseOuterDerivatives,
    /// First-order decision rule seeding the recursion: `ny x nys` and
    /// `ny x nu`.
    pub g_y: Matrix,
    pub g_u: Matrix,
    /// Shock covariance `Sigma`, `nu x nu`.
    pub sigma: Matrix,
}

impl ModelDerivatives {
    /// Slices `f`'s first-order (dimension-1) sparse tensor into the dense
    /// `ny x block_width` matrix of `f`'s partial derivative with respect
    /// to one of the four `z` blocks — the `f_y`, `f_{y^{**}_+}`, and so on
    /// blocks the pre-factored `A`/`S`/`B` matrices are built from.
    pub fn first_order_block(&self, block: usize) -> Result<Matrix> {
        let f1 = self
            .f
            .order(1)
            .ok_or_else(|| SolverError::Precondition("f has no first-order term".into()))?;
        let sizes = self.layout.sizes();
        if block >= sizes.len() {
            return Err(SolverError::Precondition(format!(
                "block index {block} out of range for a 4-block stack"
            )));
        }
        let width = sizes[block];
        let mut coor = vec![0usize; sizes.len()];
        coor[block] = 1;
        let sliced: SparseTensor = f1.slice(&sizes, &coor);
        let offset: usize = sizes[..block].iter().sum();
        let mut out = Matrix::zeros(self.partition.ny(), width);
        for entry in sliced.entries() {
            let global_col = entry.key.as_slice()[0];
            out.set(entry.row, global_col - offset, entry.value);
        }
        Ok(out)
    }

}
