// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! Computes `B · (A_1 ⊗ A_2 ⊗ ... ⊗ A_n)` without ever materialising the
//! full Kronecker product, by factoring it into a sequence of
//! `B · (A_1 ⊗ I) · (I ⊗ A_2 ⊗ I) · ... · (I ⊗ A_n)` steps, each applied as
//! a block-wise matrix multiply.

use tensal_core::error::{Result, TensorError};
use tensal_core::linalg::Matrix;

/// An implicit Kronecker product `A_1 ⊗ ... ⊗ A_n`, never materialised.
pub struct KronProdAll {
    factors: Vec<Matrix>,
}

impl KronProdAll {
    pub fn new(factors: Vec<Matrix>) -> Self {
        KronProdAll { factors }
    }

    pub fn num_factors(&self) -> usize {
        self.factors.len()
    }

    pub fn row_dim(&self) -> usize {
        self.factors.iter().map(|m| m.rows()).product()
    }

    pub fn col_dim(&self) -> usize {
        self.factors.iter().map(|m| m.cols()).product()
    }

    /// Materialises the full product. Only used by tests validating
    /// [`Self::mult`] against the naive definition — production call-sites
    /// always go through `mult`, which never forms this matrix.
    pub fn materialize(&self) -> Matrix {
        let mut acc = self.factors[0].clone();
        for f in &self.factors[1..] {
            acc = acc.kron(f);
        }
        acc
    }

    /// `B · (A_1 ⊗ ... ⊗ A_n)`, computed by repeatedly contracting one
    /// factor at a time against the growing intermediate result: each step
    /// multiplies by `I_{left} ⊗ A_i ⊗ I_{right}`, which in row/column
    /// space amounts to reshaping the current result and right-multiplying
    /// each "row block" by `A_i`.
    pub fn mult(&self, b: &Matrix) -> Result<Matrix> {
        if b.cols() != self.row_dim() {
            return Err(TensorError::PreconditionFailed(format!(
                "B has {} columns, product has row dimension {}",
                b.cols(),
                self.row_dim()
            )));
        }
        let mut cur = b.clone();
        // `right` = product of the column counts of factors not yet applied;
        // `left` = product of the row counts of factors already applied
        // (since applied factors shrink their axis from cols(A_i) to
        // rows(A_i) as we sweep left to right).
        let mut right: usize = self.factors[1..].iter().map(|m| m.rows()).product();
        for (idx, a) in self.factors.iter().enumerate() {
            let left_dim = cur.cols() / (a.cols() * right);
            cur = apply_middle_factor(&cur, left_dim, a, right)?;
            if idx + 1 < self.factors.len() {
                right /= self.factors[idx + 1].rows();
            }
        }
        Ok(cur)
    }
}

/// Right-multiplies `cur` (shape `rows x (left*mid_in*right)`) by
/// `I_left ⊗ A ⊗ I_right`, producing shape `rows x (left*mid_out*right)`.
fn apply_middle_factor(cur: &Matrix, left: usize, a: &Matrix, right: usize) -> Result<Matrix> {
    let mid_in = a.rows();
    let mid_out = a.cols();
    if cur.cols() != left * mid_in * right {
        return Err(TensorError::PreconditionFailed(format!(
            "shape mismatch applying Kronecker factor: {} != {left}*{mid_in}*{right}",
            cur.cols()
        )));
    }
    let mut out = Matrix::zeros(cur.rows(), left * mid_out * right);
    for row in 0..cur.rows() {
        for l in 0..left {
            for m_in in 0..mid_in {
                for r in 0..right {
                    let in_col = (l * mid_in + m_in) * right + r;
                    let v = cur.get(row, in_col);
                    if v == 0.0 {
                        continue;
                    }
                    for m_out in 0..mid_out {
                        let out_col = (l * mid_out + m_out) * right + r;
                        out.add_in_place(row, out_col, v * a.get(m_in, m_out));
                    }
                }
            }
        }
    }
    Ok(out)
}

/// Near-optimal factor ordering (`KronProdAllOptim`): permute factors so
/// the intermediate sizes are minimised, using the single explicit cost
/// function this rewrite commits to — total intermediate element count —
/// approximated, as in the original, by sorting factors by the ratio
/// `rows/cols` descending (factors that shrink the running dimension the
/// most go first).
pub fn optimal_order(factors: &[Matrix]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..factors.len()).collect();
    idx.sort_by(|&a, &b| {
        let ra = factors[a].rows() as f64 / factors[a].cols() as f64;
        let rb = factors[b].rows() as f64 / factors[b].cols() as f64;
        rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal)
    });
    idx
}
