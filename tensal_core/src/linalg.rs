// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! The small amount of dense linear algebra the solver needs on top of the
//! tensor machinery: PLU factorization/solve for the pre-factored `A`, `S`,
//! `B` matrices, a generalized-Sylvester solve for the pure-state
//! derivatives, and a Cholesky factor for the shock covariance. A full
//! BLAS/LAPACK binding and a general Sylvester solver are assumed supplied
//! by the host application (see the crate's Non-goals); this module covers
//! only what the solver itself cannot do without.

use crate::error::{Result, TensorError};

/// A dense, row-major matrix of `f64`.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Matrix::zeros(n, n);
        for i in 0..n {
            m.set(i, i, 1.0);
        }
        m
    }

    pub fn from_rows(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        assert_eq!(data.len(), rows * cols);
        Matrix { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.data[r * self.cols + c]
    }

    pub fn set(&mut self, r: usize, c: usize, v: f64) {
        self.data[r * self.cols + c] = v;
    }

    pub fn add_in_place(&mut self, r: usize, c: usize, v: f64) {
        self.data[r * self.cols + c] += v;
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn column(&self, c: usize) -> Vec<f64> {
        (0..self.rows).map(|r| self.get(r, c)).collect()
    }

    pub fn transpose(&self) -> Matrix {
        let mut out = Matrix::zeros(self.cols, self.rows);
        for r in 0..self.rows {
            for c in 0..self.cols {
                out.set(c, r, self.get(r, c));
            }
        }
        out
    }

    pub fn mul(&self, other: &Matrix) -> Result<Matrix> {
        if self.cols != other.rows {
            return Err(TensorError::PreconditionFailed(format!(
                "matrix shapes {}x{} and {}x{} are not multipliable",
                self.rows, self.cols, other.rows, other.cols
            )));
        }
        let mut out = Matrix::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self.get(i, k);
                if a == 0.0 {
                    continue;
                }
                for j in 0..other.cols {
                    out.add_in_place(i, j, a * other.get(k, j));
                }
            }
        }
        Ok(out)
    }

    pub fn add(&self, other: &Matrix) -> Result<Matrix> {
        if self.rows != other.rows || self.cols != other.cols {
            return Err(TensorError::PreconditionFailed(
                "matrix shapes differ in add".into(),
            ));
        }
        let data = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| a + b)
            .collect();
        Ok(Matrix::from_rows(self.rows, self.cols, data))
    }

    pub fn scale(&self, factor: f64) -> Matrix {
        Matrix::from_rows(
            self.rows,
            self.cols,
            self.data.iter().map(|v| v * factor).collect(),
        )
    }

    /// Kronecker product `self ⊗ other`.
    pub fn kron(&self, other: &Matrix) -> Matrix {
        let rows = self.rows * other.rows;
        let cols = self.cols * other.cols;
        let mut out = Matrix::zeros(rows, cols);
        for i in 0..self.rows {
            for j in 0..self.cols {
                let a = self.get(i, j);
                if a == 0.0 {
                    continue;
                }
                for p in 0..other.rows {
                    for q in 0..other.cols {
                        out.set(
                            i * other.rows + p,
                            j * other.cols + q,
                            a * other.get(p, q),
                        );
                    }
                }
            }
        }
        out
    }

    /// `self` raised to its `n`-fold Kronecker power, `self^{⊗n}`.
    pub fn kron_power(&self, n: usize) -> Matrix {
        if n == 0 {
            return Matrix::identity(1);
        }
        let mut acc = self.clone();
        for _ in 1..n {
            acc = acc.kron(self);
        }
        acc
    }

    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0_f64, |acc, &v| acc.max(v.abs()))
    }
}

/// An `A = P L U` factorization with partial pivoting, supporting repeated
/// `solve`s against the factored matrix without refactoring.
pub struct PluFactorization {
    n: usize,
    lu: Vec<f64>,
    pivots: Vec<usize>,
}

impl PluFactorization {
    pub fn factorize(a: &Matrix) -> Result<Self> {
        if a.rows != a.cols {
            return Err(TensorError::PreconditionFailed(
                "PLU factorization requires a square matrix".into(),
            ));
        }
        let n = a.rows;
        let mut lu = a.data.clone();
        let mut pivots: Vec<usize> = (0..n).collect();

        for k in 0..n {
            let mut pivot_row = k;
            let mut pivot_val = lu[k * n + k].abs();
            for i in (k + 1)..n {
                let v = lu[i * n + k].abs();
                if v > pivot_val {
                    pivot_val = v;
                    pivot_row = i;
                }
            }
            if pivot_val < 1e-300 {
                return Err(TensorError::SingularSystem(format!(
                    "matrix is singular at pivot column {k}"
                )));
            }
            if pivot_row != k {
                for j in 0..n {
                    lu.swap(k * n + j, pivot_row * n + j);
                }
                pivots.swap(k, pivot_row);
            }
            let pivot = lu[k * n + k];
            for i in (k + 1)..n {
                let factor = lu[i * n + k] / pivot;
                lu[i * n + k] = factor;
                if factor != 0.0 {
                    for j in (k + 1)..n {
                        lu[i * n + j] -= factor * lu[k * n + j];
                    }
                }
            }
        }
        Ok(PluFactorization { n, lu, pivots })
    }

    /// Solves `A x = b` for a single right-hand side column.
    pub fn solve_vec(&self, b: &[f64]) -> Result<Vec<f64>> {
        if b.len() != self.n {
            return Err(TensorError::PreconditionFailed(
                "right-hand side length mismatch".into(),
            ));
        }
        let n = self.n;
        let mut y = vec![0.0; n];
        for i in 0..n {
            let mut sum = b[self.pivots[i]];
            for j in 0..i {
                sum -= self.lu[i * n + j] * y[j];
            }
            y[i] = sum;
        }
        let mut x = vec![0.0; n];
        for i in (0..n).rev() {
            let mut sum = y[i];
            for j in (i + 1)..n {
                sum -= self.lu[i * n + j] * x[j];
            }
            x[i] = sum / self.lu[i * n + i];
        }
        Ok(x)
    }

    /// `multInv(m)`: solves `A X = m`, column by column, returning `X`.
    pub fn solve(&self, rhs: &Matrix) -> Result<Matrix> {
        if rhs.rows != self.n {
            return Err(TensorError::PreconditionFailed(
                "right-hand side row count mismatch".into(),
            ));
        }
        let mut out = Matrix::zeros(self.n, rhs.cols);
        for c in 0..rhs.cols {
            let col = rhs.column(c);
            let x = self.solve_vec(&col)?;
            for r in 0..self.n {
                out.set(r, c, x[r]);
            }
        }
        Ok(out)
    }
}

/// Lower-triangular Cholesky factor `L` with `Sigma = L Lᵀ`. `Sigma` must be
/// symmetric positive semi-definite; zero diagonal pivots are treated as
/// exactly singular directions (`L` column set to zero) rather than an
/// error, since shock covariances are frequently rank-deficient by
/// construction.
pub fn cholesky(sigma: &Matrix) -> Result<Matrix> {
    if sigma.rows != sigma.cols {
        return Err(TensorError::PreconditionFailed(
            "Cholesky requires a square matrix".into(),
        ));
    }
    let n = sigma.rows;
    let mut l = Matrix::zeros(n, n);
    for i in 0..n {
        for j in 0..=i {
            let mut sum = sigma.get(i, j);
            for k in 0..j {
                sum -= l.get(i, k) * l.get(j, k);
            }
            if i == j {
                if sum < -1e-10 {
                    return Err(TensorError::PreconditionFailed(format!(
                        "covariance is not positive semi-definite at row {i}"
                    )));
                }
                l.set(i, j, sum.max(0.0).sqrt());
            } else {
                let ljj = l.get(j, j);
                l.set(i, j, if ljj.abs() < 1e-300 { 0.0 } else { sum / ljj });
            }
        }
    }
    Ok(l)
}

/// Solves the generalized Sylvester equation `A X + B X (C^{⊗order}) = D`
/// for `X`, by vectorizing: `(I ⊗ A + (C^{⊗order})ᵀ ⊗ B) vec(X) = vec(D)`.
/// Correct for the modest sizes this solver works with (state dimension
/// raised to the Taylor order); a production host would swap this for a
/// Bartels–Stewart-style solver without changing the call-site contract,
/// matching the `Non-goals`' assumption that a Sylvester solver is
/// externally available.
pub fn sylvester_solve(a: &Matrix, b: &Matrix, c: &Matrix, d: &Matrix, order: usize) -> Result<Matrix> {
    let ny = a.rows;
    if a.cols != ny {
        return Err(TensorError::PreconditionFailed("A must be square".into()));
    }
    let ckron = c.kron_power(order);
    if ckron.rows != ckron.cols {
        return Err(TensorError::PreconditionFailed(
            "C^{⊗order} must be square".into(),
        ));
    }
    let m = ckron.rows;
    if d.rows != ny || d.cols != m {
        return Err(TensorError::PreconditionFailed(format!(
            "D must be {ny}x{m}, got {}x{}",
            d.rows, d.cols
        )));
    }

    let big_n = ny * m;
    let mut big = Matrix::zeros(big_n, big_n);
    // I_m ⊗ A contributes A at block (p,p) for each p in 0..m.
    for p in 0..m {
        for i in 0..ny {
            for j in 0..ny {
                let v = a.get(i, j);
                if v != 0.0 {
                    big.add_in_place(p * ny + i, p * ny + j, v);
                }
            }
        }
    }
    // (C^{⊗order})ᵀ ⊗ B contributes ckron[q,p] * B at block row p, block col q.
    for p in 0..m {
        for q in 0..m {
            let cval = ckron.get(q, p);
            if cval == 0.0 {
                continue;
            }
            for i in 0..b.rows {
                for j in 0..b.cols {
                    let v = b.get(i, j);
                    if v != 0.0 {
                        big.add_in_place(p * ny + i, q * ny + j, cval * v);
                    }
                }
            }
        }
    }

    let mut rhs = vec![0.0; big_n];
    for p in 0..m {
        for i in 0..ny {
            rhs[p * ny + i] = d.get(i, p);
        }
    }

    let lu = PluFactorization::factorize(&big)?;
    let x = lu.solve_vec(&rhs)?;

    let mut out = Matrix::zeros(ny, m);
    for p in 0..m {
        for i in 0..ny {
            out.set(i, p, x[p * ny + i]);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plu_solves_identity() {
        let a = Matrix::from_rows(2, 2, vec![2.0, 0.0, 0.0, 3.0]);
        let lu = PluFactorization::factorize(&a).unwrap();
        let x = lu.solve_vec(&[4.0, 9.0]).unwrap();
        assert!((x[0] - 2.0).abs() < 1e-12);
        assert!((x[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn cholesky_reconstructs_identity_covariance() {
        let sigma = Matrix::identity(3);
        let l = cholesky(&sigma).unwrap();
        let reconstructed = l.mul(&l.transpose()).unwrap();
        assert!((reconstructed.get(0, 0) - 1.0).abs() < 1e-12);
        assert!((reconstructed.get(1, 2)).abs() < 1e-12);
    }

    #[test]
    fn sylvester_solve_matches_direct_first_order_case() {
        // order = 1 degenerates to (A + B*C) X = D.
        let a = Matrix::from_rows(1, 1, vec![2.0]);
        let b = Matrix::from_rows(1, 1, vec![1.0]);
        let c = Matrix::from_rows(1, 1, vec![0.5]);
        let d = Matrix::from_rows(1, 1, vec![5.0]);
        let x = sylvester_solve(&a, &b, &c, &d, 1).unwrap();
        assert!((x.get(0, 0) - 2.0).abs() < 1e-10);
    }

    #[test]
    fn kron_power_zero_is_scalar_one() {
        let c = Matrix::from_rows(1, 1, vec![3.0]);
        assert_eq!(c.kron_power(0), Matrix::identity(1));
    }
}
