// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! The three pre-factored matrices every `performStep` sub-routine solves
//! against:
//!
//! - `A = f_y + [0, f_{y**+}.g**_{y*}, 0]` (square, `ny`), used for
//!   `recover_y`/`recover_yu`/`recover_yus`.
//! - `S = A + [0, 0, f_{y**+}]`, used for `recover_s` (the pure-`sigma`
//!   derivatives; at `sigma = 0` the Sylvester term's `C` factor has zero
//!   width, which is what makes `A` alone singular for that sub-step and
//!   `S` the one to factor instead).
//! - `B = f_{y**+}` (rectangular, `ny x nyss`), the Sylvester equation's
//!   other coefficient.

use tensal_core::error::TensorError;
use tensal_core::linalg::{Matrix, PluFactorization};

use crate::error::Result;
use crate::model::ModelDerivatives;

pub struct PreFactored {
    /// Kept unfactored alongside its `PluFactorization` since
    /// [`tensal_core::linalg::sylvester_solve`] needs to build its own
    /// vectorized system from `A` and `B` directly rather than reuse an
    /// existing factorization.
    pub a_raw: Matrix,
    pub a: PluFactorization,
    pub s_raw: Matrix,
    pub s: PluFactorization,
    pub b: Matrix,
}

impl PreFactored {
    /// `g_starstar_y`: the `nyss x nys` sub-block of `g_y` restricted to
    /// the `y**` output rows, i.e. `g**_{y*}`.
    pub fn build(model: &ModelDerivatives, g_starstar_y: &Matrix) -> Result<Self> {
        let ny = model.partition.ny();
        let nys = model.partition.nys();
        let nyss = model.partition.nyss();

        let f_y = model.first_order_block(1)?;
        let f_yss_fwd = model.first_order_block(0)?;

        if f_yss_fwd.cols() != nyss {
            return Err(crate::error::SolverError::Precondition(format!(
                "f_{{y**+}} has {} columns, expected nyss={nyss}",
                f_yss_fwd.cols()
            )));
        }
        if g_starstar_y.rows() != nyss || g_starstar_y.cols() != nys {
            return Err(crate::error::SolverError::Precondition(format!(
                "g**_y* must be {nyss}x{nys}, got {}x{}",
                g_starstar_y.rows(),
                g_starstar_y.cols()
            )));
        }

        // [0, f_{y**+}.g**_{y*}, 0] embedded at the "stat.." offset: the
        // middle `nys` columns of `A`'s `ny` columns hold the contribution,
        // the `nstat` leading and the trailing columns (beyond `nstat+nys`)
        // stay zero, matching the `[0, ., 0]` block layout in the formula.
        let middle = f_yss_fwd.mul(g_starstar_y)?;
        let nstat = model.partition.nstat;
        let mut a = f_y.clone();
        for r in 0..ny {
            for c in 0..nys {
                a.add_in_place(r, nstat + c, middle.get(r, c));
            }
        }

        let mut s = a.clone();
        for r in 0..ny {
            for c in 0..nyss {
                s.add_in_place(r, ny - nyss + c, f_yss_fwd.get(r, c));
            }
        }

        let a_fact = PluFactorization::factorize(&a).map_err(|e| wrap_singular(e, "A"))?;
        let s_fact = PluFactorization::factorize(&s).map_err(|e| wrap_singular(e, "S"))?;

        Ok(PreFactored {
            a_raw: a,
            a: a_fact,
            s_raw: s,
            s: s_fact,
            b: f_yss_fwd,
        })
    }
}

fn wrap_singular(e: TensorError, which: &str) -> crate::error::SolverError {
    crate::error::SolverError::Precondition(format!("factoring {which} failed: {e}"))
}
