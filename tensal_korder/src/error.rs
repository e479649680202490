// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! Hand-rolled error type for the k-order solver, following the same
//! shape as [`tensal_core::error::TensorError`]: a plain enum with
//! `Display`/`Error`/`From` impls, no `thiserror`/`anyhow`.

use std::fmt;

use tensal_core::error::TensorError;

#[derive(Debug)]
pub enum SolverError {
    Tensor(TensorError),
    Precondition(String),
    /// `check(dim)` found a residual above the caller's tolerance.
    ResidualTooLarge { order: usize, max_abs: f64 },
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverError::Tensor(e) => write!(f, "{e}"),
            SolverError::Precondition(msg) => write!(f, "precondition failed: {msg}"),
            SolverError::ResidualTooLarge { order, max_abs } => write!(
                f,
                "order {order} residual {max_abs:e} exceeds the configured tolerance"
            ),
        }
    }
}

impl std::error::Error for SolverError {}

impl From<TensorError> for SolverError {
    fn from(e: TensorError) -> Self {
        SolverError::Tensor(e)
    }
}

pub type Result<T> = std::result::Result<T, SolverError>;
