// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! Hand-rolled error type for decision-rule evaluation and simulation,
//! following the same shape as [`tensal_core::error::TensorError`]: a plain
//! enum with `Display`/`Error`/`From` impls, no `thiserror`/`anyhow`.

use std::fmt;

use tensal_core::error::TensorError;

#[derive(Debug)]
pub enum DecisionError {
    Tensor(TensorError),
    Precondition(String),
    /// A simulated or evaluated value left the finite-real domain (e.g. a
    /// `NumericalDomain` fault surfacing during a residual check).
    NumericalDomain(String),
    FixPointNotConverged { iterations: usize },
}

impl fmt::Display for DecisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionError::Tensor(e) => write!(f, "{e}"),
            DecisionError::Precondition(msg) => write!(f, "precondition failed: {msg}"),
            DecisionError::NumericalDomain(msg) => write!(f, "numerical domain fault: {msg}"),
            DecisionError::FixPointNotConverged { iterations } => write!(
                f,
                "centralizing fixed point did not converge within {iterations} iterations"
            ),
        }
    }
}

impl std::error::Error for DecisionError {}

impl From<TensorError> for DecisionError {
    fn from(e: TensorError) -> Self {
        DecisionError::Tensor(e)
    }
}

pub type Result<T> = std::result::Result<T, DecisionError>;
