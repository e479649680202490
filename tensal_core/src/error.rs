// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

use std::fmt;

/// Errors raised by the index/symmetry/tensor primitives.
///
/// Mirrors the `PreconditionFailed` / `NumericalDomain` kinds of the wider
/// solver's error taxonomy (see `tensal::error::PerturbationError`), scoped
/// to failures that can occur purely within tensor-algebra bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TensorError {
    /// Argument sizes, symmetries, or orderings are mutually inconsistent.
    PreconditionFailed(String),
    /// A multi-index or offset fell outside its declared domain.
    OutOfDomain(String),
    /// A linear-algebra step (factorization or solve) failed.
    SingularSystem(String),
}

impl fmt::Display for TensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TensorError::PreconditionFailed(msg) => write!(f, "precondition failed: {msg}"),
            TensorError::OutOfDomain(msg) => write!(f, "out of domain: {msg}"),
            TensorError::SingularSystem(msg) => write!(f, "singular system: {msg}"),
        }
    }
}

impl std::error::Error for TensorError {}

pub type Result<T> = std::result::Result<T, TensorError>;
