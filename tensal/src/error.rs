// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! The single public error type, following the same shape as every
//! component-local error type in this workspace (plain enum + `Display` +
//! `Error` + `From` impls, no `thiserror`/`anyhow`): one variant per error
//! kind a caller can observe from driving `Approximation::solve`, each
//! wrapping the component error that actually raised it.

use std::fmt;

use tensal_core::error::TensorError;
use tensal_decision::DecisionError;
use tensal_korder::SolverError;

#[derive(Debug)]
pub enum PerturbationError {
    /// Argument sizes, symmetries, or orderings are mutually inconsistent.
    PreconditionFailed(String),
    /// The externally-supplied first-order rule is not Blanchard-Kahn
    /// stable; `tensal` never runs that check itself (a Non-goal), but
    /// surfaces it when the caller reports it through `SolverConfig`.
    NotBlanchardKahnStable(String),
    /// Newton iteration (stochastic-steady walk or `centralize`) did not
    /// converge within the allotted iterations.
    FixPointNotConverged { iterations: usize },
    /// The Sylvester solver reported failure, e.g. spurious ill-conditioning.
    SylvesterFailure(String),
    /// The Faà di Bruno memory estimator could not find a viable slab width.
    OutOfMemory(String),
    /// A non-positive log, division by zero, or power underflow surfaced
    /// during evaluation or residual checking.
    NumericalDomain(String),
}

impl fmt::Display for PerturbationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PerturbationError::PreconditionFailed(msg) => write!(f, "precondition failed: {msg}"),
            PerturbationError::NotBlanchardKahnStable(msg) => {
                write!(f, "first-order rule is not Blanchard-Kahn stable: {msg}")
            }
            PerturbationError::FixPointNotConverged { iterations } => write!(
                f,
                "fixed-point iteration did not converge within {iterations} iterations"
            ),
            PerturbationError::SylvesterFailure(msg) => write!(f, "Sylvester solve failed: {msg}"),
            PerturbationError::OutOfMemory(msg) => write!(f, "memory estimator found no viable slab width: {msg}"),
            PerturbationError::NumericalDomain(msg) => write!(f, "numerical domain fault: {msg}"),
        }
    }
}

impl std::error::Error for PerturbationError {}

impl From<TensorError> for PerturbationError {
    fn from(e: TensorError) -> Self {
        match e {
            TensorError::SingularSystem(msg) => PerturbationError::SylvesterFailure(msg),
            TensorError::PreconditionFailed(msg) | TensorError::OutOfDomain(msg) => {
                PerturbationError::PreconditionFailed(msg)
            }
        }
    }
}

impl From<SolverError> for PerturbationError {
    fn from(e: SolverError) -> Self {
        match e {
            SolverError::Tensor(t) => t.into(),
            SolverError::Precondition(msg) => PerturbationError::PreconditionFailed(msg),
            SolverError::ResidualTooLarge { order, max_abs } => PerturbationError::NumericalDomain(format!(
                "order {order} residual {max_abs:e} exceeds tolerance"
            )),
        }
    }
}

impl From<DecisionError> for PerturbationError {
    fn from(e: DecisionError) -> Self {
        match e {
            DecisionError::Tensor(t) => t.into(),
            DecisionError::Precondition(msg) => PerturbationError::PreconditionFailed(msg),
            DecisionError::NumericalDomain(msg) => PerturbationError::NumericalDomain(msg),
            DecisionError::FixPointNotConverged { iterations } => {
                PerturbationError::FixPointNotConverged { iterations }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, PerturbationError>;
