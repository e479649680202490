// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! Flat re-export surface for the types an external caller needs to drive
//! [`crate::Approximation`]: the model input, the decision rule it returns,
//! and the simulation machinery that consumes one. Kept as a thin `pub use`
//! layer rather than a module of its own logic, so the crate's internal
//! layout (`approximation`, `config`, `error`) is free to change without
//! moving this entry surface.

pub use crate::approximation::{Approximation, ApproximationResult};
pub use crate::config::{QuadratureConfig, SimulationConfig, SolverConfig};
pub use crate::error::{PerturbationError, Result};

pub use tensal_core::context::TlContext;
pub use tensal_core::linalg::Matrix;
pub use tensal_decision::{
    simulate, DecisionRule, DeterministicShocks, EvalMethod, GaussianShocks, ShockRealization,
};
pub use tensal_korder::{ModelDerivatives, ModelPartition, StackLayout, StochSteadyState};

/// Quadrature building blocks `quadrature.max_evals` is sized for, when a
/// caller attaches its own integration backend to evaluate expectations
/// outside the core k-order recursion (which itself only needs the exact
/// Gaussian moments `tensal_moments` supplies).
pub use tensal_integ::{HaltonSequence, OneDRule, PermutationScheme, ProductQuadrature, Quadrature1D, SmolyakQuadrature};
