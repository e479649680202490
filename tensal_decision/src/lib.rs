// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

#![forbid(unsafe_code)]

//! Decision rules: a dense, per-symmetry representation of a k-order
//! policy function, two evaluation strategies over it (Horner and
//! Direct), and the shock sources and loop that drive it forward through
//! a simulation.

pub mod error;
pub mod rng;
pub mod rule;
pub mod simulate;

pub use error::{DecisionError, Result};
pub use rng::{inverse_normal_cdf, MersenneTwister};
pub use rule::DecisionRule;
pub use simulate::{simulate, DeterministicShocks, EvalMethod, GaussianShocks, ShockRealization};
