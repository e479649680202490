// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! `SolverConfig`: every knob from the external-interfaces configuration
//! table, as a plain serializable struct with a `Default` matching the
//! spec's stated defaults. Loaded directly, or layered from a TOML/env
//! source through the `config` crate when the caller wants that (no crate
//! in this workspace reaches for environment variables on its own).

use serde::{Deserialize, Serialize};

use crate::error::{PerturbationError, Result};

/// Quadrature-specific knobs, nested under `quadrature.*` in a loaded file.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QuadratureConfig {
    /// Upper bound on node evaluations `designLevelForEvals` searches under.
    pub max_evals: usize,
}

impl Default for QuadratureConfig {
    fn default() -> Self {
        QuadratureConfig { max_evals: 10_000 }
    }
}

/// Simulation-specific knobs, nested under `simulation.*`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seed for the Gaussian shock source's Mersenne Twister.
    pub seed: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig { seed: 0 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SolverConfig {
    /// Maximum Taylor order to compute, `k >= 1`.
    pub order: usize,
    /// Number of sigma-steps in the stochastic-steady walk. `0` means the
    /// deterministic steady only; `1` a single-shot stochastic step.
    pub ns: usize,
    /// If true, the final rule is recentred at its own fixed point.
    pub centralize: bool,
    /// Stability cutoff passed through to the caller's first-order solver;
    /// `tensal` itself never runs that check (a Non-goal), but carries the
    /// knob so a caller's diagnostics have somewhere to put it.
    pub qz_criterium: f64,
    /// Cap on worker count inside the Faà di Bruno engine.
    pub max_parallel_threads: usize,
    pub quadrature: QuadratureConfig,
    pub simulation: SimulationConfig,
    /// `tracing-subscriber` `EnvFilter` string controlling journal
    /// verbosity; ambient, not part of the solver's numerical behaviour.
    pub log_filter: String,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            order: 2,
            ns: 0,
            centralize: false,
            qz_criterium: 1.000001,
            max_parallel_threads: 2,
            quadrature: QuadratureConfig::default(),
            simulation: SimulationConfig::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl SolverConfig {
    /// Layers a TOML file over the defaults via the `config` crate; any key
    /// the file omits keeps its `Default` value.
    pub fn from_file(path: &str) -> Result<Self> {
        let defaults = SolverConfig::default();
        let raw = config::Config::builder()
            .add_source(config::Config::try_from(&defaults).map_err(config_err)?)
            .add_source(config::File::with_name(path))
            .build()
            .map_err(config_err)?;
        raw.try_deserialize().map_err(config_err)
    }

    pub fn validate(&self) -> Result<()> {
        if self.order == 0 {
            return Err(PerturbationError::PreconditionFailed(
                "order k must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn config_err(e: config::ConfigError) -> PerturbationError {
    PerturbationError::PreconditionFailed(format!("loading SolverConfig: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_spec() {
        let cfg = SolverConfig::default();
        assert_eq!(cfg.max_parallel_threads, 2);
        assert_eq!(cfg.ns, 0);
        assert!(!cfg.centralize);
    }

    #[test]
    fn order_zero_fails_validation() {
        let mut cfg = SolverConfig::default();
        cfg.order = 0;
        assert!(cfg.validate().is_err());
    }
}
