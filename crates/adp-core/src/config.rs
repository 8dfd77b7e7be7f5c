//! # Search Configuration
//!
//! Tuning for the multi-start global optimizer used by extremum and
//! Lipschitz searches. Loadable from YAML or JSON; missing fields take
//! their defaults.
//!
//! ```yaml
//! seed: 7
//! random_starts: 64
//! try_hessian_shortcut: true
//! ```

use serde::{Deserialize, Serialize};

use crate::error::AdpError;

/// Slack keeping explicit-search perturbations away from the zero-delta point.
pub const PERTURBATION_SLACK: f64 = 1.0 / 65536.0;

/// Default RNG seed.
pub const DEFAULT_SEED: u64 = 0x5eed_0adf;

/// Multi-start optimizer and Lipschitz search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// RNG seed for random start points. Fixed seeds make searches deterministic.
    pub seed: u64,
    /// Grid points per axis for brute-force seeding.
    pub grid_points_per_axis: usize,
    /// Skip grid seeding when the full grid would exceed this many points.
    pub max_grid_seeds: usize,
    /// Seed from every box corner when the dimension is at most this.
    pub max_corner_dims: usize,
    /// Additional uniformly random start points. When corners are not
    /// enumerated, as many random corners are drawn as well.
    pub random_starts: usize,
    /// Passes of per-axis level search applied to the best seeds when the
    /// dimension is too large for corner enumeration. Zero disables it.
    pub coordinate_sweeps: usize,
    /// Number of best-ranked seeds refined locally (ignored with `force_all_searches`).
    pub refine_top_k: usize,
    /// Iteration cap for each local refinement.
    pub max_iterations: usize,
    /// Step-size convergence tolerance, relative to the box scale.
    pub tolerance: f64,
    /// Allowed constraint violation at an accepted optimum.
    pub feasibility_tolerance: f64,
    /// Weight of the quadratic constraint penalty.
    pub penalty_weight: f64,
    /// Lower bound on the perturbation norm in explicit search.
    pub perturbation_slack: f64,
    /// Refine from every seed instead of the best `refine_top_k`.
    pub force_all_searches: bool,
    /// When restricting to one entity, pin every other entity's inputs at
    /// their current values rather than letting them range over their boxes.
    pub data_dependent: bool,
    /// Skip the search when the jacobian is provably constant.
    pub try_hessian_shortcut: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            grid_points_per_axis: 5,
            max_grid_seeds: 4096,
            max_corner_dims: 10,
            random_starts: 32,
            coordinate_sweeps: 2,
            refine_top_k: 8,
            max_iterations: 1000,
            tolerance: 1e-10,
            feasibility_tolerance: 1e-7,
            penalty_weight: 1e6,
            perturbation_slack: PERTURBATION_SLACK,
            force_all_searches: false,
            data_dependent: true,
            try_hessian_shortcut: false,
        }
    }
}

impl SearchConfig {
    /// Parse from YAML and validate.
    pub fn from_yaml_str(s: &str) -> Result<Self, AdpError> {
        let config: SearchConfig = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from JSON and validate.
    pub fn from_json_str(s: &str) -> Result<Self, AdpError> {
        let config: SearchConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings under which no search can run.
    pub fn validate(&self) -> Result<(), AdpError> {
        if self.max_iterations == 0 {
            return Err(AdpError::Config("max_iterations must be positive".into()));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(AdpError::Config(format!(
                "tolerance must be a positive finite number, got {}",
                self.tolerance
            )));
        }
        if !(self.feasibility_tolerance.is_finite() && self.feasibility_tolerance >= 0.0) {
            return Err(AdpError::Config(format!(
                "feasibility_tolerance must be non-negative, got {}",
                self.feasibility_tolerance
            )));
        }
        if !(self.penalty_weight.is_finite() && self.penalty_weight > 0.0) {
            return Err(AdpError::Config(format!(
                "penalty_weight must be positive, got {}",
                self.penalty_weight
            )));
        }
        if !(self.perturbation_slack.is_finite() && self.perturbation_slack > 0.0) {
            return Err(AdpError::Config(format!(
                "perturbation_slack must be positive, got {}",
                self.perturbation_slack
            )));
        }
        if !self.force_all_searches && self.refine_top_k == 0 {
            return Err(AdpError::Config(
                "refine_top_k must be positive unless force_all_searches is set".into(),
            ));
        }
        Ok(())
    }

    /// Builder-style toggle for `force_all_searches`.
    pub fn with_force_all_searches(mut self, force: bool) -> Self {
        self.force_all_searches = force;
        self
    }

    /// Builder-style toggle for `data_dependent`.
    pub fn with_data_dependent(mut self, data_dependent: bool) -> Self {
        self.data_dependent = data_dependent;
        self
    }

    /// Builder-style toggle for `try_hessian_shortcut`.
    pub fn with_hessian_shortcut(mut self, enabled: bool) -> Self {
        self.try_hessian_shortcut = enabled;
        self
    }
}
