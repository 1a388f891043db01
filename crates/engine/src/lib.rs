//! Stateless estimation engine for adaptive diagnostics.
//!
//! Everything here is a pure function of its inputs:
//! - [`irt`]: 3PL response probability, Fisher information, standard error
//! - [`selection`]: maximum-information next-item selection
//! - [`estimation`]: Newton–Raphson maximum-likelihood ability estimation
//! - [`classify`]: theta → level and per-domain scoring

pub mod classify;
pub mod estimation;
pub mod irt;
pub mod selection;

pub use classify::{LevelThresholds, compute_domain_levels, compute_domain_scores, theta_to_level};
pub use estimation::{EstimationOptions, Observation, ThetaBounds, estimate_theta, estimate_theta_with};
pub use irt::{fisher_information, probability_correct, standard_error};
pub use selection::select_next_item;

use serde::{Deserialize, Serialize};

/// Every tunable constant of the engine in one place.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineSettings {
    pub estimation: EstimationOptions,
    pub thresholds: LevelThresholds,
}
