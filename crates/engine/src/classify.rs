//! Level classification and per-domain sub-scores.

use crate::estimation::{EstimationOptions, Observation, estimate_theta_with};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tierwise_core::{Domain, Level};

/// Cut points between the three levels.
///
/// A theta exactly on a cut point belongs to the higher level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelThresholds {
    /// Theta strictly below this is Foundation
    pub foundation_below: f64,
    /// Theta at or above this is Advanced
    pub advanced_from: f64,
}

impl LevelThresholds {
    pub fn classify(&self, theta: f64) -> Level {
        if theta < self.foundation_below {
            Level::Foundation
        } else if theta < self.advanced_from {
            Level::Standard
        } else {
            Level::Advanced
        }
    }
}

impl Default for LevelThresholds {
    fn default() -> Self {
        Self {
            foundation_below: -0.5,
            advanced_from: 0.5,
        }
    }
}

/// Classify `theta` with the default cut points (-0.5 / 0.5).
pub fn theta_to_level(theta: f64) -> Level {
    LevelThresholds::default().classify(theta)
}

/// Independent theta per domain, each estimated from a neutral prior of 0.0.
///
/// Domains without observations are absent from the map.
pub fn compute_domain_scores(observations: &[Observation<'_>], options: &EstimationOptions) -> BTreeMap<Domain, f64> {
    let mut by_domain: BTreeMap<&Domain, Vec<Observation<'_>>> = BTreeMap::new();
    for obs in observations {
        by_domain.entry(&obs.item.domain).or_default().push(*obs);
    }

    by_domain
        .into_iter()
        .map(|(domain, partition)| (domain.clone(), estimate_theta_with(&partition, 0.0, options)))
        .collect()
}

pub fn compute_domain_levels(domain_scores: &BTreeMap<Domain, f64>, thresholds: &LevelThresholds) -> BTreeMap<Domain, Level> {
    domain_scores
        .iter()
        .map(|(domain, &theta)| (domain.clone(), thresholds.classify(theta)))
        .collect()
}
