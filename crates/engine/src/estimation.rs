//! Newton–Raphson maximum-likelihood ability estimation.
//!
//! The estimate is always re-derived from the full response history, never
//! updated incrementally. Numerical degeneracies (saturated probabilities, a
//! flat likelihood) are absorbed here: the result is always a finite theta
//! inside [`ThetaBounds`].

use crate::irt::probability_correct;
use serde::{Deserialize, Serialize};
use tierwise_core::Item;

/// Below this the likelihood is treated as flat and iteration stops.
const MIN_DENOMINATOR: f64 = 1e-10;

/// The practical limits of the ability scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThetaBounds {
    pub min: f64,
    pub max: f64,
}

impl ThetaBounds {
    pub fn clamp(&self, theta: f64) -> f64 {
        theta.clamp(self.min, self.max)
    }

    pub fn contains(&self, theta: f64) -> bool {
        (self.min..=self.max).contains(&theta)
    }
}

impl Default for ThetaBounds {
    fn default() -> Self {
        Self { min: -3.0, max: 3.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimationOptions {
    pub max_iterations: usize,
    /// Stop once a Newton step is smaller than this
    pub convergence: f64,
    pub bounds: ThetaBounds,
}

impl Default for EstimationOptions {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            convergence: 0.001,
            bounds: ThetaBounds::default(),
        }
    }
}

/// One scored item in a response history.
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    pub item: &'a Item,
    pub correct: bool,
}

impl<'a> Observation<'a> {
    pub fn new(item: &'a Item, correct: bool) -> Self {
        Self { item, correct }
    }
}

/// [`estimate_theta_with`] using [`EstimationOptions::default`].
pub fn estimate_theta(observations: &[Observation<'_>], prior_theta: f64) -> f64 {
    estimate_theta_with(observations, prior_theta, &EstimationOptions::default())
}

/// Maximum-likelihood theta for `observations`, starting from `prior_theta`.
///
/// With no observations the prior is returned unchanged. Otherwise iteration
/// starts from the prior clamped into `options.bounds`, and theta is clamped
/// again after every step.
pub fn estimate_theta_with(observations: &[Observation<'_>], prior_theta: f64, options: &EstimationOptions) -> f64 {
    if observations.is_empty() {
        return prior_theta;
    }

    let mut theta = options.bounds.clamp(prior_theta);
    for _ in 0..options.max_iterations {
        let mut numerator = 0.0;
        let mut denominator = 0.0;

        for obs in observations {
            let Item { a, b, c, .. } = *obs.item;
            let p = probability_correct(theta, a, b, c);
            let q = 1.0 - p;
            if p <= c || q <= 0.0 || p >= 1.0 {
                continue;
            }
            let p_star = (p - c) / (1.0 - c);

            if obs.correct {
                numerator += a * p_star * q / p;
            } else {
                numerator -= a * p_star;
            }
            denominator += a * a * p_star * p_star * (q / p);
        }

        if denominator.abs() < MIN_DENOMINATOR {
            break;
        }

        let step = numerator / denominator;
        theta = options.bounds.clamp(theta + step);

        if step.abs() < options.convergence {
            break;
        }
    }

    tracing::trace!(theta, responses = observations.len(), "theta estimated");
    theta
}
