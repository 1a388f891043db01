//! Mapping from file configuration to engine settings.

use tierwise_config::EngineConfig;
use tierwise_engine::{EngineSettings, EstimationOptions, LevelThresholds, ThetaBounds};

pub fn engine_settings(config: &EngineConfig) -> EngineSettings {
    EngineSettings {
        estimation: EstimationOptions {
            max_iterations: config.max_iterations,
            convergence: config.convergence,
            bounds: ThetaBounds {
                min: config.theta_min,
                max: config.theta_max,
            },
        },
        thresholds: LevelThresholds {
            foundation_below: config.foundation_below,
            advanced_from: config.advanced_from,
        },
    }
}
