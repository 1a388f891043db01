//! Ability tiers reported to students.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Placement tier, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Foundation,
    Standard,
    Advanced,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Foundation => "foundation",
            Self::Standard => "standard",
            Self::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "foundation" => Ok(Self::Foundation),
            "standard" => Ok(Self::Standard),
            "advanced" => Ok(Self::Advanced),
            other => Err(format!("unknown level: {other}")),
        }
    }
}
