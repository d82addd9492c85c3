/// Frost risk level classification.
///
/// Maps the day's highest stage damage probability onto the qualitative
/// level shown to growers. Boundaries belong to the upper bucket: 0.3 is
/// already moderate and 0.6 is already high.

use serde::Serialize;
use std::fmt;

/// Damage probability at which risk becomes moderate.
pub const MODERATE_THRESHOLD: f64 = 0.3;

/// Damage probability at which risk becomes high.
pub const HIGH_THRESHOLD: f64 = 0.6;

/// Risk levels, in ascending order of severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies an overall maximum damage probability.
pub fn classify_risk(max_damage: f64) -> RiskLevel {
    if max_damage < MODERATE_THRESHOLD {
        RiskLevel::Low
    } else if max_damage < HIGH_THRESHOLD {
        RiskLevel::Moderate
    } else {
        RiskLevel::High
    }
}
