/// Qualitative risk levels derived from damage probabilities.

pub mod risk_level;
