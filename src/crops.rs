/// Crop stage registry and frost damage model.
///
/// Defines the phenological stages tracked for each supported crop, their
/// lethal temperature thresholds (LT10/LT90), and the logistic curves that
/// turn a blossom temperature into a damage probability. This is the single
/// source of truth for stage names; other modules should look stages up here
/// rather than hardcoding them.
///
/// The frost risk pass only sees the `DamageModel` trait, so adding a crop
/// means adding a registry entry and a model, not touching the analysis code.

use crate::model::FrostError;

// ---------------------------------------------------------------------------
// Stage metadata
// ---------------------------------------------------------------------------

/// Lethal temperature thresholds for one stage, in °C.
///
/// Carried through to output for display; the damage curve uses its own
/// logistic parameters. `lt90_c` is always colder than `lt10_c`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageThreshold {
    pub lt10_c: f64,
    pub lt90_c: f64,
}

/// Logistic curve parameters: `p = 1 / (1 + e^-(a + b·T))`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageParameters {
    pub a: f64,
    pub b: f64,
}

/// Static registry entry for one stage of a crop.
pub struct StageEntry {
    /// Lowercase stage identifier, e.g. `"fullbloom"`.
    pub name: &'static str,
    pub threshold: StageThreshold,
    pub parameters: DamageParameters,
}

/// Almond stages in bloom order, from pink bud to small nut.
pub static ALMOND_STAGES: &[StageEntry] = &[
    StageEntry {
        name: "pinkbud",
        threshold: StageThreshold { lt10_c: -3.5, lt90_c: -5.5 },
        parameters: DamageParameters { a: 10.0, b: 1.5 },
    },
    StageEntry {
        name: "fullbloom",
        threshold: StageThreshold { lt10_c: -3.0, lt90_c: -4.5 },
        parameters: DamageParameters { a: 9.0, b: 1.4 },
    },
    StageEntry {
        name: "petalfall",
        threshold: StageThreshold { lt10_c: -2.8, lt90_c: -5.0 },
        parameters: DamageParameters { a: 8.0, b: 1.3 },
    },
    StageEntry {
        name: "fruitset",
        threshold: StageThreshold { lt10_c: -2.5, lt90_c: -4.7 },
        parameters: DamageParameters { a: 7.0, b: 1.2 },
    },
    StageEntry {
        name: "smallnut",
        threshold: StageThreshold { lt10_c: -2.8, lt90_c: -4.5 },
        parameters: DamageParameters { a: 6.0, b: 1.1 },
    },
];

/// Supported crops and their stage tables.
pub static CROP_REGISTRY: &[(&str, &[StageEntry])] = &[("almond", ALMOND_STAGES)];

// ---------------------------------------------------------------------------
// Stage configuration
// ---------------------------------------------------------------------------

/// Ordered mapping from stage name to LT thresholds for one crop.
///
/// Iteration follows insertion order, which is also the order stages appear
/// in hourly and daily output.
#[derive(Debug, Clone, PartialEq)]
pub struct CropStageConfig {
    crop_name: String,
    stages: Vec<(String, StageThreshold)>,
}

impl CropStageConfig {
    /// Builds a stage table, rejecting duplicate names and thresholds where
    /// LT90 is not colder than LT10. Names are lowercased.
    pub fn new(
        crop_name: &str,
        stages: impl IntoIterator<Item = (String, StageThreshold)>,
    ) -> Result<Self, FrostError> {
        let mut ordered: Vec<(String, StageThreshold)> = Vec::new();
        for (name, threshold) in stages {
            let name = name.to_ascii_lowercase();
            if !(threshold.lt90_c < threshold.lt10_c) {
                return Err(FrostError::InvalidStageConfig(format!(
                    "{}: LT90 ({}) must be colder than LT10 ({})",
                    name, threshold.lt90_c, threshold.lt10_c
                )));
            }
            if ordered.iter().any(|(existing, _)| *existing == name) {
                return Err(FrostError::InvalidStageConfig(format!(
                    "duplicate stage '{}'",
                    name
                )));
            }
            ordered.push((name, threshold));
        }
        Ok(Self {
            crop_name: crop_name.to_ascii_lowercase(),
            stages: ordered,
        })
    }

    pub fn crop_name(&self) -> &str {
        &self.crop_name
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StageThreshold)> {
        self.stages.iter().map(|(name, t)| (name.as_str(), t))
    }

    /// Looks up a stage (case-insensitive).
    pub fn threshold(&self, stage: &str) -> Result<&StageThreshold, FrostError> {
        self.stages
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(stage))
            .map(|(_, t)| t)
            .ok_or_else(|| FrostError::UnknownStage(stage.to_string()))
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Damage model
// ---------------------------------------------------------------------------

/// Exponent clamp keeping the logistic strictly inside (0, 1) in f64.
const LOGISTIC_EXPONENT_LIMIT: f64 = 30.0;

/// Maps a stage and temperature to a frost damage probability.
pub trait DamageModel: Send + Sync {
    /// Curve parameters for a stage. Unknown stages are an error.
    fn parameters(&self, stage: &str) -> Result<DamageParameters, FrostError>;

    /// Damage probability in (0, 1) for `temperature_c` at `stage`.
    fn probability(&self, temperature_c: f64, stage: &str) -> Result<f64, FrostError> {
        let p = self.parameters(stage)?;
        Ok(logistic(p.a + p.b * temperature_c))
    }
}

/// Numerically stable logistic with a clamped exponent.
pub fn logistic(z: f64) -> f64 {
    let z = z.clamp(-LOGISTIC_EXPONENT_LIMIT, LOGISTIC_EXPONENT_LIMIT);
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Logistic damage model backed by a fixed per-stage parameter table.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticDamageModel {
    parameters: Vec<(&'static str, DamageParameters)>,
}

impl LogisticDamageModel {
    pub fn from_entries(entries: &'static [StageEntry]) -> Self {
        Self {
            parameters: entries.iter().map(|e| (e.name, e.parameters)).collect(),
        }
    }

    pub fn almond() -> Self {
        Self::from_entries(ALMOND_STAGES)
    }
}

impl DamageModel for LogisticDamageModel {
    fn parameters(&self, stage: &str) -> Result<DamageParameters, FrostError> {
        self.parameters
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(stage))
            .map(|(_, p)| *p)
            .ok_or_else(|| FrostError::UnknownStage(stage.to_string()))
    }
}

/// Almond curve parameters for `stage`.
pub fn damage_parameters(stage: &str) -> Result<DamageParameters, FrostError> {
    LogisticDamageModel::almond().parameters(stage)
}

/// Almond damage probability at `temperature_c` for `stage`.
pub fn damage_probability(temperature_c: f64, stage: &str) -> Result<f64, FrostError> {
    LogisticDamageModel::almond().probability(temperature_c, stage)
}

// ---------------------------------------------------------------------------
// Crop lookup
// ---------------------------------------------------------------------------

/// Stage table plus damage model for one crop.
#[derive(Debug, Clone)]
pub struct CropProfile {
    pub stages: CropStageConfig,
    pub model: LogisticDamageModel,
}

/// Resolves a crop name (case-insensitive) against `CROP_REGISTRY`.
pub fn crop_profile(name: &str) -> Result<CropProfile, FrostError> {
    let (crop, entries) = CROP_REGISTRY
        .iter()
        .find(|(crop, _)| crop.eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| FrostError::UnsupportedCrop(name.to_string()))?;

    let stages = CropStageConfig::new(
        crop,
        entries.iter().map(|e| (e.name.to_string(), e.threshold)),
    )?;
    Ok(CropProfile {
        stages,
        model: LogisticDamageModel::from_entries(*entries),
    })
}

/// Almond stage table.
pub fn almond_stage_config() -> CropStageConfig {
    CropStageConfig {
        crop_name: "almond".to_string(),
        stages: ALMOND_STAGES
            .iter()
            .map(|e| (e.name.to_string(), e.threshold))
            .collect(),
    }
}

/// Display form of a stage name: first letter uppercased, rest lowercased.
pub fn display_stage_name(stage: &str) -> String {
    let mut chars = stage.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
