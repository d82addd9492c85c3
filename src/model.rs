/// Core data types for the almond frost risk service.
///
/// This module defines the shared domain model imported by all other modules:
/// the normalized hourly observation, the enriched record produced by the
/// frost risk pass, and the error types. It contains no I/O.

use chrono::{NaiveDate, NaiveDateTime};
use serde::ser::{SerializeMap, SerializeStruct, Serializer};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Field aliases
// ---------------------------------------------------------------------------

/// Accepted keys for hourly air temperature, in lookup order.
pub const AIR_TEMP_KEYS: &[&str] = &["HlyAirTmp", "hly-air-tmp"];

/// Accepted keys for hourly relative humidity, in lookup order.
pub const REL_HUM_KEYS: &[&str] = &["HlyRelHum", "hly-rel-hum"];

// ---------------------------------------------------------------------------
// Observation types
// ---------------------------------------------------------------------------

/// A single hourly weather observation for one station.
///
/// Built by `ingest::cimis::normalize` from one raw provider record. Either
/// measurement may be `None` when the upstream value was missing or could
/// not be parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyObservation {
    pub station: String,
    pub date: NaiveDate,
    pub hour: u32,
    pub timestamp: NaiveDateTime,
    pub air_temp_c: Option<f64>,
    pub relative_humidity_pct: Option<f64>,
}

/// Damage estimate for one phenological stage at one hour.
#[derive(Debug, Clone, PartialEq)]
pub struct StageDamage {
    pub stage: String,
    pub lt10_c: f64,
    pub lt90_c: f64,
    pub damage_prob: f64,
}

/// Per-stage damage estimates for one hour, in crop stage order.
///
/// Serializes as a JSON object keyed by stage name so the hourly output
/// keeps the same shape as the upstream API while preserving stage order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageDamageMap(Vec<StageDamage>);

impl StageDamageMap {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, damage: StageDamage) {
        self.0.push(damage);
    }

    /// Looks up a stage by name (case-insensitive).
    pub fn get(&self, stage: &str) -> Option<&StageDamage> {
        self.0.iter().find(|d| d.stage.eq_ignore_ascii_case(stage))
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageDamage> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for StageDamageMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for damage in &self.0 {
            map.serialize_entry(&damage.stage, &StageDamageEntry(damage))?;
        }
        map.end()
    }
}

struct StageDamageEntry<'a>(&'a StageDamage);

impl Serialize for StageDamageEntry<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("StageDamage", 3)?;
        s.serialize_field("LT10_C", &self.0.lt10_c)?;
        s.serialize_field("LT90_C", &self.0.lt90_c)?;
        s.serialize_field("damage_prob", &self.0.damage_prob)?;
        s.end()
    }
}

/// An hourly observation enriched with derived physical quantities and
/// per-stage damage probabilities.
///
/// Derived temperatures are `None` whenever air temperature or humidity is
/// missing; `stages` is then empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedHourlyRecord {
    pub station: String,
    #[serde(skip)]
    pub date: NaiveDate,
    #[serde(skip)]
    pub hour: u32,
    pub timestamp: NaiveDateTime,
    #[serde(rename = "air_temperature_c")]
    pub air_temp_c: Option<f64>,
    #[serde(rename = "relative_humidity")]
    pub relative_humidity_pct: Option<f64>,
    pub dew_point_c: Option<f64>,
    pub wet_bulb_c: Option<f64>,
    pub blossom_temp_c: Option<f64>,
    pub cooling_rate_c_per_hr: f64,
    #[serde(rename = "stages")]
    pub stage_damage: StageDamageMap,
}

// ---------------------------------------------------------------------------
// Dropped records
// ---------------------------------------------------------------------------

/// Why a raw provider record did not become an `HourlyObservation`.
///
/// Drops are expected with partial upstream data and are only logged and
/// counted, never returned as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DropReason {
    MissingStation,
    MissingDate,
    MissingHour,
    MalformedTimestamp,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::MissingStation => write!(f, "missing station"),
            DropReason::MissingDate => write!(f, "missing date"),
            DropReason::MissingHour => write!(f, "missing hour"),
            DropReason::MalformedTimestamp => write!(f, "malformed timestamp"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by the frost risk computation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrostError {
    /// A stage name outside the crop's stage table. Indicates a crop/stage
    /// mismatch in the caller's configuration.
    #[error("unknown phenological stage: {0}")]
    UnknownStage(String),
    /// Only the crops in `crops::CROP_REGISTRY` are supported.
    #[error("unsupported crop: {0}")]
    UnsupportedCrop(String),
    /// The raw input is not a provider document at all.
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    /// A stage table that violates `lt90 < lt10` or repeats a stage.
    #[error("invalid stage configuration: {0}")]
    InvalidStageConfig(String),
}
