/// CIMIS-style hourly document normalizer.
///
/// Converts the nested provider/record payload produced by the CIMIS API (or
/// by the local store that mimics it) into a flat, time-ordered list of
/// `HourlyObservation`s. Records with no usable station, date, or hour are
/// dropped and logged; unparseable measurement values become `None`.
///
/// Payload shape:
///
/// ```text
/// { "Data": { "Providers": [ { "Records": [ {
///     "Station": "12", "Date": "2024-01-01", "Hour": "0300",
///     "HlyAirTmp": { "Value": "5.00", "Qc": " ", "Unit": "(C)" },
///     "HlyRelHum": { "Value": "80",   "Qc": " ", "Unit": "(%)" }
/// } ] } ] } }
/// ```
///
/// The `Data` envelope is optional; a bare `{ "Providers": [...] }` is
/// accepted as well.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

use crate::logging;
use crate::model::{AIR_TEMP_KEYS, DropReason, FrostError, HourlyObservation, REL_HUM_KEYS};

// ============================================================================
// Payload Structures
// ============================================================================

/// Top-level document, with or without the `Data` envelope.
#[derive(Debug, Default, Deserialize)]
pub struct CimisDocument {
    #[serde(rename = "Data", default)]
    pub data: Option<CimisData>,
    #[serde(rename = "Providers", default)]
    pub providers: Vec<CimisProvider>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CimisData {
    #[serde(rename = "Providers", default)]
    pub providers: Vec<CimisProvider>,
}

/// One data provider (station network or spatial model).
#[derive(Debug, Default, Deserialize)]
pub struct CimisProvider {
    /// Some payloads carry the station on the provider as `{"StationNbr": ...}`.
    #[serde(rename = "Station", default)]
    pub station: Option<Value>,
    #[serde(rename = "Records", default)]
    pub records: Vec<CimisRecord>,
}

/// One raw record. Measurements live under application-specific keys and
/// are kept untyped until extraction.
#[derive(Debug, Default, Deserialize)]
pub struct CimisRecord {
    #[serde(rename = "Station", default)]
    pub station: Option<Value>,
    #[serde(rename = "Date", default)]
    pub date: Option<Value>,
    #[serde(rename = "Hour", default)]
    pub hour: Option<Value>,
    #[serde(flatten)]
    pub fields: HashMap<String, Value>,
}

impl CimisDocument {
    /// All providers, envelope first, in document order.
    pub fn providers(&self) -> impl Iterator<Item = &CimisProvider> {
        self.data
            .iter()
            .flat_map(|d| d.providers.iter())
            .chain(self.providers.iter())
    }
}

/// Parses a JSON payload. Only a payload that is not a JSON object at all is
/// an error; individual malformed records are handled by `normalize`.
pub fn parse_document(json: &str) -> Result<CimisDocument, FrostError> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| FrostError::InvalidDocument(e.to_string()))?;
    document_from_value(value)
}

/// Same as `parse_document`, from an already-decoded JSON value.
pub fn document_from_value(value: Value) -> Result<CimisDocument, FrostError> {
    if !value.is_object() {
        return Err(FrostError::InvalidDocument(format!(
            "expected a JSON object, got {}",
            json_kind(&value)
        )));
    }
    serde_json::from_value(value).map_err(|e| FrostError::InvalidDocument(e.to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Counts from one normalization pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeStats {
    pub raw_records: usize,
    pub kept: usize,
    pub dropped: BTreeMap<DropReason, usize>,
}

impl NormalizeStats {
    pub fn dropped_total(&self) -> usize {
        self.dropped.values().sum()
    }
}

/// Flattens a document into observations sorted by (station, timestamp).
///
/// The sort is required: cooling rate is computed against the previous
/// observation of the same station, regardless of how providers grouped
/// the records.
pub fn normalize(document: &CimisDocument) -> Vec<HourlyObservation> {
    normalize_with_stats(document).0
}

/// `normalize`, also returning how many records were kept and dropped.
pub fn normalize_with_stats(document: &CimisDocument) -> (Vec<HourlyObservation>, NormalizeStats) {
    let mut stats = NormalizeStats::default();
    let mut observations = Vec::new();

    for provider in document.providers() {
        for record in &provider.records {
            stats.raw_records += 1;
            match normalize_record(provider, record) {
                Ok(obs) => observations.push(obs),
                Err((station, reason)) => {
                    logging::log_dropped_record(station.as_deref(), reason);
                    *stats.dropped.entry(reason).or_insert(0) += 1;
                }
            }
        }
    }

    observations.sort_by(|a, b| {
        a.station
            .cmp(&b.station)
            .then_with(|| a.timestamp.cmp(&b.timestamp))
    });
    stats.kept = observations.len();
    (observations, stats)
}

/// Builds one observation, or reports why the record was dropped along
/// with the station (when known) for logging.
fn normalize_record(
    provider: &CimisProvider,
    record: &CimisRecord,
) -> Result<HourlyObservation, (Option<String>, DropReason)> {
    let station = record
        .station
        .as_ref()
        .and_then(station_id)
        .or_else(|| {
            provider
                .station
                .as_ref()
                .and_then(|s| s.get("StationNbr"))
                .and_then(station_id)
        })
        .ok_or((None, DropReason::MissingStation))?;

    let date_str = match record.date.as_ref().and_then(Value::as_str).map(str::trim) {
        Some(d) if !d.is_empty() => d,
        _ => return Err((Some(station), DropReason::MissingDate)),
    };

    let hour_raw = match record.hour.as_ref().and_then(hour_code) {
        Some(h) => h,
        None => return Err((Some(station), DropReason::MissingHour)),
    };

    let timestamp = match parse_timestamp(date_str, &normalize_hour(&hour_raw)) {
        Some(ts) => ts,
        None => return Err((Some(station), DropReason::MalformedTimestamp)),
    };

    Ok(HourlyObservation {
        station,
        date: timestamp.date(),
        hour: timestamp.hour(),
        timestamp,
        air_temp_c: extract_value(&record.fields, AIR_TEMP_KEYS),
        relative_humidity_pct: extract_value(&record.fields, REL_HUM_KEYS),
    })
}

/// Station identifiers arrive as strings ("170") or bare numbers (170).
fn station_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Raw hour encoding as a string: "0300", "3", or 3.
fn hour_code(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => match n.as_u64() {
            Some(h) => Some(h.to_string()),
            None => n
                .as_f64()
                .filter(|h| h.fract() == 0.0 && *h >= 0.0)
                .map(|h| format!("{}", h as u64)),
        },
        _ => None,
    }
}

/// Two-character hour from a raw code.
///
/// A four-character `HHMM` code ending in `00` yields its first two
/// characters; anything else is left-padded with zeros to two characters.
pub fn normalize_hour(code: &str) -> String {
    if code.len() == 4 && code.ends_with("00") {
        code[..2].to_string()
    } else {
        format!("{:0>2}", code)
    }
}

/// Combines `YYYY-MM-DD` and a two-digit hour into a timestamp.
///
/// chrono accepts unpadded month and day fields, so the date shape is
/// checked first: `2024-1-1` is rejected.
fn parse_timestamp(date: &str, hour: &str) -> Option<NaiveDateTime> {
    if !is_iso_date(date) {
        return None;
    }
    NaiveDateTime::parse_from_str(&format!("{} {}:00", date, hour), "%Y-%m-%d %H:%M").ok()
}

fn is_iso_date(date: &str) -> bool {
    let bytes = date.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

/// First parseable `Value` among `keys`, in order.
///
/// Each key maps to an object like `{"Value": "12.3", "Qc": "V", "Unit": "(C)"}`.
/// A key that is absent, empty, or unparseable is skipped; if none yields a
/// finite number the field is `None`.
pub fn extract_value(fields: &HashMap<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|key| fields.get(*key).and_then(Value::as_object))
        .find_map(measurement_value)
}

fn measurement_value(obj: &Map<String, Value>) -> Option<f64> {
    let parsed = match obj.get("Value")? {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

// ============================================================================
// Query Filtering
// ============================================================================

/// Station and inclusive date-range selection over normalized observations.
///
/// An empty `stations` list selects every station; missing bounds are open.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationQuery {
    pub stations: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl ObservationQuery {
    pub fn matches(&self, obs: &HourlyObservation) -> bool {
        let station_ok =
            self.stations.is_empty() || self.stations.iter().any(|s| s.trim() == obs.station);
        let start_ok = self.start_date.is_none_or(|start| obs.date >= start);
        let end_ok = self.end_date.is_none_or(|end| obs.date <= end);
        station_ok && start_ok && end_ok
    }

    /// Keeps matching observations, preserving order.
    pub fn apply(&self, observations: Vec<HourlyObservation>) -> Vec<HourlyObservation> {
        observations.into_iter().filter(|o| self.matches(o)).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
