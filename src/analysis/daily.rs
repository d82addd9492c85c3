/// Daily frost risk summary.
///
/// Collapses one station's enriched hourly records for one date into min/max
/// weather statistics, the peak damage probability for each stage, and an
/// overall risk level. Missing values never make a summary fail: with no
/// usable data the statistics fall back to zero and the risk is `low`.

use chrono::NaiveDate;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::alert::risk_level::{RiskLevel, classify_risk};
use crate::analysis::groupings::group_by_station_day;
use crate::crops::{CropStageConfig, DamageModel, display_stage_name};
use crate::model::{EnrichedHourlyRecord, FrostError};

// ---------------------------------------------------------------------------
// Summary types
// ---------------------------------------------------------------------------

/// Peak damage for one stage across a day, with the stage's reference data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSummary {
    #[serde(skip)]
    pub stage: String,
    #[serde(skip)]
    pub display_name: String,
    pub probability: f64,
    /// Same value as `probability` until a separate index is defined.
    pub frost_probability_index: f64,
    pub lt10: f64,
    pub lt90: f64,
    pub parameter_a: f64,
    pub parameter_b: f64,
}

/// Stage summaries in crop stage order, serialized as an object keyed by
/// display name ("Pinkbud", "Fullbloom", ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageSummaries(Vec<StageSummary>);

impl StageSummaries {
    pub fn get(&self, stage: &str) -> Option<&StageSummary> {
        self.0.iter().find(|s| s.stage.eq_ignore_ascii_case(stage))
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageSummary> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for StageSummaries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for summary in &self.0 {
            map.serialize_entry(&summary.display_name, summary)?;
        }
        map.end()
    }
}

/// Daily statistics and risk for one station and date.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub station_id: Option<String>,
    pub station_name: Option<String>,
    pub date: Option<NaiveDate>,
    pub hours_observed: usize,
    pub air_temp_min: f64,
    pub air_temp_max: f64,
    pub dew_point_min: f64,
    pub dew_point_max: f64,
    pub humidity_min: i32,
    pub humidity_max: i32,
    pub stages: StageSummaries,
    pub max_damage_probability: f64,
    pub risk_level: RiskLevel,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Summarizes records belonging to one station and date.
///
/// Station and date are taken from the first record; an empty group yields
/// the zero-valued summary. Fails only for a stage the model cannot resolve.
pub fn summarize<'a>(
    records: impl IntoIterator<Item = &'a EnrichedHourlyRecord>,
    stages: &CropStageConfig,
    model: &dyn DamageModel,
) -> Result<DailySummary, FrostError> {
    let records: Vec<&EnrichedHourlyRecord> = records.into_iter().collect();

    let (air_temp_min, air_temp_max) =
        min_max(records.iter().filter_map(|r| r.air_temp_c)).unwrap_or((0.0, 0.0));
    let (dew_point_min, dew_point_max) =
        min_max(records.iter().filter_map(|r| r.dew_point_c)).unwrap_or((0.0, 0.0));
    let (humidity_min, humidity_max) = min_max(records.iter().filter_map(|r| r.relative_humidity_pct))
        .map(|(lo, hi)| (lo.trunc() as i32, hi.trunc() as i32))
        .unwrap_or((0, 0));

    let mut summaries = Vec::with_capacity(stages.len());
    let mut max_damage_probability = 0.0_f64;
    for (stage, threshold) in stages.iter() {
        let probability = records
            .iter()
            .filter_map(|r| r.stage_damage.get(stage))
            .map(|d| d.damage_prob)
            .fold(0.0_f64, f64::max);
        max_damage_probability = max_damage_probability.max(probability);

        let params = model.parameters(stage)?;
        summaries.push(StageSummary {
            stage: stage.to_string(),
            display_name: display_stage_name(stage),
            probability,
            frost_probability_index: probability,
            lt10: threshold.lt10_c,
            lt90: threshold.lt90_c,
            parameter_a: params.a,
            parameter_b: params.b,
        });
    }

    let station_id = records.first().map(|r| r.station.clone());
    Ok(DailySummary {
        station_name: station_id.as_ref().map(|id| format!("CIMIS Station {}", id)),
        station_id,
        date: records.first().map(|r| r.date),
        hours_observed: records.len(),
        air_temp_min,
        air_temp_max,
        dew_point_min,
        dew_point_max,
        humidity_min,
        humidity_max,
        stages: StageSummaries(summaries),
        max_damage_probability,
        risk_level: classify_risk(max_damage_probability),
    })
}

/// One summary per (station, date) group, ordered by station then date.
pub fn summarize_by_day(
    records: &[EnrichedHourlyRecord],
    stages: &CropStageConfig,
    model: &dyn DamageModel,
) -> Result<Vec<DailySummary>, FrostError> {
    group_by_station_day(records)
        .into_iter()
        .map(|day| summarize(day.records, stages, model))
        .collect()
}

fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crops::{LogisticDamageModel, almond_stage_config};
    use crate::model::{StageDamage, StageDamageMap};

    fn rec(
        station: &str,
        hour: u32,
        temp: Option<f64>,
        rh: Option<f64>,
        dew: Option<f64>,
        damage: &[(&str, f64)],
    ) -> EnrichedHourlyRecord {
        let date = NaiveDate::from_ymd_opt(2024, 2, 28).unwrap();
        let mut stage_damage = StageDamageMap::new();
        for (stage, p) in damage {
            stage_damage.push(StageDamage {
                stage: stage.to_string(),
                lt10_c: 0.0,
                lt90_c: -1.0,
                damage_prob: *p,
            });
        }
        EnrichedHourlyRecord {
            station: station.to_string(),
            date,
            hour,
            timestamp: date.and_hms_opt(hour, 0, 0).unwrap(),
            air_temp_c: temp,
            relative_humidity_pct: rh,
            dew_point_c: dew,
            wet_bulb_c: None,
            blossom_temp_c: None,
            cooling_rate_c_per_hr: 0.0,
            stage_damage,
        }
    }

    fn summarize_almond(records: &[EnrichedHourlyRecord]) -> DailySummary {
        summarize(records, &almond_stage_config(), &LogisticDamageModel::almond())
            .expect("almond stages resolve")
    }

    #[test]
    fn test_empty_group_returns_zero_defaults() {
        let s = summarize_almond(&[]);
        assert_eq!(s.station_id, None);
        assert_eq!(s.date, None);
        assert_eq!(s.hours_observed, 0);
        assert_eq!((s.air_temp_min, s.air_temp_max), (0.0, 0.0));
        assert_eq!((s.dew_point_min, s.dew_point_max), (0.0, 0.0));
        assert_eq!((s.humidity_min, s.humidity_max), (0, 0));
        assert_eq!(s.max_damage_probability, 0.0);
        assert_eq!(s.risk_level, RiskLevel::Low);
        assert_eq!(s.stages.len(), 5);
        assert!(s.stages.iter().all(|st| st.probability == 0.0));
    }

    #[test]
    fn test_min_max_ignore_missing_values() {
        let records = vec![
            rec("12", 1, Some(3.5), Some(81.7), Some(0.4), &[]),
            rec("12", 2, None, None, None, &[]),
            rec("12", 3, Some(-1.25), Some(96.2), Some(-1.9), &[]),
        ];
        let s = summarize_almond(&records);
        assert_eq!((s.air_temp_min, s.air_temp_max), (-1.25, 3.5));
        assert_eq!((s.dew_point_min, s.dew_point_max), (-1.9, 0.4));
        assert_eq!((s.humidity_min, s.humidity_max), (81, 96), "humidity truncates");
        assert_eq!(s.hours_observed, 3);
        assert_eq!(s.station_id.as_deref(), Some("12"));
        assert_eq!(s.station_name.as_deref(), Some("CIMIS Station 12"));
    }

    #[test]
    fn test_stage_probability_is_daily_maximum() {
        let records = vec![
            rec("12", 1, Some(1.0), Some(90.0), None, &[("pinkbud", 0.2), ("fullbloom", 0.1)]),
            rec("12", 2, Some(0.0), Some(90.0), None, &[("pinkbud", 0.45), ("fullbloom", 0.05)]),
            rec("12", 3, Some(1.0), None, None, &[]),
        ];
        let s = summarize_almond(&records);
        assert_eq!(s.stages.get("pinkbud").unwrap().probability, 0.45);
        assert_eq!(s.stages.get("fullbloom").unwrap().probability, 0.1);
        assert_eq!(s.stages.get("smallnut").unwrap().probability, 0.0);
        assert_eq!(s.max_damage_probability, 0.45);
        assert_eq!(s.risk_level, RiskLevel::Moderate);
    }

    #[test]
    fn test_stage_summary_carries_reference_data() {
        let s = summarize_almond(&[]);
        let pink = s.stages.get("pinkbud").unwrap();
        assert_eq!(pink.display_name, "Pinkbud");
        assert_eq!((pink.lt10, pink.lt90), (-3.5, -5.5));
        assert_eq!((pink.parameter_a, pink.parameter_b), (10.0, 1.5));
        assert_eq!(pink.frost_probability_index, pink.probability);
    }

    #[test]
    fn test_high_risk_when_any_stage_reaches_point_six() {
        let records = vec![rec("12", 4, Some(-2.0), Some(95.0), None, &[("smallnut", 0.6)])];
        assert_eq!(summarize_almond(&records).risk_level, RiskLevel::High);
    }

    #[test]
    fn test_serialized_shape_uses_display_names_in_stage_order() {
        let value = serde_json::to_value(summarize_almond(&[rec(
            "12",
            1,
            Some(2.0),
            Some(88.0),
            Some(0.1),
            &[("petalfall", 0.25)],
        )]))
        .unwrap();

        assert_eq!(value["stationId"], "12");
        assert_eq!(value["date"], "2024-02-28");
        assert_eq!(value["airTempMin"], 2.0);
        assert_eq!(value["humidityMax"], 88);
        assert_eq!(value["riskLevel"], "low");
        assert_eq!(value["stages"]["Petalfall"]["probability"], 0.25);
        assert_eq!(value["stages"]["Petalfall"]["parameterA"], 8.0);

        let json = serde_json::to_string(&value["stages"]).unwrap();
        assert!(json.contains("Pinkbud") && json.contains("Smallnut"));
    }

    #[test]
    fn test_summarize_by_day_splits_groups() {
        let mut next_day = rec("12", 0, Some(4.0), Some(70.0), None, &[]);
        next_day.date = next_day.date.succ_opt().unwrap();
        let records = vec![
            rec("12", 22, Some(1.0), Some(90.0), None, &[]),
            rec("12", 23, Some(0.5), Some(91.0), None, &[]),
            next_day,
        ];
        let days = summarize_by_day(&records, &almond_stage_config(), &LogisticDamageModel::almond())
            .unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].hours_observed, 2);
        assert_eq!(days[1].air_temp_min, 4.0);
    }
}
