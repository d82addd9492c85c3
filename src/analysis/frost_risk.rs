/// Hourly frost risk enrichment.
///
/// A single left-to-right pass over station-sorted observations. Each record
/// gets dew point, wet-bulb and blossom temperatures, a cooling rate against
/// the previous observation of the same station, and a damage probability
/// for every configured stage.
///
/// The only cross-record state is the per-station `CoolingTracker`, owned by
/// the call that creates it. Input must be in non-decreasing timestamp order
/// per station (as produced by `ingest::cimis::normalize`); out-of-order
/// input gives meaningless cooling rates but never panics.

use chrono::NaiveDateTime;
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::debug;

use crate::crops::{CropStageConfig, DamageModel};
use crate::model::{EnrichedHourlyRecord, FrostError, HourlyObservation, StageDamage, StageDamageMap};
use crate::physics;

// ---------------------------------------------------------------------------
// Per-station cooling state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct StationState {
    previous_temp_c: Option<f64>,
    previous_time: NaiveDateTime,
}

/// Remembers the last temperature and timestamp seen for each station.
#[derive(Debug, Default)]
pub struct CoolingTracker {
    stations: HashMap<String, StationState>,
}

impl CoolingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cooling rate (°C/hr) for this observation, then records it as the
    /// station's latest.
    ///
    /// Returns 0.0 for the first observation of a station, when the previous
    /// temperature was missing, or when the current one is. The station's
    /// state is overwritten even with a missing temperature, so the next
    /// observation sees no prior value.
    pub fn observe(&mut self, station: &str, timestamp: NaiveDateTime, air_temp_c: Option<f64>) -> f64 {
        let rate = match (self.stations.get(station), air_temp_c) {
            (Some(StationState { previous_temp_c: Some(prev), previous_time }), Some(current)) => {
                let elapsed_hours =
                    (timestamp - *previous_time).num_seconds() as f64 / 3600.0;
                physics::cooling_rate(*prev, current, elapsed_hours)
            }
            _ => 0.0,
        };

        if air_temp_c.is_none() && self.stations.contains_key(station) {
            debug!(station, %timestamp, "missing air temperature; cooling baseline reset");
        }

        self.stations.insert(
            station.to_string(),
            StationState {
                previous_temp_c: air_temp_c,
                previous_time: timestamp,
            },
        );
        rate
    }

    pub fn station_count(&self) -> usize {
        self.stations.len()
    }
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

/// Enriches every observation in order. Fails only if the stage table names
/// a stage the damage model does not know.
pub fn compute_frost_risk(
    observations: &[HourlyObservation],
    stages: &CropStageConfig,
    model: &dyn DamageModel,
    delta_orchard_c: f64,
) -> Result<Vec<EnrichedHourlyRecord>, FrostError> {
    enrich_sequence(observations.iter(), stages, model, delta_orchard_c)
}

/// Same result as `compute_frost_risk`, with stations enriched concurrently.
///
/// Observations are partitioned by station, keeping first-appearance order
/// of stations and input order within each station; each partition gets its
/// own `CoolingTracker`. For station-sorted input the output is identical to
/// the sequential pass.
pub fn compute_frost_risk_parallel(
    observations: &[HourlyObservation],
    stages: &CropStageConfig,
    model: &dyn DamageModel,
    delta_orchard_c: f64,
) -> Result<Vec<EnrichedHourlyRecord>, FrostError> {
    let partitions = partition_by_station(observations);

    let enriched: Vec<Vec<EnrichedHourlyRecord>> = partitions
        .par_iter()
        .map(|partition| enrich_sequence(partition.iter().copied(), stages, model, delta_orchard_c))
        .collect::<Result<_, _>>()?;

    Ok(enriched.into_iter().flatten().collect())
}

fn partition_by_station(observations: &[HourlyObservation]) -> Vec<Vec<&HourlyObservation>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut partitions: Vec<Vec<&HourlyObservation>> = Vec::new();
    for obs in observations {
        let slot = *index.entry(obs.station.as_str()).or_insert_with(|| {
            partitions.push(Vec::new());
            partitions.len() - 1
        });
        partitions[slot].push(obs);
    }
    partitions
}

fn enrich_sequence<'a>(
    observations: impl Iterator<Item = &'a HourlyObservation>,
    stages: &CropStageConfig,
    model: &dyn DamageModel,
    delta_orchard_c: f64,
) -> Result<Vec<EnrichedHourlyRecord>, FrostError> {
    let mut tracker = CoolingTracker::new();
    observations
        .map(|obs| enrich_one(obs, &mut tracker, stages, model, delta_orchard_c))
        .collect()
}

fn enrich_one(
    obs: &HourlyObservation,
    tracker: &mut CoolingTracker,
    stages: &CropStageConfig,
    model: &dyn DamageModel,
    delta_orchard_c: f64,
) -> Result<EnrichedHourlyRecord, FrostError> {
    let (dew_point_c, wet_bulb_c, blossom_temp_c) = match (obs.air_temp_c, obs.relative_humidity_pct) {
        (Some(t), Some(rh)) => (
            Some(physics::dew_point_temperature(t, rh)),
            Some(physics::wet_bulb_temperature(t, rh)),
            Some(physics::blossom_temperature(t, rh, delta_orchard_c)),
        ),
        _ => (None, None, None),
    };

    let cooling_rate_c_per_hr = tracker.observe(&obs.station, obs.timestamp, obs.air_temp_c);

    let mut stage_damage = StageDamageMap::new();
    if let Some(blossom) = blossom_temp_c {
        for (stage, threshold) in stages.iter() {
            stage_damage.push(StageDamage {
                stage: stage.to_string(),
                lt10_c: threshold.lt10_c,
                lt90_c: threshold.lt90_c,
                damage_prob: model.probability(blossom, stage)?,
            });
        }
    }

    Ok(EnrichedHourlyRecord {
        station: obs.station.clone(),
        date: obs.date,
        hour: obs.hour,
        timestamp: obs.timestamp,
        air_temp_c: obs.air_temp_c,
        relative_humidity_pct: obs.relative_humidity_pct,
        dew_point_c,
        wet_bulb_c,
        blossom_temp_c,
        cooling_rate_c_per_hr,
        stage_damage,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crops::{DamageParameters, LogisticDamageModel, StageThreshold, almond_stage_config};
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn obs(station: &str, hour: u32, temp: Option<f64>, rh: Option<f64>) -> HourlyObservation {
        let date = NaiveDate::from_ymd_opt(2024, 2, 20).unwrap();
        HourlyObservation {
            station: station.to_string(),
            date,
            hour,
            timestamp: date.and_hms_opt(hour, 0, 0).unwrap(),
            air_temp_c: temp,
            relative_humidity_pct: rh,
        }
    }

    fn run(observations: &[HourlyObservation]) -> Vec<EnrichedHourlyRecord> {
        compute_frost_risk(
            observations,
            &almond_stage_config(),
            &LogisticDamageModel::almond(),
            physics::DEFAULT_DELTA_ORCHARD_C,
        )
        .expect("almond stages are all known to the almond model")
    }

    #[test]
    fn test_first_observation_cooling_rate_is_zero() {
        let out = run(&[obs("12", 1, Some(-4.0), Some(90.0))]);
        assert_eq!(out[0].cooling_rate_c_per_hr, 0.0);
    }

    #[test]
    fn test_cooling_rate_two_degrees_in_one_hour() {
        let out = run(&[
            obs("12", 1, Some(10.0), Some(80.0)),
            obs("12", 2, Some(8.0), Some(80.0)),
        ]);
        assert_eq!(out[1].cooling_rate_c_per_hr, 2.0);
    }

    #[test]
    fn test_cooling_rate_divides_by_elapsed_hours() {
        let out = run(&[
            obs("12", 1, Some(6.0), Some(80.0)),
            obs("12", 4, Some(0.0), Some(80.0)),
        ]);
        assert_eq!(out[1].cooling_rate_c_per_hr, 2.0);
    }

    #[test]
    fn test_duplicate_timestamp_uses_one_hour_default() {
        let out = run(&[
            obs("12", 3, Some(5.0), Some(80.0)),
            obs("12", 3, Some(2.0), Some(80.0)),
        ]);
        assert_eq!(out[1].cooling_rate_c_per_hr, 3.0);
    }

    #[test]
    fn test_cooling_state_is_per_station() {
        let out = run(&[
            obs("12", 1, Some(10.0), Some(80.0)),
            obs("20", 2, Some(0.0), Some(80.0)),
            obs("12", 2, Some(9.0), Some(80.0)),
        ]);
        assert_eq!(out[1].cooling_rate_c_per_hr, 0.0, "first record for station 20");
        assert_eq!(out[2].cooling_rate_c_per_hr, 1.0);
    }

    #[test]
    fn test_missing_temperature_resets_baseline() {
        let out = run(&[
            obs("12", 1, Some(10.0), Some(80.0)),
            obs("12", 2, None, Some(80.0)),
            obs("12", 3, Some(7.0), Some(80.0)),
        ]);
        assert_eq!(out[1].cooling_rate_c_per_hr, 0.0);
        assert_eq!(
            out[2].cooling_rate_c_per_hr, 0.0,
            "prior temperature was null, so there is no baseline"
        );
    }

    #[test]
    fn test_missing_humidity_nulls_derived_values_and_stages() {
        let out = run(&[obs("12", 1, Some(1.0), None)]);
        let r = &out[0];
        assert!(r.dew_point_c.is_none());
        assert!(r.wet_bulb_c.is_none());
        assert!(r.blossom_temp_c.is_none());
        assert!(r.stage_damage.is_empty());
        assert_eq!(r.air_temp_c, Some(1.0));
    }

    #[test]
    fn test_complete_observation_gets_every_stage() {
        let out = run(&[obs("12", 5, Some(-1.0), Some(85.0))]);
        let r = &out[0];
        let blossom = r.blossom_temp_c.expect("both inputs present");
        assert_abs_diff_eq!(
            blossom,
            physics::blossom_temperature(-1.0, 85.0, 1.0),
            epsilon = 1e-12
        );

        let names: Vec<_> = r.stage_damage.iter().map(|d| d.stage.as_str()).collect();
        assert_eq!(names, vec!["pinkbud", "fullbloom", "petalfall", "fruitset", "smallnut"]);

        let fullbloom = r.stage_damage.get("fullbloom").unwrap();
        assert_eq!(fullbloom.lt10_c, -3.0);
        assert_eq!(fullbloom.lt90_c, -4.5);
        assert_abs_diff_eq!(
            fullbloom.damage_prob,
            crate::crops::damage_probability(blossom, "fullbloom").unwrap(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_unknown_stage_in_config_propagates() {
        let stages = CropStageConfig::new(
            "almond",
            [("budswell".to_string(), StageThreshold { lt10_c: -6.0, lt90_c: -9.0 })],
        )
        .unwrap();
        let result = compute_frost_risk(
            &[obs("12", 1, Some(0.0), Some(90.0))],
            &stages,
            &LogisticDamageModel::almond(),
            1.0,
        );
        assert_eq!(result, Err(FrostError::UnknownStage("budswell".to_string())));
    }

    #[test]
    fn test_unknown_stage_not_raised_without_blossom_temp() {
        let stages = CropStageConfig::new(
            "almond",
            [("budswell".to_string(), StageThreshold { lt10_c: -6.0, lt90_c: -9.0 })],
        )
        .unwrap();
        let result =
            compute_frost_risk(&[obs("12", 1, None, None)], &stages, &LogisticDamageModel::almond(), 1.0);
        assert!(result.is_ok());
    }

    struct ConstantModel;

    impl DamageModel for ConstantModel {
        fn parameters(&self, _stage: &str) -> Result<DamageParameters, FrostError> {
            Ok(DamageParameters { a: 0.0, b: 0.0 })
        }
    }

    #[test]
    fn test_damage_model_is_pluggable() {
        let out = compute_frost_risk(
            &[obs("12", 1, Some(0.0), Some(90.0))],
            &almond_stage_config(),
            &ConstantModel,
            1.0,
        )
        .unwrap();
        assert!(out[0].stage_damage.iter().all(|d| d.damage_prob == 0.5));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut input = Vec::new();
        for station in ["12", "145", "20"] {
            for hour in 0..8 {
                let temp = if hour == 4 { None } else { Some(6.0 - hour as f64) };
                input.push(obs(station, hour, temp, Some(70.0 + hour as f64)));
            }
        }
        let sequential = run(&input);
        let parallel = compute_frost_risk_parallel(
            &input,
            &almond_stage_config(),
            &LogisticDamageModel::almond(),
            physics::DEFAULT_DELTA_ORCHARD_C,
        )
        .unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_parallel_keeps_station_continuity_for_interleaved_input() {
        let input = vec![
            obs("12", 1, Some(10.0), Some(80.0)),
            obs("20", 1, Some(5.0), Some(80.0)),
            obs("12", 2, Some(8.0), Some(80.0)),
            obs("20", 2, Some(4.0), Some(80.0)),
        ];
        let out = compute_frost_risk_parallel(
            &input,
            &almond_stage_config(),
            &LogisticDamageModel::almond(),
            1.0,
        )
        .unwrap();
        let rates: Vec<_> = out
            .iter()
            .map(|r| (r.station.as_str(), r.cooling_rate_c_per_hr))
            .collect();
        assert_eq!(rates, vec![("12", 0.0), ("12", 2.0), ("20", 0.0), ("20", 1.0)]);
    }

    #[test]
    fn test_tracker_counts_stations() {
        let mut tracker = CoolingTracker::new();
        let t = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        tracker.observe("a", t, Some(1.0));
        tracker.observe("b", t, None);
        tracker.observe("a", t, Some(0.0));
        assert_eq!(tracker.station_count(), 2);
    }
}
