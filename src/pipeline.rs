/// End-to-end frost risk run over one raw document.
///
/// normalize → filter → enrich (hourly) → group → summarize (daily).
/// No I/O happens here: the caller supplies an already-fetched document.

use serde::Serialize;

use crate::analysis::daily::{DailySummary, summarize_by_day};
use crate::analysis::frost_risk::{compute_frost_risk, compute_frost_risk_parallel};
use crate::crops::crop_profile;
use crate::ingest::cimis::{CimisDocument, ObservationQuery, normalize_with_stats};
use crate::logging;
use crate::model::{EnrichedHourlyRecord, FrostError};
use crate::physics::DEFAULT_DELTA_ORCHARD_C;

/// Parameters of one frost risk run.
#[derive(Debug, Clone, PartialEq)]
pub struct FrostRiskRequest {
    pub crop: String,
    pub query: ObservationQuery,
    pub delta_orchard_c: f64,
    /// Enrich stations concurrently.
    pub parallel: bool,
}

impl Default for FrostRiskRequest {
    fn default() -> Self {
        Self {
            crop: "almond".to_string(),
            query: ObservationQuery::default(),
            delta_orchard_c: DEFAULT_DELTA_ORCHARD_C,
            parallel: false,
        }
    }
}

/// Hourly records and daily summaries from one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrostRiskReport {
    pub hourly: Vec<EnrichedHourlyRecord>,
    pub daily: Vec<DailySummary>,
}

impl FrostRiskReport {
    pub fn is_empty(&self) -> bool {
        self.hourly.is_empty()
    }
}

/// Runs the full pipeline. An empty selection is a valid, empty report.
pub fn run_pipeline(
    document: &CimisDocument,
    request: &FrostRiskRequest,
) -> Result<FrostRiskReport, FrostError> {
    let profile = crop_profile(&request.crop)?;

    let (observations, stats) = normalize_with_stats(document);
    let observations = request.query.apply(observations);

    let hourly = if request.parallel {
        compute_frost_risk_parallel(
            &observations,
            &profile.stages,
            &profile.model,
            request.delta_orchard_c,
        )?
    } else {
        compute_frost_risk(
            &observations,
            &profile.stages,
            &profile.model,
            request.delta_orchard_c,
        )?
    };

    let daily = summarize_by_day(&hourly, &profile.stages, &profile.model)?;

    logging::log_pipeline_summary(stats.raw_records, stats.kept, hourly.len(), daily.len());
    Ok(FrostRiskReport { hourly, daily })
}
