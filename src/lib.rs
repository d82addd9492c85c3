/// Almond frost risk estimation from hourly weather observations.
///
/// Raw CIMIS-style documents are normalized into per-station hourly
/// observations, enriched with dew point, wet-bulb and blossom temperatures,
/// cooling rate and per-stage damage probabilities, then summarized per
/// station and day into a qualitative risk level.

pub mod alert;
pub mod analysis;
pub mod config;
pub mod crops;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod physics;
pub mod pipeline;
