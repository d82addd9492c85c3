/// Frost risk analysis over normalized observations.
///
/// Submodules:
/// - `frost_risk` — hourly enrichment with per-station cooling state.
/// - `groupings` — organizes enriched records into station/day groups.
/// - `daily` — daily min/max statistics and per-stage peak damage.

pub mod daily;
pub mod frost_risk;
pub mod groupings;
