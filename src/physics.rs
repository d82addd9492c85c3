/// Physical quantities derived from a single hourly observation.
///
/// All functions are total over finite inputs and never fail. Callers are
/// responsible for null-guarding: none of these should be invoked when the
/// observation is missing temperature or humidity.

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magnus coefficient `a` (dimensionless).
const MAGNUS_A: f64 = 17.27;

/// Magnus coefficient `b`, in °C.
const MAGNUS_B: f64 = 237.7;

/// Default expected difference between station and orchard canopy temperature.
pub const DEFAULT_DELTA_ORCHARD_C: f64 = 1.0;

/// Elapsed time substituted when consecutive observations are not strictly
/// increasing in time.
pub const DEFAULT_ELAPSED_HOURS: f64 = 1.0;

// ---------------------------------------------------------------------------
// Derivations
// ---------------------------------------------------------------------------

/// Wet-bulb temperature (°C) from dry-bulb temperature (°C) and relative
/// humidity (%), using Stull's (2011) empirical fit.
///
/// No range check is done on humidity; the fit is valid for 5–99 %.
pub fn wet_bulb_temperature(air_temp_c: f64, relative_humidity_pct: f64) -> f64 {
    let rh = relative_humidity_pct;
    air_temp_c * (0.151977 * (rh + 8.313659).sqrt()).atan()
        + (air_temp_c + rh).atan()
        - (rh - 1.676331).atan()
        + 0.00391838 * rh.powf(1.5) * (0.023101 * rh).atan()
        - 4.686035
}

/// Dew point (°C) from air temperature (°C) and relative humidity (%),
/// using the Magnus approximation.
///
/// Humidity at or below zero has no logarithm; the air temperature is
/// returned unchanged in that case.
pub fn dew_point_temperature(air_temp_c: f64, relative_humidity_pct: f64) -> f64 {
    if relative_humidity_pct <= 0.0 {
        return air_temp_c;
    }
    let gamma =
        MAGNUS_A * air_temp_c / (MAGNUS_B + air_temp_c) + (relative_humidity_pct / 100.0).ln();
    MAGNUS_B * gamma / (MAGNUS_A - gamma)
}

/// Estimated bud temperature (°C): air temperature lowered by the wet-bulb
/// depression and the orchard canopy offset.
///
/// Algebraically this is `wet_bulb - delta_orchard_c`; it is kept in the
/// depression form so the two adjustments stay visible.
pub fn blossom_temperature(
    air_temp_c: f64,
    relative_humidity_pct: f64,
    delta_orchard_c: f64,
) -> f64 {
    let wet_bulb = wet_bulb_temperature(air_temp_c, relative_humidity_pct);
    air_temp_c - delta_orchard_c - (air_temp_c - wet_bulb)
}

/// Cooling rate (°C per hour) between two observations. Positive when the
/// temperature is falling.
///
/// A non-positive `elapsed_hours` is replaced by `DEFAULT_ELAPSED_HOURS`.
pub fn cooling_rate(previous_temp_c: f64, current_temp_c: f64, elapsed_hours: f64) -> f64 {
    let hours = if elapsed_hours > 0.0 {
        elapsed_hours
    } else {
        DEFAULT_ELAPSED_HOURS
    };
    (previous_temp_c - current_temp_c) / hours
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
