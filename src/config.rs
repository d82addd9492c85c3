/// Service configuration.
///
/// Read from a TOML file (default `./frostmon.toml`, optional), then
/// overridden by environment variables, with `.env` honored via `dotenv`:
///
/// ```toml
/// [model]
/// crop = "almond"
/// delta_orchard_c = 1.0
///
/// [query]
/// stations = ["145"]
/// start_date = "2024-02-20"
/// end_date = "2024-02-22"
///
/// [logging]
/// level = "info"
/// log_file = "frostmon.log"
/// timestamps = true
/// ```
///
/// Dates must be quoted strings (`YYYY-MM-DD`).

use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::crops::crop_profile;
use crate::ingest::cimis::ObservationQuery;
use crate::logging::LogLevel;
use crate::physics::DEFAULT_DELTA_ORCHARD_C;
use crate::pipeline::FrostRiskRequest;

/// Config file looked up when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "./frostmon.toml";

/// Station queried when none is configured.
pub const DEFAULT_STATION: &str = "145";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub crop: String,
    pub delta_orchard_c: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            crop: "almond".to_string(),
            delta_orchard_c: DEFAULT_DELTA_ORCHARD_C,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub stations: Vec<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stations: vec![DEFAULT_STATION.to_string()],
            start_date: None,
            end_date: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub log_file: Option<String>,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_file: None,
            timestamps: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FrostConfig {
    pub model: ModelConfig,
    pub query: QueryConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl FrostConfig {
    /// Loads `path`, or `DEFAULT_CONFIG_PATH` if it exists, or defaults;
    /// then applies environment overrides and validates.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Applies `FROSTMON_*` overrides using `lookup` to read variables.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(crop) = lookup("FROSTMON_CROP") {
            self.model.crop = crop;
        }
        if let Some(delta) = lookup("FROSTMON_DELTA_ORCHARD_C") {
            self.model.delta_orchard_c = delta.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("FROSTMON_DELTA_ORCHARD_C is not a number: '{}'", delta))
            })?;
        }
        if let Some(stations) = lookup("FROSTMON_STATIONS") {
            self.query.stations = stations
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(level) = lookup("FROSTMON_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(file) = lookup("FROSTMON_LOG_FILE") {
            self.logging.log_file = Some(file);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.model.delta_orchard_c.is_finite() {
            return Err(ConfigError::Invalid(
                "model.delta_orchard_c must be a finite number".to_string(),
            ));
        }
        crop_profile(&self.model.crop).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.log_level()?;
        self.query_window()?;
        Ok(())
    }

    pub fn log_level(&self) -> Result<LogLevel, ConfigError> {
        self.logging.level.parse().map_err(ConfigError::Invalid)
    }

    /// Parsed `(start_date, end_date)`; start must not be after end.
    pub fn query_window(&self) -> Result<(Option<NaiveDate>, Option<NaiveDate>), ConfigError> {
        let start = parse_date("query.start_date", self.query.start_date.as_deref())?;
        let end = parse_date("query.end_date", self.query.end_date.as_deref())?;
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(ConfigError::Invalid(format!(
                    "query.start_date {} is after query.end_date {}",
                    s, e
                )));
            }
        }
        Ok((start, end))
    }

    /// Builds the pipeline request described by this configuration.
    pub fn to_request(&self) -> Result<FrostRiskRequest, ConfigError> {
        let (start_date, end_date) = self.query_window()?;
        Ok(FrostRiskRequest {
            crop: self.model.crop.clone(),
            query: ObservationQuery {
                stations: self.query.stations.clone(),
                start_date,
                end_date,
            },
            delta_orchard_c: self.model.delta_orchard_c,
            parallel: false,
        })
    }
}

fn parse_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, ConfigError> {
    value
        .map(|v| {
            NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d").map_err(|_| {
                ConfigError::Invalid(format!("{} must be YYYY-MM-DD, got '{}'", field, v))
            })
        })
        .transpose()
}
