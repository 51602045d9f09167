use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

pub const DEFAULT_CATEGORICAL_COLUMN: &str = "Crop_type";
pub const DEFAULT_MAGNITUDE_COLUMN: &str = "Elevation";

pub const DB_PATH_ENV: &str = "FIELDFLUX_DB_PATH";
pub const WEATHER_MAPPING_ENV: &str = "FIELDFLUX_WEATHER_MAPPING_CSV";

/// Settings for one processing run. Field names match the keys used in
/// config files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub db_path: String,
    pub sql_query: String,
    pub columns_to_rename: BTreeMap<String, String>,
    #[serde(default)]
    pub values_to_rename: HashMap<String, String>,
    pub weather_mapping_csv: String,
    #[serde(default = "default_categorical_column")]
    pub categorical_column: String,
    #[serde(default = "default_magnitude_column")]
    pub magnitude_column: String,
}

fn default_categorical_column() -> String {
    DEFAULT_CATEGORICAL_COLUMN.to_string()
}

fn default_magnitude_column() -> String {
    DEFAULT_MAGNITUDE_COLUMN.to_string()
}

/// The pair of columns whose names are exchanged by the rename step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSwap {
    pub source: String,
    pub target: String,
}

/// Columns touched by the correction step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionColumns {
    pub categorical: String,
    pub magnitude: String,
}

impl Default for CorrectionColumns {
    fn default() -> Self {
        Self {
            categorical: DEFAULT_CATEGORICAL_COLUMN.to_string(),
            magnitude: DEFAULT_MAGNITUDE_COLUMN.to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|err| PipelineError::Config(err.to_string()))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|err| PipelineError::Config(err.to_string()))
    }

    /// Reads a config file, picking the format from its extension (`.json`
    /// is JSON, everything else is TOML).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            PipelineError::Config(format!("failed to read {}: {err}", path.display()))
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json_str(&raw)
        } else {
            Self::from_toml_str(&raw)
        }
    }

    /// Replaces the data source and weather mapping locations with the values
    /// of `FIELDFLUX_DB_PATH` / `FIELDFLUX_WEATHER_MAPPING_CSV` when set.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(db_path) = lookup(DB_PATH_ENV).filter(|value| !value.is_empty()) {
            self.db_path = db_path;
        }
        if let Some(csv) = lookup(WEATHER_MAPPING_ENV).filter(|value| !value.is_empty()) {
            self.weather_mapping_csv = csv;
        }
        self
    }

    /// Checks every field and returns the single swap pair.
    pub fn validate(&self) -> Result<ColumnSwap> {
        for (name, value) in [
            ("db_path", &self.db_path),
            ("sql_query", &self.sql_query),
            ("weather_mapping_csv", &self.weather_mapping_csv),
            ("categorical_column", &self.categorical_column),
            ("magnitude_column", &self.magnitude_column),
        ] {
            if value.trim().is_empty() {
                return Err(PipelineError::Config(format!("{name} must not be empty")));
            }
        }

        self.column_swap()
    }

    pub fn column_swap(&self) -> Result<ColumnSwap> {
        let mut pairs = self.columns_to_rename.iter();
        let (source, target) = match (pairs.next(), pairs.next()) {
            (Some(pair), None) => pair,
            (None, _) => {
                return Err(PipelineError::Config(
                    "columns_to_rename must contain exactly one pair, found none".to_string(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(PipelineError::Config(format!(
                    "columns_to_rename must contain exactly one pair, found {}",
                    self.columns_to_rename.len()
                )))
            }
        };

        if source == target {
            return Err(PipelineError::Config(format!(
                "columns_to_rename maps '{source}' to itself"
            )));
        }

        Ok(ColumnSwap {
            source: source.clone(),
            target: target.clone(),
        })
    }

    pub fn correction_columns(&self) -> CorrectionColumns {
        CorrectionColumns {
            categorical: self.categorical_column.clone(),
            magnitude: self.magnitude_column.clone(),
        }
    }
}
