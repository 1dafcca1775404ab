//! Layered run configuration
//!
//! Settings come from serialized defaults, then a TOML file, then
//! `ORACLE_`-prefixed environment variables (`__` separates the section
//! from the key, e.g. `ORACLE_FORECAST__WINDOW_SIZE=6`).

use crate::data::CsvHistorySource;
use crate::error::{OracleError, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use oracle_math::ForestParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up when none is given
pub const CONFIG_FILE_NAME: &str = "oracle.toml";

/// File name of the persisted regressor
pub const MODEL_FILE_NAME: &str = "rf_model.json";

/// File name of the persisted feature scaler
pub const SCALER_FILE_NAME: &str = "scaler_x.json";

/// Complete run configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub folders: FoldersConfig,
    pub history: HistoryConfig,
    pub model: ForestParams,
    pub forecast: ForecastConfig,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
}

/// Locations of inputs and outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoldersConfig {
    /// Directory holding model artifacts and the export file
    pub temp: PathBuf,
    /// Delimited price history file
    pub history: PathBuf,
    /// Root directory of the bulk table store
    pub store: PathBuf,
    /// Run ledger document
    pub ledger: PathBuf,
}

impl Default for FoldersConfig {
    fn default() -> Self {
        Self {
            temp: PathBuf::from("./data/"),
            history: PathBuf::from("./data/prices.csv"),
            store: PathBuf::from("./data/store"),
            ledger: PathBuf::from("./data/ledger.json"),
        }
    }
}

/// Price history file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub delimiter: char,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { delimiter: ';' }
    }
}

/// Windowing and horizon settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Number of past observations fed to the model
    pub window_size: usize,
    /// Number of future days forecast per series
    pub nb_predictions: usize,
    /// Store table replaced by each forecast run
    pub target_table: String,
    /// Lookback used when gathering training history (unset = all history)
    pub train_lookback_days: Option<u32>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            window_size: 4,
            nb_predictions: 7,
            target_table: "prices_predict".to_string(),
            train_lookback_days: None,
        }
    }
}

/// Tabular export settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub delimiter: char,
    pub file_name: String,
    pub null_token: String,
    /// Field order of every exported record
    pub fields: Vec<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            delimiter: ';',
            file_name: "predicts.csv".to_string(),
            null_token: "NULL".to_string(),
            fields: ["id", "date_data", "avg1", "avg1_foil", "idProduct"]
                .iter()
                .map(|f| f.to_string())
                .collect(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `price_oracle=debug`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl OracleConfig {
    /// Locate the configuration file: `explicit` if given, otherwise
    /// `../oracle.toml` when it exists, otherwise `oracle.toml`
    pub fn discover(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        let parent = Path::new("..").join(CONFIG_FILE_NAME);
        if parent.exists() {
            parent
        } else {
            PathBuf::from(CONFIG_FILE_NAME)
        }
    }

    /// Provider chain for a configuration file; a missing file contributes nothing
    pub fn figment<P: AsRef<Path>>(path: P) -> Figment {
        Figment::from(Serialized::defaults(OracleConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("ORACLE_").split("__"))
    }

    /// Load and validate the configuration
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::from_file(Self::discover(explicit))
    }

    /// Load and validate the configuration from a specific file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: OracleConfig = Self::figment(path).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges across sections
    pub fn validate(&self) -> Result<()> {
        if self.forecast.window_size == 0 {
            return Err(OracleError::InvalidParameter(
                "window_size must be at least 1".to_string(),
            ));
        }
        if self.forecast.nb_predictions == 0 {
            return Err(OracleError::InvalidParameter(
                "nb_predictions must be at least 1".to_string(),
            ));
        }
        if self.forecast.target_table.trim().is_empty() {
            return Err(OracleError::InvalidParameter(
                "target_table must not be empty".to_string(),
            ));
        }
        check_delimiter("export", self.export.delimiter)?;
        check_delimiter("history", self.history.delimiter)?;
        if self.export.fields.is_empty() {
            return Err(OracleError::InvalidParameter(
                "export fields must not be empty".to_string(),
            ));
        }
        self.model
            .validate()
            .map_err(|e| OracleError::InvalidParameter(e.to_string()))
    }

    /// Reader for the configured history file
    pub fn history_source(&self) -> CsvHistorySource {
        CsvHistorySource::new(&self.folders.history).with_delimiter(self.history.delimiter as u8)
    }

    /// Path of the persisted regressor
    pub fn model_path(&self) -> PathBuf {
        self.folders.temp.join(MODEL_FILE_NAME)
    }

    /// Path of the persisted scaler
    pub fn scaler_path(&self) -> PathBuf {
        self.folders.temp.join(SCALER_FILE_NAME)
    }

    /// Path of the forecast export file
    pub fn export_path(&self) -> PathBuf {
        self.folders.temp.join(&self.export.file_name)
    }
}

fn check_delimiter(section: &str, delimiter: char) -> Result<()> {
    if !delimiter.is_ascii() || delimiter == '"' {
        return Err(OracleError::InvalidParameter(format!(
            "{} delimiter must be a single ASCII character other than '\"', got {:?}",
            section, delimiter
        )));
    }
    Ok(())
}
