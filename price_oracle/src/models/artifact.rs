//! Persisted regressor and scaler

use crate::config::{OracleConfig, MODEL_FILE_NAME, SCALER_FILE_NAME};
use crate::error::{OracleError, Result};
use oracle_math::{FeatureTransform, ForestParams, RandomForestRegressor, Regressor, StandardScaler};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Where the two artifact files live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub scaler: PathBuf,
}

impl ArtifactPaths {
    /// Default file names inside `dir`
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            model: dir.as_ref().join(MODEL_FILE_NAME),
            scaler: dir.as_ref().join(SCALER_FILE_NAME),
        }
    }

    pub fn from_config(config: &OracleConfig) -> Self {
        Self {
            model: config.model_path(),
            scaler: config.scaler_path(),
        }
    }

    /// Whether both files are present
    pub fn exist(&self) -> bool {
        self.model.exists() && self.scaler.exists()
    }
}

/// The shared model: one regressor and the scaler its inputs went through
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    model: RandomForestRegressor,
    scaler: StandardScaler,
}

impl ModelArtifact {
    /// Untrained artifact configured with `params`
    pub fn new(params: ForestParams) -> Self {
        Self {
            model: RandomForestRegressor::new(params),
            scaler: StandardScaler::new(),
        }
    }

    pub fn from_parts(model: RandomForestRegressor, scaler: StandardScaler) -> Self {
        Self { model, scaler }
    }

    /// Reuse the persisted artifact unless `reset` is set or a file is
    /// missing; otherwise start from a fresh untrained one
    pub fn load_or_new(paths: &ArtifactPaths, params: ForestParams, reset: bool) -> Result<Self> {
        if !reset && paths.exist() {
            let artifact = Self::load(paths)?;
            info!(model = %paths.model.display(), "loaded model artifact");
            return Ok(artifact);
        }
        info!(reset, "starting from an untrained model artifact");
        Ok(Self::new(params))
    }

    /// Read both files
    pub fn load(paths: &ArtifactPaths) -> Result<Self> {
        Ok(Self {
            model: read_json(&paths.model)?,
            scaler: read_json(&paths.scaler)?,
        })
    }

    /// Overwrite both files
    pub fn save(&self, paths: &ArtifactPaths) -> Result<()> {
        write_json(&paths.model, &self.model)?;
        write_json(&paths.scaler, &self.scaler)?;
        info!(model = %paths.model.display(), scaler = %paths.scaler.display(), "saved model artifact");
        Ok(())
    }

    /// Whether both the regressor and the scaler are fitted
    pub fn is_trained(&self) -> bool {
        self.model.is_fitted() && self.scaler.is_fitted()
    }

    pub fn model(&self) -> &RandomForestRegressor {
        &self.model
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    /// The regressor as a trait object
    pub fn regressor(&self) -> &dyn Regressor {
        &self.model
    }

    /// The scaler as a trait object
    pub fn transform(&self) -> &dyn FeatureTransform {
        &self.scaler
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| {
        OracleError::MissingArtifact(format!("Cannot open {}: {}", path.display(), e))
    })?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}
