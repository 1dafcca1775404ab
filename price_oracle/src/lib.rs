//! # Price Oracle
//!
//! Short-term price forecasting for many independent daily series with one
//! shared model.
//!
//! ## Features
//!
//! - Daily price history per item and variant, read from delimited files
//! - Sliding-window training set pooled across every series
//! - Standard scaler and random forest regressor fit once, persisted as JSON
//! - Chained multi-step forecasts fed back into each series' window
//! - Delimited export and whole-table replacement in a downstream store
//! - Run ledger recording each learn and predict launch
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use price_oracle::config::OracleConfig;
//! use price_oracle::data::CsvHistorySource;
//! use price_oracle::oracle::Oracle;
//! use price_oracle::store::DirectoryStore;
//!
//! let config = OracleConfig::load(None)?;
//! let source = CsvHistorySource::new(&config.folders.history);
//! let mut store = DirectoryStore::new(&config.folders.store);
//!
//! let mut oracle = Oracle::new(config, Box::new(source), false)?;
//! if oracle.learn()? {
//!     oracle.predict()?;
//!     oracle.insert_predictions(&mut store)?;
//! }
//! # Ok::<(), price_oracle::OracleError>(())
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod forecast;
pub mod ledger;
pub mod models;
pub mod oracle;
pub mod store;
pub mod utils;
pub mod window;

// Re-export commonly used types
pub use crate::config::OracleConfig;
pub use crate::data::{gather, CsvHistorySource, HistoryRow, HistorySource, SeriesCollection, Variant};
pub use crate::error::{OracleError, Result};
pub use crate::export::{csvify, ExportFormat};
pub use crate::forecast::{ForecastEngine, ForecastRow};
pub use crate::ledger::{FileLedger, RunLedger};
pub use crate::models::{ModelArtifact, ModelTrainer, TrainingOutcome};
pub use crate::oracle::Oracle;
pub use crate::store::{BulkStore, DirectoryStore};
pub use crate::window::{build_training_matrix, TrainingMatrix};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
