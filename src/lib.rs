//! # Card Oracle
//!
//! Workspace facade over the price forecasting crates.
//!
//! - [`math`] holds the scaler, regression tree and random forest
//! - [`oracle`] holds the history, training, forecasting and export pipeline
//!
//! ## Example
//!
//! ```
//! use card_oracle_workspace::oracle::config::OracleConfig;
//!
//! let config = OracleConfig::default();
//! assert_eq!(config.forecast.window_size, 4);
//! assert_eq!(config.forecast.nb_predictions, 7);
//! ```

pub use oracle_math as math;
pub use price_oracle as oracle;
