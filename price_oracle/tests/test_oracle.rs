use chrono::{Days, NaiveDate};
use oracle_math::ForestParams;
use price_oracle::config::OracleConfig;
use price_oracle::data::{CsvHistorySource, HistoryRow, MemoryHistorySource};
use price_oracle::error::OracleError;
use price_oracle::oracle::Oracle;
use price_oracle::store::DirectoryStore;
use pretty_assertions::assert_eq;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn create_test_config(root: &Path) -> OracleConfig {
    let mut config = OracleConfig::default();
    config.folders.temp = root.join("temp");
    config.folders.history = root.join("prices.csv");
    config.folders.store = root.join("store");
    config.folders.ledger = root.join("ledger.json");
    config.model = ForestParams {
        n_estimators: 10,
        n_jobs: 1,
        ..ForestParams::default()
    };
    config
}

/// Items 1 and 2 have 30 days of history, item 3 only two
fn write_history(path: &Path) {
    let mut text = String::from("idProduct;date_data;avg1;avg1_foil\n");
    for item in 1..=2u64 {
        for d in 0..30u64 {
            let date = start() + Days::new(d);
            let price = item as f64 + (d % 5) as f64 * 0.25;
            writeln!(text, "{};{};{};{}", item, date, price, price * 3.0).unwrap();
        }
    }
    for d in 28..30u64 {
        writeln!(text, "3;{};0.5;", start() + Days::new(d)).unwrap();
    }
    fs::write(path, text).unwrap();
}

fn csv_oracle(config: &OracleConfig, reset: bool) -> Oracle {
    let source = CsvHistorySource::new(&config.folders.history);
    Oracle::new(config.clone(), Box::new(source), reset).unwrap()
}

#[test]
fn test_learn_predict_insert() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    write_history(&config.folders.history);

    let mut oracle = csv_oracle(&config, true);
    assert!(oracle.learn().unwrap());
    assert!(config.model_path().exists());
    assert!(config.scaler_path().exists());
    assert_eq!(oracle.as_of(), Some(start() + Days::new(29)));

    let path = oracle.predict().unwrap();
    assert_eq!(path, config.export_path());

    let text = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    // Item 3 is too short to seed a window
    assert_eq!(lines.len(), 2 * 7);
    assert!(lines.iter().all(|l| l.starts_with("0;") && l.ends_with(';')));
    assert!(lines[0].ends_with(";1;"));
    assert!(lines[0].contains(";2024-01-31;"));
    assert!(lines[6].contains(";2024-02-06;"));
    assert!(lines[7].ends_with(";2;"));

    let mut store = DirectoryStore::new(&config.folders.store);
    assert_eq!(oracle.insert_predictions(&mut store).unwrap(), 14);
    let table = store.read_table("prices_predict", b';').unwrap();
    assert_eq!(table.len(), 14);
    assert!(table.iter().all(|row| row.len() == 5));
}

#[test]
fn test_predict_reuses_saved_model() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    write_history(&config.folders.history);

    let mut learner = csv_oracle(&config, false);
    assert!(learner.learn().unwrap());
    let first = fs::read_to_string(learner.predict().unwrap()).unwrap();

    // A fresh process only gathers the last window_size days
    let mut predictor = csv_oracle(&config, false);
    assert!(predictor.artifact().is_trained());
    let second = fs::read_to_string(predictor.predict().unwrap()).unwrap();
    assert_eq!(
        predictor.collection().unwrap().get(1).unwrap().len(),
        config.forecast.window_size + 1
    );

    assert_eq!(first, second);
}

#[test]
fn test_predict_without_model() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    write_history(&config.folders.history);

    let mut oracle = csv_oracle(&config, true);
    assert!(matches!(oracle.predict(), Err(OracleError::MissingArtifact(_))));
    assert!(!config.export_path().exists());
}

#[test]
fn test_reset_ignores_saved_model() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    write_history(&config.folders.history);

    assert!(csv_oracle(&config, false).learn().unwrap());
    assert!(csv_oracle(&config, false).artifact().is_trained());
    assert!(!csv_oracle(&config, true).artifact().is_trained());
}

#[test]
fn test_empty_history() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    fs::write(&config.folders.history, "idProduct;date_data;avg1;avg1_foil\n").unwrap();

    let mut oracle = csv_oracle(&config, true);
    assert!(!oracle.gather_data(None).unwrap());
    assert!(!oracle.learn().unwrap());
    assert!(!config.model_path().exists());
}

#[test]
fn test_too_short_history_keeps_previous_model() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    write_history(&config.folders.history);
    assert!(csv_oracle(&config, false).learn().unwrap());
    let saved = fs::read_to_string(config.model_path()).unwrap();

    let rows = (0..4u64)
        .map(|d| HistoryRow::new(1, start() + Days::new(d), Some(1.0), Some(2.0)))
        .collect();
    let mut oracle = Oracle::new(config.clone(), Box::new(MemoryHistorySource::new(rows)), false)
        .unwrap();

    assert!(!oracle.learn().unwrap());
    assert!(oracle.artifact().is_trained());
    assert_eq!(fs::read_to_string(config.model_path()).unwrap(), saved);
}

#[test]
fn test_training_lookback() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path());
    config.forecast.train_lookback_days = Some(9);
    write_history(&config.folders.history);

    let mut oracle = csv_oracle(&config, true);
    assert!(oracle.learn().unwrap());
    assert_eq!(oracle.collection().unwrap().get(1).unwrap().len(), 10);
}

#[test]
fn test_window_mismatch_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path());
    write_history(&config.folders.history);
    assert!(csv_oracle(&config, false).learn().unwrap());

    config.forecast.window_size = 6;
    let mut oracle = csv_oracle(&config, false);
    assert!(matches!(oracle.predict(), Err(OracleError::InvalidParameter(_))));
}

#[test]
fn test_insert_before_predict() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    write_history(&config.folders.history);

    let oracle = csv_oracle(&config, true);
    let mut store = DirectoryStore::new(&config.folders.store);
    assert!(matches!(
        oracle.insert_predictions(&mut store),
        Err(OracleError::DataError(_))
    ));
}
