use chrono::NaiveDate;
use price_oracle::data::{
    gather, CsvHistorySource, HistoryRow, HistorySource, MemoryHistorySource, Variant,
};
use price_oracle::error::OracleError;
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

fn create_test_source() -> MemoryHistorySource {
    let mut rows = Vec::new();
    for d in 1..=10 {
        rows.push(HistoryRow::new(7, day(d), Some(f64::from(d)), Some(f64::from(d) * 2.0)));
    }
    for d in 8..=10 {
        rows.push(HistoryRow::new(3, day(d), None, Some(1.5)));
    }
    MemoryHistorySource::new(rows)
}

#[test]
fn test_gather_unrestricted() {
    let collection = gather(&create_test_source(), None).unwrap().unwrap();

    assert_eq!(collection.as_of(), day(10));
    assert_eq!(collection.len(), 2);
    assert_eq!(collection.n_observations(), 13);

    let series = collection.get(7).unwrap();
    assert_eq!(series.len(), 10);
    assert_eq!(series.get(Variant::Primary)[0], 1.0);
    assert_eq!(series.get(Variant::Alternate)[9], 20.0);
}

#[test]
fn test_missing_values_read_as_zero() {
    let collection = gather(&create_test_source(), None).unwrap().unwrap();
    let series = collection.get(3).unwrap();

    assert_eq!(series.get(Variant::Primary), &[0.0, 0.0, 0.0]);
    assert_eq!(series.get(Variant::Alternate), &[1.5, 1.5, 1.5]);
}

#[test]
fn test_lookback_keeps_limit_plus_one_days() {
    let collection = gather(&create_test_source(), Some(4)).unwrap().unwrap();

    let series = collection.get(7).unwrap();
    assert_eq!(series.get(Variant::Primary), &[6.0, 7.0, 8.0, 9.0, 10.0]);
    assert_eq!(collection.get(3).unwrap().len(), 3);
}

#[test]
fn test_lookback_anchors_on_global_max_date() {
    // Item 3 stops two days before the others
    let source = MemoryHistorySource::new(vec![
        HistoryRow::new(1, day(10), Some(1.0), None),
        HistoryRow::new(3, day(5), Some(1.0), None),
        HistoryRow::new(3, day(8), Some(2.0), None),
    ]);
    let collection = gather(&source, Some(2)).unwrap().unwrap();

    assert_eq!(collection.as_of(), day(10));
    assert_eq!(collection.get(3).unwrap().get(Variant::Primary), &[2.0]);
}

#[test]
fn test_empty_history_yields_nothing() {
    let source = MemoryHistorySource::new(Vec::new());
    assert!(gather(&source, None).unwrap().is_none());
    assert!(gather(&source, Some(4)).unwrap().is_none());
}

#[test]
fn test_csv_source_reads_history_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("prices.csv");
    fs::write(
        &path,
        "idProduct;date_data;avg1;avg1_foil\n\
         12;2024-01-01;1.25;\n\
         12;2024-01-02;1.5;4.0\n\
         40;2024-01-02;NULL;0.75\n",
    )
    .unwrap();

    let source = CsvHistorySource::new(&path);
    assert_eq!(source.max_date().unwrap(), Some(day(2)));

    let collection = gather(&source, None).unwrap().unwrap();
    assert_eq!(collection.get(12).unwrap().get(Variant::Primary), &[1.25, 1.5]);
    assert_eq!(collection.get(12).unwrap().get(Variant::Alternate), &[0.0, 4.0]);
    assert_eq!(collection.get(40).unwrap().get(Variant::Primary), &[0.0]);
}

#[test]
fn test_csv_source_with_comma_delimiter() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("prices.csv");
    fs::write(
        &path,
        "idProduct,date_data,avg1,avg1_foil\n5,2024-01-03,2.0,3.0\n",
    )
    .unwrap();

    let source = CsvHistorySource::new(&path).with_delimiter(b',');
    let rows: Vec<HistoryRow> = source.rows(None).unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(rows, vec![HistoryRow::new(5, day(3), Some(2.0), Some(3.0))]);
}

#[test]
fn test_missing_history_file() {
    let source = CsvHistorySource::new("/nonexistent/prices.csv");
    match source.max_date() {
        Err(OracleError::DataError(msg)) => assert!(msg.contains("prices.csv")),
        other => panic!("Expected DataError, got {:?}", other),
    }
}

#[test]
fn test_unordered_csv_history_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("prices.csv");
    fs::write(
        &path,
        "idProduct;date_data;avg1;avg1_foil\n\
         1;2024-01-05;1.0;1.0\n\
         1;2024-01-04;1.0;1.0\n",
    )
    .unwrap();

    match gather(&CsvHistorySource::new(&path), None) {
        Err(OracleError::DataError(msg)) => assert!(msg.contains("chronological")),
        other => panic!("Expected DataError, got {:?}", other),
    }
}
