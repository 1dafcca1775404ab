use price_oracle::error::OracleError;
use price_oracle::store::{BulkStore, DirectoryStore};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_replace_loads_every_record() {
    let dir = TempDir::new().unwrap();
    let export = dir.path().join("predicts.csv");
    fs::write(&export, "0;2024-01-02;NULL;3.5;42;\n0;2024-01-03;1.25;3.0;42;\n").unwrap();

    let mut store = DirectoryStore::new(dir.path().join("store"));
    let loaded = store.replace_from_file("prices_predict", &export, b';').unwrap();

    assert_eq!(loaded, 2);
    assert_eq!(
        store.read_table("prices_predict", b';').unwrap(),
        vec![
            vec!["0", "2024-01-02", "NULL", "3.5", "42"],
            vec!["0", "2024-01-03", "1.25", "3.0", "42"],
        ]
    );
}

#[test]
fn test_replace_discards_previous_contents() {
    let dir = TempDir::new().unwrap();
    let mut store = DirectoryStore::new(dir.path());

    let first = dir.path().join("first.csv");
    fs::write(&first, "0;2024-01-02;1.0;1.0;1;\n0;2024-01-02;1.0;1.0;2;\n").unwrap();
    store.replace_from_file("prices_predict", &first, b';').unwrap();

    let second = dir.path().join("second.csv");
    fs::write(&second, "0;2024-02-02;2.0;NULL;3;\n").unwrap();
    assert_eq!(store.replace_from_file("prices_predict", &second, b';').unwrap(), 1);

    let rows = store.read_table("prices_predict", b';').unwrap();
    assert_eq!(rows, vec![vec!["0", "2024-02-02", "2.0", "NULL", "3"]]);

    // No staging file is left next to the table
    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains("staging"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_empty_export_empties_table() {
    let dir = TempDir::new().unwrap();
    let export = dir.path().join("predicts.csv");
    fs::write(&export, "").unwrap();

    let mut store = DirectoryStore::new(dir.path().join("store"));
    assert_eq!(store.replace_from_file("prices_predict", &export, b';').unwrap(), 0);
    assert!(store.read_table("prices_predict", b';').unwrap().is_empty());
}

#[test]
fn test_missing_export_leaves_table_untouched() {
    let dir = TempDir::new().unwrap();
    let export = dir.path().join("predicts.csv");
    fs::write(&export, "0;2024-01-02;1.0;1.0;1;\n").unwrap();

    let mut store = DirectoryStore::new(dir.path());
    store.replace_from_file("prices_predict", &export, b';').unwrap();

    let missing = dir.path().join("absent.csv");
    assert!(matches!(
        store.replace_from_file("prices_predict", &missing, b';'),
        Err(OracleError::DataError(_))
    ));
    assert_eq!(store.read_table("prices_predict", b';').unwrap().len(), 1);
}

#[test]
fn test_table_names_are_validated() {
    let dir = TempDir::new().unwrap();
    let store = DirectoryStore::new(dir.path());

    assert!(store.table_path("prices_predict").is_ok());
    assert!(matches!(
        store.table_path("../escape"),
        Err(OracleError::ValidationError(_))
    ));
    assert!(store.table_path("").is_err());
}

#[test]
fn test_unknown_table_reads_empty() {
    let dir = TempDir::new().unwrap();
    let store = DirectoryStore::new(dir.path());
    assert!(store.read_table("nothing_here", b';').unwrap().is_empty());
}
