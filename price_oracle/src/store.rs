//! Downstream table store
//!
//! Forecasts reach their consumers through a [`BulkStore`] that replaces a
//! whole table from an exported delimited file.

use crate::error::{OracleError, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

/// Destination of exported forecast files
pub trait BulkStore {
    /// Replace the contents of `table` with the records of a delimited file,
    /// returning the number of records loaded
    fn replace_from_file(&mut self, table: &str, file: &Path, delimiter: u8) -> Result<usize>;
}

/// Store keeping each table as `<root>/<table>.csv`.
///
/// The new contents are staged in a sibling file and renamed over the
/// table, so readers see either the old table or the new one, never an
/// empty one.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// File backing `table`
    pub fn table_path(&self, table: &str) -> Result<PathBuf> {
        validate_table_name(table)?;
        Ok(self.root.join(format!("{}.csv", table)))
    }

    /// Records of `table`, without the trailing empty field of each line
    pub fn read_table(&self, table: &str, delimiter: u8) -> Result<Vec<Vec<String>>> {
        let path = self.table_path(table)?;
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for record in reader(File::open(&path)?, delimiter).into_records() {
            let mut fields: Vec<String> = record?.iter().map(str::to_string).collect();
            if fields.last().map_or(false, String::is_empty) {
                fields.pop();
            }
            records.push(fields);
        }
        Ok(records)
    }
}

impl BulkStore for DirectoryStore {
    fn replace_from_file(&mut self, table: &str, file: &Path, delimiter: u8) -> Result<usize> {
        let target = self.table_path(table)?;
        let records = count_records(file, delimiter)?;

        fs::create_dir_all(&self.root)?;
        let staging = self.root.join(format!(".{}.csv.staging", table));
        fs::copy(file, &staging)?;
        fs::rename(&staging, &target)?;

        info!(table, records, path = %target.display(), "replaced table");
        Ok(records)
    }
}

fn reader(file: File, delimiter: u8) -> csv::Reader<File> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(file)
}

fn count_records(path: &Path, delimiter: u8) -> Result<usize> {
    let file = File::open(path).map_err(|e| {
        OracleError::DataError(format!("Cannot open export file {}: {}", path.display(), e))
    })?;
    let mut count = 0;
    for record in reader(file, delimiter).into_records() {
        record?;
        count += 1;
    }
    Ok(count)
}

fn validate_table_name(table: &str) -> Result<()> {
    if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(OracleError::ValidationError(format!(
            "Invalid table name '{}'",
            table
        )));
    }
    Ok(())
}
