//! Price history gathering
//!
//! A [`HistorySource`] yields rows of `(item, day, primary, alternate)`
//! ordered by item then day. [`gather`] folds those rows into a
//! [`SeriesCollection`]: one pair of aligned daily series per item, anchored
//! at the most recent day in the history.

use crate::error::{OracleError, Result};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Identifier of a tracked item
pub type ItemId = u64;

/// Tracked price variant of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Variant {
    /// Standard price
    Primary,
    /// Premium (foil) price
    Alternate,
}

impl Variant {
    /// Every variant, in the order series are processed
    pub const ALL: [Variant; 2] = [Variant::Primary, Variant::Alternate];

    /// Column name of this variant in history and export records
    pub fn field_name(&self) -> &'static str {
        match self {
            Variant::Primary => "avg1",
            Variant::Alternate => "avg1_foil",
        }
    }
}

/// One day of history for one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    #[serde(rename = "idProduct")]
    pub item: ItemId,
    #[serde(rename = "date_data")]
    pub date: NaiveDate,
    #[serde(rename = "avg1", default, deserialize_with = "csv::invalid_option")]
    pub primary: Option<f64>,
    #[serde(rename = "avg1_foil", default, deserialize_with = "csv::invalid_option")]
    pub alternate: Option<f64>,
}

impl HistoryRow {
    pub fn new(item: ItemId, date: NaiveDate, primary: Option<f64>, alternate: Option<f64>) -> Self {
        Self {
            item,
            date,
            primary,
            alternate,
        }
    }
}

/// Streaming iterator over history rows
pub type RowIter<'a> = Box<dyn Iterator<Item = Result<HistoryRow>> + 'a>;

/// Bulk read access to the price history
pub trait HistorySource {
    /// Most recent day present in the history, `None` when it is empty
    fn max_date(&self) -> Result<Option<NaiveDate>>;

    /// Rows with `date >= since` (all rows when `since` is `None`),
    /// ordered by item then day
    fn rows(&self, since: Option<NaiveDate>) -> Result<RowIter<'_>>;
}

/// History kept in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryHistorySource {
    rows: Vec<HistoryRow>,
}

impl MemoryHistorySource {
    /// Create a source from rows in any order
    pub fn new(mut rows: Vec<HistoryRow>) -> Self {
        rows.sort_by_key(|r| (r.item, r.date));
        Self { rows }
    }
}

impl HistorySource for MemoryHistorySource {
    fn max_date(&self) -> Result<Option<NaiveDate>> {
        Ok(self.rows.iter().map(|r| r.date).max())
    }

    fn rows(&self, since: Option<NaiveDate>) -> Result<RowIter<'_>> {
        Ok(Box::new(
            self.rows
                .iter()
                .filter(move |r| since.map_or(true, |s| r.date >= s))
                .cloned()
                .map(Ok),
        ))
    }
}

/// History stored as a delimited file with an
/// `idProduct;date_data;avg1;avg1_foil` header.
///
/// Empty or non-numeric prices read as missing. The file must already be
/// ordered by item then day.
#[derive(Debug, Clone)]
pub struct CsvHistorySource {
    path: PathBuf,
    delimiter: u8,
}

impl CsvHistorySource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            delimiter: b';',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn reader(&self) -> Result<csv::Reader<File>> {
        let file = File::open(&self.path).map_err(|e| {
            OracleError::DataError(format!(
                "Cannot open history file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(file))
    }
}

impl HistorySource for CsvHistorySource {
    fn max_date(&self) -> Result<Option<NaiveDate>> {
        let mut max: Option<NaiveDate> = None;
        for row in self.reader()?.into_deserialize::<HistoryRow>() {
            let row = row?;
            max = Some(max.map_or(row.date, |m| m.max(row.date)));
        }
        Ok(max)
    }

    fn rows(&self, since: Option<NaiveDate>) -> Result<RowIter<'_>> {
        let rows = self
            .reader()?
            .into_deserialize::<HistoryRow>()
            .map(|r| r.map_err(OracleError::from))
            .filter(move |r| match (r, since) {
                (Ok(row), Some(s)) => row.date >= s,
                _ => true,
            });
        Ok(Box::new(rows))
    }
}

/// Aligned daily series of both variants of one item.
///
/// Missing observations are stored as 0.0 so both series always have the
/// same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariantSeries {
    primary: Vec<f64>,
    alternate: Vec<f64>,
}

impl VariantSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from complete series of equal length
    pub fn from_values(primary: Vec<f64>, alternate: Vec<f64>) -> Result<Self> {
        if primary.len() != alternate.len() {
            return Err(OracleError::DataError(format!(
                "Variant series lengths differ ({} vs {})",
                primary.len(),
                alternate.len()
            )));
        }
        Ok(Self { primary, alternate })
    }

    /// Append one day, treating missing values as 0.0
    pub fn push(&mut self, primary: Option<f64>, alternate: Option<f64>) {
        self.primary.push(primary.unwrap_or(0.0));
        self.alternate.push(alternate.unwrap_or(0.0));
    }

    /// Series of one variant
    pub fn get(&self, variant: Variant) -> &[f64] {
        match variant {
            Variant::Primary => &self.primary,
            Variant::Alternate => &self.alternate,
        }
    }

    /// Series in declared variant order
    pub fn iter(&self) -> impl Iterator<Item = (Variant, &[f64])> + '_ {
        Variant::ALL.into_iter().map(move |v| (v, self.get(v)))
    }

    /// Number of days
    pub fn len(&self) -> usize {
        self.primary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }
}

/// Series of every item, as of the most recent day in the history
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesCollection {
    as_of: NaiveDate,
    items: BTreeMap<ItemId, VariantSeries>,
}

impl SeriesCollection {
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            items: BTreeMap::new(),
        }
    }

    /// Day every forecast offset is counted from
    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    /// Insert or replace the series of an item
    pub fn insert(&mut self, item: ItemId, series: VariantSeries) {
        self.items.insert(item, series);
    }

    pub fn get(&self, item: ItemId) -> Option<&VariantSeries> {
        self.items.get(&item)
    }

    /// Items in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = (ItemId, &VariantSeries)> + '_ {
        self.items.iter().map(|(id, s)| (*id, s))
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total days across all items
    pub fn n_observations(&self) -> usize {
        self.items.values().map(VariantSeries::len).sum()
    }
}

/// First day kept for a lookback of `limit` days before `as_of` (inclusive)
pub fn lookback_start(as_of: NaiveDate, limit: u32) -> Option<NaiveDate> {
    as_of.checked_sub_days(Days::new(u64::from(limit)))
}

/// Read the history into a [`SeriesCollection`].
///
/// The maximum day is read once and anchors the collection. With `limit`,
/// only days within `limit` days of that anchor are kept. Returns `None`
/// when the history is empty.
pub fn gather<S: HistorySource + ?Sized>(
    source: &S,
    limit: Option<u32>,
) -> Result<Option<SeriesCollection>> {
    let Some(as_of) = source.max_date()? else {
        info!("price history is empty");
        return Ok(None);
    };
    let since = limit.and_then(|l| lookback_start(as_of, l));
    debug!(%as_of, ?since, "reading price history");

    let mut collection = SeriesCollection::new(as_of);
    let mut last_seen: BTreeMap<ItemId, NaiveDate> = BTreeMap::new();

    for row in source.rows(since)? {
        let row = row?;
        if let Some(previous) = last_seen.insert(row.item, row.date) {
            if row.date < previous {
                return Err(OracleError::DataError(format!(
                    "History for item {} is not in chronological order ({} after {})",
                    row.item, row.date, previous
                )));
            }
        }
        collection
            .items
            .entry(row.item)
            .or_default()
            .push(row.primary, row.alternate);
    }

    info!(
        %as_of,
        items = collection.len(),
        observations = collection.n_observations(),
        "gathered price history"
    );
    Ok(Some(collection))
}
