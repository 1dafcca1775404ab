//! Delimited export of forecast rows
//!
//! Each record renders its fields in a fixed order, each followed by the
//! delimiter, one record per line:
//!
//! - absent values render as the null token (`NULL`)
//! - dates render as `YYYY-MM-DD`
//! - numbers and all-digit text render as literals, floats in shortest
//!   round-trip form with exponents written as `1e-07` or `1e+16`
//! - other text is double-quoted with embedded quotes doubled

use crate::config::ExportConfig;
use crate::data::Variant;
use crate::error::{OracleError, Result};
use crate::forecast::ForecastRow;
use chrono::NaiveDate;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use tracing::info;

/// A single exported value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Date(NaiveDate),
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Render the value as it appears between delimiters
    pub fn render(&self, null_token: &str) -> String {
        match self {
            FieldValue::Null => null_token.to_string(),
            FieldValue::Date(date) => date.format("%Y-%m-%d").to_string(),
            FieldValue::Int(value) => value.to_string(),
            FieldValue::Float(value) => render_float(*value),
            FieldValue::Text(text) if is_numeric_text(text) => text.clone(),
            FieldValue::Text(text) => format!("\"{}\"", text.replace('"', "\"\"")),
        }
    }
}

impl From<Option<f64>> for FieldValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(FieldValue::Null, FieldValue::Float)
    }
}

/// Shortest round-trip form with a decimal point on integral values
/// (`12.0`) and a signed two-digit exponent outside `1e-4..1e16`
/// (`1e-07`, `1.5e+16`).
fn render_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    // Debug already switches to exponent form at the same magnitudes
    let text = format!("{:?}", value);
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => text,
    }
}

fn is_numeric_text(text: &str) -> bool {
    !text.is_empty() && text.chars().all(char::is_numeric)
}

/// A record that can be exported field by field
pub trait ExportRecord {
    /// Value of the named field, `None` when the record has no such field
    fn field(&self, name: &str) -> Option<FieldValue>;
}

impl ExportRecord for ForecastRow {
    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => Some(FieldValue::Text(self.id.clone())),
            "date_data" => Some(FieldValue::Date(self.date)),
            "idProduct" => Some(
                i64::try_from(self.item)
                    .map(FieldValue::Int)
                    .unwrap_or_else(|_| FieldValue::Text(self.item.to_string())),
            ),
            _ => Variant::ALL
                .into_iter()
                .find(|v| v.field_name() == name)
                .map(|v| FieldValue::from(self.value(v))),
        }
    }
}

/// Field order, delimiter and null token of an export
#[derive(Debug, Clone, PartialEq)]
pub struct ExportFormat {
    pub fields: Vec<String>,
    pub delimiter: u8,
    pub null_token: String,
}

impl Default for ExportFormat {
    fn default() -> Self {
        Self::from_config(&ExportConfig::default())
    }
}

impl ExportFormat {
    /// Format described by the export section; the delimiter must be ASCII
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            fields: config.fields.clone(),
            delimiter: config.delimiter as u8,
            null_token: config.null_token.clone(),
        }
    }

    /// Rendered fields of one record, in declared order
    pub fn render<R: ExportRecord + ?Sized>(&self, record: &R) -> Result<Vec<String>> {
        self.fields
            .iter()
            .map(|name| {
                record
                    .field(name)
                    .map(|v| v.render(&self.null_token))
                    .ok_or_else(|| {
                        OracleError::ValidationError(format!("Unknown export field '{}'", name))
                    })
            })
            .collect()
    }

    fn writer<W: Write>(&self, sink: W) -> csv::Writer<W> {
        csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .quote_style(csv::QuoteStyle::Never)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(sink)
    }
}

/// One record as a complete line, e.g. `0;2024-01-02;NULL;3.5;42;\n`
pub fn csvify<R: ExportRecord + ?Sized>(record: &R, format: &ExportFormat) -> Result<String> {
    let mut writer = TabularWriter::new(Vec::new(), format.clone());
    writer.write_record(record)?;
    let bytes = writer.into_inner()?;
    String::from_utf8(bytes).map_err(|e| OracleError::CsvError(e.to_string()))
}

/// Streams records to any writer
pub struct TabularWriter<W: Write> {
    writer: csv::Writer<W>,
    format: ExportFormat,
    records: usize,
}

impl<W: Write> TabularWriter<W> {
    pub fn new(sink: W, format: ExportFormat) -> Self {
        Self {
            writer: format.writer(sink),
            format,
            records: 0,
        }
    }

    pub fn write_record<R: ExportRecord + ?Sized>(&mut self, record: &R) -> Result<()> {
        let mut fields = self.format.render(record)?;
        // Empty last field leaves a trailing delimiter on every line
        fields.push(String::new());
        self.writer.write_record(&fields)?;
        self.records += 1;
        Ok(())
    }

    /// Records written so far
    pub fn records(&self) -> usize {
        self.records
    }

    /// Flush and return the underlying writer
    pub fn into_inner(self) -> Result<W> {
        self.writer.into_inner().map_err(|e| {
            OracleError::IoError(io::Error::new(e.error().kind(), e.error().to_string()))
        })
    }
}

/// Write forecast rows to `path`, replacing the file; returns the record count
pub fn write_forecasts<P: AsRef<Path>>(
    path: P,
    rows: &[ForecastRow],
    format: &ExportFormat,
) -> Result<usize> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut writer = TabularWriter::new(File::create(path)?, format.clone());
    for row in rows {
        writer.write_record(row)?;
    }
    let records = writer.records();
    writer.into_inner()?.flush()?;

    info!(records, path = %path.display(), "exported forecasts");
    Ok(records)
}
