//! CSV loading of HLC price series

use crate::error::{GannError, Result};
use crate::series::PriceSeries;
use crate::types::{Bar, Timestamp};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::{ReaderBuilder, StringRecord};
use std::io::Read;
use std::path::Path;

/// CSV column layout
#[derive(Debug, Clone)]
pub struct CsvFormat {
    /// Date column name; the column itself is optional
    pub date_column: String,
    pub high_column: String,
    pub low_column: String,
    pub close_column: String,
    /// Volume column name; the column itself is optional
    pub volume_column: String,
    /// Date-only format tried after RFC 3339 and `%Y-%m-%d %H:%M:%S`
    pub date_format: String,
    pub delimiter: u8,
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self {
            date_column: "Date".to_string(),
            high_column: "High".to_string(),
            low_column: "Low".to_string(),
            close_column: "Close".to_string(),
            volume_column: "Volume".to_string(),
            date_format: "%Y-%m-%d".to_string(),
            delimiter: b',',
        }
    }
}

struct Columns {
    date: Option<usize>,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

/// Reads a single-instrument series from CSV
#[derive(Debug, Clone, Default)]
pub struct CsvSeriesReader {
    format: CsvFormat,
}

impl CsvSeriesReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(format: CsvFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> &CsvFormat {
        &self.format
    }

    /// Load and validate a series from a CSV file
    pub fn load_csv(&self, path: &Path) -> Result<PriceSeries> {
        let file = std::fs::File::open(path).map_err(|e| {
            GannError::DataError(format!("Failed to open CSV {}: {}", path.display(), e))
        })?;
        let series = self.load_reader(file)?;
        log::debug!("Loaded {} bars from {}", series.len(), path.display());
        Ok(series)
    }

    /// Load and validate a series from any CSV source
    pub fn load_reader<R: Read>(&self, reader: R) -> Result<PriceSeries> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.format.delimiter)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|e| GannError::DataError(format!("Failed to read headers: {}", e)))?
            .clone();
        let columns = self.columns(&headers)?;
        if columns.date.is_none() {
            log::warn!(
                "Column '{}' not found, keeping rows in file order",
                self.format.date_column
            );
        }

        let mut bars = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let record = result
                .map_err(|e| GannError::DataError(format!("Failed to read record: {}", e)))?;
            bars.push(self.parse_bar(&record, &columns, row)?);
        }

        if columns.date.is_some() {
            bars.sort_by_key(|b| b.timestamp);
        }

        let series = PriceSeries::new(bars);
        series.validate()?;
        Ok(series)
    }

    fn columns(&self, headers: &StringRecord) -> Result<Columns> {
        Ok(Columns {
            date: find_column(headers, &self.format.date_column),
            high: require_column(headers, &self.format.high_column)?,
            low: require_column(headers, &self.format.low_column)?,
            close: require_column(headers, &self.format.close_column)?,
            volume: find_column(headers, &self.format.volume_column),
        })
    }

    fn parse_bar(&self, record: &StringRecord, columns: &Columns, row: usize) -> Result<Bar> {
        let high = parse_price(record, columns.high, "high", row)?;
        let low = parse_price(record, columns.low, "low", row)?;
        let close = parse_price(record, columns.close, "close", row)?;
        let mut bar = Bar::new(high, low, close);

        if let Some(idx) = columns.date {
            let raw = field(record, idx, "date", row)?;
            bar = bar.with_timestamp(self.parse_timestamp(raw).ok_or_else(|| {
                GannError::DataError(format!("Row {}: invalid date '{}'", row, raw))
            })?);
        }

        if let Some(idx) = columns.volume {
            match record.get(idx).map(str::parse::<f64>) {
                Some(Ok(volume)) => bar = bar.with_volume(volume),
                _ => log::warn!("Row {}: unparseable volume, leaving it empty", row),
            }
        }

        Ok(bar)
    }

    fn parse_timestamp(&self, raw: &str) -> Option<Timestamp> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
            return Some(dt.and_utc());
        }
        NaiveDate::parse_from_str(raw, &self.format.date_format)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.eq_ignore_ascii_case(name))
}

fn require_column(headers: &StringRecord, name: &str) -> Result<usize> {
    find_column(headers, name)
        .ok_or_else(|| GannError::DataError(format!("Column '{}' not found", name)))
}

fn field<'r>(record: &'r StringRecord, idx: usize, name: &str, row: usize) -> Result<&'r str> {
    record
        .get(idx)
        .ok_or_else(|| GannError::DataError(format!("Row {}: missing {}", row, name)))
}

fn parse_price(record: &StringRecord, idx: usize, name: &str, row: usize) -> Result<f64> {
    let raw = field(record, idx, name, row)?;
    raw.parse()
        .map_err(|_| GannError::DataError(format!("Row {}: invalid {} '{}'", row, name, raw)))
}
