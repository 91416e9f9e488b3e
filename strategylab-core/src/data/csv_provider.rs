//! Local CSV file provider.
//!
//! Reads `datetime,open,high,low,close,volume` files exported by brokers or
//! other tools. Timestamps carrying an explicit offset (RFC 3339) are used as
//! is; naive timestamps are interpreted in the configured source timezone.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::warn;

use super::provider::{DataError, DataProvider, FetchWindow};
use super::twelve_data::parse_naive_datetime;
use crate::domain::PriceRow;

#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(alias = "timestamp", alias = "date", alias = "Date")]
    datetime: String,
    #[serde(alias = "Open")]
    open: f64,
    #[serde(alias = "High")]
    high: f64,
    #[serde(alias = "Low")]
    low: f64,
    #[serde(alias = "Close")]
    close: f64,
    #[serde(default, alias = "Volume")]
    volume: Option<f64>,
}

pub struct CsvFileProvider {
    symbol: String,
    path: PathBuf,
    timezone: Tz,
    window: FetchWindow,
}

impl CsvFileProvider {
    pub fn new(symbol: impl Into<String>, path: impl Into<PathBuf>, timezone: Tz, window: FetchWindow) -> Self {
        Self {
            symbol: symbol.into(),
            path: path.into(),
            timezone,
            window,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn to_utc(&self, raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw.trim()) {
            return Some(dt.with_timezone(&Utc));
        }
        let naive = parse_naive_datetime(raw)?;
        self.timezone
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl DataProvider for CsvFileProvider {
    fn name(&self) -> &str {
        "csv_file"
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn window(&self) -> &FetchWindow {
        &self.window
    }

    fn window_mut(&mut self) -> &mut FetchWindow {
        &mut self.window
    }

    fn fetch(&self) -> Result<Vec<PriceRow>, DataError> {
        let mut reader = csv::Reader::from_path(&self.path).map_err(|e| match e.into_kind() {
            csv::ErrorKind::Io(io) => DataError::io(&self.path, io),
            other => DataError::CacheError(format!("{other:?}")),
        })?;

        let mut rows = Vec::new();
        for (line, record) in reader.deserialize::<CsvRecord>().enumerate() {
            let record = record.map_err(|e| {
                DataError::ResponseFormatChanged(format!("{}:{}: {e}", self.path.display(), line + 2))
            })?;
            let Some(timestamp) = self.to_utc(&record.datetime) else {
                warn!(path = %self.path.display(), datetime = %record.datetime, "unparseable timestamp, skipping row");
                continue;
            };
            if !self.window.contains(timestamp.date_naive()) {
                continue;
            }
            rows.push(PriceRow {
                timestamp,
                open: record.open,
                high: record.high,
                low: record.low,
                close: record.close,
                volume: record.volume.unwrap_or(0.0),
            });
        }
        Ok(rows)
    }

    fn ping(&self) -> bool {
        self.path.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn naive_timestamps_localize_in_source_timezone() {
        let f = write_csv(
            "datetime,open,high,low,close,volume\n\
             2024-01-03 09:00:00,100,101,99,100.5,1000\n",
        );
        let p = CsvFileProvider::new("005930", f.path(), chrono_tz::Asia::Seoul, FetchWindow::default());
        let rows = p.get_data();
        assert_eq!(rows.len(), 1);
        // KST is UTC+9
        assert_eq!(rows[0].timestamp.hour(), 0);
        assert_eq!(rows[0].timestamp.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
    }

    #[test]
    fn explicit_offset_is_honoured() {
        let f = write_csv(
            "timestamp,open,high,low,close,volume\n\
             2024-01-03T09:00:00-05:00,1,1,1,1,1\n",
        );
        let p = CsvFileProvider::new("X", f.path(), chrono_tz::Asia::Seoul, FetchWindow::default());
        let rows = p.get_data();
        assert_eq!(rows[0].timestamp.hour(), 14);
    }

    #[test]
    fn window_filters_rows() {
        let f = write_csv(
            "datetime,open,high,low,close,volume\n\
             2024-01-02,1,1,1,1,1\n2024-01-03,2,2,2,2,1\n2024-01-04,3,3,3,3,1\n",
        );
        let window = FetchWindow::new(NaiveDate::from_ymd_opt(2024, 1, 3), NaiveDate::from_ymd_opt(2024, 1, 3));
        let p = CsvFileProvider::new("X", f.path(), Tz::UTC, window);
        let rows = p.get_data();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].close, 2.0);
    }

    #[test]
    fn missing_file_is_empty_not_error() {
        let p = CsvFileProvider::new("X", "/nonexistent/prices.csv", Tz::UTC, FetchWindow::default());
        assert!(!p.ping());
        assert!(p.get_data().is_empty());
    }
}
