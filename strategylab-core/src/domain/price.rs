//! PriceRow — one OHLCV observation for a single symbol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV row for one symbol at one UTC instant.
///
/// Providers convert their native timestamps to UTC before constructing rows,
/// so every row that reaches the cache is already normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceRow {
    /// Row with every price set to `close` and the given volume.
    pub fn flat(timestamp: DateTime<Utc>, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open: close,
            high: close,
            low: close,
            close,
            volume,
        }
    }

    /// Returns true if any price field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }
}

/// Sort rows by timestamp and collapse duplicates, keeping the row that
/// appears last in the input for each timestamp.
pub fn dedup_keep_last(rows: Vec<PriceRow>) -> Vec<PriceRow> {
    let mut by_ts = std::collections::BTreeMap::new();
    for row in rows {
        by_ts.insert(row.timestamp, row);
    }
    by_ts.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn flat_row_is_not_void() {
        assert!(!PriceRow::flat(ts(2), 100.0, 10.0).is_void());
    }

    #[test]
    fn nan_row_is_void() {
        let row = PriceRow::flat(ts(2), f64::NAN, 0.0);
        assert!(row.is_void());
    }

    #[test]
    fn dedup_sorts_and_keeps_last_written() {
        let rows = vec![
            PriceRow::flat(ts(3), 103.0, 1.0),
            PriceRow::flat(ts(2), 100.0, 1.0),
            PriceRow::flat(ts(3), 999.0, 1.0),
        ];
        let out = dedup_keep_last(rows);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].timestamp, ts(2));
        assert_eq!(out[1].close, 999.0);
    }
}
