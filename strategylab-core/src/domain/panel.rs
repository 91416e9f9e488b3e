//! Rectangular close-price matrix for multiple symbols.
//!
//! Built by inner-joining per-symbol series on the UTC calendar date: a date
//! survives only if every symbol has a finite close for it. No forward-fill.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::price::PriceRow;

#[derive(Debug, Error, PartialEq)]
pub enum PanelError {
    #[error("row {row} has {actual} values, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("{dates} dates but {rows} rows")]
    LengthMismatch { dates: usize, rows: usize },

    #[error("symbol '{0}' is not in the panel")]
    UnknownSymbol(String),

    #[error("duplicate symbol '{0}'")]
    DuplicateSymbol(String),
}

/// Close prices indexed by (date, symbol). `values[row][col]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePanel {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl PricePanel {
    pub fn new(
        dates: Vec<NaiveDate>,
        symbols: Vec<String>,
        values: Vec<Vec<f64>>,
    ) -> Result<Self, PanelError> {
        if dates.len() != values.len() {
            return Err(PanelError::LengthMismatch {
                dates: dates.len(),
                rows: values.len(),
            });
        }
        let mut seen = BTreeSet::new();
        for s in &symbols {
            if !seen.insert(s.as_str()) {
                return Err(PanelError::DuplicateSymbol(s.clone()));
            }
        }
        for (row, v) in values.iter().enumerate() {
            if v.len() != symbols.len() {
                return Err(PanelError::RaggedRow {
                    row,
                    expected: symbols.len(),
                    actual: v.len(),
                });
            }
        }
        Ok(Self {
            dates,
            symbols,
            values,
        })
    }

    /// Inner-join per-symbol rows on the UTC date of each timestamp.
    ///
    /// When a symbol has several rows on one date, the latest one supplies
    /// the close. Non-finite closes count as missing.
    pub fn inner_join(series: Vec<(String, Vec<PriceRow>)>) -> Result<Self, PanelError> {
        let mut symbols = Vec::with_capacity(series.len());
        let mut closes: Vec<BTreeMap<NaiveDate, f64>> = Vec::with_capacity(series.len());

        for (symbol, rows) in series {
            if symbols.contains(&symbol) {
                return Err(PanelError::DuplicateSymbol(symbol));
            }
            let mut by_date: BTreeMap<NaiveDate, (chrono::DateTime<chrono::Utc>, f64)> =
                BTreeMap::new();
            for row in rows {
                if !row.close.is_finite() {
                    continue;
                }
                let date = row.timestamp.date_naive();
                match by_date.get(&date) {
                    Some((ts, _)) if *ts > row.timestamp => {}
                    _ => {
                        by_date.insert(date, (row.timestamp, row.close));
                    }
                }
            }
            symbols.push(symbol);
            closes.push(by_date.into_iter().map(|(d, (_, c))| (d, c)).collect());
        }

        let dates: Vec<NaiveDate> = match closes.first() {
            None => Vec::new(),
            Some(first) => first
                .keys()
                .filter(|d| closes.iter().all(|m| m.contains_key(*d)))
                .copied()
                .collect(),
        };

        let values = dates
            .iter()
            .map(|d| closes.iter().map(|m| m[d]).collect())
            .collect();

        Ok(Self {
            dates,
            symbols,
            values,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn values(&self) -> &[Vec<f64>] {
        &self.values
    }

    pub fn n_rows(&self) -> usize {
        self.dates.len()
    }

    pub fn n_cols(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.symbols.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Column index of a symbol.
    pub fn position(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    /// All values of column `col`, top to bottom.
    pub fn column_at(&self, col: usize) -> Vec<f64> {
        self.values.iter().map(|row| row[col]).collect()
    }

    pub fn column(&self, symbol: &str) -> Option<Vec<f64>> {
        self.position(symbol).map(|col| self.column_at(col))
    }

    /// Rows whose date lies in `[start, end]`.
    pub fn slice(&self, start: NaiveDate, end: NaiveDate) -> Self {
        let (dates, values): (Vec<NaiveDate>, Vec<Vec<f64>>) = self
            .dates
            .iter()
            .zip(&self.values)
            .filter(|(d, _)| **d >= start && **d <= end)
            .map(|(d, v)| (*d, v.clone()))
            .unzip();
        Self {
            dates,
            symbols: self.symbols.clone(),
            values,
        }
    }

    /// Sub-panel with the given columns, in the given order.
    pub fn select(&self, symbols: &[String]) -> Result<Self, PanelError> {
        let cols = symbols
            .iter()
            .map(|s| {
                self.position(s)
                    .ok_or_else(|| PanelError::UnknownSymbol(s.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let values = self
            .values
            .iter()
            .map(|row| cols.iter().map(|&c| row[c]).collect())
            .collect();
        Self::new(self.dates.clone(), symbols.to_vec(), values)
    }

    /// Trailing `window`-row mean of every column. Leading rows without a full
    /// window are dropped, so the result has `n_rows - window + 1` rows.
    pub fn rolling_mean(&self, window: usize) -> Self {
        if window == 0 || self.n_rows() < window {
            return Self {
                dates: Vec::new(),
                symbols: self.symbols.clone(),
                values: Vec::new(),
            };
        }
        let n_cols = self.n_cols();
        let mut sums = vec![0.0_f64; n_cols];
        let mut dates = Vec::with_capacity(self.n_rows() - window + 1);
        let mut values = Vec::with_capacity(self.n_rows() - window + 1);

        for (i, row) in self.values.iter().enumerate() {
            for (sum, v) in sums.iter_mut().zip(row) {
                *sum += v;
            }
            if i >= window {
                for (sum, v) in sums.iter_mut().zip(&self.values[i - window]) {
                    *sum -= v;
                }
            }
            if i + 1 >= window {
                dates.push(self.dates[i]);
                values.push(sums.iter().map(|s| s / window as f64).collect());
            }
        }

        Self {
            dates,
            symbols: self.symbols.clone(),
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn row(day: u32, hour: u32, close: f64) -> PriceRow {
        PriceRow::flat(
            Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap(),
            close,
            1000.0,
        )
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn inner_join_drops_dates_missing_any_symbol() {
        let panel = PricePanel::inner_join(vec![
            ("SPY".into(), vec![row(2, 0, 100.0), row(3, 0, 101.0), row(4, 0, 102.0)]),
            ("QQQ".into(), vec![row(2, 0, 200.0), row(4, 0, 202.0)]),
        ])
        .unwrap();

        assert_eq!(panel.dates(), &[d(2), d(4)]);
        assert_eq!(panel.column("SPY").unwrap(), vec![100.0, 102.0]);
        assert_eq!(panel.column("QQQ").unwrap(), vec![200.0, 202.0]);
    }

    #[test]
    fn inner_join_uses_latest_row_of_a_date() {
        let panel = PricePanel::inner_join(vec![(
            "SPY".into(),
            vec![row(2, 20, 105.0), row(2, 14, 100.0)],
        )])
        .unwrap();
        assert_eq!(panel.column("SPY").unwrap(), vec![105.0]);
    }

    #[test]
    fn inner_join_treats_nan_as_missing() {
        let panel = PricePanel::inner_join(vec![
            ("A".into(), vec![row(2, 0, f64::NAN), row(3, 0, 1.0)]),
            ("B".into(), vec![row(2, 0, 1.0), row(3, 0, 1.0)]),
        ])
        .unwrap();
        assert_eq!(panel.dates(), &[d(3)]);
    }

    #[test]
    fn inner_join_rejects_duplicate_symbols() {
        let err = PricePanel::inner_join(vec![
            ("A".into(), vec![row(2, 0, 1.0)]),
            ("A".into(), vec![row(2, 0, 1.0)]),
        ])
        .unwrap_err();
        assert_eq!(err, PanelError::DuplicateSymbol("A".into()));
    }

    #[test]
    fn rolling_mean_drops_incomplete_leading_rows() {
        let panel = PricePanel::new(
            vec![d(2), d(3), d(4), d(5)],
            vec!["A".into()],
            vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]],
        )
        .unwrap();

        let smoothed = panel.rolling_mean(2);
        assert_eq!(smoothed.dates(), &[d(3), d(4), d(5)]);
        assert_eq!(smoothed.column("A").unwrap(), vec![1.5, 2.5, 3.5]);
    }

    #[test]
    fn rolling_mean_longer_than_panel_is_empty() {
        let panel =
            PricePanel::new(vec![d(2)], vec!["A".into()], vec![vec![1.0]]).unwrap();
        assert!(panel.rolling_mean(5).is_empty());
    }

    #[test]
    fn slice_is_inclusive() {
        let panel = PricePanel::new(
            vec![d(2), d(3), d(4)],
            vec!["A".into()],
            vec![vec![1.0], vec![2.0], vec![3.0]],
        )
        .unwrap();
        let sliced = panel.slice(d(3), d(4));
        assert_eq!(sliced.dates(), &[d(3), d(4)]);
    }

    #[test]
    fn select_reorders_and_rejects_unknown() {
        let panel = PricePanel::new(
            vec![d(2)],
            vec!["A".into(), "B".into()],
            vec![vec![1.0, 2.0]],
        )
        .unwrap();
        let sel = panel.select(&["B".into(), "A".into()]).unwrap();
        assert_eq!(sel.values(), &[vec![2.0, 1.0]]);
        assert!(panel.select(&["C".into()]).is_err());
    }

    #[test]
    fn new_rejects_ragged_rows() {
        let err = PricePanel::new(
            vec![d(2)],
            vec!["A".into(), "B".into()],
            vec![vec![1.0]],
        )
        .unwrap_err();
        assert!(matches!(err, PanelError::RaggedRow { .. }));
    }
}
