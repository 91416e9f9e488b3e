//! Scoring algorithms.
//!
//! An algorithm turns a close-price panel into one comparable score per
//! symbol. It runs in two stages so callers can inspect the intermediate
//! panel: `prepare_data` (smoothing, transforms) then `calculate_values`
//! (one normalized score per column).

pub mod momentum;
pub mod moving_average;
pub mod stats;

pub use momentum::MomentumAlgo;
pub use moving_average::MovingAverageAlgo;

use thiserror::Error;

use crate::domain::PricePanel;

#[derive(Debug, Error, PartialEq)]
pub enum AlgoError {
    #[error("need at least {needed} rows after preparation, got {actual}")]
    InsufficientData { needed: usize, actual: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("non-finite value in column '{symbol}'")]
    NonFinite { symbol: String },
}

/// Per-symbol scores in panel column order.
pub type Scores = Vec<(String, f64)>;

/// Trait for scoring algorithms.
///
/// Scores are deterministic: the same prepared panel always yields the same
/// scores, in `[0, 1]`.
pub trait ScoringAlgorithm: Send + Sync {
    /// Short identifier (e.g., "momentum").
    fn name(&self) -> &str;

    /// Parameters for logs and result metadata.
    fn params(&self) -> serde_json::Value;

    fn prepare_data(&self, panel: &PricePanel) -> PricePanel;

    fn calculate_values(&self, prepared: &PricePanel) -> Result<Scores, AlgoError>;

    fn predict(&self, panel: &PricePanel) -> Result<Scores, AlgoError> {
        let prepared = self.prepare_data(panel);
        self.calculate_values(&prepared)
    }
}

/// Algorithm kinds that can be named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    Momentum,
    MovingAverage,
}

impl AlgorithmKind {
    pub fn build(self, window: usize) -> Result<Box<dyn ScoringAlgorithm>, AlgoError> {
        Ok(match self {
            Self::Momentum => Box::new(MomentumAlgo::new(window)?),
            Self::MovingAverage => Box::new(MovingAverageAlgo::new(window)?),
        })
    }
}

/// Winsorize raw scores to mean ± 3 sample std, then min-max normalize.
/// If every score ends up equal, all get 0.5.
pub(crate) fn normalize_scores(symbols: &[String], raw: Vec<f64>) -> Scores {
    let clipped = stats::winsorize(&raw, 3.0);
    let normalized = stats::min_max(&clipped);
    symbols.iter().cloned().zip(normalized).collect()
}

#[cfg(test)]
pub(crate) fn panel_from_columns(columns: &[(&str, Vec<f64>)]) -> PricePanel {
    let n = columns.first().map_or(0, |(_, v)| v.len());
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let dates = (0..n)
        .map(|i| base + chrono::Duration::days(i as i64))
        .collect();
    let symbols = columns.iter().map(|(s, _)| s.to_string()).collect();
    let values = (0..n)
        .map(|row| columns.iter().map(|(_, v)| v[row]).collect())
        .collect();
    PricePanel::new(dates, symbols, values).unwrap()
}
