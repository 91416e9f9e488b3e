//! Momentum score: confidence-weighted, annualized trend of smoothed prices.
//!
//! Per symbol:
//! 1. z-score the smoothed series (population std),
//! 2. regress it on the time index `0..n`,
//! 3. raw = slope · √252 · R².
//!
//! Raw scores are then winsorized across symbols to mean ± 3 std and min-max
//! normalized to `[0, 1]`. A flat series scores raw 0; if every raw score is
//! equal after winsorizing, every symbol gets 0.5.

use serde_json::json;

use super::stats::{linregress, mean, std_population};
use super::{normalize_scores, AlgoError, Scores, ScoringAlgorithm};
use crate::domain::PricePanel;

const TRADING_DAYS: f64 = 252.0;

#[derive(Debug, Clone, PartialEq)]
pub struct MomentumAlgo {
    window: usize,
}

impl MomentumAlgo {
    pub fn new(window: usize) -> Result<Self, AlgoError> {
        if window == 0 {
            return Err(AlgoError::InvalidParameter("momentum window must be >= 1".into()));
        }
        Ok(Self { window })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Unnormalized score of one series.
    pub fn raw_score(series: &[f64]) -> f64 {
        let sd = std_population(series);
        if !(sd.is_finite() && sd > 0.0) {
            return 0.0;
        }
        let m = mean(series);
        let z: Vec<f64> = series.iter().map(|x| (x - m) / sd).collect();
        match linregress(&z) {
            Some(fit) => fit.slope * TRADING_DAYS.sqrt() * fit.r_squared,
            None => 0.0,
        }
    }
}

impl Default for MomentumAlgo {
    fn default() -> Self {
        Self { window: 20 }
    }
}

impl ScoringAlgorithm for MomentumAlgo {
    fn name(&self) -> &str {
        "momentum"
    }

    fn params(&self) -> serde_json::Value {
        json!({ "indicator_type": "momentum", "window": self.window })
    }

    /// Rolling mean over `window` rows; incomplete leading rows are dropped.
    fn prepare_data(&self, panel: &PricePanel) -> PricePanel {
        panel.rolling_mean(self.window)
    }

    fn calculate_values(&self, prepared: &PricePanel) -> Result<Scores, AlgoError> {
        if prepared.n_rows() < 2 {
            return Err(AlgoError::InsufficientData {
                needed: 2,
                actual: prepared.n_rows(),
            });
        }

        let mut raw = Vec::with_capacity(prepared.n_cols());
        for (col, symbol) in prepared.symbols().iter().enumerate() {
            let series = prepared.column_at(col);
            if series.iter().any(|v| !v.is_finite()) {
                return Err(AlgoError::NonFinite { symbol: symbol.clone() });
            }
            raw.push(Self::raw_score(&series));
        }

        Ok(normalize_scores(prepared.symbols(), raw))
    }
}
