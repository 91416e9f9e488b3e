//! Performance metrics — pure functions over a daily return series.
//!
//! Every metric is a pure function: returns in, scalar out. The basket
//! return series itself comes from [`basket_returns`], which equal-weights the
//! daily percentage changes of the selected columns.

use serde::{Deserialize, Serialize};
use strategylab_core::algo::stats::{mean, std_sample};
use strategylab_core::domain::PricePanel;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Validation-window statistics of one selected basket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub cumulative_return: f64,
    pub annualized_return: f64,
    pub annualized_volatility: f64,
    pub sharpe_ratio: f64,
    /// Non-positive fraction, e.g. -0.15 for a 15% peak-to-trough decline.
    pub max_drawdown: f64,
    /// Number of daily returns the figures are based on.
    pub return_days: usize,
}

impl PerformanceMetrics {
    pub fn compute(returns: &[f64]) -> Self {
        Self {
            cumulative_return: cumulative_return(returns),
            annualized_return: annualized_return(returns),
            annualized_volatility: annualized_volatility(returns),
            sharpe_ratio: sharpe_ratio(returns),
            max_drawdown: max_drawdown(returns),
            return_days: returns.len(),
        }
    }

    /// Both cumulative return and Sharpe ratio strictly positive.
    pub fn is_viable(&self) -> bool {
        self.cumulative_return > 0.0 && self.sharpe_ratio > 0.0
    }
}

/// Equal-weight daily returns of every column in `panel`.
///
/// Row `i` of the result is the mean over columns of `p[i+1] / p[i] - 1`, so
/// the first panel row contributes no return.
pub fn basket_returns(panel: &PricePanel) -> Vec<f64> {
    if panel.n_cols() == 0 {
        return Vec::new();
    }
    panel
        .values()
        .windows(2)
        .map(|pair| {
            let changes: Vec<f64> = pair[0]
                .iter()
                .zip(&pair[1])
                .map(|(prev, next)| next / prev - 1.0)
                .collect();
            mean(&changes)
        })
        .collect()
}

// ─── Individual metric functions ────────────────────────────────────

/// Compounded return: ∏(1 + r) − 1.
pub fn cumulative_return(returns: &[f64]) -> f64 {
    returns.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0
}

/// Mean daily return compounded over a year: (1 + mean)^252 − 1.
pub fn annualized_return(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    (1.0 + mean(returns)).powf(TRADING_DAYS_PER_YEAR) - 1.0
}

/// Sample standard deviation scaled by √252. 0.0 for fewer than 2 returns.
pub fn annualized_volatility(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    std_sample(returns) * TRADING_DAYS_PER_YEAR.sqrt()
}

/// √252 · mean / std with a zero risk-free rate.
///
/// Returns 0.0 if variance is zero or there are fewer than 2 returns.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_sample(returns);
    if std < 1e-15 {
        return 0.0;
    }
    TRADING_DAYS_PER_YEAR.sqrt() * mean(returns) / std
}

/// Largest decline of the cumulative curve ∏(1 + r) from its running peak.
///
/// The peak starts at the first point of the curve. Returns 0.0 for a
/// monotonically non-decreasing curve.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut growth = 1.0;
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;

    for r in returns {
        growth *= 1.0 + r;
        if growth > peak {
            peak = growth;
        }
        if peak > 0.0 {
            max_dd = max_dd.min(growth / peak - 1.0);
        }
    }
    max_dd
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-10
    }

    fn panel(columns: &[(&str, Vec<f64>)]) -> PricePanel {
        let n = columns[0].1.len();
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = (0..n).map(|i| base + Duration::days(i as i64)).collect();
        let symbols = columns.iter().map(|(s, _)| s.to_string()).collect();
        let values = (0..n)
            .map(|row| columns.iter().map(|(_, c)| c[row]).collect())
            .collect();
        PricePanel::new(dates, symbols, values).unwrap()
    }

    // ── Basket returns ──

    #[test]
    fn basket_is_equal_weighted() {
        let p = panel(&[("A", vec![100.0, 110.0, 121.0]), ("B", vec![50.0, 50.0, 45.0])]);
        let r = basket_returns(&p);
        assert_eq!(r.len(), 2);
        assert!(approx(r[0], 0.05));
        assert!(approx(r[1], (0.10 - 0.10) / 2.0));
    }

    #[test]
    fn single_row_has_no_returns() {
        let p = panel(&[("A", vec![100.0])]);
        assert!(basket_returns(&p).is_empty());
    }

    // ── Cumulative / annualized return ──

    #[test]
    fn cumulative_compounds() {
        assert!(approx(cumulative_return(&[0.1, 0.1]), 0.21));
        assert_eq!(cumulative_return(&[]), 0.0);
    }

    #[test]
    fn annualized_return_compounds_mean() {
        let r = [0.001, 0.003];
        assert!(approx(annualized_return(&r), 1.002_f64.powf(252.0) - 1.0));
    }

    // ── Volatility / Sharpe ──

    #[test]
    fn sharpe_zero_for_constant_returns() {
        assert_eq!(sharpe_ratio(&[0.01; 10]), 0.0);
        assert!(annualized_volatility(&[0.01; 10]) < 1e-12);
    }

    #[test]
    fn sharpe_known_value() {
        let r = [0.01, -0.01, 0.02];
        let m: f64 = 0.02 / 3.0;
        let var = ((0.01 - m).powi(2) + (-0.01 - m).powi(2) + (0.02 - m).powi(2)) / 2.0;
        assert!(approx(sharpe_ratio(&r), 252f64.sqrt() * m / var.sqrt()));
        assert!(approx(annualized_volatility(&r), var.sqrt() * 252f64.sqrt()));
    }

    #[test]
    fn single_return_has_no_spread() {
        assert_eq!(sharpe_ratio(&[0.05]), 0.0);
        assert_eq!(annualized_volatility(&[0.05]), 0.0);
    }

    // ── Max drawdown ──

    #[test]
    fn drawdown_of_rising_curve_is_zero() {
        assert_eq!(max_drawdown(&[0.01, 0.02, 0.0]), 0.0);
    }

    #[test]
    fn drawdown_peak_to_trough() {
        // curve: 1.1, 0.88, 0.968
        let dd = max_drawdown(&[0.1, -0.2, 0.1]);
        assert!(approx(dd, -0.2));
    }

    #[test]
    fn viability_needs_both_positive() {
        let up = PerformanceMetrics::compute(&[0.01, 0.02, 0.01]);
        assert!(up.is_viable());
        let flat = PerformanceMetrics::compute(&[0.0, 0.0]);
        assert!(!flat.is_viable());
    }
}
