//! Human-facing summary of a selected portfolio.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::pool::PoolOutcome;
use crate::strategy::PortfolioResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioReport {
    pub strategy_name: String,
    pub strategy_id: String,
    pub execute_date: NaiveDate,
    pub selected_stocks: Vec<String>,
    /// Display names, same order as `selected_stocks`.
    pub selected_stock_names: Vec<String>,
    /// Symbol → weight as a percentage, e.g. "50.00%".
    pub stocks_ratio: BTreeMap<String, String>,
    pub cumulative_return: String,
    pub annual_return: String,
    pub annual_volatility: String,
    /// Rounded to 5 decimals.
    pub sharpe_ratio: f64,
    pub mdd: String,
}

impl PortfolioReport {
    /// Symbols missing from `symbol_names` are shown as their ticker.
    pub fn from_result(result: &PortfolioResult, symbol_names: &BTreeMap<String, String>) -> Self {
        let perf = &result.performance;
        Self {
            strategy_name: result.strategy_name.clone(),
            strategy_id: result.strategy_id.clone(),
            execute_date: result.execute_date,
            selected_stocks: result.selected_stocks.clone(),
            selected_stock_names: result
                .selected_stocks
                .iter()
                .map(|s| symbol_names.get(s).cloned().unwrap_or_else(|| s.clone()))
                .collect(),
            stocks_ratio: result
                .weights
                .iter()
                .map(|(s, w)| (s.clone(), percent(*w)))
                .collect(),
            cumulative_return: percent(perf.cumulative_return),
            annual_return: percent(perf.annualized_return),
            annual_volatility: percent(perf.annualized_volatility),
            sharpe_ratio: round_to(perf.sharpe_ratio, 5),
            mdd: percent(perf.max_drawdown),
        }
    }

    /// `None` (with a warning) when the pool found nothing viable.
    pub fn from_outcome(outcome: &PoolOutcome, symbol_names: &BTreeMap<String, String>) -> Option<Self> {
        match outcome {
            PoolOutcome::Selected { result, .. } => Some(Self::from_result(result, symbol_names)),
            PoolOutcome::NoMatch { message, .. } => {
                warn!("nothing to report: {message}");
                None
            }
        }
    }
}

/// Fraction as a two-decimal percentage string: 0.1234 → "12.34%".
pub fn percent(x: f64) -> String {
    format!("{:.2}%", x * 100.0)
}

fn round_to(x: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (x * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::PerformanceMetrics;
    use crate::window::StrategyWindow;

    fn sample() -> PortfolioResult {
        let execute_date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        PortfolioResult {
            strategy_name: "mom".into(),
            strategy_id: "abc".into(),
            execute_date,
            window: StrategyWindow::compute(execute_date, 20, 5).unwrap(),
            selected_stocks: vec!["005930".into(), "AAPL".into()],
            weights: vec![("005930".into(), 0.5), ("AAPL".into(), 0.5)],
            scores: vec![("005930".into(), 1.0), ("AAPL".into(), 0.8)],
            performance: PerformanceMetrics {
                cumulative_return: 0.0312,
                annualized_return: 0.4567,
                annualized_volatility: 0.1875,
                sharpe_ratio: 1.234_567_89,
                max_drawdown: -0.0421,
                return_days: 4,
            },
        }
    }

    #[test]
    fn formats_percentages_and_names() {
        let names = BTreeMap::from([("005930".to_string(), "Samsung Electronics".to_string())]);
        let r = PortfolioReport::from_result(&sample(), &names);
        assert_eq!(r.selected_stock_names, vec!["Samsung Electronics", "AAPL"]);
        assert_eq!(r.stocks_ratio["AAPL"], "50.00%");
        assert_eq!(r.cumulative_return, "3.12%");
        assert_eq!(r.annual_return, "45.67%");
        assert_eq!(r.annual_volatility, "18.75%");
        assert_eq!(r.mdd, "-4.21%");
        assert_eq!(r.sharpe_ratio, 1.23457);
    }

    #[test]
    fn no_match_has_no_report() {
        let outcome = PoolOutcome::NoMatch {
            message: "none".into(),
            evaluated: 2,
            eligible: 0,
        };
        assert!(PortfolioReport::from_outcome(&outcome, &BTreeMap::new()).is_none());
    }
}
