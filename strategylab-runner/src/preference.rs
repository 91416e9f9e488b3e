//! Trading preference — which metric a pool ranks eligible results by.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::metrics::PerformanceMetrics;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TradingPreference {
    /// Highest cumulative return.
    Aggressive,
    /// Shallowest max drawdown.
    Conservative,
    /// Highest Sharpe ratio.
    Sharp,
    /// Lowest annualized volatility.
    LowVolatility,
    /// Highest Sharpe ratio.
    #[default]
    Balanced,
}

impl TradingPreference {
    /// Parses a preference tag. Unknown tags fall back to `Balanced`.
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "aggressive" => Self::Aggressive,
            "conservative" => Self::Conservative,
            "sharp" => Self::Sharp,
            "low_volatility" => Self::LowVolatility,
            "balanced" => Self::Balanced,
            other => {
                warn!(preference = other, "unknown trading preference, using balanced");
                Self::Balanced
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aggressive => "aggressive",
            Self::Conservative => "conservative",
            Self::Sharp => "sharp",
            Self::LowVolatility => "low_volatility",
            Self::Balanced => "balanced",
        }
    }

    /// Ranking key for `metrics`; higher is always better.
    ///
    /// Drawdown is non-positive, so "least negative" is simply the larger
    /// value. Volatility is negated so the smallest ranks first.
    pub fn key(&self, metrics: &PerformanceMetrics) -> f64 {
        match self {
            Self::Aggressive => metrics.cumulative_return,
            Self::Conservative => -metrics.max_drawdown.abs(),
            Self::Sharp | Self::Balanced => metrics.sharpe_ratio,
            Self::LowVolatility => -metrics.annualized_volatility,
        }
    }

    /// Whether `a` ranks strictly ahead of `b`.
    pub fn is_better(&self, a: &PerformanceMetrics, b: &PerformanceMetrics) -> bool {
        self.key(a) > self.key(b)
    }
}

impl From<String> for TradingPreference {
    fn from(tag: String) -> Self {
        Self::parse(&tag)
    }
}

impl From<TradingPreference> for String {
    fn from(p: TradingPreference) -> Self {
        p.as_str().to_string()
    }
}

impl fmt::Display for TradingPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(cum: f64, vol: f64, sharpe: f64, mdd: f64) -> PerformanceMetrics {
        PerformanceMetrics {
            cumulative_return: cum,
            annualized_return: 0.0,
            annualized_volatility: vol,
            sharpe_ratio: sharpe,
            max_drawdown: mdd,
            return_days: 20,
        }
    }

    #[test]
    fn parse_known_and_unknown() {
        assert_eq!(TradingPreference::parse("Aggressive"), TradingPreference::Aggressive);
        assert_eq!(TradingPreference::parse("low_volatility"), TradingPreference::LowVolatility);
        assert_eq!(TradingPreference::parse("yolo"), TradingPreference::Balanced);
    }

    #[test]
    fn each_preference_picks_its_metric() {
        let steady = metrics(0.05, 0.10, 2.0, -0.01);
        let wild = metrics(0.30, 0.60, 1.0, -0.20);

        assert!(TradingPreference::Aggressive.is_better(&wild, &steady));
        assert!(TradingPreference::Conservative.is_better(&steady, &wild));
        assert!(TradingPreference::Sharp.is_better(&steady, &wild));
        assert!(TradingPreference::LowVolatility.is_better(&steady, &wild));
        assert!(TradingPreference::Balanced.is_better(&steady, &wild));
    }

    #[test]
    fn equal_keys_are_not_better() {
        let a = metrics(0.1, 0.2, 1.0, -0.05);
        assert!(!TradingPreference::Balanced.is_better(&a, &a));
    }

    #[test]
    fn deserializes_leniently() {
        let p: TradingPreference = serde_json::from_str("\"sharp\"").unwrap();
        assert_eq!(p, TradingPreference::Sharp);
        let p: TradingPreference = serde_json::from_str("\"whatever\"").unwrap();
        assert_eq!(p, TradingPreference::Balanced);
        assert_eq!(serde_json::to_string(&TradingPreference::LowVolatility).unwrap(), "\"low_volatility\"");
    }
}
