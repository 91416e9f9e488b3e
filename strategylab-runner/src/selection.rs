//! Stock selection policies over per-symbol scores.
//!
//! All policies rank symbols by score (highest first, ties keep panel order)
//! and ignore non-finite scores. The count is clipped into
//! `[min_stocks, max_stocks]`, never exceeding the number of valid scores.

use serde::{Deserialize, Serialize};
use strategylab_core::algo::stats::{mean, std_sample};
use strategylab_core::algo::Scores;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    /// The `param` best scores.
    TopN,
    /// Scores above `mean + param · std`.
    Threshold,
    /// Scores above the cross-sectional mean.
    Relative,
}

impl SelectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TopN => "top_n",
            Self::Threshold => "threshold",
            Self::Relative => "relative",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionPolicy {
    pub method: SelectionMethod,
    pub param: f64,
    pub min_stocks: usize,
    pub max_stocks: usize,
}

impl SelectionPolicy {
    pub fn select(&self, scores: &Scores) -> Vec<String> {
        let ranked = rank(scores);
        if ranked.is_empty() {
            return Vec::new();
        }
        let min = self.min_stocks.min(ranked.len());
        let max = self.max_stocks.max(min).min(ranked.len());

        let count = match self.method {
            SelectionMethod::TopN => {
                let n = if self.param.is_finite() && self.param > 0.0 {
                    self.param as usize
                } else {
                    0
                };
                n.clamp(min, max)
            }
            SelectionMethod::Threshold | SelectionMethod::Relative => {
                let values: Vec<f64> = ranked.iter().map(|(_, s)| *s).collect();
                let cutoff = match self.method {
                    SelectionMethod::Threshold => mean(&values) + self.param * std_sample(&values),
                    _ => mean(&values),
                };
                // NaN cutoff (single score) selects nothing, then falls back to min.
                let above = values.iter().filter(|s| **s > cutoff).count();
                if above < min {
                    min
                } else {
                    above.min(max)
                }
            }
        };

        ranked
            .into_iter()
            .take(count)
            .map(|(symbol, _)| symbol.to_string())
            .collect()
    }
}

/// Finite scores, highest first. Stable, so equal scores keep input order.
fn rank(scores: &Scores) -> Vec<(&str, f64)> {
    let mut ranked: Vec<(&str, f64)> = scores
        .iter()
        .filter(|(_, s)| s.is_finite())
        .map(|(sym, s)| (sym.as_str(), *s))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(values: &[(&str, f64)]) -> Scores {
        values.iter().map(|(s, v)| (s.to_string(), *v)).collect()
    }

    fn policy(method: SelectionMethod, param: f64, min: usize, max: usize) -> SelectionPolicy {
        SelectionPolicy {
            method,
            param,
            min_stocks: min,
            max_stocks: max,
        }
    }

    fn sample() -> Scores {
        scores(&[("A", 0.1), ("B", 0.9), ("C", 0.45), ("D", 1.0), ("E", 0.0)])
    }

    // ── top_n ──

    #[test]
    fn top_n_orders_by_score() {
        let picked = policy(SelectionMethod::TopN, 3.0, 1, 10).select(&sample());
        assert_eq!(picked, vec!["D", "B", "C"]);
    }

    #[test]
    fn top_n_clipped_to_bounds() {
        assert_eq!(policy(SelectionMethod::TopN, 10.0, 1, 2).select(&sample()).len(), 2);
        assert_eq!(policy(SelectionMethod::TopN, 0.0, 3, 5).select(&sample()).len(), 3);
        assert_eq!(policy(SelectionMethod::TopN, 4.0, 1, 50).select(&sample()).len(), 4);
    }

    #[test]
    fn ties_keep_panel_order() {
        let s = scores(&[("X", 0.5), ("Y", 0.5), ("Z", 0.5)]);
        assert_eq!(policy(SelectionMethod::TopN, 2.0, 1, 5).select(&s), vec!["X", "Y"]);
    }

    #[test]
    fn non_finite_scores_are_ignored() {
        let s = scores(&[("A", f64::NAN), ("B", 0.2), ("C", 0.7)]);
        assert_eq!(policy(SelectionMethod::TopN, 5.0, 1, 5).select(&s), vec!["C", "B"]);
    }

    // ── relative / threshold ──

    #[test]
    fn relative_takes_above_mean() {
        // mean = 0.49, C sits just below it
        let picked = policy(SelectionMethod::Relative, 0.0, 1, 10).select(&sample());
        assert_eq!(picked, vec!["D", "B"]);
    }

    #[test]
    fn threshold_falls_back_to_min() {
        // nothing is 10 std above the mean
        let picked = policy(SelectionMethod::Threshold, 10.0, 2, 10).select(&sample());
        assert_eq!(picked, vec!["D", "B"]);
    }

    #[test]
    fn threshold_truncates_to_max() {
        let picked = policy(SelectionMethod::Threshold, -10.0, 1, 3).select(&sample());
        assert_eq!(picked, vec!["D", "B", "C"]);
    }

    #[test]
    fn empty_scores_select_nothing() {
        assert!(policy(SelectionMethod::TopN, 2.0, 1, 5).select(&Vec::new()).is_empty());
    }

    #[test]
    fn method_names_round_trip_through_serde() {
        let m: SelectionMethod = serde_json::from_str("\"top_n\"").unwrap();
        assert_eq!(m, SelectionMethod::TopN);
        assert_eq!(m.as_str(), "top_n");
    }
}
