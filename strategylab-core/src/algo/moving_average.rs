//! Moving-average distance: how far the latest price sits above its trailing
//! mean, `close / sma(window) - 1`, normalized across symbols.

use serde_json::json;

use super::{normalize_scores, AlgoError, Scores, ScoringAlgorithm};
use crate::domain::PricePanel;

#[derive(Debug, Clone, PartialEq)]
pub struct MovingAverageAlgo {
    window: usize,
}

impl MovingAverageAlgo {
    pub fn new(window: usize) -> Result<Self, AlgoError> {
        if window == 0 {
            return Err(AlgoError::InvalidParameter("moving average window must be >= 1".into()));
        }
        Ok(Self { window })
    }
}

impl ScoringAlgorithm for MovingAverageAlgo {
    fn name(&self) -> &str {
        "moving_average"
    }

    fn params(&self) -> serde_json::Value {
        json!({ "indicator_type": "ma", "window": self.window })
    }

    /// Panel of `close / sma - 1` on the rows where the mean is defined.
    fn prepare_data(&self, panel: &PricePanel) -> PricePanel {
        let sma = panel.rolling_mean(self.window);
        let offset = panel.n_rows() - sma.n_rows();
        let values = sma
            .values()
            .iter()
            .zip(&panel.values()[offset..])
            .map(|(means, closes)| closes.iter().zip(means).map(|(c, m)| c / m - 1.0).collect())
            .collect();
        PricePanel::new(sma.dates().to_vec(), sma.symbols().to_vec(), values).unwrap_or(sma)
    }

    fn calculate_values(&self, prepared: &PricePanel) -> Result<Scores, AlgoError> {
        let Some(last) = prepared.values().last() else {
            return Err(AlgoError::InsufficientData { needed: 1, actual: 0 });
        };
        if let Some(col) = last.iter().position(|v| !v.is_finite()) {
            return Err(AlgoError::NonFinite {
                symbol: prepared.symbols()[col].clone(),
            });
        }
        Ok(normalize_scores(prepared.symbols(), last.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::panel_from_columns;

    #[test]
    fn distance_from_mean() {
        let panel = panel_from_columns(&[("A", vec![1.0, 2.0, 3.0]), ("B", vec![3.0, 2.0, 1.0])]);
        let algo = MovingAverageAlgo::new(3).unwrap();
        let prepared = algo.prepare_data(&panel);
        assert_eq!(prepared.n_rows(), 1);
        assert!((prepared.values()[0][0] - 0.5).abs() < 1e-12);
        assert!((prepared.values()[0][1] + 0.5).abs() < 1e-12);

        let scores = algo.calculate_values(&prepared).unwrap();
        assert_eq!(scores, vec![("A".to_string(), 1.0), ("B".to_string(), 0.0)]);
    }

    #[test]
    fn window_longer_than_history() {
        let panel = panel_from_columns(&[("A", vec![1.0, 2.0])]);
        let err = MovingAverageAlgo::new(5).unwrap().predict(&panel).unwrap_err();
        assert_eq!(err, AlgoError::InsufficientData { needed: 1, actual: 0 });
    }
}
