//! Deterministic synthetic price provider.
//!
//! Generates a business-day random walk seeded from the symbol name, so the
//! same symbol always produces the same history regardless of the requested
//! window. Used for demos and for exercising the cache without a network.

use chrono::{Duration, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::provider::{DataError, DataProvider, FetchWindow};
use crate::calendar::is_business_day;
use crate::domain::PriceRow;

/// Random-walk shape. `volatility = 0` gives a pure geometric drift.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkParams {
    pub start_price: f64,
    /// Mean daily return.
    pub drift: f64,
    /// Half-width of the uniform daily shock.
    pub volatility: f64,
}

impl Default for WalkParams {
    fn default() -> Self {
        Self {
            start_price: 100.0,
            drift: 0.0003,
            volatility: 0.02,
        }
    }
}

pub struct SyntheticProvider {
    symbol: String,
    params: WalkParams,
    origin: NaiveDate,
    /// Bars are generated up to this date when the window has no end.
    horizon: NaiveDate,
    window: FetchWindow,
}

impl SyntheticProvider {
    pub fn new(symbol: impl Into<String>, params: WalkParams, origin: NaiveDate, window: FetchWindow) -> Self {
        Self {
            symbol: symbol.into(),
            params,
            origin,
            horizon: Utc::now().date_naive(),
            window,
        }
    }

    /// Cap generated history at `horizon` (the walk's notion of "today").
    pub fn with_horizon(mut self, horizon: NaiveDate) -> Self {
        self.horizon = horizon;
        self
    }

    fn seed(&self) -> u64 {
        let hash = blake3::hash(self.symbol.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    fn generate(&self) -> Vec<PriceRow> {
        let end = self.window.end.map_or(self.horizon, |e| e.min(self.horizon));
        let mut rng = StdRng::seed_from_u64(self.seed());
        let mut price = self.params.start_price;
        let mut rows = Vec::new();

        let mut day = self.origin;
        while day <= end {
            if is_business_day(day) {
                let shock = if self.params.volatility > 0.0 {
                    rng.gen_range(-self.params.volatility..self.params.volatility)
                } else {
                    0.0
                };
                let open = price;
                price = (price * (1.0 + self.params.drift + shock)).max(0.01);
                let volume = rng.gen_range(1_000.0..100_000.0_f64).round();

                if self.window.contains(day) {
                    if let Some(ts) = day.and_hms_opt(0, 0, 0) {
                        rows.push(PriceRow {
                            timestamp: ts.and_utc(),
                            open,
                            high: open.max(price),
                            low: open.min(price),
                            close: price,
                            volume,
                        });
                    }
                }
            }
            day += Duration::days(1);
        }
        rows
    }
}

impl DataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
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
        if !self.params.start_price.is_finite() || self.params.start_price <= 0.0 {
            return Err(DataError::InvalidConfig(format!(
                "start_price must be positive, got {}",
                self.params.start_price
            )));
        }
        Ok(self.generate())
    }

    fn ping(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn provider(symbol: &str, window: FetchWindow) -> SyntheticProvider {
        SyntheticProvider::new(symbol, WalkParams::default(), d(2024, 1, 1), window).with_horizon(d(2024, 3, 29))
    }

    #[test]
    fn same_symbol_same_history() {
        let a = provider("SPY", FetchWindow::default()).get_data();
        let b = provider("SPY", FetchWindow::default()).get_data();
        assert_eq!(a, b);
        assert_ne!(a, provider("QQQ", FetchWindow::default()).get_data());
    }

    #[test]
    fn only_business_days_within_horizon() {
        let rows = provider("SPY", FetchWindow::default()).get_data();
        assert!(rows.iter().all(|r| is_business_day(r.timestamp.date_naive())));
        assert!(rows.last().unwrap().timestamp.date_naive() <= d(2024, 3, 29));
    }

    #[test]
    fn window_is_a_slice_of_full_history() {
        let full = provider("SPY", FetchWindow::default()).get_data();
        let window = FetchWindow::new(Some(d(2024, 2, 1)), Some(d(2024, 2, 29)));
        let part = provider("SPY", window).get_data();
        assert_eq!(part.len(), 21);
        let offset = full.iter().position(|r| r.timestamp == part[0].timestamp).unwrap();
        assert_eq!(&full[offset..offset + part.len()], part.as_slice());
    }

    #[test]
    fn zero_volatility_is_monotone() {
        let params = WalkParams {
            start_price: 50.0,
            drift: 0.01,
            volatility: 0.0,
        };
        let rows = SyntheticProvider::new("UP", params, d(2024, 1, 1), FetchWindow::default())
            .with_horizon(d(2024, 1, 31))
            .get_data();
        assert!(rows.windows(2).all(|w| w[1].close > w[0].close));
    }
}
