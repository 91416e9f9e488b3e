//! Property tests for calendar arithmetic and scoring bounds.
//!
//! Uses proptest to verify:
//! 1. Business-day spans — `business_days_back` yields exactly n business days
//! 2. Previous/next business day — never a weekend, strictly ordered
//! 3. Momentum bounds — every score lies in [0, 1]
//! 4. Determinism — identical input gives identical scores

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use strategylab_core::algo::{MomentumAlgo, MovingAverageAlgo, ScoringAlgorithm};
use strategylab_core::calendar::{
    business_days_back, count_business_days, is_business_day, next_business_day, previous_business_day,
};
use strategylab_core::domain::PricePanel;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (0i64..20_000).prop_map(|offset| NaiveDate::from_ymd_opt(1990, 1, 1).unwrap() + Duration::days(offset))
}

/// Panel of `n_cols` random walks, `n_rows` long, all prices positive.
fn arb_panel() -> impl Strategy<Value = PricePanel> {
    (2usize..8, 25usize..80).prop_flat_map(|(n_cols, n_rows)| {
        (
            prop::collection::vec(prop::collection::vec(-0.05..0.05_f64, n_rows), n_cols),
            prop::collection::vec(10.0..500.0_f64, n_cols),
        )
            .prop_map(move |(returns, starts)| {
                let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
                let dates = (0..n_rows).map(|i| base + Duration::days(i as i64)).collect();
                let symbols = (0..n_cols).map(|c| format!("S{c}")).collect();
                let mut prices = starts.clone();
                let values = (0..n_rows)
                    .map(|row| {
                        for (p, r) in prices.iter_mut().zip(&returns) {
                            *p *= 1.0 + r[row];
                        }
                        prices.clone()
                    })
                    .collect();
                PricePanel::new(dates, symbols, values).unwrap()
            })
    })
}

// ── 1. Business-day spans ────────────────────────────────────────────

proptest! {
    #[test]
    fn business_days_back_spans_exactly_n(end in arb_date(), n in 1usize..300) {
        let end = if is_business_day(end) { end } else { previous_business_day(end) };
        let start = business_days_back(end, n);
        prop_assert!(is_business_day(start));
        prop_assert!(start <= end);
        prop_assert_eq!(count_business_days(start, end), n);
    }
}

// ── 2. Neighbouring business days ────────────────────────────────────

proptest! {
    #[test]
    fn neighbours_are_business_days(d in arb_date()) {
        let prev = previous_business_day(d);
        let next = next_business_day(d);
        prop_assert!(is_business_day(prev) && is_business_day(next));
        prop_assert!(prev < d && d < next);
        prop_assert!((d - prev).num_days() <= 3);
        prop_assert!((next - d).num_days() <= 3);
    }
}

// ── 3. Score bounds ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn momentum_scores_lie_in_unit_interval(panel in arb_panel(), window in 1usize..20) {
        let scores = MomentumAlgo::new(window).unwrap().predict(&panel).unwrap();
        prop_assert_eq!(scores.len(), panel.n_cols());
        for (_, s) in &scores {
            prop_assert!((0.0..=1.0).contains(s), "score out of range: {}", s);
        }
        // Non-degenerate input always spans the full range.
        let hi = scores.iter().map(|(_, s)| *s).fold(f64::MIN, f64::max);
        let lo = scores.iter().map(|(_, s)| *s).fold(f64::MAX, f64::min);
        prop_assert!(hi == 1.0 || hi == 0.5);
        prop_assert!(lo == 0.0 || lo == 0.5);
    }

    #[test]
    fn moving_average_scores_lie_in_unit_interval(panel in arb_panel(), window in 1usize..20) {
        let scores = MovingAverageAlgo::new(window).unwrap().predict(&panel).unwrap();
        prop_assert!(scores.iter().all(|(_, s)| (0.0..=1.0).contains(s)));
    }
}

// ── 4. Determinism ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn momentum_is_deterministic(panel in arb_panel()) {
        let algo = MomentumAlgo::default();
        let a = algo.predict(&panel).unwrap();
        let b = algo.predict(&panel.clone()).unwrap();
        prop_assert_eq!(a, b);
    }
}
