//! Strategy pool — run several strategies for one date, keep the best viable
//! result under a trading preference.
//!
//! A result is viable when both its cumulative return and its Sharpe ratio
//! are strictly positive. Among viable results the preference key decides;
//! on an exact tie the strategy registered first wins.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::preference::TradingPreference;
use crate::strategy::{PortfolioResult, Strategy};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PoolOutcome {
    Selected {
        result: PortfolioResult,
        strategy_index: usize,
        strategy_name: String,
    },
    NoMatch {
        message: String,
        /// Strategies that produced a result.
        evaluated: usize,
        eligible: usize,
    },
}

impl PoolOutcome {
    pub fn result(&self) -> Option<&PortfolioResult> {
        match self {
            Self::Selected { result, .. } => Some(result),
            Self::NoMatch { .. } => None,
        }
    }
}

pub struct StrategyPool {
    strategies: Vec<Box<dyn Strategy>>,
    preference: TradingPreference,
    parallel: bool,
}

impl StrategyPool {
    pub fn new(preference: TradingPreference) -> Self {
        Self {
            strategies: Vec::new(),
            preference,
            parallel: false,
        }
    }

    /// Execute strategies on the rayon pool instead of one after another.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn add(&mut self, strategy: Box<dyn Strategy>) {
        self.strategies.push(strategy);
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn preference(&self) -> TradingPreference {
        self.preference
    }

    pub fn strategies(&self) -> &[Box<dyn Strategy>] {
        &self.strategies
    }

    /// Run every strategy for `execute_date`, in registration order.
    /// Failed strategies leave `None` in their slot.
    pub fn run_all(&mut self, execute_date: NaiveDate) -> Vec<Option<PortfolioResult>> {
        if self.parallel {
            // Indexed collect keeps registration order.
            self.strategies
                .par_iter_mut()
                .map(|s| s.execute(execute_date))
                .collect()
        } else {
            self.strategies.iter_mut().map(|s| s.execute(execute_date)).collect()
        }
    }

    pub fn execute(&mut self, execute_date: NaiveDate) -> PoolOutcome {
        let results = self.run_all(execute_date);
        let outcome = pick_best(self.preference, &results);
        match &outcome {
            PoolOutcome::Selected { strategy_name, .. } => {
                info!(preference = %self.preference, strategy = %strategy_name, date = %execute_date, "pool selected strategy");
            }
            PoolOutcome::NoMatch { message, .. } => {
                warn!(preference = %self.preference, date = %execute_date, "{message}");
            }
        }
        outcome
    }
}

/// Best viable result under `preference`; earlier slots win exact ties.
pub fn pick_best(preference: TradingPreference, results: &[Option<PortfolioResult>]) -> PoolOutcome {
    let evaluated = results.iter().flatten().count();
    let mut eligible = 0;
    let mut best: Option<(usize, &PortfolioResult)> = None;

    for (index, result) in results.iter().enumerate() {
        let Some(result) = result else { continue };
        if !result.performance.is_viable() {
            continue;
        }
        eligible += 1;
        let better = match best {
            None => true,
            Some((_, current)) => preference.is_better(&result.performance, &current.performance),
        };
        if better {
            best = Some((index, result));
        }
    }

    match best {
        Some((strategy_index, result)) => PoolOutcome::Selected {
            result: result.clone(),
            strategy_index,
            strategy_name: result.strategy_name.clone(),
        },
        None => PoolOutcome::NoMatch {
            message: format!(
                "no strategy met the {preference} policy ({evaluated} evaluated, none with positive return and Sharpe)"
            ),
            evaluated,
            eligible,
        },
    }
}
