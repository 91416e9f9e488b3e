//! Train/validation windows derived from one execution date.
//!
//! ```text
//!   train_start ......... train_end | valid_start ......... valid_end | execute_date
//!   <──── train_period bdays ────>    <──── valid_period bdays ────>
//! ```
//!
//! The validation window ends on the business day before the execution date,
//! the training window ends on the business day before validation starts.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strategylab_core::calendar::{business_days_back, previous_business_day};
use thiserror::Error;

/// Smallest period that still leaves a window with distinct start and end.
pub const MIN_PERIOD: usize = 2;

#[derive(Debug, Error, PartialEq)]
pub enum WindowError {
    #[error("{which} must span at least {min} business days, got {period}")]
    PeriodTooShort {
        which: &'static str,
        period: usize,
        min: usize,
    },

    #[error("window boundaries out of order: {0}")]
    Ordering(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyWindow {
    pub execute_date: NaiveDate,
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub valid_start: NaiveDate,
    pub valid_end: NaiveDate,
}

impl StrategyWindow {
    pub fn compute(
        execute_date: NaiveDate,
        train_period: usize,
        valid_period: usize,
    ) -> Result<Self, WindowError> {
        check_periods(train_period, valid_period)?;

        let valid_end = previous_business_day(execute_date);
        let valid_start = business_days_back(valid_end, valid_period);
        let train_end = previous_business_day(valid_start);
        let train_start = business_days_back(train_end, train_period);

        let window = Self {
            execute_date,
            train_start,
            train_end,
            valid_start,
            valid_end,
        };
        window.check_ordering()?;
        Ok(window)
    }

    fn check_ordering(&self) -> Result<(), WindowError> {
        let ordered = self.train_start < self.train_end
            && self.train_end < self.valid_start
            && self.valid_start < self.valid_end
            && self.valid_end < self.execute_date;
        if ordered {
            Ok(())
        } else {
            Err(WindowError::Ordering(format!(
                "train {}..{}, valid {}..{}, execute {}",
                self.train_start, self.train_end, self.valid_start, self.valid_end, self.execute_date
            )))
        }
    }
}

/// Rejects periods shorter than [`MIN_PERIOD`] business days.
pub fn check_periods(train_period: usize, valid_period: usize) -> Result<(), WindowError> {
    check_period("train_period", train_period)?;
    check_period("valid_period", valid_period)
}

fn check_period(which: &'static str, period: usize) -> Result<(), WindowError> {
    if period < MIN_PERIOD {
        return Err(WindowError::PeriodTooShort {
            which,
            period,
            min: MIN_PERIOD,
        });
    }
    Ok(())
}
