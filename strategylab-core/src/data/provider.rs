//! Data provider trait and structured error types.
//!
//! The DataProvider trait abstracts over data sources (Yahoo Finance, Twelve Data,
//! CSV import, synthetic) so pipelines can swap implementations and tests can mock.
//! Providers never raise for transient failures: `get_data` logs the error and
//! hands back an empty batch, which callers read as "nothing new, try later".

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::domain::{dedup_keep_last, PriceRow};

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("unknown provider kind '{0}'")]
    UnknownProvider(String),

    #[error("invalid provider configuration: {0}")]
    InvalidConfig(String),

    #[error("timed out after {waited:?} waiting for lock on {}", .path.display())]
    LockTimeout { path: PathBuf, waited: Duration },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Optional date bounds a provider passes to its source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl FetchWindow {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// Whether `date` lies inside the bounds (both inclusive).
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// Trait for data providers.
///
/// Implementations handle the specifics of fetching one symbol from a
/// particular source and return rows with UTC timestamps. The cache layer sits
/// above this trait; providers don't know about the cache.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// The one symbol this provider serves.
    fn symbol(&self) -> &str;

    fn window(&self) -> &FetchWindow;

    fn window_mut(&mut self) -> &mut FetchWindow;

    /// Fetch rows from the source. Errors stay inside the provider boundary;
    /// pipelines call [`DataProvider::get_data`].
    fn fetch(&self) -> Result<Vec<PriceRow>, DataError>;

    /// Check if the source is reachable and serving this symbol.
    fn ping(&self) -> bool;

    fn start_date(&self) -> Option<NaiveDate> {
        self.window().start
    }

    fn set_start_date(&mut self, date: Option<NaiveDate>) {
        self.window_mut().start = date;
    }

    fn end_date(&self) -> Option<NaiveDate> {
        self.window().end
    }

    fn set_end_date(&mut self, date: Option<NaiveDate>) {
        self.window_mut().end = date;
    }

    /// Rows sorted by timestamp with duplicate timestamps collapsed, or an
    /// empty batch if anything went wrong.
    fn get_data(&self) -> Vec<PriceRow> {
        match self.fetch() {
            Ok(rows) => dedup_keep_last(rows),
            Err(e) => {
                warn!(provider = self.name(), symbol = self.symbol(), error = %e, "fetch failed, returning no rows");
                Vec::new()
            }
        }
    }
}
