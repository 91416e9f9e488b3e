//! Data pipeline: one provider, one on-disk chunk store, one in-memory window.
//!
//! The chunk store is authoritative. The in-memory cache only holds the last
//! `cache_days` of rows seen by this instance and is never consulted for
//! range queries. A pipeline is not meant to be shared between threads that
//! fetch concurrently; give each worker its own instance over the same
//! directory and let the per-chunk locks serialize the writes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::chunk_store::ChunkStore;
use super::provider::{DataError, DataProvider};
use crate::clock::Clock;
use crate::domain::{dedup_keep_last, PriceRow};

/// Tunables for one pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Data root; each symbol gets `{base_path}/{symbol}`.
    pub base_path: PathBuf,
    pub cache_days: u32,
    pub chunk_size: usize,
    pub lock_timeout: Duration,
    pub fetch_interval: Duration,
    pub use_file_lock: bool,
    pub clock: Clock,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("data"),
            cache_days: 7,
            chunk_size: 1000,
            lock_timeout: Duration::from_secs(60),
            fetch_interval: Duration::from_secs(60),
            use_file_lock: true,
            clock: Clock::System,
        }
    }
}

/// Pipeline settings, flattened for logs and reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineParams {
    pub symbol: String,
    pub provider: Option<String>,
    pub base_path: PathBuf,
    pub cache_days: u32,
    pub chunk_size: usize,
    pub use_file_lock: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpdateSummary {
    pub fetches: usize,
    pub rows_added: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RealtimeSummary {
    pub iterations: usize,
    pub rows_added: usize,
    pub failures: usize,
    pub day_rollovers: usize,
}

pub struct DataPipeline {
    symbol: String,
    provider: Option<Box<dyn DataProvider>>,
    store: ChunkStore,
    config: PipelineConfig,
    cached: Vec<PriceRow>,
}

impl DataPipeline {
    /// Pipeline that fetches from `provider` into `{base_path}/{symbol}`.
    pub fn new(provider: Box<dyn DataProvider>, config: PipelineConfig) -> Result<Self, DataError> {
        let symbol = provider.symbol().to_string();
        Self::build(symbol, Some(provider), config)
    }

    /// Pipeline with no provider: serves what is already on disk and never
    /// fetches. The memory window is loaded from disk up front.
    pub fn read_only(symbol: impl Into<String>, config: PipelineConfig) -> Result<Self, DataError> {
        let mut pipeline = Self::build(symbol.into(), None, config)?;
        let today = pipeline.config.clock.today();
        let from = today - ChronoDuration::days(i64::from(pipeline.config.cache_days));
        let mut rows = pipeline.store.read_months(from, today)?;
        rows.retain(|r| r.timestamp.date_naive() >= from);
        pipeline.cached = rows;
        Ok(pipeline)
    }

    fn build(symbol: String, provider: Option<Box<dyn DataProvider>>, config: PipelineConfig) -> Result<Self, DataError> {
        if config.chunk_size == 0 {
            return Err(DataError::InvalidConfig("chunk_size must be at least 1".into()));
        }
        let root = config.base_path.join(&symbol);
        std::fs::create_dir_all(&root).map_err(|e| DataError::io(&root, e))?;
        let store = ChunkStore::new(root, config.chunk_size, config.lock_timeout, config.use_file_lock);
        Ok(Self {
            symbol,
            provider,
            store,
            config,
            cached: Vec::new(),
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn root(&self) -> &Path {
        self.store.root()
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn provider(&self) -> Option<&dyn DataProvider> {
        self.provider.as_deref()
    }

    pub fn params(&self) -> PipelineParams {
        PipelineParams {
            symbol: self.symbol.clone(),
            provider: self.provider.as_ref().map(|p| p.name().to_string()),
            base_path: self.config.base_path.clone(),
            cache_days: self.config.cache_days,
            chunk_size: self.config.chunk_size,
            use_file_lock: self.config.use_file_lock,
        }
    }

    /// The in-memory window. Not authoritative; see [`Self::get_all_data`].
    pub fn cached_data(&self) -> &[PriceRow] {
        &self.cached
    }

    /// Fetch from the provider and persist rows strictly newer than the last
    /// stored timestamp. Returns the rows that were persisted.
    ///
    /// Provider failures show up as an empty batch. Storage failures (lock
    /// timeouts included) are returned.
    pub fn fetch_data(&mut self) -> Result<Vec<PriceRow>, DataError> {
        let Some(provider) = self.provider.as_ref() else {
            warn!(symbol = %self.symbol, "read-only pipeline, nothing to fetch");
            return Ok(Vec::new());
        };

        let fetched = dedup_keep_last(provider.get_data());
        if fetched.is_empty() {
            debug!(symbol = %self.symbol, "provider returned no rows");
            return Ok(Vec::new());
        }

        let last_cached = self.last_timestamp()?;
        let fresh: Vec<PriceRow> = match last_cached {
            Some(last) => fetched.into_iter().filter(|r| r.timestamp > last).collect(),
            None => fetched,
        };
        if fresh.is_empty() {
            debug!(symbol = %self.symbol, "no rows newer than cache");
            return Ok(Vec::new());
        }

        let summary = self.store.append(&fresh)?;
        info!(
            symbol = %self.symbol,
            rows = summary.rows_written,
            files = summary.files_touched.len(),
            "persisted new rows"
        );
        self.refresh_cache(&fresh);
        Ok(fresh)
    }

    fn refresh_cache(&mut self, fresh: &[PriceRow]) {
        let cutoff = self.config.clock.now() - ChronoDuration::days(i64::from(self.config.cache_days));
        let mut merged = std::mem::take(&mut self.cached);
        merged.extend_from_slice(fresh);
        merged.retain(|r| r.timestamp >= cutoff);
        self.cached = dedup_keep_last(merged);
    }

    fn last_timestamp(&self) -> Result<Option<DateTime<Utc>>, DataError> {
        Ok(self.get_all_data()?.last().map(|r| r.timestamp))
    }

    /// Every stored row, sorted by timestamp, duplicates resolved to the last
    /// written value.
    pub fn get_all_data(&self) -> Result<Vec<PriceRow>, DataError> {
        self.store.read_all()
    }

    /// Rows with `start <= timestamp <= end`; either bound may be open.
    pub fn get_data_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<PriceRow>, DataError> {
        let mut rows = self.get_all_data()?;
        rows.retain(|r| start.map_or(true, |s| r.timestamp >= s) && end.map_or(true, |e| r.timestamp <= e));
        Ok(rows)
    }

    /// Calendar date (UTC) of the newest stored row.
    pub fn get_latest_date(&self) -> Result<Option<NaiveDate>, DataError> {
        Ok(self.last_timestamp()?.map(|t| t.date_naive()))
    }

    /// Rows from the last `n` calendar days up to now.
    pub fn get_latest_n_days(&self, n: u32) -> Result<Vec<PriceRow>, DataError> {
        let end = self.config.clock.now();
        let start = end - ChronoDuration::days(i64::from(n));
        self.get_data_range(Some(start), Some(end))
    }

    /// Rows from midnight `days_back` days ago through the end of today (UTC).
    pub fn load(&self, days_back: u32) -> Result<Vec<PriceRow>, DataError> {
        let today = self.config.clock.today();
        let start = (today - ChronoDuration::days(i64::from(days_back)))
            .and_hms_opt(0, 0, 0)
            .map(|t| t.and_utc());
        let end = today
            .succ_opt()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|t| t.and_utc() - ChronoDuration::nanoseconds(1));
        self.get_data_range(start, end)
    }

    /// Catch the cache up to today.
    ///
    /// An empty cache gets one full fetch. Otherwise the provider's start date
    /// walks forward one day per fetch from the last stored date until a fetch
    /// persists nothing or the walk passes today.
    pub fn update_to_latest(&mut self) -> Result<UpdateSummary, DataError> {
        let mut summary = UpdateSummary::default();
        if self.provider.is_none() {
            warn!(symbol = %self.symbol, "read-only pipeline, skipping update");
            return Ok(summary);
        }

        let Some(mut cursor) = self.get_latest_date()? else {
            info!(symbol = %self.symbol, "cache empty, running full fetch");
            summary.rows_added = self.fetch_data()?.len();
            summary.fetches = 1;
            return Ok(summary);
        };

        let today = self.config.clock.today();
        while cursor < today {
            cursor += ChronoDuration::days(1);
            if let Some(provider) = self.provider.as_mut() {
                provider.set_start_date(Some(cursor));
            }
            let added = self.fetch_data()?;
            summary.fetches += 1;
            if added.is_empty() {
                break;
            }
            summary.rows_added += added.len();
            debug!(symbol = %self.symbol, from = %cursor, rows = added.len(), "caught up");
        }

        info!(
            symbol = %self.symbol,
            fetches = summary.fetches,
            rows = summary.rows_added,
            "update to latest finished"
        );
        Ok(summary)
    }

    /// Poll the provider every `fetch_interval` until `stop` is set.
    ///
    /// `stop` is checked before each iteration and while waiting. A failing
    /// iteration is logged and counted; the loop keeps going. With
    /// `single_fetch` exactly one iteration runs.
    pub fn fetch_and_save_realtime(&mut self, stop: &AtomicBool, single_fetch: bool) -> RealtimeSummary {
        self.poll_realtime(stop, single_fetch.then_some(1))
    }

    /// The realtime loop, ending after `max_iterations` when given.
    pub fn poll_realtime(&mut self, stop: &AtomicBool, max_iterations: Option<usize>) -> RealtimeSummary {
        let mut summary = RealtimeSummary::default();
        let within_limit = |done: usize| max_iterations.map_or(true, |n| done < n);
        if self.provider.is_none() {
            warn!(symbol = %self.symbol, "read-only pipeline, realtime fetch not started");
            return summary;
        }

        let mut current_day = self.config.clock.today();
        info!(symbol = %self.symbol, interval_secs = self.config.fetch_interval.as_secs(), "realtime fetch started");

        while !stop.load(Ordering::Relaxed) && within_limit(summary.iterations) {
            let today = self.config.clock.today();
            if today != current_day {
                info!(symbol = %self.symbol, from = %current_day, to = %today, "UTC day rolled over");
                current_day = today;
                summary.day_rollovers += 1;
            }

            match self.fetch_data() {
                Ok(rows) => summary.rows_added += rows.len(),
                Err(e) => {
                    error!(symbol = %self.symbol, error = %e, "realtime fetch iteration failed");
                    summary.failures += 1;
                }
            }
            summary.iterations += 1;

            if !within_limit(summary.iterations) {
                break;
            }
            self.wait(stop);
        }

        info!(
            symbol = %self.symbol,
            iterations = summary.iterations,
            rows = summary.rows_added,
            failures = summary.failures,
            rollovers = summary.day_rollovers,
            "realtime fetch stopped"
        );
        summary
    }

    fn wait(&self, stop: &AtomicBool) {
        let deadline = Instant::now() + self.config.fetch_interval;
        let step = Duration::from_millis(100);
        while !stop.load(Ordering::Relaxed) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep(step.min(deadline - now));
        }
    }

    /// Remove month partitions that end before `today - days`. Returns the
    /// number of partitions removed.
    pub fn clean_old_data(&mut self, days: u32) -> Result<usize, DataError> {
        let cutoff = self.config.clock.today() - ChronoDuration::days(i64::from(days));
        let mut removed = 0;

        for (month, _) in self.store.partitions()? {
            if month_end(month) < cutoff && self.store.remove_partition(month)? {
                info!(symbol = %self.symbol, partition = %month, "removed old partition");
                removed += 1;
            }
        }

        self.cached.retain(|r| month_end(r.timestamp.date_naive()) >= cutoff);
        Ok(removed)
    }
}

/// Last day of the month containing `date`.
fn month_end(date: NaiveDate) -> NaiveDate {
    let first = ChunkStore::month_start(date);
    let next = first
        .checked_add_months(chrono::Months::new(1))
        .unwrap_or(NaiveDate::MAX);
    next.pred_opt().unwrap_or(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_end_handles_leap_years_and_december() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        assert_eq!(month_end(d(2024, 2, 10)), d(2024, 2, 29));
        assert_eq!(month_end(d(2023, 2, 1)), d(2023, 2, 28));
        assert_eq!(month_end(d(2024, 12, 31)), d(2024, 12, 31));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            base_path: dir.path().to_path_buf(),
            chunk_size: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            DataPipeline::read_only("SPY", config).err().unwrap(),
            DataError::InvalidConfig(_)
        ));
    }
}
