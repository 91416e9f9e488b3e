//! Chunked on-disk CSV store for one symbol.
//!
//! Layout: `{root}/{YYYY-MM-01}/chunk{N}.csv`
//!
//! - One date-named directory per calendar month (the partition).
//! - Inside a partition, chunk ordinals start at 0. An append tops up the
//!   highest-numbered chunk to `chunk_size` rows, then opens the next ordinal.
//! - Every read and write of a chunk holds that chunk's sidecar lock, never a
//!   lock on the partition or the symbol, so writers to different months or
//!   symbols proceed in parallel.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use super::lock::FileLock;
use super::provider::DataError;
use crate::domain::{dedup_keep_last, PriceRow};

/// Outcome of one [`ChunkStore::append`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendSummary {
    pub rows_written: usize,
    pub files_touched: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ChunkStore {
    root: PathBuf,
    chunk_size: usize,
    lock_timeout: Duration,
    use_file_lock: bool,
}

impl ChunkStore {
    pub fn new(root: impl Into<PathBuf>, chunk_size: usize, lock_timeout: Duration, use_file_lock: bool) -> Self {
        Self {
            root: root.into(),
            chunk_size: chunk_size.max(1),
            lock_timeout,
            use_file_lock,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// First day of the month containing `date`.
    pub fn month_start(date: NaiveDate) -> NaiveDate {
        date.with_day(1).unwrap_or(date)
    }

    pub fn partition_dir(&self, month: NaiveDate) -> PathBuf {
        self.root.join(Self::month_start(month).format("%Y-%m-%d").to_string())
    }

    pub fn chunk_path(&self, month: NaiveDate, ordinal: usize) -> PathBuf {
        self.partition_dir(month).join(format!("chunk{ordinal}.csv"))
    }

    fn lock(&self, path: &Path) -> Result<Option<FileLock>, DataError> {
        if self.use_file_lock {
            FileLock::acquire(path, self.lock_timeout).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Date-named partitions, ascending. Directories whose name is not a
    /// `YYYY-MM-DD` date are ignored.
    pub fn partitions(&self) -> Result<Vec<(NaiveDate, PathBuf)>, DataError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.root).map_err(|e| DataError::io(&self.root, e))?;

        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DataError::io(&self.root, e))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(date) = name
                .to_str()
                .and_then(|n| NaiveDate::parse_from_str(n, "%Y-%m-%d").ok())
            else {
                continue;
            };
            out.push((date, path));
        }
        out.sort_by_key(|(d, _)| *d);
        Ok(out)
    }

    /// Chunk files of one partition directory, by ascending ordinal.
    pub fn list_chunks(&self, partition: &Path) -> Result<Vec<(usize, PathBuf)>, DataError> {
        if !partition.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(partition).map_err(|e| DataError::io(partition, e))?;

        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DataError::io(partition, e))?;
            let name = entry.file_name();
            let ordinal = name
                .to_str()
                .and_then(|n| n.strip_prefix("chunk"))
                .and_then(|n| n.strip_suffix(".csv"))
                .and_then(|n| n.parse::<usize>().ok());
            if let Some(ordinal) = ordinal {
                out.push((ordinal, entry.path()));
            }
        }
        out.sort_by_key(|(n, _)| *n);
        Ok(out)
    }

    /// Rows of one chunk file in file order, under its lock.
    pub fn read_chunk(&self, path: &Path) -> Result<Vec<PriceRow>, DataError> {
        let _guard = self.lock(path)?;
        read_rows(path)
    }

    /// Every stored row, sorted, one row per timestamp (last written wins).
    pub fn read_all(&self) -> Result<Vec<PriceRow>, DataError> {
        let mut rows = Vec::new();
        for (_, partition) in self.partitions()? {
            for (_, chunk) in self.list_chunks(&partition)? {
                rows.extend(self.read_chunk(&chunk)?);
            }
        }
        Ok(dedup_keep_last(rows))
    }

    /// Rows of the partitions overlapping `[start, end]` (dates inclusive).
    pub fn read_months(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<PriceRow>, DataError> {
        let first = Self::month_start(start);
        let mut rows = Vec::new();
        for (month, partition) in self.partitions()? {
            if month < first || month > end {
                continue;
            }
            for (_, chunk) in self.list_chunks(&partition)? {
                rows.extend(self.read_chunk(&chunk)?);
            }
        }
        Ok(dedup_keep_last(rows))
    }

    /// Append rows to their month partitions. Rows must already be sorted.
    pub fn append(&self, rows: &[PriceRow]) -> Result<AppendSummary, DataError> {
        let mut by_month: BTreeMap<NaiveDate, Vec<&PriceRow>> = BTreeMap::new();
        for row in rows {
            by_month
                .entry(Self::month_start(row.timestamp.date_naive()))
                .or_default()
                .push(row);
        }

        let mut summary = AppendSummary::default();
        for (month, month_rows) in by_month {
            self.append_month(month, &month_rows, &mut summary)?;
        }
        Ok(summary)
    }

    fn append_month(&self, month: NaiveDate, rows: &[&PriceRow], summary: &mut AppendSummary) -> Result<(), DataError> {
        let dir = self.partition_dir(month);
        fs::create_dir_all(&dir).map_err(|e| DataError::io(&dir, e))?;

        let mut ordinal = self
            .list_chunks(&dir)?
            .last()
            .map(|(n, _)| *n)
            .unwrap_or(0);
        let mut remaining = rows;

        // Fullness is re-checked under each chunk's lock, so a concurrent
        // writer that filled or created the chunk first is simply skipped past.
        while !remaining.is_empty() {
            let path = self.chunk_path(month, ordinal);
            let _guard = self.lock(&path)?;

            let existing = if path.exists() { read_rows(&path)?.len() } else { 0 };
            let free = self.chunk_size.saturating_sub(existing);
            if free > 0 {
                let take = free.min(remaining.len());
                write_rows(&path, &remaining[..take])?;
                debug!(path = %path.display(), rows = take, "appended to chunk");
                summary.rows_written += take;
                summary.files_touched.push(path);
                remaining = &remaining[take..];
            }
            ordinal += 1;
        }
        Ok(())
    }

    /// Delete one month partition and everything in it.
    pub fn remove_partition(&self, month: NaiveDate) -> Result<bool, DataError> {
        let dir = self.partition_dir(month);
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir).map_err(|e| DataError::io(&dir, e))?;
        Ok(true)
    }
}

fn csv_error(path: &Path, err: csv::Error) -> DataError {
    match err.into_kind() {
        csv::ErrorKind::Io(e) => DataError::io(path, e),
        other => DataError::CacheError(format!("{}: {other:?}", path.display())),
    }
}

fn read_rows(path: &Path) -> Result<Vec<PriceRow>, DataError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| csv_error(path, e))?;
    reader
        .deserialize::<PriceRow>()
        .map(|r| r.map_err(|e| csv_error(path, e)))
        .collect()
}

fn write_rows(path: &Path, rows: &[&PriceRow]) -> Result<(), DataError> {
    let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| DataError::io(path, e))?;

    let mut writer = csv::WriterBuilder::new().has_headers(needs_header).from_writer(file);
    for row in rows {
        writer.serialize(row).map_err(|e| csv_error(path, e))?;
    }
    writer.flush().map_err(|e| DataError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as Days, TimeZone, Utc};

    fn store(dir: &Path, chunk_size: usize) -> ChunkStore {
        ChunkStore::new(dir.join("SPY"), chunk_size, Duration::from_secs(1), true)
    }

    fn rows(start: (i32, u32, u32), n: usize) -> Vec<PriceRow> {
        let t0 = Utc.with_ymd_and_hms(start.0, start.1, start.2, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| PriceRow::flat(t0 + Days::minutes(i as i64), 100.0 + i as f64, 1.0))
            .collect()
    }

    #[test]
    fn partitions_by_month() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path(), 100);
        let mut batch = rows((2024, 1, 31), 1);
        batch.extend(rows((2024, 2, 1), 1));
        s.append(&batch).unwrap();

        let parts = s.partitions().unwrap();
        let names: Vec<_> = parts.iter().map(|(d, _)| d.to_string()).collect();
        assert_eq!(names, vec!["2024-01-01", "2024-02-01"]);
    }

    #[test]
    fn tops_up_last_chunk_before_opening_next() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path(), 10);
        let all = rows((2024, 3, 1), 25);
        s.append(&all[..7]).unwrap();
        s.append(&all[7..]).unwrap();

        let partition = s.partition_dir(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        let sizes: Vec<_> = s
            .list_chunks(&partition)
            .unwrap()
            .iter()
            .map(|(_, p)| s.read_chunk(p).unwrap().len())
            .collect();
        assert_eq!(sizes, vec![10, 10, 5]);
        assert_eq!(s.read_all().unwrap(), all);
    }

    #[test]
    fn read_all_keeps_last_written_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path(), 100);
        let first = rows((2024, 3, 1), 2);
        let mut second = first[1].clone();
        second.close = 999.0;
        s.append(&first).unwrap();
        s.append(&[second]).unwrap();

        let all = s.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].close, 999.0);
    }

    #[test]
    fn ignores_foreign_files_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path(), 100);
        s.append(&rows((2024, 3, 1), 3)).unwrap();
        fs::create_dir_all(s.root().join("backup")).unwrap();
        let partition = s.partition_dir(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        fs::write(partition.join("notes.txt"), "x").unwrap();

        assert_eq!(s.partitions().unwrap().len(), 1);
        assert_eq!(s.list_chunks(&partition).unwrap().len(), 1);
        assert_eq!(s.read_all().unwrap().len(), 3);
    }

    #[test]
    fn nan_prices_survive_storage() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path(), 100);
        let mut r = rows((2024, 3, 1), 1);
        r[0].open = f64::NAN;
        s.append(&r).unwrap();
        assert!(s.read_all().unwrap()[0].open.is_nan());
    }

    #[test]
    fn remove_partition_deletes_month() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path(), 100);
        s.append(&rows((2024, 3, 1), 3)).unwrap();
        let march = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert!(s.remove_partition(march).unwrap());
        assert!(!s.remove_partition(march).unwrap());
        assert!(s.read_all().unwrap().is_empty());
    }

    #[test]
    fn empty_store_reads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path(), 100);
        assert!(s.partitions().unwrap().is_empty());
        assert!(s.read_all().unwrap().is_empty());
    }
}
