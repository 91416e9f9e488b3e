//! Parquet snapshots of a price panel.
//!
//! Schema: a `date` column (Date) followed by one f64 close column per
//! symbol, in panel order.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;

use super::provider::DataError;
use crate::domain::PricePanel;

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Convert a panel to a DataFrame.
pub fn panel_to_dataframe(panel: &PricePanel) -> Result<DataFrame, DataError> {
    let days: Vec<i32> = panel
        .dates()
        .iter()
        .map(|d| (*d - epoch()).num_days() as i32)
        .collect();

    let mut columns = Vec::with_capacity(panel.n_cols() + 1);
    columns.push(
        Column::new("date".into(), days)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
    );
    for (col, symbol) in panel.symbols().iter().enumerate() {
        columns.push(Column::new(symbol.as_str().into(), panel.column_at(col)));
    }

    DataFrame::new(columns).map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

pub fn write_panel_parquet(panel: &PricePanel, path: &Path) -> Result<(), DataError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| DataError::io(parent, e))?;
    }
    let mut df = panel_to_dataframe(panel)?;
    let file = fs::File::create(path).map_err(|e| DataError::io(path, e))?;
    ParquetWriter::new(file)
        .finish(&mut df)
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

pub fn read_panel_parquet(path: &Path) -> Result<PricePanel, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::io(path, e))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    let dates = df
        .column("date")
        .map_err(|e| DataError::ParquetError(format!("missing date column: {e}")))?
        .date()
        .map_err(|e| DataError::ParquetError(format!("date column type: {e}")))?;

    let n = df.height();
    let mut panel_dates = Vec::with_capacity(n);
    for i in 0..n {
        let days = dates
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))?;
        panel_dates.push(epoch() + chrono::Duration::days(i64::from(days)));
    }

    let mut symbols = Vec::new();
    let mut columns = Vec::new();
    for column in df.get_columns() {
        if column.name().as_str() == "date" {
            continue;
        }
        let ca = column
            .f64()
            .map_err(|e| DataError::ParquetError(format!("column '{}' type: {e}", column.name())))?;
        symbols.push(column.name().to_string());
        columns.push(ca.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect::<Vec<f64>>());
    }

    let values = (0..n)
        .map(|row| columns.iter().map(|c| c[row]).collect())
        .collect();
    PricePanel::new(panel_dates, symbols, values).map_err(|e| DataError::ParquetError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_preserves_panel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("panel.parquet");
        let dates = vec![
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
        ];
        let panel = PricePanel::new(
            dates,
            vec!["SPY".into(), "QQQ".into()],
            vec![vec![470.0, 400.0], vec![471.5, 401.25]],
        )
        .unwrap();

        write_panel_parquet(&panel, &path).unwrap();
        assert_eq!(read_panel_parquet(&path).unwrap(), panel);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_panel_parquet(Path::new("/nonexistent/panel.parquet")).unwrap_err();
        assert!(matches!(err, DataError::Io { .. }));
    }
}
