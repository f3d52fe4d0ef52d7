//! CSV loading and saving, plus typed column extraction

use std::fs::{self, File};
use std::path::Path;
use std::time::Instant;

use polars::prelude::*;
use tracing::debug;

use crate::error::{Result, ScorecastError};

/// CSV reader for the source and split tables. Column types are inferred
/// from the whole file.
#[derive(Debug, Clone, Default)]
pub struct DataLoader;

impl DataLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a headed CSV file
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let start = Instant::now();
        let file = File::open(path)?;

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .into_reader_with_file_handle(file)
            .finish()?;

        debug!(
            path = %path.display(),
            rows = df.height(),
            cols = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "loaded csv"
        );
        Ok(df)
    }
}

/// CSV writer for pipeline artifacts
pub struct DataSaver;

impl DataSaver {
    /// Write `df` with a header row, creating parent directories.
    pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).include_header(true).finish(df)?;
        Ok(())
    }
}

fn get_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| ScorecastError::FeatureNotFound(name.to_string()))
}

/// Read a numeric column as `f64`, keeping nulls as `None`.
///
/// Integer columns are widened; text that does not parse as a number is an error.
pub fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = get_column(df, name)?
        .as_materialized_series()
        .strict_cast(&DataType::Float64)
        .map_err(|e| ScorecastError::DataError(format!("column '{}' is not numeric: {}", name, e)))?;
    Ok(series.f64()?.into_iter().collect())
}

/// Read a column as text, keeping nulls as `None`.
pub fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = get_column(df, name)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Rows of `df` at `indices`, in the given order.
pub fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let height = df.height();
    let mut idx = Vec::with_capacity(indices.len());
    for &i in indices {
        if i >= height {
            return Err(ScorecastError::ShapeError {
                expected: format!("row index < {}", height),
                actual: i.to_string(),
            });
        }
        idx.push(i as IdxSize);
    }
    let idx = IdxCa::from_vec("idx".into(), idx);
    Ok(df.take(&idx)?)
}
