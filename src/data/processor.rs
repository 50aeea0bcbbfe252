//! Data Processor Module
//! Handles data cleaning (deduplicate, fill missing) and column selection.

use polars::prelude::*;
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Unknown column: {0}")]
    UnknownColumn(String),
    #[error("Column selected more than once: {0}")]
    DuplicateColumn(String),
}

/// Outcome of a fill-missing pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FillReport {
    /// Numeric columns that had missing cells.
    pub columns: Vec<String>,
    /// Cells replaced by a column mean.
    pub cells_filled: usize,
}

/// Handles data cleaning and projection operations.
pub struct DataProcessor;

impl DataProcessor {
    pub fn is_numeric(dtype: &DataType) -> bool {
        matches!(
            dtype,
            DataType::Float32
                | DataType::Float64
                | DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
        )
    }

    fn is_float(dtype: &DataType) -> bool {
        matches!(dtype, DataType::Float32 | DataType::Float64)
    }

    /// Get list of column names.
    pub fn column_names(df: &DataFrame) -> Vec<String> {
        df.get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Get list of numeric column names, in table order.
    pub fn numeric_columns(df: &DataFrame) -> Vec<String> {
        df.get_columns()
            .iter()
            .filter(|col| Self::is_numeric(col.dtype()))
            .map(|col| col.name().to_string())
            .collect()
    }

    /// Count of null or NaN cells in a numeric column.
    fn missing_count(column: &Column) -> PolarsResult<usize> {
        let as_f64 = column.cast(&DataType::Float64)?;
        Ok(as_f64
            .f64()?
            .into_iter()
            .filter(|v| v.map_or(true, |x| x.is_nan()))
            .count())
    }

    /// Remove rows that repeat an earlier row, keeping first occurrences in order.
    ///
    /// Returns the number of rows removed.
    pub fn remove_duplicates(df: &mut DataFrame) -> Result<usize, ProcessorError> {
        if df.width() == 0 {
            return Ok(0);
        }

        let before = df.height();
        let deduplicated = df
            .clone()
            .lazy()
            .unique_stable(None, UniqueKeepStrategy::First)
            .collect()?;

        let removed = before - deduplicated.height();
        *df = deduplicated;
        debug!(removed, rows = df.height(), "removed duplicate rows");
        Ok(removed)
    }

    /// Replace missing cells of numeric columns with that column's mean.
    ///
    /// The mean is taken over the non-missing cells at call time. Integer
    /// columns with gaps become Float64; columns without gaps keep their type.
    /// Non-numeric columns are left alone.
    pub fn fill_missing(df: &mut DataFrame) -> Result<FillReport, ProcessorError> {
        let mut exprs: Vec<Expr> = Vec::new();
        let mut missing_before: Vec<(String, usize)> = Vec::new();

        for column in df.get_columns() {
            let dtype = column.dtype();
            if !Self::is_numeric(dtype) {
                continue;
            }

            let missing = Self::missing_count(column)?;
            if missing == 0 {
                continue;
            }

            let name = column.name().as_str();
            let base = if Self::is_float(dtype) {
                col(name).fill_nan(lit(NULL))
            } else {
                col(name).cast(DataType::Float64)
            };
            exprs.push(base.clone().fill_null(base.mean()));
            missing_before.push((name.to_string(), missing));
        }

        if exprs.is_empty() {
            return Ok(FillReport::default());
        }

        let filled = df.clone().lazy().with_columns(exprs).collect()?;

        let mut report = FillReport::default();
        for (name, missing) in missing_before {
            let remaining = filled.column(&name)?.null_count();
            report.cells_filled += missing.saturating_sub(remaining);
            report.columns.push(name);
        }

        *df = filled;
        debug!(
            columns = ?report.columns,
            cells = report.cells_filled,
            "filled missing values"
        );
        Ok(report)
    }

    /// Check a column selection against the table's columns.
    pub fn validate_selection(df: &DataFrame, selection: &[String]) -> Result<(), ProcessorError> {
        let mut seen: HashSet<&str> = HashSet::new();
        for name in selection {
            if df.column(name).is_err() {
                return Err(ProcessorError::UnknownColumn(name.clone()));
            }
            if !seen.insert(name.as_str()) {
                return Err(ProcessorError::DuplicateColumn(name.clone()));
            }
        }
        Ok(())
    }

    /// Project the table onto the selected columns, in selection order.
    ///
    /// An empty selection yields a table without columns.
    pub fn select_columns(df: &DataFrame, selection: &[String]) -> Result<DataFrame, ProcessorError> {
        Self::validate_selection(df, selection)?;
        if selection.is_empty() {
            return Ok(DataFrame::empty());
        }
        Ok(df.select(selection.iter().map(|s| s.as_str()))?)
    }

    /// First `rows` rows of the table.
    pub fn preview(df: &DataFrame, rows: usize) -> DataFrame {
        df.head(Some(rows))
    }

    /// Render every row as display strings, row-major. Meant for previews.
    pub fn cell_rows(df: &DataFrame) -> Vec<Vec<String>> {
        (0..df.height())
            .map(|i| {
                df.get_columns()
                    .iter()
                    .map(|column| {
                        column
                            .get(i)
                            .map(|val| Self::cell_text(&val))
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect()
    }

    fn cell_text(val: &AnyValue) -> String {
        match val {
            AnyValue::Null => String::new(),
            AnyValue::String(s) => s.to_string(),
            other => other.to_string().trim_matches('"').to_string(),
        }
    }
}
