//! Excel Worksheet Reader
//! Converts the first worksheet of an XLSX workbook into a DataFrame.
//!
//! The first row is the header. Column types are inferred from the body cells:
//! integral numbers become Int64, other numbers Float64, booleans Boolean,
//! date cells Date (or Datetime when any cell carries a time of day) and
//! anything mixed falls back to String. Empty cells are nulls.

use super::loader::LoaderError;
use calamine::{Data, Range, Reader, Xlsx};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use std::collections::HashSet;
use std::io::Cursor;

static EMPTY_CELL: Data = Data::Empty;

/// Largest magnitude stored as an integer when a float cell has no fraction.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Read the first worksheet of an XLSX workbook.
pub fn read_xlsx(bytes: &[u8]) -> Result<DataFrame, LoaderError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(LoaderError::NoWorksheet)??;
    range_to_dataframe(&range)
}

/// Convert a worksheet range (header row first) into a DataFrame.
pub fn range_to_dataframe(range: &Range<Data>) -> Result<DataFrame, LoaderError> {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(DataFrame::empty());
    };
    let body: Vec<&[Data]> = rows.collect();

    let columns: Vec<Column> = header_names(header)
        .into_iter()
        .enumerate()
        .map(|(idx, name)| {
            let cells: Vec<&Data> = body
                .iter()
                .map(|row| row.get(idx).unwrap_or(&EMPTY_CELL))
                .collect();
            build_column(name, &cells)
        })
        .collect();

    Ok(DataFrame::new(columns)?)
}

/// Header cells as unique column names.
///
/// Blank headers become `Unnamed: {index}`; repeats get a `.{n}` suffix.
fn header_names(header: &[Data]) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();

    header
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let base = match cell {
                Data::Empty => format!("Unnamed: {}", idx),
                Data::String(s) if s.trim().is_empty() => format!("Unnamed: {}", idx),
                other => cell_text(other),
            };

            let mut name = base.clone();
            let mut suffix = 0;
            while !used.insert(name.clone()) {
                suffix += 1;
                name = format!("{}.{}", base, suffix);
            }
            name
        })
        .collect()
}

fn integral(value: f64) -> bool {
    value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_EXACT_INTEGER
}

/// Text form of a cell, with dates as ISO 8601 rather than serial numbers.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Float(f) if integral(*f) => (*f as i64).to_string(),
        Data::DateTime(dt) if dt.is_duration() => match dt.as_duration() {
            Some(duration) => duration.to_string(),
            None => cell.to_string(),
        },
        Data::DateTime(_) => match cell_datetime(cell) {
            Some(dt) if dt.time() == NaiveTime::MIN => dt.date().to_string(),
            Some(dt) => dt.to_string(),
            None => cell.to_string(),
        },
        other => other.to_string(),
    }
}

/// Calendar value of a date cell. Durations and non-date cells yield `None`.
fn cell_datetime(cell: &Data) -> Option<NaiveDateTime> {
    match cell {
        Data::DateTime(dt) if dt.is_datetime() => dt.as_datetime(),
        Data::DateTimeIso(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .map(|d| d.and_time(NaiveTime::MIN))
            }),
        _ => None,
    }
}

fn build_column(name: String, cells: &[&Data]) -> Column {
    let present: Vec<&Data> = cells
        .iter()
        .copied()
        .filter(|cell| !matches!(cell, Data::Empty))
        .collect();

    if present.is_empty() {
        let values: Vec<Option<f64>> = vec![None; cells.len()];
        return Column::new(name.into(), values);
    }

    let all_integers = present.iter().all(|cell| match cell {
        Data::Int(_) => true,
        Data::Float(f) => integral(*f),
        _ => false,
    });
    if all_integers {
        let values: Vec<Option<i64>> = cells
            .iter()
            .map(|cell| match cell {
                Data::Int(i) => Some(*i),
                Data::Float(f) => Some(*f as i64),
                _ => None,
            })
            .collect();
        return Column::new(name.into(), values);
    }

    let all_numbers = present
        .iter()
        .all(|cell| matches!(cell, Data::Int(_) | Data::Float(_)));
    if all_numbers {
        let values: Vec<Option<f64>> = cells
            .iter()
            .map(|cell| match cell {
                Data::Int(i) => Some(*i as f64),
                Data::Float(f) => Some(*f),
                _ => None,
            })
            .collect();
        return Column::new(name.into(), values);
    }

    if present.iter().all(|cell| matches!(cell, Data::Bool(_))) {
        let values: Vec<Option<bool>> = cells
            .iter()
            .map(|cell| match cell {
                Data::Bool(b) => Some(*b),
                _ => None,
            })
            .collect();
        return Column::new(name.into(), values);
    }

    if present.iter().all(|cell| cell_datetime(cell).is_some()) {
        let values: Vec<Option<NaiveDateTime>> =
            cells.iter().map(|cell| cell_datetime(cell)).collect();
        if values.iter().flatten().all(|dt| dt.time() == NaiveTime::MIN) {
            let dates: Vec<Option<NaiveDate>> =
                values.iter().map(|dt| dt.map(|dt| dt.date())).collect();
            return Column::new(name.into(), dates);
        }
        return Column::new(name.into(), values);
    }

    let values: Vec<Option<String>> = cells
        .iter()
        .map(|cell| match cell {
            Data::Empty => None,
            other => Some(cell_text(other)),
        })
        .collect();
    Column::new(name.into(), values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataProcessor;
    use calamine::{ExcelDateTime, ExcelDateTimeType};

    fn sheet(rows: Vec<Vec<Data>>) -> Range<Data> {
        let height = rows.len() as u32;
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0) as u32;
        let mut range = Range::new((0, 0), (height - 1, width - 1));
        for (r, row) in rows.into_iter().enumerate() {
            for (c, cell) in row.into_iter().enumerate() {
                range.set_value((r as u32, c as u32), cell);
            }
        }
        range
    }

    fn text(s: &str) -> Data {
        Data::String(s.to_string())
    }

    fn serial(value: f64) -> Data {
        Data::DateTime(ExcelDateTime::new(value, ExcelDateTimeType::DateTime, false))
    }

    #[test]
    fn infers_column_types() {
        let range = sheet(vec![
            vec![text("id"), text("price"), text("active"), text("label")],
            vec![Data::Float(1.0), Data::Float(2.5), Data::Bool(true), text("a")],
            vec![Data::Float(2.0), Data::Empty, Data::Bool(false), Data::Float(3.0)],
        ]);

        let df = range_to_dataframe(&range).unwrap();

        assert_eq!(df.shape(), (2, 4));
        assert_eq!(df.column("id").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("price").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("price").unwrap().null_count(), 1);
        assert_eq!(df.column("active").unwrap().dtype(), &DataType::Boolean);
        assert_eq!(df.column("label").unwrap().dtype(), &DataType::String);

        let labels = df.column("label").unwrap().str().unwrap().clone();
        assert_eq!(labels.get(1), Some("3"));
    }

    #[test]
    fn date_cells_become_date_column() {
        let range = sheet(vec![
            vec![text("id"), text("when")],
            vec![Data::Int(1), serial(45292.0)],
            vec![Data::Int(2), Data::Empty],
            vec![Data::Int(3), Data::DateTimeIso("2024-03-15".to_string())],
        ]);

        let df = range_to_dataframe(&range).unwrap();
        let when = df.column("when").unwrap();

        assert_eq!(when.dtype(), &DataType::Date);
        assert_eq!(when.null_count(), 1);

        let csv = crate::export::encode_csv(&df).unwrap();
        assert_eq!(
            String::from_utf8(csv).unwrap(),
            "id,when\n1,2024-01-01\n2,\n3,2024-03-15\n"
        );
    }

    #[test]
    fn times_of_day_make_datetime_column() {
        let range = sheet(vec![
            vec![text("at")],
            vec![serial(45292.5)],
            vec![serial(45293.0)],
        ]);

        let df = range_to_dataframe(&range).unwrap();
        let at = df.column("at").unwrap();

        assert!(matches!(at.dtype(), DataType::Datetime(_, None)));
        let noon = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(cell_datetime(&serial(45292.5)), Some(noon));
    }

    #[test]
    fn mixed_date_column_renders_iso_text() {
        let range = sheet(vec![
            vec![serial(45292.0), text("note")],
            vec![serial(45292.0), text("x")],
            vec![text("n/a"), text("y")],
        ]);

        let df = range_to_dataframe(&range).unwrap();
        let names = DataProcessor::column_names(&df);
        assert_eq!(names, ["2024-01-01", "note"]);

        let values = df.column("2024-01-01").unwrap().str().unwrap().clone();
        assert_eq!(values.get(0), Some("2024-01-01"));
        assert_eq!(values.get(1), Some("n/a"));
    }

    #[test]
    fn durations_render_as_iso_text() {
        let hour = Data::DateTime(ExcelDateTime::new(
            1.0 / 24.0,
            ExcelDateTimeType::TimeDelta,
            false,
        ));
        assert_eq!(cell_text(&hour), "PT3600S");
    }

    #[test]
    fn names_blank_and_repeated_headers() {
        let range = sheet(vec![
            vec![text("x"), Data::Empty, text("x"), text("x")],
            vec![Data::Int(1), Data::Int(2), Data::Int(3), Data::Int(4)],
        ]);

        let df = range_to_dataframe(&range).unwrap();
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        assert_eq!(names, ["x", "Unnamed: 1", "x.1", "x.2"]);
    }

    #[test]
    fn header_only_sheet_has_no_rows() {
        let range = sheet(vec![vec![text("a"), text("b")]]);
        let df = range_to_dataframe(&range).unwrap();
        assert_eq!(df.shape(), (0, 2));
    }

    #[test]
    fn empty_sheet_is_empty_table() {
        let range: Range<Data> = Range::empty();
        let df = range_to_dataframe(&range).unwrap();
        assert_eq!(df.shape(), (0, 0));
    }

    #[test]
    fn rejects_bytes_that_are_not_a_workbook() {
        let result = read_xlsx(b"definitely not a zip archive");
        assert!(matches!(result, Err(LoaderError::ExcelError(_))));
    }
}
