//! Uploaded File Loader Module
//! Detects the upload format and parses CSV/XLSX bytes into a DataFrame using Polars.

use super::excel;
use polars::prelude::*;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Default number of rows Polars scans to infer CSV column types.
pub const DEFAULT_INFER_SCHEMA_LENGTH: usize = 10000;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Unsupported file type: '{extension}'")]
    UnsupportedFormat { extension: String },
    #[error("Failed to parse table: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Failed to load Excel workbook: {0}")]
    ExcelError(#[from] calamine::XlsxError),
    #[error("Excel workbook has no worksheet")]
    NoWorksheet,
}

/// Tabular formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Xlsx,
}

impl SourceFormat {
    /// Detect the format from a file name. Matching is case-insensitive.
    pub fn from_file_name(name: &str) -> Result<Self, LoaderError> {
        let extension = file_extension(name);
        match extension.as_str() {
            ".csv" => Ok(SourceFormat::Csv),
            ".xlsx" => Ok(SourceFormat::Xlsx),
            _ => Err(LoaderError::UnsupportedFormat { extension }),
        }
    }
}

/// Lowercased extension of a file name including the leading dot, or an empty string.
pub fn file_extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// A file handed over by the user: name plus raw bytes, read once.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a file from disk, keeping only its file name.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Ok(Self::new(name, bytes))
    }

    /// Declared size in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Parses uploaded files into DataFrames.
#[derive(Debug, Clone)]
pub struct DataLoader {
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: DEFAULT_INFER_SCHEMA_LENGTH,
        }
    }

    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows;
        self
    }

    /// Parse an uploaded file according to its extension.
    ///
    /// Unsupported extensions fail before any byte is parsed.
    pub fn load(&self, file: &UploadedFile) -> Result<DataFrame, LoaderError> {
        let format = SourceFormat::from_file_name(&file.name)?;
        debug!(file = %file.name, ?format, bytes = file.size(), "parsing upload");

        let df = match format {
            SourceFormat::Csv => self.read_csv(&file.bytes)?,
            SourceFormat::Xlsx => excel::read_xlsx(&file.bytes)?,
        };

        info!(
            file = %file.name,
            rows = df.height(),
            columns = df.width(),
            "loaded table"
        );
        Ok(df)
    }

    /// Parse comma-delimited text with a header row. Empty fields become nulls.
    pub fn read_csv(&self, bytes: &[u8]) -> Result<DataFrame, LoaderError> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()?;
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_formats_case_insensitively() {
        assert_eq!(
            SourceFormat::from_file_name("sales.csv").unwrap(),
            SourceFormat::Csv
        );
        assert_eq!(
            SourceFormat::from_file_name("Report.XLSX").unwrap(),
            SourceFormat::Xlsx
        );
    }

    #[test]
    fn rejects_unsupported_extension() {
        let err = SourceFormat::from_file_name("notes.txt").unwrap_err();
        match err {
            LoaderError::UnsupportedFormat { extension } => assert_eq!(extension, ".txt"),
            other => panic!("unexpected error: {other}"),
        }

        let err = SourceFormat::from_file_name("README").unwrap_err();
        assert!(matches!(err, LoaderError::UnsupportedFormat { extension } if extension.is_empty()));
    }

    #[test]
    fn unsupported_upload_produces_no_table() {
        let file = UploadedFile::new("notes.txt", b"a,b\n1,2\n".to_vec());
        let result = DataLoader::new().load(&file);
        assert!(matches!(result, Err(LoaderError::UnsupportedFormat { .. })));
    }

    #[test]
    fn reads_csv_with_missing_values() {
        let file = UploadedFile::new("data.csv", b"a,b\n1,\n1,4\n".to_vec());
        let df = DataLoader::new().load(&file).unwrap();

        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(df.height(), 2);
        assert_eq!(names, ["a", "b"]);
        assert_eq!(df.column("b").unwrap().null_count(), 1);
    }

    #[test]
    fn reads_upload_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.csv");
        std::fs::write(&path, "name,age\nAda,36\n").unwrap();

        let file = UploadedFile::from_path(&path).unwrap();
        assert_eq!(file.name, "people.csv");

        let df = DataLoader::new().load(&file).unwrap();
        assert_eq!(df.shape(), (1, 2));
    }
}
