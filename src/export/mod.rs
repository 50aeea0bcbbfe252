//! Export module - re-encoding tables for download

mod xlsx;

pub use xlsx::XlsxWriter;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

pub const CSV_MIME: &str = "text/csv";
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to encode table: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Failed to write workbook: {0}")]
    ZipError(#[from] ::zip::result::ZipError),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Output format applied to every file of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionTarget {
    #[default]
    Csv,
    Excel,
}

impl ConversionTarget {
    pub const ALL: [ConversionTarget; 2] = [ConversionTarget::Csv, ConversionTarget::Excel];

    pub fn label(self) -> &'static str {
        match self {
            ConversionTarget::Csv => "CSV",
            ConversionTarget::Excel => "Excel",
        }
    }

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ConversionTarget::Csv => "csv",
            ConversionTarget::Excel => "xlsx",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ConversionTarget::Csv => CSV_MIME,
            ConversionTarget::Excel => XLSX_MIME,
        }
    }

    /// Download name: the original name with its last extension swapped.
    pub fn output_file_name(self, original: &str) -> String {
        Path::new(original)
            .with_extension(self.extension())
            .to_string_lossy()
            .to_string()
    }
}

/// A fully materialized download.
#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Serialize a table as comma-delimited text with a header row and no index.
pub fn encode_csv(df: &DataFrame) -> Result<Vec<u8>, ExportError> {
    let mut buffer: Vec<u8> = Vec::new();
    if df.width() == 0 {
        return Ok(buffer);
    }

    let mut df = df.clone();
    CsvWriter::new(&mut buffer)
        .include_header(true)
        .finish(&mut df)?;
    Ok(buffer)
}

/// Encode a table in the target format, named after the original upload.
pub fn encode(
    df: &DataFrame,
    target: ConversionTarget,
    original_name: &str,
) -> Result<ExportedFile, ExportError> {
    let bytes = match target {
        ConversionTarget::Csv => encode_csv(df)?,
        ConversionTarget::Excel => XlsxWriter::write(df)?,
    };

    let exported = ExportedFile {
        file_name: target.output_file_name(original_name),
        mime_type: target.mime_type(),
        bytes,
    };
    info!(
        file = %exported.file_name,
        format = target.label(),
        bytes = exported.bytes.len(),
        "encoded table"
    );
    Ok(exported)
}
