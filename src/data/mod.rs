//! Data module - upload ingestion and cleaning

pub mod excel;
mod loader;
mod processor;

pub use loader::{DataLoader, LoaderError, UploadedFile, DEFAULT_INFER_SCHEMA_LENGTH};
pub use processor::{DataProcessor, FillReport, ProcessorError};
