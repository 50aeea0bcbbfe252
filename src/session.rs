//! Session Module
//! Holds one user's uploaded files and their tables, and exposes the
//! request/response handlers the GUI calls on each interaction.
//!
//! Every handler works on a single file. A failure is returned as a
//! `FileProcessingError` for that file and never touches the others.

use crate::charts::BarChartData;
use crate::config::SweeperConfig;
use crate::data::{
    DataLoader, DataProcessor, FillReport, LoaderError, ProcessorError, UploadedFile,
};
use crate::export::{self, ConversionTarget, ExportError, ExportedFile};
use polars::prelude::*;
use thiserror::Error;
use tracing::{info, warn};

/// Stable identifier of a file within a session.
pub type FileId = usize;

#[derive(Error, Debug)]
pub enum FileErrorKind {
    #[error(transparent)]
    Load(#[from] LoaderError),
    #[error(transparent)]
    Process(#[from] ProcessorError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("Failed to build chart: {0}")]
    Chart(#[source] PolarsError),
    #[error("file has no table because it failed to load")]
    NotLoaded,
    #[error("no such file in this session")]
    UnknownFile,
}

/// A per-file failure: the file name plus the underlying cause.
#[derive(Error, Debug)]
#[error("Error processing file {file_name}: {source}")]
pub struct FileProcessingError {
    pub file_name: String,
    #[source]
    pub source: FileErrorKind,
}

impl FileProcessingError {
    pub fn new(file_name: impl Into<String>, source: impl Into<FileErrorKind>) -> Self {
        Self {
            file_name: file_name.into(),
            source: source.into(),
        }
    }

    fn unknown(id: FileId) -> Self {
        Self::new(format!("#{}", id), FileErrorKind::UnknownFile)
    }

    /// True when the file was skipped for having an unsupported extension.
    pub fn is_unsupported_format(&self) -> bool {
        matches!(
            self.source,
            FileErrorKind::Load(LoaderError::UnsupportedFormat { .. })
        )
    }
}

/// Table state of a successfully ingested file.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: DataFrame,
    /// Columns to keep on export, in output order.
    pub selection: Vec<String>,
    pub show_chart: bool,
}

impl LoadedTable {
    fn new(table: DataFrame) -> Self {
        let selection = DataProcessor::column_names(&table);
        Self {
            table,
            selection,
            show_chart: false,
        }
    }

    /// Drop selected names that no longer exist in the table.
    fn retain_valid_selection(&mut self) {
        let table = &self.table;
        self.selection.retain(|name| table.column(name).is_ok());
    }

    pub fn selected_table(&self) -> Result<DataFrame, ProcessorError> {
        DataProcessor::select_columns(&self.table, &self.selection)
    }
}

#[derive(Debug)]
pub enum FileState {
    Loaded(LoadedTable),
    Failed(FileProcessingError),
}

/// One uploaded file and what became of it.
#[derive(Debug)]
pub struct SessionFile {
    pub id: FileId,
    pub name: String,
    pub size_bytes: usize,
    pub state: FileState,
}

impl SessionFile {
    pub fn size_kb(&self) -> f64 {
        self.size_bytes as f64 / 1024.0
    }

    pub fn loaded(&self) -> Result<&LoadedTable, FileProcessingError> {
        match &self.state {
            FileState::Loaded(loaded) => Ok(loaded),
            FileState::Failed(_) => Err(FileProcessingError::new(&self.name, FileErrorKind::NotLoaded)),
        }
    }

    fn loaded_mut(&mut self) -> Result<&mut LoadedTable, FileProcessingError> {
        match &mut self.state {
            FileState::Loaded(loaded) => Ok(loaded),
            FileState::Failed(_) => Err(FileProcessingError::new(&self.name, FileErrorKind::NotLoaded)),
        }
    }

    pub fn error(&self) -> Option<&FileProcessingError> {
        match &self.state {
            FileState::Failed(err) => Some(err),
            FileState::Loaded(_) => None,
        }
    }
}

/// Result of one upload batch.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchReport {
    pub loaded: Vec<FileId>,
    /// Failed files with their user-facing message.
    pub failed: Vec<(FileId, String)>,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// One user's interactive lifetime.
pub struct Session {
    config: SweeperConfig,
    loader: DataLoader,
    target: ConversionTarget,
    files: Vec<SessionFile>,
    next_id: FileId,
}

impl Session {
    pub fn new(config: SweeperConfig) -> Self {
        Self {
            loader: config.loader(),
            target: config.default_target,
            config,
            files: Vec::new(),
            next_id: 0,
        }
    }

    pub fn config(&self) -> &SweeperConfig {
        &self.config
    }

    pub fn files(&self) -> &[SessionFile] {
        &self.files
    }

    pub fn file(&self, id: FileId) -> Option<&SessionFile> {
        self.files.iter().find(|f| f.id == id)
    }

    fn entry(&self, id: FileId) -> Result<&SessionFile, FileProcessingError> {
        self.file(id).ok_or_else(|| FileProcessingError::unknown(id))
    }

    fn entry_mut(&mut self, id: FileId) -> Result<&mut SessionFile, FileProcessingError> {
        self.files
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| FileProcessingError::unknown(id))
    }

    pub fn target(&self) -> ConversionTarget {
        self.target
    }

    pub fn set_target(&mut self, target: ConversionTarget) {
        if self.target != target {
            info!(target = target.label(), "conversion target changed");
        }
        self.target = target;
    }

    /// Ingest a batch of uploads. Each file succeeds or fails on its own.
    pub fn upload(&mut self, uploads: Vec<UploadedFile>) -> BatchReport {
        let mut report = BatchReport::default();

        for upload in uploads {
            let id = self.next_id;
            self.next_id += 1;

            let state = match self.loader.load(&upload) {
                Ok(table) => {
                    report.loaded.push(id);
                    FileState::Loaded(LoadedTable::new(table))
                }
                Err(err) => {
                    let err = FileProcessingError::new(&upload.name, err);
                    warn!(file = %upload.name, error = %err.source, "skipping file");
                    report.failed.push((id, err.to_string()));
                    FileState::Failed(err)
                }
            };

            self.files.push(SessionFile {
                id,
                size_bytes: upload.size(),
                name: upload.name,
                state,
            });
        }

        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "processed upload batch"
        );
        report
    }

    /// Deduplicate the file's table in place. Returns the rows removed.
    pub fn remove_duplicates(&mut self, id: FileId) -> Result<usize, FileProcessingError> {
        let entry = self.entry_mut(id)?;
        let name = entry.name.clone();
        let loaded = entry.loaded_mut()?;

        let removed = DataProcessor::remove_duplicates(&mut loaded.table)
            .map_err(|e| FileProcessingError::new(&name, e))?;
        loaded.retain_valid_selection();

        info!(file = %name, removed, "duplicates removed");
        Ok(removed)
    }

    /// Fill missing numeric cells of the file's table with column means.
    pub fn fill_missing(&mut self, id: FileId) -> Result<FillReport, FileProcessingError> {
        let entry = self.entry_mut(id)?;
        let name = entry.name.clone();
        let loaded = entry.loaded_mut()?;

        let report = DataProcessor::fill_missing(&mut loaded.table)
            .map_err(|e| FileProcessingError::new(&name, e))?;
        loaded.retain_valid_selection();

        info!(file = %name, columns = ?report.columns, cells = report.cells_filled, "missing values filled");
        Ok(report)
    }

    /// Replace the column selection used for charting and export.
    pub fn set_selection(
        &mut self,
        id: FileId,
        columns: Vec<String>,
    ) -> Result<(), FileProcessingError> {
        let entry = self.entry_mut(id)?;
        let name = entry.name.clone();
        let loaded = entry.loaded_mut()?;

        DataProcessor::validate_selection(&loaded.table, &columns)
            .map_err(|e| FileProcessingError::new(&name, e))?;
        info!(file = %name, columns = ?columns, "selection changed");
        loaded.selection = columns;
        Ok(())
    }

    pub fn set_chart_visible(&mut self, id: FileId, visible: bool) -> Result<(), FileProcessingError> {
        self.entry_mut(id)?.loaded_mut()?.show_chart = visible;
        Ok(())
    }

    /// The file's table projected onto its selection.
    pub fn selected_table(&self, id: FileId) -> Result<DataFrame, FileProcessingError> {
        let entry = self.entry(id)?;
        entry
            .loaded()?
            .selected_table()
            .map_err(|e| FileProcessingError::new(&entry.name, e))
    }

    /// First rows of the file's full table.
    pub fn preview(&self, id: FileId) -> Result<DataFrame, FileProcessingError> {
        let loaded = self.entry(id)?.loaded()?;
        Ok(DataProcessor::preview(&loaded.table, self.config.preview_rows))
    }

    /// Bar chart data for the selected columns.
    pub fn chart(&self, id: FileId) -> Result<BarChartData, FileProcessingError> {
        let entry = self.entry(id)?;
        let selected = self.selected_table(id)?;
        BarChartData::from_table(&selected, self.config.chart_max_rows)
            .map_err(|e| FileProcessingError::new(&entry.name, FileErrorKind::Chart(e)))
    }

    /// Encode the selected columns in the session's conversion target.
    pub fn export(&self, id: FileId) -> Result<ExportedFile, FileProcessingError> {
        let entry = self.entry(id)?;
        let selected = self.selected_table(id)?;
        export::encode(&selected, self.target, &entry.name)
            .map_err(|e| FileProcessingError::new(&entry.name, e))
    }

    /// Drop a file from the session. Returns false when it was not present.
    pub fn remove(&mut self, id: FileId) -> bool {
        let before = self.files.len();
        self.files.retain(|f| f.id != id);
        before != self.files.len()
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::excel;
    use crate::export::{XlsxWriter, CSV_MIME, XLSX_MIME};

    fn session() -> Session {
        Session::new(SweeperConfig::default())
    }

    fn csv(name: &str, text: &str) -> UploadedFile {
        UploadedFile::new(name, text.as_bytes().to_vec())
    }

    #[test]
    fn batch_isolates_failures() {
        let mut session = session();
        let report = session.upload(vec![
            csv("good.csv", "a,b\n1,2\n"),
            csv("notes.txt", "hello"),
            csv("empty.csv", ""),
            csv("other.csv", "x\n3\n"),
        ]);

        assert_eq!(report.loaded, [0, 3]);
        assert_eq!(report.failed.len(), 2);
        assert!(!report.all_succeeded());
        assert!(report.failed[0].1.contains("Error processing file notes.txt"));

        let skipped = session.file(1).unwrap();
        assert!(skipped.error().unwrap().is_unsupported_format());
        assert!(skipped.loaded().is_err());

        assert_eq!(session.preview(0).unwrap().height(), 1);
        assert_eq!(session.preview(3).unwrap().height(), 1);
    }

    #[test]
    fn records_file_size() {
        let mut session = session();
        session.upload(vec![UploadedFile::new("big.csv", vec![b'1'; 2048])]);

        let file = session.file(0).unwrap();
        assert_eq!(file.size_bytes, 2048);
        assert!((file.size_kb() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn handlers_on_failed_file_report_its_name() {
        let mut session = session();
        session.upload(vec![csv("notes.txt", "hello")]);

        let err = session.remove_duplicates(0).unwrap_err();
        assert_eq!(err.file_name, "notes.txt");
        assert!(matches!(err.source, FileErrorKind::NotLoaded));

        let err = session.export(42).unwrap_err();
        assert!(matches!(err.source, FileErrorKind::UnknownFile));
    }

    #[test]
    fn full_flow_exports_cleaned_csv() {
        let mut session = session();
        session.upload(vec![csv("data.csv", "a,b\n1,\n1,4\n")]);

        assert_eq!(session.remove_duplicates(0).unwrap(), 0);
        let filled = session.fill_missing(0).unwrap();
        assert_eq!(filled.columns, ["b"]);
        assert_eq!(filled.cells_filled, 1);

        let exported = session.export(0).unwrap();
        assert_eq!(exported.file_name, "data.csv");
        assert_eq!(exported.mime_type, CSV_MIME);
        assert_eq!(String::from_utf8(exported.bytes).unwrap(), "a,b\n1,4.0\n1,4.0\n");
    }

    #[test]
    fn cleaning_persists_between_requests() {
        let mut session = session();
        session.upload(vec![csv("dupes.csv", "k,v\n1,x\n1,x\n2,y\n")]);

        assert_eq!(session.remove_duplicates(0).unwrap(), 1);
        assert_eq!(session.remove_duplicates(0).unwrap(), 0);
        assert_eq!(session.selected_table(0).unwrap().height(), 2);
    }

    #[test]
    fn selection_narrows_export_and_chart() {
        let mut session = session();
        session.upload(vec![csv("wide.csv", "id,name,score,rank\n1,a,0.5,3\n2,b,1.5,4\n")]);

        session
            .set_selection(0, vec!["score".to_string(), "name".to_string()])
            .unwrap();

        let exported = session.export(0).unwrap();
        assert_eq!(
            String::from_utf8(exported.bytes).unwrap(),
            "score,name\n0.5,a\n1.5,b\n"
        );

        let chart = session.chart(0).unwrap();
        assert_eq!(chart.series.len(), 1);
        assert_eq!(chart.series[0].name, "score");

        let err = session.set_selection(0, vec!["missing".to_string()]).unwrap_err();
        assert!(matches!(
            err.source,
            FileErrorKind::Process(ProcessorError::UnknownColumn(_))
        ));
        // The rejected selection leaves the previous one in place.
        assert_eq!(session.file(0).unwrap().loaded().unwrap().selection, ["score", "name"]);
    }

    #[test]
    fn empty_selection_passes_through() {
        let mut session = session();
        session.upload(vec![csv("data.csv", "a,b\n1,2\n")]);
        session.set_selection(0, Vec::new()).unwrap();

        assert_eq!(session.selected_table(0).unwrap().width(), 0);
        assert!(session.chart(0).unwrap().is_empty());
        assert!(session.export(0).is_ok());
    }

    #[test]
    fn excel_target_applies_to_every_file() {
        let mut session = session();
        session.upload(vec![csv("one.csv", "a\n1\n"), csv("two.csv", "b\nx\n")]);
        session.set_target(ConversionTarget::Excel);

        for id in [0, 1] {
            let exported = session.export(id).unwrap();
            assert!(exported.file_name.ends_with(".xlsx"));
            assert_eq!(exported.mime_type, XLSX_MIME);

            let original = session.selected_table(id).unwrap();
            let parsed = excel::read_xlsx(&exported.bytes).unwrap();
            assert!(parsed.equals_missing(&original));
        }
    }

    #[test]
    fn workbook_upload_loads_through_session() {
        let day = |d| chrono::NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        let source = df!(
            "when" => [day(1), day(1), day(2)],
            "qty" => [Some(3i64), Some(3), None]
        )
        .unwrap();
        let bytes = XlsxWriter::write(&source).unwrap();

        let mut session = session();
        let report = session.upload(vec![UploadedFile::new("Orders.XLSX", bytes)]);
        assert_eq!(report.loaded, [0]);

        let table = &session.file(0).unwrap().loaded().unwrap().table;
        assert!(table.equals_missing(&source));
        assert_eq!(session.preview(0).unwrap().height(), 3);

        assert_eq!(session.remove_duplicates(0).unwrap(), 1);
        session.fill_missing(0).unwrap();

        let exported = session.export(0).unwrap();
        assert_eq!(exported.file_name, "Orders.csv");
        assert_eq!(
            String::from_utf8(exported.bytes).unwrap(),
            "when,qty\n2024-01-01,3.0\n2024-01-02,3.0\n"
        );
    }

    #[test]
    fn default_target_comes_from_config() {
        let config = SweeperConfig {
            default_target: ConversionTarget::Excel,
            ..SweeperConfig::default()
        };
        assert_eq!(Session::new(config).target(), ConversionTarget::Excel);
    }

    #[test]
    fn chart_toggle_and_removal() {
        let mut session = session();
        session.upload(vec![csv("a.csv", "x\n1\n"), csv("b.csv", "y\n2\n")]);

        session.set_chart_visible(0, true).unwrap();
        assert!(session.file(0).unwrap().loaded().unwrap().show_chart);

        assert!(session.remove(0));
        assert!(!session.remove(0));
        assert_eq!(session.files().len(), 1);
        assert_eq!(session.files()[0].name, "b.csv");

        session.clear();
        assert!(session.files().is_empty());
    }
}
