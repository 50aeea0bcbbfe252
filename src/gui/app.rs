//! Data Sweeper Main Application
//! Main window with control panel and file cards. Every interaction is
//! forwarded to a session handler on the UI thread.

use crate::config::SweeperConfig;
use crate::data::UploadedFile;
use crate::gui::{ControlPanel, ControlPanelAction, FileAction, FileViewer};
use crate::session::{FileId, Session};
use egui::SidePanel;
use tracing::{info, warn};

/// Main application window.
pub struct SweeperApp {
    session: Session,
    control_panel: ControlPanel,
    file_viewer: FileViewer,
}

impl SweeperApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: SweeperConfig) -> Self {
        Self {
            session: Session::new(config),
            control_panel: ControlPanel::new(),
            file_viewer: FileViewer::new(),
        }
    }

    /// Handle file upload via the native picker.
    fn handle_upload(&mut self) {
        let Some(paths) = rfd::FileDialog::new()
            .add_filter("CSV or Excel", &["csv", "xlsx"])
            .pick_files()
        else {
            return; // User cancelled
        };

        let mut uploads = Vec::new();
        let mut unreadable = Vec::new();
        for path in paths {
            match UploadedFile::from_path(&path) {
                Ok(upload) => uploads.push(upload),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to read upload");
                    unreadable.push(path.display().to_string());
                }
            }
        }

        let report = self.session.upload(uploads);
        self.control_panel.report_batch(&report);
        if !unreadable.is_empty() {
            self.control_panel.set_status(&format!(
                "Error: could not read {}",
                unreadable.join(", ")
            ));
        }
    }

    /// Handle download: encode, then ask the user where to save.
    fn handle_download(&mut self, id: FileId) {
        let exported = match self.session.export(id) {
            Ok(exported) => exported,
            Err(e) => {
                self.file_viewer.set_message(id, e.to_string(), true);
                return;
            }
        };

        let target = self.session.target();
        let Some(path) = rfd::FileDialog::new()
            .add_filter(target.label(), &[target.extension()])
            .set_file_name(&exported.file_name)
            .save_file()
        else {
            return; // User cancelled
        };

        match std::fs::write(&path, &exported.bytes) {
            Ok(()) => {
                info!(path = %path.display(), mime = exported.mime_type, "saved export");
                self.file_viewer
                    .set_message(id, format!("✅ Saved {}", path.display()), false);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to save export");
                self.file_viewer
                    .set_message(id, format!("Error saving {}: {}", path.display(), e), true);
            }
        }
    }

    fn handle_file_action(&mut self, action: FileAction) {
        match action {
            FileAction::RemoveDuplicates(id) => match self.session.remove_duplicates(id) {
                Ok(removed) => self.file_viewer.set_message(
                    id,
                    format!("✅ Duplicates removed: {} rows", removed),
                    false,
                ),
                Err(e) => self.file_viewer.set_message(id, e.to_string(), true),
            },
            FileAction::FillMissing(id) => match self.session.fill_missing(id) {
                Ok(report) if report.columns.is_empty() => {
                    self.file_viewer
                        .set_message(id, "✅ No missing numeric values", false)
                }
                Ok(report) => self.file_viewer.set_message(
                    id,
                    format!(
                        "✅ Missing values filled: {} cells in {}",
                        report.cells_filled,
                        report.columns.join(", ")
                    ),
                    false,
                ),
                Err(e) => self.file_viewer.set_message(id, e.to_string(), true),
            },
            FileAction::SetSelection(id, columns) => {
                if let Err(e) = self.session.set_selection(id, columns) {
                    self.file_viewer.set_message(id, e.to_string(), true);
                }
            }
            FileAction::ShowChart(id, visible) => {
                if let Err(e) = self.session.set_chart_visible(id, visible) {
                    self.file_viewer.set_message(id, e.to_string(), true);
                }
            }
            FileAction::Download(id) => self.handle_download(id),
            FileAction::Remove(id) => {
                self.session.remove(id);
                self.file_viewer.forget(id);
            }
        }
    }
}

impl eframe::App for SweeperApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let mut panel_action = ControlPanelAction::None;
        let mut file_actions = Vec::new();

        // Left panel - Control Panel
        SidePanel::left("control_panel")
            .min_width(260.0)
            .max_width(320.0)
            .show(ctx, |ui| {
                panel_action = self.control_panel.show(
                    ui,
                    self.session.target(),
                    self.session.files().len(),
                );
            });

        // Central panel - File cards
        egui::CentralPanel::default().show(ctx, |ui| {
            file_actions = self.file_viewer.show(ui, &self.session);
        });

        match panel_action {
            ControlPanelAction::Upload => self.handle_upload(),
            ControlPanelAction::ClearAll => {
                self.session.clear();
                self.file_viewer.clear();
                self.control_panel.set_status("Session cleared");
            }
            ControlPanelAction::TargetChanged(target) => self.session.set_target(target),
            ControlPanelAction::None => {}
        }

        for action in file_actions {
            self.handle_file_action(action);
        }
    }
}
