//! Control Panel Widget
//! Left side panel with upload and conversion settings.

use crate::export::ConversionTarget;
use crate::session::BatchReport;
use egui::{Color32, RichText};

/// Left side control panel with file upload and output format.
pub struct ControlPanel {
    pub status: String,
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self {
            status: "Upload CSV or Excel files to begin".to_string(),
        }
    }
}

impl ControlPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Summarize an upload batch in the status line.
    pub fn report_batch(&mut self, report: &BatchReport) {
        self.status = if report.all_succeeded() {
            format!(
                "All files processed successfully! ({} loaded)",
                report.loaded.len()
            )
        } else {
            format!(
                "Error: {} of {} files could not be processed",
                report.failed.len(),
                report.loaded.len() + report.failed.len()
            )
        };
    }

    pub fn set_status(&mut self, status: &str) {
        self.status = status.to_string();
    }

    /// Draw the control panel
    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        target: ConversionTarget,
        file_count: usize,
    ) -> ControlPanelAction {
        let mut action = ControlPanelAction::None;

        // Title
        ui.vertical_centered(|ui| {
            ui.add_space(5.0);
            ui.label(
                RichText::new("🧹 Data Sweeper")
                    .size(22.0)
                    .color(Color32::from_rgb(100, 149, 237)),
            );
            ui.label(
                RichText::new("Clean, visualize and convert tabular files")
                    .size(11.0)
                    .color(Color32::GRAY),
            );
        });
        ui.add_space(10.0);
        ui.separator();
        ui.add_space(5.0);

        // ===== Upload Section =====
        ui.label(RichText::new("📂 Files").size(14.0).strong());
        ui.add_space(5.0);

        ui.horizontal(|ui| {
            if ui.button("📂 Upload CSV / Excel").clicked() {
                action = ControlPanelAction::Upload;
            }
            ui.add_enabled_ui(file_count > 0, |ui| {
                if ui.button("🗑 Clear All").clicked() {
                    action = ControlPanelAction::ClearAll;
                }
            });
        });
        ui.label(
            RichText::new(format!("{} file(s) in session", file_count))
                .size(11.0)
                .color(Color32::GRAY),
        );

        ui.add_space(15.0);
        ui.separator();
        ui.add_space(10.0);

        // ===== Output Format Section =====
        ui.label(RichText::new("🔧 Convert File To:").size(14.0).strong());
        ui.add_space(5.0);

        let mut selected = target;
        ui.horizontal(|ui| {
            for option in ConversionTarget::ALL {
                ui.radio_value(&mut selected, option, option.label());
            }
        });
        if selected != target {
            action = ControlPanelAction::TargetChanged(selected);
        }

        ui.add_space(15.0);
        ui.separator();
        ui.add_space(10.0);

        // ===== Status Section =====
        let status_color = if self.status.contains("Error") {
            Color32::from_rgb(220, 53, 69)
        } else if self.status.contains("success") {
            Color32::from_rgb(40, 167, 69)
        } else {
            Color32::GRAY
        };
        ui.label(RichText::new(&self.status).size(11.0).color(status_color));

        action
    }
}

/// Actions triggered by control panel
#[derive(Debug, Clone, PartialEq)]
pub enum ControlPanelAction {
    None,
    Upload,
    ClearAll,
    TargetChanged(ConversionTarget),
}
