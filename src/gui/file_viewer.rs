//! File Viewer Widget
//! Right side scrollable panel with one card per uploaded file: file info,
//! preview, cleaning buttons, column selection, chart and download.

use crate::charts::ChartPlotter;
use crate::data::DataProcessor;
use crate::session::{FileId, LoadedTable, Session, SessionFile};
use egui::{Color32, RichText, ScrollArea};
use std::collections::HashMap;

const CARD_SPACING: f32 = 15.0;
const ERROR_COLOR: Color32 = Color32::from_rgb(220, 53, 69);
const SUCCESS_COLOR: Color32 = Color32::from_rgb(40, 167, 69);

/// Requests raised by a file card, handled by the app.
#[derive(Debug, Clone, PartialEq)]
pub enum FileAction {
    RemoveDuplicates(FileId),
    FillMissing(FileId),
    SetSelection(FileId, Vec<String>),
    ShowChart(FileId, bool),
    Download(FileId),
    Remove(FileId),
}

/// Outcome of the last action on a file.
#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub text: String,
    pub is_error: bool,
}

/// Scrollable list of file cards.
#[derive(Default)]
pub struct FileViewer {
    messages: HashMap<FileId, StatusMessage>,
}

impl FileViewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_message(&mut self, id: FileId, text: impl Into<String>, is_error: bool) {
        self.messages.insert(
            id,
            StatusMessage {
                text: text.into(),
                is_error,
            },
        );
    }

    pub fn forget(&mut self, id: FileId) {
        self.messages.remove(&id);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Draw every file card and collect the actions the user triggered.
    pub fn show(&mut self, ui: &mut egui::Ui, session: &Session) -> Vec<FileAction> {
        let mut actions = Vec::new();

        if session.files().is_empty() {
            ui.centered_and_justified(|ui| {
                ui.label(RichText::new("No files uploaded").size(20.0));
            });
            return actions;
        }

        ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                for file in session.files() {
                    ui.push_id(file.id, |ui| {
                        let message = self.messages.get(&file.id);
                        Self::draw_file_card(ui, session, file, message, &mut actions);
                    });
                    ui.add_space(CARD_SPACING);
                }
            });

        actions
    }

    fn draw_file_card(
        ui: &mut egui::Ui,
        session: &Session,
        file: &SessionFile,
        message: Option<&StatusMessage>,
        actions: &mut Vec<FileAction>,
    ) {
        let border_color = if file.error().is_some() {
            ERROR_COLOR
        } else {
            ui.visuals().widgets.noninteractive.bg_stroke.color
        };

        egui::Frame::none()
            .rounding(8.0)
            .stroke(egui::Stroke::new(1.5, border_color))
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .inner_margin(12.0)
            .show(ui, |ui| {
                ui.set_width(ui.available_width());

                ui.horizontal(|ui| {
                    ui.label(
                        RichText::new(format!("📄 {}", file.name))
                            .size(16.0)
                            .strong(),
                    );
                    ui.label(
                        RichText::new(format!("📏 {:.2} KB", file.size_kb()))
                            .size(12.0)
                            .color(Color32::GRAY),
                    );
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.small_button("✖ Remove").clicked() {
                            actions.push(FileAction::Remove(file.id));
                        }
                    });
                });

                let loaded = match file.loaded() {
                    Ok(loaded) => loaded,
                    Err(_) => {
                        if let Some(err) = file.error() {
                            let icon = if err.is_unsupported_format() { "⚠" } else { "❌" };
                            ui.label(RichText::new(format!("{} {}", icon, err)).color(ERROR_COLOR));
                        }
                        return;
                    }
                };

                ui.label(
                    RichText::new(format!(
                        "{} rows × {} columns",
                        loaded.table.height(),
                        loaded.table.width()
                    ))
                    .size(12.0),
                );
                ui.add_space(6.0);

                Self::draw_preview(ui, session, file.id);
                ui.add_space(6.0);

                egui::CollapsingHeader::new("🛠 Data Cleaning Options").show(ui, |ui| {
                    ui.horizontal(|ui| {
                        if ui.button("Remove Duplicates").clicked() {
                            actions.push(FileAction::RemoveDuplicates(file.id));
                        }
                        if ui.button("Fill Missing Values").clicked() {
                            actions.push(FileAction::FillMissing(file.id));
                        }
                    });
                });

                egui::CollapsingHeader::new("🎯 Select Columns to Convert").show(ui, |ui| {
                    if let Some(selection) = Self::draw_column_selector(ui, loaded) {
                        actions.push(FileAction::SetSelection(file.id, selection));
                    }
                });

                egui::CollapsingHeader::new("📊 Data Visualization").show(ui, |ui| {
                    let mut show_chart = loaded.show_chart;
                    if ui.checkbox(&mut show_chart, "Show Visualization").changed() {
                        actions.push(FileAction::ShowChart(file.id, show_chart));
                    }
                    if loaded.show_chart {
                        match session.chart(file.id) {
                            Ok(chart) if chart.is_empty() => {
                                ui.label(
                                    RichText::new("No numeric columns to chart")
                                        .color(Color32::GRAY),
                                );
                            }
                            Ok(chart) => {
                                ChartPlotter::draw_bar_chart(ui, ("bar_chart", file.id), &chart);
                                ui.label(
                                    RichText::new(format!("First {} rows", chart.row_count()))
                                        .size(11.0)
                                        .color(Color32::GRAY),
                                );
                            }
                            Err(err) => {
                                ui.label(RichText::new(err.to_string()).color(ERROR_COLOR));
                            }
                        }
                    }
                });

                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    let target = session.target();
                    let button = egui::Button::new(
                        RichText::new(format!("⬇ Download {} as {}", file.name, target.label()))
                            .size(14.0),
                    );
                    if ui.add(button).clicked() {
                        actions.push(FileAction::Download(file.id));
                    }
                });

                if let Some(message) = message {
                    let color = if message.is_error {
                        ERROR_COLOR
                    } else {
                        SUCCESS_COLOR
                    };
                    ui.label(RichText::new(&message.text).size(12.0).color(color));
                }
            });
    }

    fn draw_preview(ui: &mut egui::Ui, session: &Session, id: FileId) {
        ui.label(RichText::new("🔍 Preview").size(13.0).strong());

        let head = match session.preview(id) {
            Ok(head) => head,
            Err(err) => {
                ui.label(RichText::new(err.to_string()).color(ERROR_COLOR));
                return;
            }
        };
        let headers = DataProcessor::column_names(&head);
        let cells = DataProcessor::cell_rows(&head);

        ScrollArea::horizontal().show(ui, |ui| {
            egui::Grid::new(("preview", id))
                .striped(true)
                .min_col_width(60.0)
                .spacing([12.0, 4.0])
                .show(ui, |ui| {
                    for header in &headers {
                        ui.label(RichText::new(header).strong().size(11.0));
                    }
                    ui.end_row();

                    for row in &cells {
                        for cell in row {
                            ui.label(RichText::new(cell).size(11.0));
                        }
                        ui.end_row();
                    }
                });
        });
    }

    /// Column checkboxes. Returns the new selection when it changed.
    fn draw_column_selector(ui: &mut egui::Ui, loaded: &LoadedTable) -> Option<Vec<String>> {
        let columns = DataProcessor::column_names(&loaded.table);
        let mut selection = loaded.selection.clone();
        let mut changed = false;

        ui.horizontal(|ui| {
            if ui.small_button("Select All").clicked() {
                selection = columns.clone();
                changed = true;
            }
            if ui.small_button("Clear All").clicked() {
                selection.clear();
                changed = true;
            }
        });

        ScrollArea::vertical().max_height(120.0).show(ui, |ui| {
            for column in &columns {
                let mut checked = selection.contains(column);
                if ui.checkbox(&mut checked, column.as_str()).changed() {
                    changed = true;
                    if checked {
                        selection.push(column.clone());
                    } else {
                        selection.retain(|c| c != column);
                    }
                }
            }
        });

        changed.then_some(selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_kept_per_file() {
        let mut viewer = FileViewer::new();
        viewer.set_message(1, "Duplicates removed: 2 rows", false);
        viewer.set_message(2, "Error processing file b.csv", true);

        assert!(!viewer.messages[&1].is_error);
        assert!(viewer.messages[&2].is_error);

        viewer.forget(1);
        assert!(!viewer.messages.contains_key(&1));

        viewer.clear();
        assert!(viewer.messages.is_empty());
    }
}
