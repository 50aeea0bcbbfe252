//! GUI module - User interface components

mod app;
mod control_panel;
mod file_viewer;

pub use app::SweeperApp;
pub use control_panel::{ControlPanel, ControlPanelAction};
pub use file_viewer::{FileAction, FileViewer};
