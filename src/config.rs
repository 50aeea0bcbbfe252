//! Application Settings
//! Optional JSON settings file; every field falls back to its default.

use crate::data::DataLoader;
use crate::export::ConversionTarget;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Environment variable naming an explicit settings file.
pub const CONFIG_ENV_VAR: &str = "DATA_SWEEPER_CONFIG";
/// Settings file picked up from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "data_sweeper.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    /// Rows shown in each file preview.
    pub preview_rows: usize,
    /// Rows scanned to infer CSV column types.
    pub infer_schema_length: usize,
    /// Rows plotted in the bar chart.
    pub chart_max_rows: usize,
    pub default_target: ConversionTarget,
    pub window_width: f32,
    pub window_height: f32,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            preview_rows: 5,
            infer_schema_length: crate::data::DEFAULT_INFER_SCHEMA_LENGTH,
            chart_max_rows: 1000,
            default_target: ConversionTarget::Csv,
            window_width: 1200.0,
            window_height: 800.0,
        }
    }
}

impl SweeperConfig {
    /// Load settings from `$DATA_SWEEPER_CONFIG`, else `./data_sweeper.json`, else defaults.
    pub fn load() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            return Self::from_file(Path::new(&path));
        }

        let path = Path::new(DEFAULT_CONFIG_FILE);
        if path.exists() {
            Self::from_file(path)
        } else {
            debug!("no settings file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("invalid settings file {}", path.display()))?;
        debug!(path = %path.display(), ?config, "loaded settings");
        Ok(config)
    }

    /// Loader configured with these settings.
    pub fn loader(&self) -> DataLoader {
        DataLoader::new().with_infer_schema_length(self.infer_schema_length)
    }
}
