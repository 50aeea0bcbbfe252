//! Chart Plotter Module
//! Builds bar chart data from a table and draws it with egui_plot.

use crate::data::DataProcessor;
use egui::Color32;
use egui_plot::{Bar, BarChart, Legend, Plot};
use polars::prelude::*;

/// Numeric columns charted per table.
pub const MAX_SERIES: usize = 2;

pub const PALETTE: [Color32; MAX_SERIES] = [
    Color32::from_rgb(52, 152, 219), // Blue
    Color32::from_rgb(231, 76, 60),  // Red
];

/// One bar series: a numeric column, one value per row.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Bar chart over the first two numeric columns of a table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarChartData {
    pub series: Vec<BarSeries>,
}

impl BarChartData {
    /// Collect up to `max_rows` rows of the first numeric columns.
    ///
    /// Missing and non-finite cells are kept as gaps.
    pub fn from_table(df: &DataFrame, max_rows: usize) -> PolarsResult<Self> {
        let series = DataProcessor::numeric_columns(df)
            .into_iter()
            .take(MAX_SERIES)
            .map(|name| {
                let values = df
                    .column(&name)?
                    .cast(&DataType::Float64)?
                    .f64()?
                    .into_iter()
                    .take(max_rows)
                    .map(|v| v.filter(|x| x.is_finite()))
                    .collect();
                Ok(BarSeries { name, values })
            })
            .collect::<PolarsResult<Vec<_>>>()?;

        Ok(Self { series })
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Number of rows (bars per series).
    pub fn row_count(&self) -> usize {
        self.series.iter().map(|s| s.values.len()).max().unwrap_or(0)
    }
}

/// Draws bar charts using egui_plot.
pub struct ChartPlotter;

impl ChartPlotter {
    pub fn series_color(idx: usize) -> Color32 {
        PALETTE[idx % PALETTE.len()]
    }

    /// Grouped bars: x = row position, one bar per series side by side.
    pub fn draw_bar_chart(ui: &mut egui::Ui, id: impl std::hash::Hash, data: &BarChartData) {
        let n_series = data.series.len().max(1);
        let bar_width = 0.8 / n_series as f64;

        Plot::new(id)
            .height(260.0)
            .legend(Legend::default())
            .allow_scroll(false)
            .x_axis_label("Row")
            .y_axis_label("Value")
            .show(ui, |plot_ui| {
                for (idx, series) in data.series.iter().enumerate() {
                    let offset = (idx as f64 - (n_series as f64 - 1.0) / 2.0) * bar_width;
                    let bars: Vec<Bar> = series
                        .values
                        .iter()
                        .enumerate()
                        .filter_map(|(row, v)| {
                            v.map(|y| Bar::new(row as f64 + offset, y).width(bar_width))
                        })
                        .collect();

                    plot_ui.bar_chart(
                        BarChart::new(bars)
                            .color(Self::series_color(idx))
                            .name(&series.name),
                    );
                }
            });
    }
}
