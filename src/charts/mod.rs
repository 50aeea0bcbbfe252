//! Charts module - Chart rendering

mod plotter;

pub use plotter::{BarChartData, ChartPlotter};
