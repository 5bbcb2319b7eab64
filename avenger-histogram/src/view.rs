use serde::Serialize;

use crate::config::HistogramConfig;
use crate::scales::{BarGeometry, HistogramScales};
use crate::selection::Selection;
use crate::types::{Bin, BinKey, ColumnType};

/// Everything a renderer needs to draw one bar
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarView {
    pub key: BinKey,
    pub label: String,
    /// Position inside the plot area, which starts at the top-left margin
    pub geometry: BarGeometry,
    pub fill: String,
    pub selected: bool,
    pub hovered: bool,
}

/// Read-only state of a histogram after a binning pass or gesture
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    pub column: String,
    pub column_type: ColumnType,
    pub bins: Vec<Bin>,
    pub scales: HistogramScales,
    pub selection: Selection,
    pub hovered: Option<BinKey>,
    pub bars: Vec<BarView>,
    pub y_ticks: Vec<f64>,
    /// Positions of the x axis ticks, empty for ordinal columns
    pub x_ticks: Vec<f64>,
    /// Top-left corner of the plot area
    pub origin: (f32, f32),
    pub show_axis: bool,
    pub show_labels_below: bool,
}

impl HistogramSnapshot {
    pub fn new(
        config: &HistogramConfig,
        column_type: ColumnType,
        bins: Vec<Bin>,
        scales: HistogramScales,
        selection: Selection,
        hovered: Option<BinKey>,
    ) -> Self {
        let bars = bins
            .iter()
            .map(|bin| {
                let key = bin.selection_key();
                let selected = selection.contains(&key);
                BarView {
                    label: bin.label(column_type),
                    geometry: scales.bar_geometry(bin),
                    fill: config.fill(selected).to_string(),
                    hovered: hovered.as_ref() == Some(&key),
                    selected,
                    key,
                }
            })
            .collect();
        let y_ticks = scales.y_ticks(None);
        let x_ticks = scales.x_ticks(config.date_interval);
        Self {
            column: config.column.clone(),
            column_type,
            bins,
            scales,
            selection,
            hovered,
            bars,
            y_ticks,
            x_ticks,
            origin: (config.margin.left, config.margin.top),
            show_axis: config.axis,
            show_labels_below: config.show_labels_below,
        }
    }

    pub fn selected_bins(&self) -> Vec<&Bin> {
        self.selection.selected_bins(&self.bins)
    }
}

/// Receives snapshots whenever the histogram's visible state changes.
///
/// Implementations draw; they never mutate the histogram directly and report
/// gestures back through the histogram's `on_*` methods.
pub trait ViewAdapter: Send + Sync {
    fn render(&self, snapshot: &HistogramSnapshot);
}
