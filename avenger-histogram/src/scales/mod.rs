pub mod array;
pub mod band;
pub mod linear;
pub mod time;

use serde::Serialize;

use crate::binning::temporal::DateInterval;
use crate::types::{Bin, ColumnType};

use self::band::BandScale;
use self::linear::LinearScale;
use self::time::TimeScale;

/// Padding applied on both sides of ordinal bands
pub const BAND_PADDING: f32 = 0.1;

/// Tick count used to nice the count axis
pub const Y_NICE_COUNT: usize = 10;

/// Horizontal scale, chosen by column type
#[derive(Debug, Clone, PartialEq)]
pub enum XScale {
    Band(BandScale),
    Linear(LinearScale),
    Time(TimeScale),
}

/// Pixel rectangle of one bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BarGeometry {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Scales of one binning pass
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramScales {
    pub x: XScale,
    pub y: LinearScale,
}

/// Build the x and y scales for a bin sequence drawn into a `width` by `height` area
pub fn build_scales(bins: &[Bin], column_type: ColumnType, width: f32, height: f32) -> HistogramScales {
    let x = match column_type {
        ColumnType::Ordinal => XScale::Band(
            BandScale::new(bins.iter().map(Bin::selection_key))
                .range((0.0, width))
                .padding(BAND_PADDING)
                .align(0.5),
        ),
        ColumnType::Continuous | ColumnType::Date => {
            let (lo, hi) = x_extent(bins);
            if column_type == ColumnType::Date {
                XScale::Time(TimeScale::new(
                    (time::from_millis(lo), time::from_millis(hi)),
                    (0.0, width),
                ))
            } else {
                XScale::Linear(LinearScale::new((lo, hi), (0.0, width)))
            }
        }
    };

    let max_length = bins.iter().map(|b| b.length).max().unwrap_or(0) as f64;
    let y = LinearScale::new((0.0, max_length), (height, 0.0)).nice(Some(Y_NICE_COUNT));

    HistogramScales { x, y }
}

/// `[min x0, max x1]` of range bins, in the bins' numeric positions
fn x_extent(bins: &[Bin]) -> (f64, f64) {
    let lo = bins
        .iter()
        .filter_map(|b| b.x0.as_f64())
        .fold(f64::INFINITY, f64::min);
    let hi = bins
        .iter()
        .filter_map(|b| b.x1.as_f64())
        .fold(f64::NEG_INFINITY, f64::max);
    if lo.is_finite() && hi.is_finite() {
        (lo, hi)
    } else {
        (0.0, 0.0)
    }
}

impl HistogramScales {
    /// Left pixel edge of a bin
    fn left(&self, bin: &Bin) -> f32 {
        match &self.x {
            XScale::Band(band) => band.scale(&bin.selection_key()).unwrap_or(f32::NAN),
            XScale::Linear(linear) => bin.x0.as_f64().map_or(f32::NAN, |v| linear.scale(v)),
            XScale::Time(time) => bin.x0.as_f64().map_or(f32::NAN, |v| time.scale_millis(v)),
        }
    }

    fn right(&self, bin: &Bin) -> f32 {
        match &self.x {
            XScale::Band(band) => self.left(bin) + band.bandwidth(),
            XScale::Linear(linear) => bin.x1.as_f64().map_or(f32::NAN, |v| linear.scale(v)),
            XScale::Time(time) => bin.x1.as_f64().map_or(f32::NAN, |v| time.scale_millis(v)),
        }
    }

    /// Pixel width of a bar; at least one pixel for range bins, zero when undefined
    pub fn bar_width(&self, bin: &Bin) -> f32 {
        match &self.x {
            XScale::Band(band) => band.bandwidth(),
            _ => {
                let width = self.right(bin) - self.left(bin);
                if width.is_nan() {
                    0.0
                } else {
                    width.max(1.0)
                }
            }
        }
    }

    /// Horizontal pixel extent `[left, right]` of a bin, used for brush overlap tests
    pub fn bin_extent(&self, bin: &Bin) -> (f32, f32) {
        (self.left(bin), self.right(bin))
    }

    pub fn bar_geometry(&self, bin: &Bin) -> BarGeometry {
        let y = self.y.scale(bin.length as f64);
        let baseline = self.y.scale(0.0);
        let (baseline, y) = if baseline >= y { (baseline, y) } else { (y, baseline) };
        BarGeometry {
            x: self.left(bin),
            y,
            width: self.bar_width(bin),
            height: baseline - y,
        }
    }

    /// Tick positions along x, in the bins' numeric positions. Bands have none.
    pub fn x_ticks(&self, interval: DateInterval) -> Vec<f64> {
        match &self.x {
            XScale::Band(_) => vec![],
            XScale::Linear(linear) => linear.ticks(None),
            XScale::Time(time) => time.ticks(interval).into_iter().map(time::to_millis).collect(),
        }
    }

    pub fn y_ticks(&self, count: Option<usize>) -> Vec<f64> {
        self.y.ticks(count)
    }
}
