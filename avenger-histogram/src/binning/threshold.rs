//! Equal-width bin layout shared by the array and query backends.
//!
//! Both backends gather the same summary statistics and hand them to
//! [`BinLayout::from_stats`], so a column partitions identically regardless of where
//! the values live.

use crate::config::BinThreshold;
use crate::error::HistogramError;
use crate::types::{Bin, BinValue};

/// Quartile positions used by the Freedman–Diaconis rule
pub const QUARTILES: [f64; 2] = [0.25, 0.75];

/// Upper limit on the number of numeric bins, whatever the threshold asks for
pub const MAX_BINS: usize = 1_000;

/// Summary statistics of the non-null values of a numeric column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericStats {
    pub min: f64,
    pub max: f64,
    pub count: u64,
    /// First and third quartile, only needed for Freedman–Diaconis
    pub quartiles: Option<(f64, f64)>,
}

impl NumericStats {
    /// Compute statistics over in-memory values. Non-finite values are skipped.
    pub fn from_values(values: &[f64], with_quartiles: bool) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);
        let quartiles = with_quartiles.then(|| {
            (
                quantile_sorted(&sorted, QUARTILES[0]),
                quantile_sorted(&sorted, QUARTILES[1]),
            )
        });
        Some(Self {
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            count: sorted.len() as u64,
            quartiles,
        })
    }
}

/// Position of quantile `p` in a sorted sequence of `n` values, as the index of the
/// lower neighbour plus the interpolation fraction
pub fn quantile_position(n: u64, p: f64) -> (u64, f64) {
    if n == 0 {
        return (0, 0.0);
    }
    let pos = (n - 1) as f64 * p.clamp(0.0, 1.0);
    let lower = pos.floor();
    (lower as u64, pos - lower)
}

/// Interpolate between the two neighbours surrounding a quantile position
pub fn interpolate(lower: f64, upper: Option<f64>, fraction: f64) -> f64 {
    match upper {
        Some(upper) if fraction > 0.0 => lower + (upper - lower) * fraction,
        _ => lower,
    }
}

/// Linear-interpolation quantile of sorted values
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    let (index, fraction) = quantile_position(sorted.len() as u64, p);
    let index = index as usize;
    interpolate(sorted[index], sorted.get(index + 1).copied(), fraction)
}

/// Equal-width partition of `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinLayout {
    pub min: f64,
    pub max: f64,
    pub width: f64,
    pub count: usize,
}

impl BinLayout {
    pub fn from_stats(stats: &NumericStats, threshold: BinThreshold) -> Result<Self, HistogramError> {
        let NumericStats { min, max, .. } = *stats;
        let span = max - min;
        if span == 0.0 || !span.is_finite() {
            return Ok(Self {
                min,
                max,
                width: 0.0,
                count: 1,
            });
        }

        let count = match threshold {
            BinThreshold::Count(k) => k.clamp(1, MAX_BINS),
            BinThreshold::Width(w) => {
                if !(w.is_finite() && w > 0.0) {
                    return Err(HistogramError::ConfigError(format!(
                        "bin width must be positive and finite, got {w}"
                    )));
                }
                capped_count(span / w)
            }
            BinThreshold::FreedmanDiaconis => {
                let (q1, q3) = stats.quartiles.ok_or_else(|| {
                    HistogramError::InternalError(
                        "Freedman-Diaconis binning requires quartiles".to_string(),
                    )
                })?;
                freedman_diaconis(span, q3 - q1, stats.count)
            }
        };

        // A width that would need more than MAX_BINS bins falls back to MAX_BINS equal bins
        let width = match threshold {
            BinThreshold::Width(w) if span / w <= MAX_BINS as f64 => w,
            _ => span / count as f64,
        };
        Ok(Self {
            min,
            max,
            width,
            count,
        })
    }

    /// Bin index of a value inside `[min, max]`. The maximum lands in the last bin.
    ///
    /// The floored quotient can be one off near an edge, so it is corrected against
    /// [`BinLayout::bounds`]: a value `v` lands in bin `i` exactly when
    /// `x0 <= v < x1`, the same test a range selection applies.
    pub fn index_of(&self, value: f64) -> usize {
        if self.width <= 0.0 {
            return 0;
        }
        let last = self.count - 1;
        let raw = ((value - self.min) / self.width).floor();
        let index = if raw < 0.0 || raw.is_nan() {
            0
        } else {
            (raw as usize).min(last)
        };
        if index > 0 && value < self.lower(index) {
            index - 1
        } else if index < last && value >= self.lower(index + 1) {
            index + 1
        } else {
            index
        }
    }

    fn lower(&self, i: usize) -> f64 {
        self.min + self.width * i as f64
    }

    /// Lower and upper boundary of bin `i`. The upper bound of the last bin is the maximum.
    pub fn bounds(&self, i: usize) -> (f64, f64) {
        let x0 = self.lower(i);
        let x1 = if i + 1 >= self.count {
            self.max.max(x0)
        } else {
            self.lower(i + 1)
        };
        (x0, x1)
    }

    /// Materialize bins from per-index counts. Missing indices become empty bins.
    pub fn bins(&self, counts: impl IntoIterator<Item = (usize, u64)>) -> Vec<Bin> {
        let mut lengths = vec![0u64; self.count];
        for (index, length) in counts {
            if let Some(slot) = lengths.get_mut(index) {
                *slot += length;
            }
        }
        lengths
            .into_iter()
            .enumerate()
            .map(|(i, length)| {
                let (x0, x1) = self.bounds(i);
                Bin::range(BinValue::Number(x0), BinValue::Number(x1), length)
            })
            .collect()
    }
}

/// Freedman–Diaconis bin count: `ceil(span / (2 * IQR * n^(-1/3)))`, at most [`MAX_BINS`]
pub fn freedman_diaconis(span: f64, iqr: f64, n: u64) -> usize {
    if iqr <= 0.0 || n == 0 || !iqr.is_finite() {
        return 1;
    }
    let width = 2.0 * iqr * (n as f64).powf(-1.0 / 3.0);
    capped_count(span / width)
}

/// Round a fractional bin count up into `[1, MAX_BINS]`
fn capped_count(bins: f64) -> usize {
    if bins.is_nan() {
        return 1;
    }
    bins.ceil().clamp(1.0, MAX_BINS as f64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    const AGES: [f64; 10] = [19.0, 25.0, 28.0, 29.0, 32.0, 35.0, 38.0, 41.0, 45.0, 52.0];

    #[test]
    fn test_quantiles() {
        let stats = NumericStats::from_values(&AGES, true).unwrap();
        let (q1, q3) = stats.quartiles.unwrap();
        // Positions 2.25 and 6.75
        assert_approx_eq!(f64, q1, 28.25);
        assert_approx_eq!(f64, q3, 40.25);
        assert_eq!(stats.count, 10);
        assert_eq!(stats.min, 19.0);
        assert_eq!(stats.max, 52.0);
    }

    #[test]
    fn test_count_layout() {
        let stats = NumericStats::from_values(&AGES, false).unwrap();
        let layout = BinLayout::from_stats(&stats, BinThreshold::Count(10)).unwrap();
        assert_eq!(layout.count, 10);
        assert_approx_eq!(f64, layout.width, 3.3);
        assert_eq!(layout.index_of(19.0), 0);
        assert_eq!(layout.index_of(52.0), 9);
        assert_eq!(layout.index_of(25.0), 1);

        let bins = layout.bins(AGES.iter().map(|v| (layout.index_of(*v), 1)));
        let total: u64 = bins.iter().map(|b| b.length).sum();
        assert_eq!(total, 10);
        assert_eq!(bins.len(), 10);
        assert_eq!(bins[9].x1, BinValue::Number(52.0));
    }

    #[test]
    fn test_freedman_diaconis_layout() {
        let stats = NumericStats::from_values(&AGES, true).unwrap();
        let layout = BinLayout::from_stats(&stats, BinThreshold::FreedmanDiaconis).unwrap();
        // IQR 12, width 24 * 10^(-1/3) ~= 11.14, span 33
        assert_eq!(layout.count, 3);
    }

    #[test]
    fn test_width_layout() {
        let stats = NumericStats::from_values(&[0.0, 1.0, 9.5], false).unwrap();
        let layout = BinLayout::from_stats(&stats, BinThreshold::Width(2.0)).unwrap();
        assert_eq!(layout.count, 5);
        assert_eq!(layout.bounds(0), (0.0, 2.0));
        assert_eq!(layout.bounds(4), (8.0, 9.5));
        assert_eq!(layout.index_of(9.5), 4);
    }

    #[test]
    fn test_constant_column_single_bin() {
        let stats = NumericStats::from_values(&[4.0, 4.0, 4.0], true).unwrap();
        let layout = BinLayout::from_stats(&stats, BinThreshold::FreedmanDiaconis).unwrap();
        assert_eq!(layout.count, 1);
        let bins = layout.bins([(layout.index_of(4.0), 3)]);
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].x0, BinValue::Number(4.0));
        assert_eq!(bins[0].x1, BinValue::Number(4.0));
        assert_eq!(bins[0].length, 3);
    }

    #[test]
    fn test_zero_iqr_is_one_bin() {
        assert_eq!(freedman_diaconis(10.0, 0.0, 100), 1);
        assert_eq!(freedman_diaconis(10.0, 2.0, 0), 1);
    }

    #[test]
    fn test_edge_values_follow_bounds() {
        // 0..=44 in 20 bins puts 33 right on a rounded edge
        let values: Vec<f64> = (0..=44).map(f64::from).collect();
        let stats = NumericStats::from_values(&values, false).unwrap();
        let layout = BinLayout::from_stats(&stats, BinThreshold::Count(20)).unwrap();
        for v in &values {
            let i = layout.index_of(*v);
            let (x0, x1) = layout.bounds(i);
            let last = i + 1 == layout.count;
            assert!(
                x0 <= *v && (*v < x1 || (last && *v <= x1)),
                "{v} assigned to bin {i} = [{x0}, {x1})"
            );
        }
        let bins = layout.bins(values.iter().map(|v| (layout.index_of(*v), 1)));
        assert_eq!(bins[14].length, 2);
        assert_eq!(bins[15].length, 3);
    }

    #[test]
    fn test_bin_count_is_capped() {
        let mut values: Vec<f64> = (0..7).map(|i| i as f64 * 1e-10).collect();
        values.push(1e300);
        let stats = NumericStats::from_values(&values, true).unwrap();
        let layout = BinLayout::from_stats(&stats, BinThreshold::FreedmanDiaconis).unwrap();
        assert_eq!(layout.count, MAX_BINS);

        let bins = layout.bins(values.iter().map(|v| (layout.index_of(*v), 1)));
        assert_eq!(bins.len(), MAX_BINS);
        assert_eq!(bins.iter().map(|b| b.length).sum::<u64>(), 8);
        assert_eq!(bins[MAX_BINS - 1].x1, BinValue::Number(1e300));

        let layout = BinLayout::from_stats(&stats, BinThreshold::Count(usize::MAX)).unwrap();
        assert_eq!(layout.count, MAX_BINS);

        let layout = BinLayout::from_stats(&stats, BinThreshold::Width(1e-12)).unwrap();
        assert_eq!(layout.count, MAX_BINS);
        assert_approx_eq!(f64, layout.width, 1e300 / MAX_BINS as f64, ulps = 4);
    }

    #[test]
    fn test_overflowing_span_is_one_bin() {
        let stats = NumericStats::from_values(&[-f64::MAX, f64::MAX], true).unwrap();
        let layout = BinLayout::from_stats(&stats, BinThreshold::Count(10)).unwrap();
        assert_eq!(layout.count, 1);
        assert_eq!(layout.index_of(f64::MAX), 0);
    }

    #[test]
    fn test_empty_values() {
        assert!(NumericStats::from_values(&[f64::NAN], true).is_none());
    }
}
