pub mod ordinal;
pub mod temporal;
pub mod threshold;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::BinThreshold;
use crate::error::HistogramError;
use crate::types::{Bin, ColumnType, Record};

use self::temporal::DateInterval;
use self::threshold::{BinLayout, NumericStats};

/// Options of one binning pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinConfig {
    pub threshold: BinThreshold,
    pub max_ordinal_bins: usize,
    pub date_interval: DateInterval,
}

impl Default for BinConfig {
    fn default() -> Self {
        Self {
            threshold: BinThreshold::default(),
            max_ordinal_bins: 20,
            date_interval: DateInterval::default(),
        }
    }
}

/// Parse a column type name, reporting names with no binning rule
pub fn parse_column_type(name: &str) -> Result<ColumnType, HistogramError> {
    ColumnType::from_str(name).map_err(|_| HistogramError::UnsupportedTypeError(name.to_string()))
}

/// Bin a column of in-memory records
pub fn bin_records(
    records: &[Record],
    column: &str,
    column_type: ColumnType,
    config: &BinConfig,
) -> Result<Vec<Bin>, HistogramError> {
    let values = records
        .iter()
        .filter_map(|r| r.get(column))
        .filter(|v| !v.is_null());

    let bins = match column_type {
        ColumnType::Continuous => {
            let numbers: Vec<f64> = values.filter_map(|v| v.as_f64()).collect();
            let with_quartiles = matches!(config.threshold, BinThreshold::FreedmanDiaconis);
            let Some(stats) = NumericStats::from_values(&numbers, with_quartiles) else {
                return Err(HistogramError::EmptyColumnError(column.to_string()));
            };
            let layout = BinLayout::from_stats(&stats, config.threshold)?;
            layout.bins(numbers.iter().map(|v| (layout.index_of(*v), 1)))
        }
        ColumnType::Date => {
            let counts = temporal::count_dates(
                values.filter_map(|v| v.as_date()),
                config.date_interval,
            );
            temporal::densify(&counts, config.date_interval)
        }
        ColumnType::Ordinal => {
            let keys: Vec<String> = values.filter_map(|v| v.ordinal_key()).collect();
            let total = keys.len() as u64;
            ordinal::collapse(ordinal::rank_keys(keys), total, config.max_ordinal_bins)?
        }
    };

    if bins.is_empty() {
        return Err(HistogramError::EmptyColumnError(column.to_string()));
    }
    Ok(bins)
}
