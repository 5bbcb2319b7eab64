use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::binning::temporal::DateInterval;
use crate::error::HistogramError;
use crate::binning::threshold::MAX_BINS;
use crate::types::Record;

/// Strategy used to partition a continuous column into equal-width bins.
///
/// Both backends derive the same bin layout from the same strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum BinThreshold {
    /// Freedman–Diaconis rule over the non-null values
    #[default]
    FreedmanDiaconis,
    /// Fixed number of bins
    Count(usize),
    /// Fixed bin width
    Width(f64),
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SelectionMode {
    #[default]
    Single,
    Multiple,
    Drag,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DataFormat {
    Parquet,
    Csv,
    Json,
}

impl DataFormat {
    /// Guess the format from a file name or URL extension
    pub fn from_extension(name: &str) -> Option<Self> {
        let path = name.split(['?', '#']).next().unwrap_or(name);
        let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "parquet" | "pq" => Some(DataFormat::Parquet),
            "csv" => Some(DataFormat::Csv),
            "json" | "ndjson" | "jsonl" => Some(DataFormat::Json),
            _ => None,
        }
    }
}

/// Source of a dataset
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    /// Uniformly shaped in-memory records
    Records(Vec<Record>),
    /// A file-like binary blob with a name
    File { name: String, bytes: bytes::Bytes },
    /// A file on the local filesystem
    Path(PathBuf),
    /// A remote file, fetched and then treated like `File`
    Url(String),
}

impl<'de> Deserialize<'de> for DataSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawSource {
            Location(String),
            Records(Vec<Record>),
        }

        Ok(match RawSource::deserialize(deserializer)? {
            RawSource::Location(location)
                if location.starts_with("http://") || location.starts_with("https://") =>
            {
                DataSource::Url(location)
            }
            RawSource::Location(location) => DataSource::Path(PathBuf::from(location)),
            RawSource::Records(records) => DataSource::Records(records),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margin {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Default for Margin {
    fn default() -> Self {
        Self {
            top: 20.0,
            right: 20.0,
            bottom: 40.0,
            left: 40.0,
        }
    }
}

/// Histogram configuration.
///
/// Deserializes from the camelCase JSON form, e.g.
/// `{"column": "age", "maxOrdinalBins": 10, "selectionMode": "drag"}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramConfig {
    #[serde(default = "default_width")]
    pub width: f32,
    #[serde(default = "default_height")]
    pub height: f32,
    #[serde(default)]
    pub margin: Margin,
    pub column: String,
    #[serde(default)]
    pub bin_threshold: Option<BinThreshold>,
    #[serde(default = "default_colors")]
    pub colors: [String; 2],
    #[serde(default = "default_max_ordinal_bins")]
    pub max_ordinal_bins: usize,
    #[serde(default)]
    pub selection_mode: SelectionMode,
    #[serde(default)]
    pub axis: bool,
    #[serde(default)]
    pub show_labels_below: bool,
    #[serde(default)]
    pub data_source: Option<DataSource>,
    #[serde(default)]
    pub data_format: Option<DataFormat>,
    #[serde(default)]
    pub date_interval: DateInterval,
    /// Forces the column type instead of classifying the column's values
    #[serde(default)]
    pub column_type: Option<String>,
}

fn default_width() -> f32 {
    600.0
}

fn default_height() -> f32 {
    400.0
}

fn default_colors() -> [String; 2] {
    ["steelblue".to_string(), "orange".to_string()]
}

fn default_max_ordinal_bins() -> usize {
    20
}

impl HistogramConfig {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            margin: Margin::default(),
            column: column.into(),
            bin_threshold: None,
            colors: default_colors(),
            max_ordinal_bins: default_max_ordinal_bins(),
            selection_mode: SelectionMode::default(),
            axis: false,
            show_labels_below: false,
            data_source: None,
            data_format: None,
            date_interval: DateInterval::default(),
            column_type: None,
        }
    }

    pub fn with_bin_threshold(mut self, threshold: BinThreshold) -> Self {
        self.bin_threshold = Some(threshold);
        self
    }

    pub fn with_max_ordinal_bins(mut self, max_ordinal_bins: usize) -> Self {
        self.max_ordinal_bins = max_ordinal_bins;
        self
    }

    pub fn with_selection_mode(mut self, mode: SelectionMode) -> Self {
        self.selection_mode = mode;
        self
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_data_source(mut self, source: DataSource, format: Option<DataFormat>) -> Self {
        self.data_source = Some(source);
        self.data_format = format;
        self
    }

    pub fn with_date_interval(mut self, interval: DateInterval) -> Self {
        self.date_interval = interval;
        self
    }

    pub fn with_column_type(mut self, column_type: impl Into<String>) -> Self {
        self.column_type = Some(column_type.into());
        self
    }

    /// Load and validate a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, HistogramError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), HistogramError> {
        if self.column.trim().is_empty() {
            return Err(HistogramError::ConfigError(
                "`column` must name a column".to_string(),
            ));
        }
        if self.max_ordinal_bins == 0 {
            return Err(HistogramError::ConfigError(
                "`maxOrdinalBins` must be a positive integer".to_string(),
            ));
        }
        if !(self.width > 0.0 && self.height > 0.0) {
            return Err(HistogramError::ConfigError(format!(
                "width and height must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if let Some(name) = &self.column_type {
            crate::binning::parse_column_type(name)?;
        }
        match self.bin_threshold {
            Some(BinThreshold::Count(0)) => Err(HistogramError::ConfigError(
                "`binThreshold` count must be positive".to_string(),
            )),
            Some(BinThreshold::Count(k)) if k > MAX_BINS => Err(HistogramError::ConfigError(
                format!("`binThreshold` count must be at most {MAX_BINS}, got {k}"),
            )),
            Some(BinThreshold::Width(w)) if !(w.is_finite() && w > 0.0) => {
                Err(HistogramError::ConfigError(format!(
                    "`binThreshold` width must be positive and finite, got {w}"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Binning options derived from this configuration
    pub fn bin_config(&self) -> crate::binning::BinConfig {
        crate::binning::BinConfig {
            threshold: self.bin_threshold.unwrap_or_default(),
            max_ordinal_bins: self.max_ordinal_bins,
            date_interval: self.date_interval,
        }
    }

    /// Fill color for a bar given its selection state
    pub fn fill(&self, selected: bool) -> &str {
        if selected {
            &self.colors[1]
        } else {
            &self.colors[0]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnType, Value};
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config: HistogramConfig = serde_json::from_str(r#"{"column": "age"}"#).unwrap();
        assert_eq!(config.width, 600.0);
        assert_eq!(config.height, 400.0);
        assert_eq!(config.margin, Margin::default());
        assert_eq!(config.max_ordinal_bins, 20);
        assert_eq!(config.selection_mode, SelectionMode::Single);
        assert_eq!(config.colors[0], "steelblue");
        assert_eq!(config.colors[1], "orange");
        assert!(config.bin_threshold.is_none());
        assert!(config.data_source.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_camel_case_options() {
        let config: HistogramConfig = serde_json::from_str(
            r#"{
                "column": "education",
                "maxOrdinalBins": 3,
                "selectionMode": "multiple",
                "binThreshold": {"count": 10},
                "showLabelsBelow": true,
                "dataSource": "https://example.com/data.parquet",
                "dataFormat": "parquet"
            }"#,
        )
        .unwrap();
        assert_eq!(config.max_ordinal_bins, 3);
        assert_eq!(config.selection_mode, SelectionMode::Multiple);
        assert_eq!(config.bin_threshold, Some(BinThreshold::Count(10)));
        assert!(config.show_labels_below);
        assert_eq!(
            config.data_source,
            Some(DataSource::Url("https://example.com/data.parquet".to_string()))
        );
        assert_eq!(config.data_format, Some(DataFormat::Parquet));
    }

    #[test]
    fn test_inline_records_source() {
        let config: HistogramConfig = serde_json::from_str(
            r#"{"column": "age", "dataSource": [{"age": 19, "name": "a"}, {"age": 25.5, "name": null}]}"#,
        )
        .unwrap();
        let Some(DataSource::Records(records)) = config.data_source else {
            panic!("expected inline records");
        };
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["age"], Value::Integer(19));
        assert_eq!(records[1]["age"], Value::Float(25.5));
        assert_eq!(records[1]["name"], Value::Null);
    }

    #[test]
    fn test_missing_column_is_rejected() {
        assert!(serde_json::from_str::<HistogramConfig>(r#"{"width": 10}"#).is_err());
        assert!(HistogramConfig::new(" ").validate().is_err());
    }

    #[test]
    fn test_invalid_thresholds() {
        let config = HistogramConfig::new("x").with_bin_threshold(BinThreshold::Count(0));
        assert!(matches!(
            config.validate(),
            Err(HistogramError::ConfigError(_))
        ));
        let config = HistogramConfig::new("x").with_bin_threshold(BinThreshold::Width(-1.0));
        assert!(config.validate().is_err());
        let config = HistogramConfig::new("x").with_max_ordinal_bins(0);
        assert!(config.validate().is_err());
    }

    #[rstest]
    #[case(BinThreshold::Count(MAX_BINS + 1))]
    #[case(BinThreshold::Count(usize::MAX))]
    #[case(BinThreshold::Width(f64::NAN))]
    #[case(BinThreshold::Width(f64::INFINITY))]
    #[case(BinThreshold::Width(0.0))]
    fn test_out_of_range_thresholds(#[case] threshold: BinThreshold) {
        let config = HistogramConfig::new("x").with_bin_threshold(threshold);
        assert!(
            matches!(config.validate(), Err(HistogramError::ConfigError(_))),
            "{threshold:?}"
        );
        let config = HistogramConfig::new("x").with_bin_threshold(BinThreshold::Count(MAX_BINS));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_column_type_override() {
        let config: HistogramConfig =
            serde_json::from_str(r#"{"column": "zip", "columnType": "ordinal"}"#).unwrap();
        assert_eq!(config.column_type.as_deref(), Some("ordinal"));
        assert!(config.validate().is_ok());
        assert_eq!(
            crate::binning::parse_column_type("ordinal").unwrap(),
            ColumnType::Ordinal
        );

        let config = HistogramConfig::new("zip").with_column_type("geo");
        assert!(matches!(
            config.validate(),
            Err(HistogramError::UnsupportedTypeError(ref name)) if name == "geo"
        ));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            DataFormat::from_extension("data/cars.parquet"),
            Some(DataFormat::Parquet)
        );
        assert_eq!(
            DataFormat::from_extension("https://x.org/a.CSV?raw=1"),
            Some(DataFormat::Csv)
        );
        assert_eq!(DataFormat::from_extension("rows.ndjson"), Some(DataFormat::Json));
        assert_eq!(DataFormat::from_extension("notes.txt"), None);
    }
}
