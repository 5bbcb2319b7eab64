use datafusion::arrow::error::ArrowError;
use datafusion::error::DataFusionError;
use datafusion::parquet::errors::ParquetError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HistogramError {
    #[error("Initialization error: {0}")]
    InitializationError(String),

    #[error("Failed to load data: {0}")]
    DataLoadError(String),

    #[error("No data was loaded into table `{0}`")]
    EmptyLoadError(String),

    #[error("Column `{0}` contains no non-null values")]
    EmptyColumnError(String),

    #[error("No binning rule for column type: `{0}`")]
    UnsupportedTypeError(String),

    #[error("Query error ({stage}): {message}")]
    QueryError { stage: String, message: String },

    #[error("Column not found: `{0}`")]
    ColumnNotFound(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Histogram is not initialized: {0}")]
    NotInitialized(String),

    #[error("Unknown event: `{0}`")]
    UnknownEvent(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("DataFusion error: `{0}`")]
    DataFusionError(#[from] DataFusionError),

    #[error("Arrow error: `{0}`")]
    ArrowError(#[from] ArrowError),

    #[error("Parquet error: `{0}`")]
    ParquetError(#[from] ParquetError),

    #[error("Fetch error: `{0}`")]
    ReqwestError(#[from] reqwest::Error),

    #[error("IO error: `{0}`")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: `{0}`")]
    SerdeJsonError(#[from] serde_json::Error),
}

impl HistogramError {
    pub fn query(stage: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::QueryError {
            stage: stage.into(),
            message: err.to_string(),
        }
    }

    /// Prefix the message of a load failure with the stage that produced it
    ///
    /// Errors that already carry a load-specific variant are passed through unchanged
    pub fn into_load_error(self, stage: &str) -> Self {
        match self {
            e @ (Self::DataLoadError(_) | Self::EmptyLoadError(_)) => e,
            e => Self::DataLoadError(format!("{stage}: {e}")),
        }
    }
}
