pub mod array;
pub mod convert;
pub mod query;

use std::fmt::Debug;

use async_trait::async_trait;

use crate::binning::BinConfig;
use crate::config::{DataFormat, DataSource};
use crate::error::HistogramError;
use crate::selection::SelectionPredicate;
use crate::types::{Bin, ColumnType, Record};

pub use self::array::ArrayBackend;
pub use self::query::QueryEngineBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum BackendKind {
    Array,
    QueryEngine,
}

/// A dataset the histogram can classify, bin and filter.
///
/// Both implementations produce identical bins for the same logical data.
#[async_trait]
pub trait HistogramBackend: Debug + Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn type_of(&self, column: &str) -> Result<ColumnType, HistogramError>;

    async fn bin(
        &self,
        column: &str,
        column_type: ColumnType,
        config: &BinConfig,
    ) -> Result<Vec<Bin>, HistogramError>;

    /// Records whose `column` value satisfies the predicate, in dataset order
    async fn records_matching(
        &self,
        column: &str,
        predicate: &SelectionPredicate,
    ) -> Result<Vec<Record>, HistogramError>;

    /// Replace the dataset. Returns the number of rows loaded.
    async fn load(
        &self,
        source: DataSource,
        format: Option<DataFormat>,
    ) -> Result<u64, HistogramError>;

    async fn row_count(&self) -> Result<u64, HistogramError>;
}
