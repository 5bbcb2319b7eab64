use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{BackendKind, HistogramBackend};
use crate::binning::{bin_records, BinConfig};
use crate::classify::classify_values;
use crate::config::{DataFormat, DataSource};
use crate::error::HistogramError;
use crate::selection::SelectionPredicate;
use crate::types::{Bin, ColumnType, Record, Value};

/// Backend over records held in memory
#[derive(Debug, Default)]
pub struct ArrayBackend {
    records: RwLock<Arc<Vec<Record>>>,
}

impl ArrayBackend {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: RwLock::new(Arc::new(records)),
        }
    }

    /// Snapshot of the current records
    pub async fn records(&self) -> Arc<Vec<Record>> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl HistogramBackend for ArrayBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Array
    }

    async fn type_of(&self, column: &str) -> Result<ColumnType, HistogramError> {
        let records = self.records().await;
        Ok(classify_values(records.iter(), column))
    }

    async fn bin(
        &self,
        column: &str,
        column_type: ColumnType,
        config: &BinConfig,
    ) -> Result<Vec<Bin>, HistogramError> {
        let records = self.records().await;
        bin_records(&records, column, column_type, config)
    }

    async fn records_matching(
        &self,
        column: &str,
        predicate: &SelectionPredicate,
    ) -> Result<Vec<Record>, HistogramError> {
        if matches!(predicate, SelectionPredicate::Nothing) {
            return Ok(vec![]);
        }
        let records = self.records().await;
        Ok(records
            .iter()
            .filter(|r| predicate.matches(r.get(column).unwrap_or(&Value::Null)))
            .cloned()
            .collect())
    }

    async fn load(
        &self,
        source: DataSource,
        _format: Option<DataFormat>,
    ) -> Result<u64, HistogramError> {
        let DataSource::Records(records) = source else {
            return Err(HistogramError::DataLoadError(
                "the array backend only accepts in-memory records".to_string(),
            ));
        };
        let count = records.len() as u64;
        *self.records.write().await = Arc::new(records);
        Ok(count)
    }

    async fn row_count(&self) -> Result<u64, HistogramError> {
        Ok(self.records.read().await.len() as u64)
    }
}
