use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use datafusion::arrow::datatypes::SchemaRef;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::SessionContext;
use datafusion::sql::TableReference;
use serde::Serialize;
use tokio::sync::Mutex;

use super::convert::{batches_to_records, get_date, get_f64, get_string, get_u64};
use super::{BackendKind, HistogramBackend};
use crate::binning::threshold::{interpolate, quantile_position, BinLayout, NumericStats, QUARTILES};
use crate::binning::{ordinal, temporal, BinConfig};
use crate::classify::classify_type_name;
use crate::config::{BinThreshold, DataFormat, DataSource};
use crate::error::HistogramError;
use crate::fetcher::DataFetcher;
use crate::loader::{self, Decoded, INSERT_BATCH_SIZE};
use crate::naming::staging_name;
use crate::query::QueryBuilder;
use crate::selection::SelectionPredicate;
use crate::types::{Bin, ColumnType, Record};

/// Schema entry of one table column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescription {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

/// A resolved data source, ready to ingest
enum Payload {
    Records(Vec<Record>),
    File {
        name: String,
        bytes: Bytes,
        format: DataFormat,
    },
    Url {
        url: String,
        format: DataFormat,
    },
}

/// Backend over one table of a DataFusion session
pub struct QueryEngineBackend {
    ctx: SessionContext,
    query: QueryBuilder,
    fetcher: Arc<dyn DataFetcher>,
    /// Serializes statements that read or replace the table
    table_lock: Mutex<()>,
}

impl std::fmt::Debug for QueryEngineBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngineBackend")
            .field("table", &self.query.table())
            .finish()
    }
}

impl QueryEngineBackend {
    /// Start a session and check that it answers queries
    pub async fn connect(
        table_name: impl Into<String>,
        fetcher: Arc<dyn DataFetcher>,
    ) -> Result<Self, HistogramError> {
        Self::connect_with_context(SessionContext::new(), table_name, fetcher).await
    }

    pub async fn connect_with_context(
        ctx: SessionContext,
        table_name: impl Into<String>,
        fetcher: Arc<dyn DataFetcher>,
    ) -> Result<Self, HistogramError> {
        ctx.sql("SELECT 1")
            .await
            .map_err(|e| HistogramError::InitializationError(e.to_string()))?
            .collect()
            .await
            .map_err(|e| HistogramError::InitializationError(e.to_string()))?;

        let table_name = table_name.into();
        log::info!("Query engine ready for table `{table_name}`");
        Ok(Self {
            ctx,
            query: QueryBuilder::new(table_name),
            fetcher,
            table_lock: Mutex::new(()),
        })
    }

    pub fn table_name(&self) -> &str {
        self.query.table()
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    async fn run(&self, stage: &str, sql: &str) -> Result<Vec<RecordBatch>, HistogramError> {
        log::debug!("[{stage}] {sql}");
        self.ctx
            .sql(sql)
            .await
            .map_err(|e| HistogramError::query(stage, e))?
            .collect()
            .await
            .map_err(|e| HistogramError::query(stage, e))
    }

    async fn run_records(&self, stage: &str, sql: &str) -> Result<Vec<Record>, HistogramError> {
        let batches = self.run(stage, sql).await?;
        batches_to_records(&batches)
    }

    /// Whether the table currently exists
    pub fn table_exists(&self) -> Result<bool, HistogramError> {
        Ok(self
            .ctx
            .table_exist(TableReference::bare(self.table_name()))?)
    }

    /// Name, type and nullability of a column of the loaded table
    pub async fn describe_column(&self, column: &str) -> Result<ColumnDescription, HistogramError> {
        let provider = self
            .ctx
            .table_provider(TableReference::bare(self.table_name()))
            .await
            .map_err(|e| HistogramError::NotInitialized(e.to_string()))?;
        let schema = provider.schema();
        let field = schema
            .field_with_name(column)
            .map_err(|_| HistogramError::ColumnNotFound(column.to_string()))?;
        Ok(ColumnDescription {
            name: field.name().clone(),
            data_type: field.data_type().to_string(),
            nullable: field.is_nullable(),
        })
    }

    /// Drop the table if it exists
    pub async fn drop_table(&self) -> Result<(), HistogramError> {
        let _guard = self.table_lock.lock().await;
        self.run("drop", &self.query.drop_table()).await?;
        Ok(())
    }

    async fn load_records(&self, records: &[Record]) -> Result<(), HistogramError> {
        let schema = loader::infer_schema(records);
        if schema.is_empty() {
            return Ok(());
        }
        self.run("create", &self.query.create_table(&schema)).await?;
        let rows = loader::literal_rows(records, &schema);
        for chunk in rows.chunks(INSERT_BATCH_SIZE) {
            self.run("insert", &self.query.insert_batch(&schema, chunk))
                .await?;
        }
        Ok(())
    }

    async fn load_batches(
        &self,
        schema: SchemaRef,
        batches: Vec<RecordBatch>,
    ) -> Result<(), HistogramError> {
        let staging = staging_name(self.table_name());
        let table = MemTable::try_new(schema, vec![batches])?;
        self.ctx
            .register_table(TableReference::bare(staging.clone()), Arc::new(table))?;
        let result = self
            .run("copy", &self.query.create_table_as(&staging))
            .await;
        self.ctx.deregister_table(TableReference::bare(staging))?;
        result.map(|_| ())
    }

    async fn ingest(&self, payload: Payload) -> Result<(), HistogramError> {
        let (bytes, format) = match payload {
            Payload::Records(records) => return self.load_records(&records).await,
            Payload::File {
                name,
                bytes,
                format,
            } => {
                log::info!("Loading {} bytes of {format} from `{name}`", bytes.len());
                (bytes, format)
            }
            Payload::Url { url, format } => {
                let bytes = self
                    .fetcher
                    .fetch(&url)
                    .await
                    .map_err(|e| e.into_load_error("fetch"))?;
                log::info!("Loading {} bytes of {format} from {url}", bytes.len());
                (bytes, format)
            }
        };
        match loader::decode(bytes, format).map_err(|e| e.into_load_error("decode"))? {
            Decoded::Batches(schema, batches) => self.load_batches(schema, batches).await,
            Decoded::Records(records) => self.load_records(&records).await,
        }
    }

    async fn ingest_and_count(&self, payload: Payload) -> Result<u64, HistogramError> {
        self.ingest(payload).await?;
        if self.table_exists()? {
            self.count_rows().await
        } else {
            Ok(0)
        }
    }

    async fn count_rows(&self) -> Result<u64, HistogramError> {
        let rows = self.run_records("count", &self.query.row_count()).await?;
        rows.first()
            .map(|r| get_u64(r, "row_count"))
            .unwrap_or(Ok(0))
    }

    async fn numeric_bins(
        &self,
        column: &str,
        threshold: BinThreshold,
    ) -> Result<Vec<Bin>, HistogramError> {
        let rows = self
            .run_records("stats", &self.query.numeric_stats(column))
            .await?;
        let row = rows.first().ok_or_else(|| {
            HistogramError::InternalError("statistics query returned no rows".to_string())
        })?;
        let count = get_u64(row, "value_count")?;
        let (Some(min), Some(max)) = (get_f64(row, "min_value")?, get_f64(row, "max_value")?)
        else {
            return Err(HistogramError::EmptyColumnError(column.to_string()));
        };
        if count == 0 {
            return Err(HistogramError::EmptyColumnError(column.to_string()));
        }

        let quartiles = if matches!(threshold, BinThreshold::FreedmanDiaconis) {
            Some((
                self.quantile(column, count, QUARTILES[0]).await?,
                self.quantile(column, count, QUARTILES[1]).await?,
            ))
        } else {
            None
        };

        let stats = NumericStats {
            min,
            max,
            count,
            quartiles,
        };
        let layout = BinLayout::from_stats(&stats, threshold)?;

        let rows = self
            .run_records("bin", &self.query.numeric_bins(column, &layout))
            .await?;
        let counts = rows
            .iter()
            .map(|r| Ok((get_u64(r, "bin_index")? as usize, get_u64(r, "bin_count")?)))
            .collect::<Result<Vec<_>, HistogramError>>()?;
        Ok(layout.bins(counts))
    }

    async fn quantile(&self, column: &str, count: u64, p: f64) -> Result<f64, HistogramError> {
        let (offset, fraction) = quantile_position(count, p);
        let rows = self
            .run_records("quantile", &self.query.quantile_neighbors(column, offset))
            .await?;
        let lower = rows
            .first()
            .map(|r| get_f64(r, "sorted_value"))
            .transpose()?
            .flatten()
            .ok_or_else(|| {
                HistogramError::InternalError(format!("no value at quantile offset {offset}"))
            })?;
        let upper = match rows.get(1) {
            Some(r) => get_f64(r, "sorted_value")?,
            None => None,
        };
        Ok(interpolate(lower, upper, fraction))
    }

    async fn date_bins(
        &self,
        column: &str,
        config: &BinConfig,
    ) -> Result<Vec<Bin>, HistogramError> {
        let rows = self
            .run_records("bin", &self.query.date_bins(column, config.date_interval))
            .await?;
        let mut counts = BTreeMap::new();
        for row in &rows {
            counts.insert(get_date(row, "x0")?, get_u64(row, "bin_count")?);
        }
        Ok(temporal::densify(&counts, config.date_interval))
    }

    async fn ordinal_bins(
        &self,
        column: &str,
        config: &BinConfig,
    ) -> Result<Vec<Bin>, HistogramError> {
        let cap = config.max_ordinal_bins.max(1);
        let rows = self
            .run_records("count", &self.query.non_null_count(column))
            .await?;
        let total = rows
            .first()
            .map(|r| get_u64(r, "value_count"))
            .unwrap_or(Ok(0))?;
        if total == 0 {
            return Err(HistogramError::EmptyColumnError(column.to_string()));
        }

        let rows = self
            .run_records("bin", &self.query.ordinal_bins(column, cap + 1))
            .await?;
        let ranked = rows
            .iter()
            .map(|r| Ok((get_string(r, "bin_key")?, get_u64(r, "bin_count")?)))
            .collect::<Result<Vec<_>, HistogramError>>()?;
        let over_cap = ranked.len() > cap;
        let bins = ordinal::collapse(ranked, total, cap)?;

        if over_cap {
            let rows = self
                .run_records("other", &self.query.ordinal_other(column, cap - 1))
                .await?;
            let other = rows
                .first()
                .map(|r| get_u64(r, "other_count"))
                .unwrap_or(Ok(0))?;
            let expected = bins.last().map(|b| b.length).unwrap_or(0);
            if other != expected {
                return Err(HistogramError::InternalError(format!(
                    "\"Other\" bin of `{column}` sums to {other}, expected {expected}"
                )));
            }
        }
        Ok(bins)
    }
}

#[async_trait]
impl HistogramBackend for QueryEngineBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::QueryEngine
    }

    async fn type_of(&self, column: &str) -> Result<ColumnType, HistogramError> {
        let _guard = self.table_lock.lock().await;
        self.describe_column(column).await?;
        let rows = self
            .run_records("type", &self.query.type_query(column))
            .await?;
        Ok(match rows.first() {
            Some(row) => classify_type_name(&get_string(row, "column_type")?),
            None => ColumnType::Ordinal,
        })
    }

    async fn bin(
        &self,
        column: &str,
        column_type: ColumnType,
        config: &BinConfig,
    ) -> Result<Vec<Bin>, HistogramError> {
        let _guard = self.table_lock.lock().await;
        let bins = match column_type {
            ColumnType::Continuous => self.numeric_bins(column, config.threshold).await?,
            ColumnType::Date => self.date_bins(column, config).await?,
            ColumnType::Ordinal => self.ordinal_bins(column, config).await?,
        };
        if bins.is_empty() {
            return Err(HistogramError::EmptyColumnError(column.to_string()));
        }
        Ok(bins)
    }

    async fn records_matching(
        &self,
        column: &str,
        predicate: &SelectionPredicate,
    ) -> Result<Vec<Record>, HistogramError> {
        let Some(sql) = self.query.select_matching(column, predicate) else {
            return Ok(vec![]);
        };
        let _guard = self.table_lock.lock().await;
        self.run_records("select", &sql).await
    }

    async fn load(
        &self,
        source: DataSource,
        format: Option<DataFormat>,
    ) -> Result<u64, HistogramError> {
        // Resolve the format before touching the table
        let payload = match source {
            DataSource::Records(records) => Payload::Records(records),
            DataSource::File { name, bytes } => {
                let format = loader::resolve_format(&name, format)?;
                Payload::File {
                    name,
                    bytes,
                    format,
                }
            }
            DataSource::Path(path) => {
                let name = path.display().to_string();
                let format = loader::resolve_format(&name, format)?;
                let bytes = std::fs::read(&path)
                    .map_err(|e| HistogramError::DataLoadError(format!("{name}: {e}")))?;
                Payload::File {
                    name,
                    bytes: Bytes::from(bytes),
                    format,
                }
            }
            DataSource::Url(url) => {
                let format = loader::resolve_format(&url, format)?;
                Payload::Url { url, format }
            }
        };

        let _guard = self.table_lock.lock().await;
        let table = self.table_name().to_string();
        self.run("drop", &self.query.drop_table())
            .await
            .map_err(|e| e.into_load_error("drop"))?;

        match self.ingest_and_count(payload).await {
            Ok(0) => {
                self.run("drop", &self.query.drop_table()).await?;
                Err(HistogramError::EmptyLoadError(table))
            }
            Ok(rows) => {
                log::info!("Loaded {rows} rows into `{table}`");
                Ok(rows)
            }
            Err(e) => {
                if let Err(drop_err) = self.run("drop", &self.query.drop_table()).await {
                    log::warn!("Failed to drop `{table}` after load error: {drop_err}");
                }
                Err(e.into_load_error("load"))
            }
        }
    }

    async fn row_count(&self) -> Result<u64, HistogramError> {
        let _guard = self.table_lock.lock().await;
        if !self.table_exists()? {
            return Ok(0);
        }
        self.count_rows().await
    }
}
