//! Decoding of data sources into rows the query engine can ingest

use std::io::{Cursor, Seek};
use std::sync::Arc;

use bytes::Bytes;
use datafusion::arrow::csv::reader::Format;
use datafusion::arrow::datatypes::SchemaRef;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use indexmap::IndexMap;

use crate::config::DataFormat;
use crate::error::HistogramError;
use crate::types::{Record, Value};

/// Rows per `INSERT` statement when loading records
pub const INSERT_BATCH_SIZE: usize = 1000;

/// Column type inferred from record values
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum SqlType {
    #[strum(serialize = "TIMESTAMP")]
    Timestamp,
    #[strum(serialize = "BIGINT")]
    BigInt,
    #[strum(serialize = "DOUBLE")]
    Double,
    #[strum(serialize = "BOOLEAN")]
    Boolean,
    #[strum(serialize = "VARCHAR")]
    Varchar,
}

impl SqlType {
    fn of(value: &Value) -> Option<Self> {
        match value {
            v if v.is_null() => None,
            Value::Date(_) => Some(SqlType::Timestamp),
            Value::Integer(_) => Some(SqlType::BigInt),
            Value::Float(_) => Some(SqlType::Double),
            Value::Boolean(_) => Some(SqlType::Boolean),
            Value::Text(_) | Value::Null => Some(SqlType::Varchar),
        }
    }
}

/// Infer a table schema from records.
///
/// Each field takes the type of the first non-null value it holds. A whole-number
/// field that later holds a fraction is widened to `DOUBLE`. Fields that are never
/// non-null become `VARCHAR`. Field order follows first appearance.
pub fn infer_schema(records: &[Record]) -> Vec<(String, SqlType)> {
    let mut schema: IndexMap<String, Option<SqlType>> = IndexMap::new();
    for record in records {
        for (name, value) in record {
            let slot = schema.entry(name.clone()).or_insert(None);
            match (*slot, SqlType::of(value)) {
                (None, found) => *slot = found,
                (Some(SqlType::BigInt), Some(SqlType::Double)) => *slot = Some(SqlType::Double),
                _ => {}
            }
        }
    }
    schema
        .into_iter()
        .map(|(name, sql_type)| (name, sql_type.unwrap_or(SqlType::Varchar)))
        .collect()
}

/// Double embedded single quotes
pub fn escape_string(value: &str) -> String {
    value.replace('\'', "''")
}

/// Render a value as a SQL literal
pub fn render_literal(value: &Value) -> String {
    match value {
        v if v.is_null() => "NULL".to_string(),
        Value::Boolean(true) => "TRUE".to_string(),
        Value::Boolean(false) => "FALSE".to_string(),
        Value::Integer(v) => v.to_string(),
        Value::Float(v) => format!("{v:?}"),
        Value::Date(v) => format!(
            "CAST('{}' AS TIMESTAMP)",
            v.format("%Y-%m-%dT%H:%M:%S%.3f")
        ),
        Value::Text(v) => format!("'{}'", escape_string(v)),
        Value::Null => "NULL".to_string(),
    }
}

/// Literal rows aligned with `schema`; missing fields become `NULL`
pub fn literal_rows(records: &[Record], schema: &[(String, SqlType)]) -> Vec<Vec<String>> {
    records
        .iter()
        .map(|record| {
            schema
                .iter()
                .map(|(name, _)| record.get(name).map_or_else(|| "NULL".to_string(), render_literal))
                .collect()
        })
        .collect()
}

/// A decoded data file
#[derive(Debug, Clone)]
pub enum Decoded {
    /// Arrow batches ready to register as a staging table
    Batches(SchemaRef, Vec<RecordBatch>),
    /// Records from a JSON array document
    Records(Vec<Record>),
}

/// Choose the format of a named blob, preferring an explicit format
pub fn resolve_format(name: &str, format: Option<DataFormat>) -> Result<DataFormat, HistogramError> {
    format
        .or_else(|| DataFormat::from_extension(name))
        .ok_or_else(|| {
            HistogramError::DataLoadError(format!(
                "Unable to determine the format of `{name}`; expected parquet, csv or json"
            ))
        })
}

/// Decode a file blob
pub fn decode(bytes: Bytes, format: DataFormat) -> Result<Decoded, HistogramError> {
    match format {
        DataFormat::Csv => read_csv_batches(bytes),
        DataFormat::Parquet => read_parquet_batches(bytes),
        DataFormat::Json => read_json(bytes),
    }
}

fn read_csv_batches(bytes: Bytes) -> Result<Decoded, HistogramError> {
    let mut cursor = Cursor::new(bytes);
    let (schema, _) = Format::default()
        .with_header(true)
        .infer_schema(&mut cursor, None)?;
    cursor.rewind()?;

    let schema = Arc::new(schema);
    let reader = datafusion::arrow::csv::ReaderBuilder::new(schema.clone())
        .with_header(true)
        .build(cursor)?;
    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    Ok(Decoded::Batches(schema, batches))
}

fn read_parquet_batches(bytes: Bytes) -> Result<Decoded, HistogramError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;
    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    Ok(Decoded::Batches(schema, batches))
}

/// JSON arrays of objects become records; anything else is read as newline-delimited JSON
fn read_json(bytes: Bytes) -> Result<Decoded, HistogramError> {
    let is_array = bytes
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'[');
    if is_array {
        let records: Vec<Record> = serde_json::from_slice(&bytes)?;
        return Ok(Decoded::Records(records));
    }

    let mut cursor = Cursor::new(bytes);
    let (schema, _) =
        datafusion::arrow::json::reader::infer_json_schema_from_seekable(&mut cursor, None)?;
    cursor.rewind()?;

    let schema = Arc::new(schema);
    let reader = datafusion::arrow::json::ReaderBuilder::new(schema.clone()).build(cursor)?;
    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    Ok(Decoded::Batches(schema, batches))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::record;
    use chrono::NaiveDate;
    use datafusion::arrow::datatypes::DataType;

    #[test]
    fn test_infer_schema() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let records = vec![
            record([
                ("age", Value::from(19)),
                ("score", Value::Null),
                ("joined", Value::from(day)),
            ]),
            record([
                ("age", Value::from(25.5)),
                ("score", Value::from(true)),
                ("joined", Value::Null),
            ]),
            record([("name", "O'Brien")]),
        ];
        assert_eq!(
            infer_schema(&records),
            vec![
                ("age".to_string(), SqlType::Double),
                ("score".to_string(), SqlType::Boolean),
                ("joined".to_string(), SqlType::Timestamp),
                ("name".to_string(), SqlType::Varchar),
            ]
        );
    }

    #[test]
    fn test_render_literals() {
        assert_eq!(render_literal(&Value::Null), "NULL");
        assert_eq!(render_literal(&Value::Float(f64::NAN)), "NULL");
        assert_eq!(render_literal(&Value::from(3)), "3");
        assert_eq!(render_literal(&Value::from(2.0)), "2.0");
        assert_eq!(render_literal(&Value::from(false)), "FALSE");
        assert_eq!(render_literal(&Value::from("O'Brien")), "'O''Brien'");
        let moment = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_milli_opt(8, 5, 0, 250)
            .unwrap();
        assert_eq!(
            render_literal(&Value::from(moment)),
            "CAST('2024-03-01T08:05:00.250' AS TIMESTAMP)"
        );
    }

    #[test]
    fn test_literal_rows_fill_missing() {
        let records = vec![record([("a", 1)]), record([("b", "x")])];
        let schema = infer_schema(&records);
        assert_eq!(
            literal_rows(&records, &schema),
            vec![
                vec!["1".to_string(), "NULL".to_string()],
                vec!["NULL".to_string(), "'x'".to_string()],
            ]
        );
    }

    #[test]
    fn test_decode_csv() {
        let csv = Bytes::from_static(b"age,education\n19,HS\n25,Bachelor\n");
        let Decoded::Batches(schema, batches) = decode(csv, DataFormat::Csv).unwrap() else {
            panic!("expected batches");
        };
        assert_eq!(schema.field(0).data_type(), &DataType::Int64);
        assert_eq!(schema.field(1).data_type(), &DataType::Utf8);
        assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 2);
    }

    #[test]
    fn test_decode_json_variants() {
        let array = Bytes::from_static(br#" [{"age": 19}, {"age": null}]"#);
        let Decoded::Records(records) = decode(array, DataFormat::Json).unwrap() else {
            panic!("expected records");
        };
        assert_eq!(records.len(), 2);

        let lines = Bytes::from_static(b"{\"age\": 19}\n{\"age\": 25}\n");
        let Decoded::Batches(_, batches) = decode(lines, DataFormat::Json).unwrap() else {
            panic!("expected batches");
        };
        assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 2);
    }

    #[test]
    fn test_resolve_format() {
        assert_eq!(
            resolve_format("a.bin", Some(DataFormat::Csv)).unwrap(),
            DataFormat::Csv
        );
        assert_eq!(resolve_format("a.parquet", None).unwrap(), DataFormat::Parquet);
        assert!(matches!(
            resolve_format("a.bin", None),
            Err(HistogramError::DataLoadError(_))
        ));
    }
}
