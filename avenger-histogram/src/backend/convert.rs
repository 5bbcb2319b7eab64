//! Conversion of query results into records

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::scalar::ScalarValue;

use crate::error::HistogramError;
use crate::types::{Record, Value};

/// Days from 0001-01-01 to 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(chrono::NaiveTime::MIN)
}

fn date_value(value: Option<NaiveDateTime>) -> Value {
    value.map(Value::Date).unwrap_or(Value::Null)
}

pub fn scalar_to_value(scalar: ScalarValue) -> Value {
    if scalar.is_null() {
        return Value::Null;
    }
    match scalar {
        ScalarValue::Boolean(v) => Value::from(v),
        ScalarValue::Int8(v) => Value::from(v.map(i64::from)),
        ScalarValue::Int16(v) => Value::from(v.map(i64::from)),
        ScalarValue::Int32(v) => Value::from(v.map(i64::from)),
        ScalarValue::Int64(v) => Value::from(v),
        ScalarValue::UInt8(v) => Value::from(v.map(i64::from)),
        ScalarValue::UInt16(v) => Value::from(v.map(i64::from)),
        ScalarValue::UInt32(v) => Value::from(v.map(i64::from)),
        ScalarValue::UInt64(v) => Value::from(v.map(|v| i64::try_from(v).unwrap_or(i64::MAX))),
        ScalarValue::Float16(v) => Value::from(v.map(|v| v.to_f64())),
        ScalarValue::Float32(v) => Value::from(v.map(f64::from)),
        ScalarValue::Float64(v) => Value::from(v),
        ScalarValue::Decimal128(v, _, scale) => {
            Value::from(v.map(|v| v as f64 / 10f64.powi(scale as i32)))
        }
        ScalarValue::Utf8(v) | ScalarValue::LargeUtf8(v) | ScalarValue::Utf8View(v) => {
            Value::from(v)
        }
        ScalarValue::Date32(v) => date_value(
            v.and_then(|d| NaiveDate::from_num_days_from_ce_opt(d + UNIX_EPOCH_DAYS_FROM_CE))
                .map(midnight),
        ),
        ScalarValue::Date64(v) => date_value(
            v.and_then(DateTime::from_timestamp_millis)
                .map(|d| d.naive_utc()),
        ),
        ScalarValue::TimestampSecond(v, _) => date_value(
            v.and_then(|s| DateTime::from_timestamp(s, 0))
                .map(|d| d.naive_utc()),
        ),
        ScalarValue::TimestampMillisecond(v, _) => date_value(
            v.and_then(DateTime::from_timestamp_millis)
                .map(|d| d.naive_utc()),
        ),
        ScalarValue::TimestampMicrosecond(v, _) => date_value(
            v.and_then(DateTime::from_timestamp_micros)
                .map(|d| d.naive_utc()),
        ),
        ScalarValue::TimestampNanosecond(v, _) => {
            date_value(v.map(|n| DateTime::from_timestamp_nanos(n).naive_utc()))
        }
        other => Value::Text(other.to_string()),
    }
}

/// Convert result batches to records, one per row
pub fn batches_to_records(batches: &[RecordBatch]) -> Result<Vec<Record>, HistogramError> {
    let mut records = Vec::with_capacity(batches.iter().map(|b| b.num_rows()).sum());
    for batch in batches {
        let schema = batch.schema();
        for row in 0..batch.num_rows() {
            let mut record = Record::with_capacity(schema.fields().len());
            for (i, field) in schema.fields().iter().enumerate() {
                let scalar = ScalarValue::try_from_array(batch.column(i), row)?;
                record.insert(field.name().clone(), scalar_to_value(scalar));
            }
            records.push(record);
        }
    }
    Ok(records)
}

fn missing(field: &str) -> HistogramError {
    HistogramError::InternalError(format!("query result has no usable `{field}` field"))
}

/// Read a non-negative count from a result record
pub fn get_u64(record: &Record, field: &str) -> Result<u64, HistogramError> {
    match record.get(field) {
        Some(Value::Integer(v)) if *v >= 0 => Ok(*v as u64),
        Some(Value::Float(v)) if *v >= 0.0 => Ok(*v as u64),
        _ => Err(missing(field)),
    }
}

pub fn get_f64(record: &Record, field: &str) -> Result<Option<f64>, HistogramError> {
    match record.get(field) {
        Some(Value::Null) => Ok(None),
        Some(v) => v.as_f64().map(Some).ok_or_else(|| missing(field)),
        None => Err(missing(field)),
    }
}

pub fn get_date(record: &Record, field: &str) -> Result<NaiveDateTime, HistogramError> {
    record
        .get(field)
        .and_then(Value::as_date)
        .ok_or_else(|| missing(field))
}

pub fn get_string(record: &Record, field: &str) -> Result<String, HistogramError> {
    match record.get(field) {
        Some(Value::Text(v)) => Ok(v.clone()),
        _ => Err(missing(field)),
    }
}
