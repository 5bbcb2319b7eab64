//! Column type classification for both backends

use crate::types::{ColumnType, Record, Value};

/// Classify a column of in-memory records by its first non-null value
pub fn classify_values<'a>(records: impl IntoIterator<Item = &'a Record>, column: &str) -> ColumnType {
    let first = records
        .into_iter()
        .filter_map(|r| r.get(column))
        .find(|v| !v.is_null());

    match first {
        Some(Value::Integer(_) | Value::Float(_)) => ColumnType::Continuous,
        Some(Value::Date(_)) => ColumnType::Date,
        _ => ColumnType::Ordinal,
    }
}

/// Classify a column from the type name reported by the query engine.
///
/// Accepts both Arrow display names (`Int64`, `Timestamp(Nanosecond, None)`) and SQL
/// names (`BIGINT`, `TIMESTAMP`).
pub fn classify_type_name(type_name: &str) -> ColumnType {
    let name = type_name.trim().to_ascii_lowercase();

    // Interval names contain "int", so they are checked first
    if name.starts_with("interval") || name.starts_with("duration") {
        return ColumnType::Ordinal;
    }

    const NUMERIC: [&str; 9] = [
        "int", "uint", "float", "double", "decimal", "real", "numeric", "bigint", "smallint",
    ];
    if NUMERIC.iter().any(|p| name.starts_with(p)) || name == "tinyint" {
        return ColumnType::Continuous;
    }
    if name.starts_with("date") || name.starts_with("timestamp") {
        return ColumnType::Date;
    }
    ColumnType::Ordinal
}
