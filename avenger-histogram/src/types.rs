use std::fmt::Display;

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Key of the synthetic bin that aggregates low-rank ordinal values
pub const OTHER_KEY: &str = "Other";

/// A single cell of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Date(NaiveDateTime),
    Text(String),
}

impl Value {
    /// Whether the value counts as missing. Non-finite floats are treated as missing.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(v) => !v.is_finite(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(v) => Some(*v),
            _ => None,
        }
    }

    /// String key used to group the value into an ordinal bin.
    ///
    /// Matches the text the query engine produces for `CAST(value AS VARCHAR)`.
    pub fn ordinal_key(&self) -> Option<String> {
        match self {
            v if v.is_null() => None,
            Value::Boolean(v) => Some(v.to_string()),
            Value::Integer(v) => Some(v.to_string()),
            Value::Float(v) => Some(v.to_string()),
            Value::Date(v) => Some(v.format("%Y-%m-%dT%H:%M:%S").to_string()),
            Value::Text(v) => Some(v.clone()),
            Value::Null => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::Date(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A uniformly shaped row of a dataset
pub type Record = IndexMap<String, Value>;

/// Build a record from `(field, value)` pairs
pub fn record<K, V, I>(fields: I) -> Record
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    fields
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Semantic type of a column, decides which binning rule applies
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ColumnType {
    Continuous,
    Ordinal,
    Date,
}

/// A bin boundary in the column's native ordering
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BinValue {
    Number(f64),
    Date(NaiveDateTime),
    Category(String),
}

impl BinValue {
    /// Position of the boundary on a continuous axis. Dates map to epoch milliseconds.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            BinValue::Number(v) => Some(*v),
            BinValue::Date(v) => Some(v.and_utc().timestamp_millis() as f64),
            BinValue::Category(_) => None,
        }
    }
}

impl Display for BinValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinValue::Number(v) => write!(f, "{v}"),
            BinValue::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            BinValue::Category(v) => write!(f, "{v}"),
        }
    }
}

/// Structural identity of a bin, stable across rebinning passes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum BinKey {
    Range(OrderedFloat<f64>, OrderedFloat<f64>),
    Category(String),
    Other,
}

/// One bucket of a histogram
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bin {
    pub x0: BinValue,
    pub x1: BinValue,
    pub length: u64,
    pub key: Option<String>,
    /// Set on the synthetic bin that aggregates the tail of an ordinal column
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub other: bool,
}

impl Bin {
    pub fn range(x0: BinValue, x1: BinValue, length: u64) -> Self {
        Self {
            x0,
            x1,
            length,
            key: None,
            other: false,
        }
    }

    pub fn category(key: impl Into<String>, length: u64) -> Self {
        let key = key.into();
        Self {
            x0: BinValue::Category(key.clone()),
            x1: BinValue::Category(key.clone()),
            length,
            key: Some(key),
            other: false,
        }
    }

    pub fn other(length: u64) -> Self {
        Self {
            other: true,
            ..Self::category(OTHER_KEY, length)
        }
    }

    pub fn selection_key(&self) -> BinKey {
        if self.other {
            return BinKey::Other;
        }
        if let Some(key) = &self.key {
            return BinKey::Category(key.clone());
        }
        BinKey::Range(
            OrderedFloat(self.x0.as_f64().unwrap_or(f64::NAN)),
            OrderedFloat(self.x1.as_f64().unwrap_or(f64::NAN)),
        )
    }

    /// Text shown below or beside the bar
    pub fn label(&self, column_type: ColumnType) -> String {
        match (column_type, &self.x0, &self.x1) {
            (ColumnType::Continuous, BinValue::Number(x0), BinValue::Number(x1)) => {
                format!("{x0:.1}-{x1:.1}: {}", self.length)
            }
            (ColumnType::Date, BinValue::Date(x0), _) => {
                format!("{}: {}", x0.format("%Y-%m-%d"), self.length)
            }
            _ => format!(
                "{}: {}",
                self.key.clone().unwrap_or_else(|| self.x0.to_string()),
                self.length
            ),
        }
    }
}
