//! SQL text for every statement the query-engine backend issues.
//!
//! Nothing here touches the engine; each method returns a statement for one table.

use crate::binning::temporal::DateInterval;
use crate::binning::threshold::BinLayout;
use crate::loader::{render_literal, SqlType};
use crate::selection::{RangeTest, SelectionPredicate};
use crate::types::{BinValue, Value};

/// Double-quote an identifier, doubling embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn string_literal(value: &str) -> String {
    render_literal(&Value::Text(value.to_string()))
}

fn bound_literal(value: &BinValue) -> String {
    match value {
        BinValue::Number(v) => format!("{v:?}"),
        BinValue::Date(v) => render_literal(&Value::Date(*v)),
        BinValue::Category(v) => string_literal(v),
    }
}

fn in_list(keys: &[String]) -> String {
    keys.iter()
        .map(|k| string_literal(k))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBuilder {
    table: String,
}

impl QueryBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn table_ref(&self) -> String {
        quote_ident(&self.table)
    }

    fn numeric(column: &str) -> String {
        format!("CAST({} AS DOUBLE)", quote_ident(column))
    }

    /// Non-null and, for numbers, not NaN
    fn numeric_filter(column: &str) -> String {
        format!(
            "{} IS NOT NULL AND NOT isnan({})",
            quote_ident(column),
            Self::numeric(column)
        )
    }

    /// Arrow type name of the first non-null value
    pub fn type_query(&self, column: &str) -> String {
        let c = quote_ident(column);
        format!(
            "SELECT arrow_typeof({c}) AS column_type FROM {} WHERE {c} IS NOT NULL LIMIT 1",
            self.table_ref()
        )
    }

    pub fn non_null_count(&self, column: &str) -> String {
        format!(
            "SELECT COUNT({}) AS value_count FROM {}",
            quote_ident(column),
            self.table_ref()
        )
    }

    pub fn numeric_stats(&self, column: &str) -> String {
        let value = Self::numeric(column);
        format!(
            "SELECT MIN({value}) AS min_value, MAX({value}) AS max_value, COUNT(*) AS value_count \
             FROM {} WHERE {}",
            self.table_ref(),
            Self::numeric_filter(column)
        )
    }

    /// The sorted value at `offset` and its successor, for quantile interpolation
    pub fn quantile_neighbors(&self, column: &str, offset: u64) -> String {
        format!(
            "SELECT {} AS sorted_value FROM {} WHERE {} ORDER BY sorted_value ASC LIMIT 2 OFFSET {offset}",
            Self::numeric(column),
            self.table_ref(),
            Self::numeric_filter(column)
        )
    }

    /// Counts per bin index.
    ///
    /// The floored quotient is corrected against the lower edges `lo + step * i` so a
    /// value lands in the bin whose `[x0, x1)` range selection would return it.
    pub fn numeric_bins(&self, column: &str, layout: &BinLayout) -> String {
        if layout.width <= 0.0 || layout.count <= 1 {
            return format!(
                "SELECT 0 AS bin_index, COUNT(*) AS bin_count FROM {} WHERE {}",
                self.table_ref(),
                Self::numeric_filter(column)
            );
        }
        let (lo, step, last) = (layout.min, layout.width, layout.count - 1);
        format!(
            "SELECT bin_index, COUNT(*) AS bin_count FROM (\
             SELECT CAST(CASE \
             WHEN guess > 0 AND v < {lo:?} + {step:?} * guess THEN guess - 1 \
             WHEN guess < {last} AND v >= {lo:?} + {step:?} * (guess + 1) THEN guess + 1 \
             ELSE guess END AS BIGINT) AS bin_index FROM (\
             SELECT v, CASE \
             WHEN raw < 0 THEN 0 \
             WHEN raw > {last} THEN {last} \
             ELSE raw END AS guess FROM (\
             SELECT v, FLOOR((v - {lo:?}) / {step:?}) AS raw FROM (\
             SELECT {value} AS v FROM {table} WHERE {filter}\
             ) AS vals) AS quotients) AS guesses\
             ) AS indexed GROUP BY bin_index ORDER BY bin_index",
            value = Self::numeric(column),
            table = self.table_ref(),
            filter = Self::numeric_filter(column),
        )
    }

    /// Counts per truncated date
    pub fn date_bins(&self, column: &str, interval: DateInterval) -> String {
        let c = quote_ident(column);
        format!(
            "SELECT x0, COUNT(*) AS bin_count FROM (\
             SELECT date_trunc('{unit}', CAST({c} AS TIMESTAMP)) AS x0 FROM {table} WHERE {c} IS NOT NULL\
             ) AS truncated GROUP BY x0 ORDER BY x0",
            unit = interval.sql_unit(),
            table = self.table_ref(),
        )
    }

    fn ordinal_groups(&self, column: &str) -> String {
        let c = quote_ident(column);
        format!(
            "SELECT bin_key, COUNT(*) AS bin_count FROM (\
             SELECT CAST({c} AS VARCHAR) AS bin_key FROM {table} WHERE {c} IS NOT NULL\
             ) AS keyed GROUP BY bin_key ORDER BY bin_count DESC, bin_key ASC",
            table = self.table_ref(),
        )
    }

    /// The `limit` highest-count groups
    pub fn ordinal_bins(&self, column: &str, limit: usize) -> String {
        format!("{} LIMIT {limit}", self.ordinal_groups(column))
    }

    /// Total of every group after the first `offset`
    pub fn ordinal_other(&self, column: &str, offset: usize) -> String {
        format!(
            "SELECT COALESCE(SUM(bin_count), 0) AS other_count FROM ({} OFFSET {offset}) AS tail",
            self.ordinal_groups(column)
        )
    }

    fn range_test(column: &str, test: &RangeTest) -> String {
        let value = match test.lower {
            BinValue::Date(_) => format!("CAST({} AS TIMESTAMP)", quote_ident(column)),
            _ => Self::numeric(column),
        };
        let upper_op = if test.closed { "<=" } else { "<" };
        format!(
            "({value} >= {} AND {value} {upper_op} {})",
            bound_literal(&test.lower),
            bound_literal(&test.upper)
        )
    }

    /// Boolean SQL expression for a selection. `None` when nothing can match.
    pub fn predicate(&self, column: &str, predicate: &SelectionPredicate) -> Option<String> {
        let c = quote_ident(column);
        let key = format!("CAST({c} AS VARCHAR)");
        let terms: Vec<String> = match predicate {
            SelectionPredicate::Nothing => vec![],
            SelectionPredicate::Ranges(tests) => tests
                .iter()
                .map(|test| Self::range_test(column, test))
                .collect(),
            SelectionPredicate::Categories {
                keys,
                other_excluding,
            } => {
                let mut terms = vec![];
                if !keys.is_empty() {
                    terms.push(format!("{key} IN ({})", in_list(keys)));
                }
                match other_excluding {
                    Some(kept) if !kept.is_empty() => terms.push(format!(
                        "({c} IS NOT NULL AND {key} NOT IN ({}))",
                        in_list(kept)
                    )),
                    Some(_) => terms.push(format!("{c} IS NOT NULL")),
                    None => {}
                }
                terms
            }
        };
        if terms.is_empty() {
            None
        } else {
            Some(terms.join(" OR "))
        }
    }

    /// All rows matching a selection, in table order
    pub fn select_matching(&self, column: &str, predicate: &SelectionPredicate) -> Option<String> {
        let condition = self.predicate(column, predicate)?;
        Some(format!(
            "SELECT * FROM {} WHERE {condition}",
            self.table_ref()
        ))
    }

    pub fn drop_table(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.table_ref())
    }

    pub fn create_table(&self, schema: &[(String, SqlType)]) -> String {
        let columns = schema
            .iter()
            .map(|(name, sql_type)| format!("{} {sql_type}", quote_ident(name)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE {} ({columns})", self.table_ref())
    }

    pub fn insert_batch(&self, schema: &[(String, SqlType)], rows: &[Vec<String>]) -> String {
        let columns = schema
            .iter()
            .map(|(name, _)| quote_ident(name))
            .collect::<Vec<_>>()
            .join(", ");
        let values = rows
            .iter()
            .map(|row| format!("({})", row.join(", ")))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} ({columns}) VALUES {values}",
            self.table_ref()
        )
    }

    pub fn create_table_as(&self, staging: &str) -> String {
        format!(
            "CREATE TABLE {} AS SELECT * FROM {}",
            self.table_ref(),
            quote_ident(staging)
        )
    }

    pub fn row_count(&self) -> String {
        format!("SELECT COUNT(*) AS row_count FROM {}", self.table_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn builder() -> QueryBuilder {
        QueryBuilder::new("people")
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("age"), "\"age\"");
        assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
    }

    #[test]
    fn test_type_query() {
        assert_eq!(
            builder().type_query("age"),
            "SELECT arrow_typeof(\"age\") AS column_type FROM \"people\" WHERE \"age\" IS NOT NULL LIMIT 1"
        );
    }

    #[test]
    fn test_ordinal_queries() {
        let sql = builder().ordinal_bins("education", 4);
        assert!(sql.contains("CAST(\"education\" AS VARCHAR) AS bin_key"));
        assert!(sql.ends_with("ORDER BY bin_count DESC, bin_key ASC LIMIT 4"));

        let sql = builder().ordinal_other("education", 2);
        assert!(sql.starts_with("SELECT COALESCE(SUM(bin_count), 0) AS other_count FROM (SELECT"));
        assert!(sql.ends_with("bin_key ASC OFFSET 2) AS tail"));
    }

    #[test]
    fn test_numeric_bins_embeds_layout() {
        let layout = BinLayout {
            min: 19.0,
            max: 52.0,
            width: 3.3,
            count: 10,
        };
        let sql = builder().numeric_bins("age", &layout);
        assert!(sql.contains("FLOOR((v - 19.0) / 3.3) AS raw"));
        assert!(sql.contains("WHEN guess > 0 AND v < 19.0 + 3.3 * guess THEN guess - 1"));
        assert!(sql.contains("WHEN guess < 9 AND v >= 19.0 + 3.3 * (guess + 1) THEN guess + 1"));
        assert!(sql.ends_with("GROUP BY bin_index ORDER BY bin_index"));

        let single = BinLayout {
            width: 0.0,
            count: 1,
            ..layout
        };
        let sql = builder().numeric_bins("age", &single);
        assert!(sql.starts_with("SELECT 0 AS bin_index, COUNT(*) AS bin_count FROM"));
        assert!(!sql.contains("FLOOR"));
    }

    #[test]
    fn test_range_predicate() {
        let predicate = SelectionPredicate::Ranges(vec![
            RangeTest {
                lower: BinValue::Number(19.0),
                upper: BinValue::Number(22.3),
                closed: false,
            },
            RangeTest {
                lower: BinValue::Number(48.7),
                upper: BinValue::Number(52.0),
                closed: true,
            },
        ]);
        assert_eq!(
            builder().predicate("age", &predicate).unwrap(),
            "(CAST(\"age\" AS DOUBLE) >= 19.0 AND CAST(\"age\" AS DOUBLE) < 22.3) OR \
             (CAST(\"age\" AS DOUBLE) >= 48.7 AND CAST(\"age\" AS DOUBLE) <= 52.0)"
        );
    }

    #[test]
    fn test_date_predicate() {
        let day = |d| {
            NaiveDate::from_ymd_opt(2024, 1, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        };
        let predicate = SelectionPredicate::Ranges(vec![RangeTest {
            lower: BinValue::Date(day(1)),
            upper: BinValue::Date(day(2)),
            closed: false,
        }]);
        assert_eq!(
            builder().predicate("t", &predicate).unwrap(),
            "(CAST(\"t\" AS TIMESTAMP) >= CAST('2024-01-01T00:00:00.000' AS TIMESTAMP) AND \
             CAST(\"t\" AS TIMESTAMP) < CAST('2024-01-02T00:00:00.000' AS TIMESTAMP))"
        );
    }

    #[test]
    fn test_category_predicate() {
        let predicate = SelectionPredicate::Categories {
            keys: vec!["O'Neil".to_string()],
            other_excluding: Some(vec!["a".to_string(), "b".to_string()]),
        };
        assert_eq!(
            builder().predicate("name", &predicate).unwrap(),
            "CAST(\"name\" AS VARCHAR) IN ('O''Neil') OR \
             (\"name\" IS NOT NULL AND CAST(\"name\" AS VARCHAR) NOT IN ('a', 'b'))"
        );
        assert!(builder()
            .select_matching("name", &SelectionPredicate::Nothing)
            .is_none());
    }

    #[test]
    fn test_table_statements() {
        let schema = vec![
            ("age".to_string(), SqlType::BigInt),
            ("name".to_string(), SqlType::Varchar),
        ];
        assert_eq!(
            builder().create_table(&schema),
            "CREATE TABLE \"people\" (\"age\" BIGINT, \"name\" VARCHAR)"
        );
        let rows = vec![
            vec!["19".to_string(), "'a'".to_string()],
            vec!["NULL".to_string(), "'b'".to_string()],
        ];
        assert_eq!(
            builder().insert_batch(&schema, &rows),
            "INSERT INTO \"people\" (\"age\", \"name\") VALUES (19, 'a'), (NULL, 'b')"
        );
        assert_eq!(builder().drop_table(), "DROP TABLE IF EXISTS \"people\"");
        assert_eq!(
            builder().create_table_as("staging"),
            "CREATE TABLE \"people\" AS SELECT * FROM \"staging\""
        );
    }
}
