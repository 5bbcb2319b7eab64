use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Produces the name of the table a histogram loads its data into
pub trait TableIdentifier: Debug + Send + Sync {
    fn table_name(&self) -> String;
}

/// Names of the form `histogram_<millis>_<n>`, unique within a process
#[derive(Debug, Default)]
pub struct TimestampTableIdentifier {
    counter: AtomicU64,
}

impl TimestampTableIdentifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TableIdentifier for TimestampTableIdentifier {
    fn table_name(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("histogram_{millis}_{n}")
    }
}

/// Always the same name, for reproducible tests and scripted use
#[derive(Debug, Clone)]
pub struct FixedTableIdentifier(pub String);

impl FixedTableIdentifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl TableIdentifier for FixedTableIdentifier {
    fn table_name(&self) -> String {
        self.0.clone()
    }
}

/// Name of the transient table a file is staged in before it is copied
pub fn staging_name(table: &str) -> String {
    format!("{table}_staging")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_names_are_unique() {
        let identifier = TimestampTableIdentifier::new();
        let a = identifier.table_name();
        let b = identifier.table_name();
        assert_ne!(a, b);
        assert!(a.starts_with("histogram_"));
    }

    #[test]
    fn test_fixed_name() {
        assert_eq!(FixedTableIdentifier::new("people").table_name(), "people");
        assert_eq!(staging_name("people"), "people_staging");
    }
}
