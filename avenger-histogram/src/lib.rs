pub mod backend;
pub mod binning;
pub mod classify;
pub mod config;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod histogram;
pub mod loader;
pub mod naming;
pub mod query;
pub mod scales;
pub mod selection;
pub mod types;
pub mod view;

pub use config::HistogramConfig;
pub use error::HistogramError;
pub use histogram::Histogram;
pub use types::{record, Bin, BinKey, BinValue, ColumnType, Record, Value};
