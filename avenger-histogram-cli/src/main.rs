use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use avenger_histogram::config::{BinThreshold, DataFormat, DataSource, SelectionMode};
use avenger_histogram::selection::ModifiersState;
use avenger_histogram::view::HistogramSnapshot;
use avenger_histogram::{Bin, BinKey, Histogram, HistogramConfig, HistogramError, Record};

use clap::{Args, Parser, Subcommand};
use log::{info, warn};

/// Bin a column of a dataset and select records through its bins
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Path or http(s) URL of the dataset
    #[arg(short, long)]
    source: Option<String>,

    /// Dataset format (csv, parquet or json), inferred from the extension when omitted
    #[arg(short, long)]
    format: Option<DataFormat>,

    /// Column to bin
    #[arg(short, long)]
    column: Option<String>,

    /// Number of equal-width bins for numeric columns
    #[arg(long, conflicts_with = "bin_width")]
    bins: Option<usize>,

    /// Width of each bin for numeric columns
    #[arg(long)]
    bin_width: Option<f64>,

    /// Maximum number of bars for categorical columns
    #[arg(long)]
    max_ordinal_bins: Option<usize>,

    /// Bin the column as this type (continuous, ordinal or date) instead of detecting it
    #[arg(long)]
    column_type: Option<String>,

    /// JSON configuration file; other arguments override its values
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the bins of a column with their labels and bar geometry
    Bins {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Select bins and print the records that fall into them
    Select {
        #[command(flatten)]
        source: SourceArgs,

        /// Pixel interval of a brush over the plot area
        #[arg(long, num_args = 2, value_names = ["LEFT", "RIGHT"], conflicts_with = "key")]
        brush: Option<Vec<f32>>,

        /// Bin to select: a category, "Other", or a bin's lower bound. Repeat to select several.
        #[arg(short, long)]
        key: Vec<String>,

        /// Print the matching records as JSON
        #[arg(long)]
        json: bool,
    },
}

impl SourceArgs {
    fn into_config(self) -> Result<HistogramConfig, HistogramError> {
        let mut config = match &self.config {
            Some(path) => HistogramConfig::from_json_file(path)?,
            None => HistogramConfig::new(self.column.clone().unwrap_or_default()),
        };
        if let Some(column) = self.column {
            config.column = column;
        }
        if let Some(count) = self.bins {
            config = config.with_bin_threshold(BinThreshold::Count(count));
        }
        if let Some(width) = self.bin_width {
            config = config.with_bin_threshold(BinThreshold::Width(width));
        }
        if let Some(max_ordinal_bins) = self.max_ordinal_bins {
            config = config.with_max_ordinal_bins(max_ordinal_bins);
        }
        if let Some(column_type) = self.column_type {
            config = config.with_column_type(column_type);
        }
        match self.source {
            Some(source) => {
                let source: DataSource = serde_json::from_value(serde_json::Value::String(source))?;
                config = config.with_data_source(source, self.format);
            }
            None if self.format.is_some() => config.data_format = self.format,
            None => {}
        }
        if config.data_source.is_none() {
            return Err(HistogramError::ConfigError(
                "no dataset: pass --source or set `dataSource` in the config file".to_string(),
            ));
        }
        Ok(config)
    }
}

async fn open(config: HistogramConfig) -> Result<Histogram, HistogramError> {
    let histogram = Histogram::new(config)?;
    histogram.initialize().await?;
    Ok(histogram)
}

fn current_snapshot(histogram: &Histogram) -> Result<HistogramSnapshot, HistogramError> {
    histogram
        .snapshot()
        .ok_or_else(|| HistogramError::InternalError("histogram has no bins".to_string()))
}

/// Resolve a user-supplied bin name against the current bins
fn find_key(bins: &[Bin], value: &str) -> Option<BinKey> {
    bins.iter()
        .find(|bin| match &bin.key {
            Some(key) => key == value,
            None => bin.x0.to_string() == value,
        })
        .map(Bin::selection_key)
}

async fn run_bins(source: SourceArgs) -> Result<(), HistogramError> {
    let histogram = open(source.into_config()?).await?;
    let snapshot = current_snapshot(&histogram)?;
    info!(
        "Binned `{}` as {} into {} bins",
        snapshot.column,
        snapshot.column_type,
        snapshot.bins.len()
    );

    let output = serde_json::json!({
        "column": snapshot.column,
        "columnType": snapshot.column_type,
        "bins": snapshot.bins,
        "bars": snapshot.bars,
        "xTicks": snapshot.x_ticks,
        "yTicks": snapshot.y_ticks,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    histogram.destroy().await;
    Ok(())
}

async fn run_select(
    source: SourceArgs,
    brush: Option<Vec<f32>>,
    keys: Vec<String>,
    json: bool,
) -> Result<(), HistogramError> {
    let mut config = source.into_config()?;
    config.selection_mode = match (&brush, keys.len()) {
        (Some(_), _) => SelectionMode::Drag,
        (None, 0) => {
            return Err(HistogramError::ConfigError(
                "pass --brush or at least one --key".to_string(),
            ))
        }
        (None, 1) => config.selection_mode,
        (None, _) => SelectionMode::Multiple,
    };

    let histogram = open(config).await?;
    let selected: Arc<Mutex<Vec<Record>>> = Arc::new(Mutex::new(vec![]));
    let sink = selected.clone();
    histogram.on("selectionChanged", move |records| {
        if let Ok(mut slot) = sink.lock() {
            *slot = records.to_vec();
        }
    })?;

    let snapshot = current_snapshot(&histogram)?;
    match brush.as_deref() {
        Some(&[left, right]) => histogram.on_brush_end(Some((left, right))).await?,
        Some(_) => {
            return Err(HistogramError::ConfigError(
                "--brush takes a left and a right pixel position".to_string(),
            ))
        }
        None => {
            let modifiers = ModifiersState {
                control: keys.len() > 1,
                ..Default::default()
            };
            for value in &keys {
                match find_key(&snapshot.bins, value) {
                    Some(key) => histogram.on_click(key, modifiers).await?,
                    None => warn!("No bin named `{value}` in column `{}`", snapshot.column),
                }
            }
        }
    }

    let selected_bins = current_snapshot(&histogram)?
        .selected_bins()
        .iter()
        .map(|bin| bin.label(snapshot.column_type))
        .collect::<Vec<_>>();
    let records = selected.lock().map(|r| r.clone()).unwrap_or_default();
    println!(
        "{} records in [{}]",
        records.len(),
        selected_bins.join(", ")
    );
    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    }
    histogram.destroy().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), HistogramError> {
    // Setup logger
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Bins { source } => run_bins(source).await,
        Commands::Select {
            source,
            brush,
            key,
            json,
        } => run_select(source, brush, key, json).await,
    }
}
