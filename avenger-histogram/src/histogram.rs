use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::backend::{ArrayBackend, HistogramBackend, QueryEngineBackend};
use crate::binning::parse_column_type;
use crate::config::{DataFormat, DataSource, HistogramConfig, SelectionMode};
use crate::error::HistogramError;
use crate::events::EventHandlers;
use crate::fetcher::{make_data_fetcher, DataFetcher};
use crate::naming::{TableIdentifier, TimestampTableIdentifier};
use crate::scales::{build_scales, HistogramScales};
use crate::selection::{ModifiersState, Selection, SelectionPredicate, TransitionSequence};
use crate::types::{Bin, BinKey, ColumnType, Record};
use crate::view::{HistogramSnapshot, ViewAdapter};

/// Backends owned by the engine
#[derive(Default)]
struct Backends {
    query: Option<Arc<QueryEngineBackend>>,
    array: Option<Arc<ArrayBackend>>,
}

/// State produced by the latest binning pass and gesture
#[derive(Default)]
struct Published {
    backend: Option<Arc<dyn HistogramBackend>>,
    column_type: Option<ColumnType>,
    bins: Vec<Bin>,
    scales: Option<HistogramScales>,
    selection: Selection,
    hovered: Option<BinKey>,
}

/// A selection that has been installed but whose records are not fetched yet
struct PendingFetch {
    seq: u64,
    backend: Option<Arc<dyn HistogramBackend>>,
    predicate: SelectionPredicate,
}

/// Interactive histogram over one column of a dataset.
///
/// Binning passes are serialized. Each selection gesture is a transition with its
/// own sequence number, and only the latest transition delivers its records to the
/// `selectionChanged` handlers.
pub struct Histogram {
    config: HistogramConfig,
    table_identifier: Arc<dyn TableIdentifier>,
    fetcher: Arc<dyn DataFetcher>,
    backends: tokio::sync::Mutex<Backends>,
    state: Mutex<Published>,
    handlers: EventHandlers,
    sequence: TransitionSequence,
    view: RwLock<Option<Arc<dyn ViewAdapter>>>,
}

impl std::fmt::Debug for Histogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Histogram")
            .field("config", &self.config)
            .field("table_identifier", &self.table_identifier)
            .field("handlers", &self.handlers)
            .finish()
    }
}

impl Histogram {
    pub fn new(config: HistogramConfig) -> Result<Self, HistogramError> {
        config.validate()?;
        Ok(Self {
            config,
            table_identifier: Arc::new(TimestampTableIdentifier::new()),
            fetcher: make_data_fetcher(),
            backends: tokio::sync::Mutex::new(Backends::default()),
            state: Mutex::new(Published::default()),
            handlers: EventHandlers::new(),
            sequence: TransitionSequence::new(),
            view: RwLock::new(None),
        })
    }

    pub fn with_table_identifier(mut self, table_identifier: Arc<dyn TableIdentifier>) -> Self {
        self.table_identifier = table_identifier;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn DataFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn config(&self) -> &HistogramConfig {
        &self.config
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, Published>, HistogramError> {
        self.state
            .lock()
            .map_err(|e| HistogramError::InternalError(format!("histogram state poisoned: {e}")))
    }

    fn plot_size(&self) -> (f32, f32) {
        let margin = &self.config.margin;
        (
            (self.config.width - margin.left - margin.right).max(0.0),
            (self.config.height - margin.top - margin.bottom).max(0.0),
        )
    }

    /// Connect the query engine and load the configured data source.
    ///
    /// Calling this again after success does nothing. On failure everything created
    /// so far is torn down.
    pub async fn initialize(&self) -> Result<(), HistogramError> {
        let result = self.try_initialize().await;
        if let Err(e) = &result {
            log::error!("Histogram initialization failed: {e}");
            self.release().await;
        }
        result
    }

    async fn try_initialize(&self) -> Result<(), HistogramError> {
        {
            let mut backends = self.backends.lock().await;
            if backends.query.is_some() {
                return Ok(());
            }
            let table = self.table_identifier.table_name();
            let backend = QueryEngineBackend::connect(table, self.fetcher.clone()).await?;
            backends.query = Some(Arc::new(backend));
        }
        if let Some(source) = self.config.data_source.clone() {
            self.load(source, self.config.data_format).await?;
        }
        Ok(())
    }

    /// Whether the query engine is connected
    pub async fn is_initialized(&self) -> bool {
        self.backends.lock().await.query.is_some()
    }

    /// Reload the query engine table from `source` and rebin
    pub async fn load(
        &self,
        source: DataSource,
        format: Option<DataFormat>,
    ) -> Result<u64, HistogramError> {
        let backends = self.backends.lock().await;
        let query = backends.query.clone().ok_or_else(|| {
            HistogramError::NotInitialized("initialize() must succeed before loading".to_string())
        })?;
        let rows = query.load(source, format).await?;
        self.rebin(query).await?;
        drop(backends);
        Ok(rows)
    }

    /// Rebin and redraw.
    ///
    /// With `data` the records replace the in-memory dataset and are binned directly.
    /// Without, the query engine table is binned, falling back to the last in-memory
    /// dataset when no engine is connected.
    pub async fn update(&self, data: Option<Vec<Record>>) -> Result<(), HistogramError> {
        let mut backends = self.backends.lock().await;
        let backend: Arc<dyn HistogramBackend> = match data {
            Some(records) => {
                let array = Arc::new(ArrayBackend::new(records));
                backends.array = Some(array.clone());
                array
            }
            None => match (&backends.query, &backends.array) {
                (Some(query), _) => query.clone(),
                (None, Some(array)) => array.clone(),
                (None, None) => {
                    return Err(HistogramError::NotInitialized(
                        "no data: pass records or initialize() with a data source".to_string(),
                    ))
                }
            },
        };
        self.rebin(backend).await
    }

    /// Bin through a caller-provided backend
    pub async fn set_backend(&self, backend: Arc<dyn HistogramBackend>) -> Result<(), HistogramError> {
        let _backends = self.backends.lock().await;
        self.rebin(backend).await
    }

    /// Run a binning pass. Callers hold the backends lock.
    async fn rebin(&self, backend: Arc<dyn HistogramBackend>) -> Result<(), HistogramError> {
        let column = &self.config.column;
        let column_type = match &self.config.column_type {
            Some(name) => parse_column_type(name)?,
            None => backend.type_of(column).await?,
        };
        let bins = backend
            .bin(column, column_type, &self.config.bin_config())
            .await?;
        let (width, height) = self.plot_size();
        let scales = build_scales(&bins, column_type, width, height);
        log::debug!(
            "Binned `{column}` as {column_type} into {} bins with the {} backend",
            bins.len(),
            backend.kind()
        );

        let pending = {
            let mut state = self.lock_state()?;
            let revalidated = state.selection.revalidate(&bins);
            let changed = revalidated != state.selection;
            if let Some(hovered) = &state.hovered {
                if !bins.iter().any(|b| &b.selection_key() == hovered) {
                    state.hovered = None;
                }
            }
            state.backend = Some(backend);
            state.column_type = Some(column_type);
            state.bins = bins;
            state.scales = Some(scales);
            changed.then(|| self.begin_transition(&mut state, revalidated))
        };

        match pending {
            Some(pending) => self.deliver(pending).await,
            None => {
                self.render();
                Ok(())
            }
        }
    }

    /// Clear the selection and rebin from scratch
    pub async fn reset(&self) -> Result<(), HistogramError> {
        self.clear_selection().await?;
        let backends = self.backends.lock().await;
        let backend = self.lock_state()?.backend.clone();
        if let Some(backend) = backend {
            self.rebin(backend).await?;
        }
        drop(backends);
        Ok(())
    }

    /// Drop the table, close the query engine and forget all state, handlers and view.
    ///
    /// Safe to call at any time and more than once.
    pub async fn destroy(&self) {
        self.release().await;
        self.handlers.clear();
        match self.view.write() {
            Ok(mut view) => *view = None,
            Err(e) => log::warn!("View slot poisoned during destroy: {e}"),
        }
    }

    /// Release the data resources. Handlers and the view stay registered.
    async fn release(&self) {
        // Supersede any in-flight selection fetch
        self.sequence.next();
        let query = {
            let mut backends = self.backends.lock().await;
            backends.array = None;
            backends.query.take()
        };
        if let Some(query) = query {
            if let Err(e) = query.drop_table().await {
                log::warn!("Failed to drop table `{}`: {e}", query.table_name());
            }
        }
        match self.state.lock() {
            Ok(mut state) => *state = Published::default(),
            Err(e) => log::warn!("Histogram state poisoned during destroy: {e}"),
        }
    }

    /// Register an event handler. Only `selectionChanged` is published.
    pub fn on<F>(&self, event_name: &str, handler: F) -> Result<(), HistogramError>
    where
        F: Fn(&[Record]) + Send + Sync + 'static,
    {
        self.handlers.register_handler(event_name, handler)
    }

    /// Attach the view that receives a snapshot after every change
    pub fn set_view(&self, view: Arc<dyn ViewAdapter>) {
        match self.view.write() {
            Ok(mut slot) => *slot = Some(view),
            Err(e) => log::error!("View slot poisoned: {e}"),
        }
        self.render();
    }

    /// Current state, or `None` before the first binning pass
    pub fn snapshot(&self) -> Option<HistogramSnapshot> {
        let state = self.lock_state().ok()?;
        let (Some(column_type), Some(scales)) = (state.column_type, state.scales.clone()) else {
            return None;
        };
        Some(HistogramSnapshot::new(
            &self.config,
            column_type,
            state.bins.clone(),
            scales,
            state.selection.clone(),
            state.hovered.clone(),
        ))
    }

    fn render(&self) {
        let view = match self.view.read() {
            Ok(view) => view.clone(),
            Err(_) => None,
        };
        if let (Some(view), Some(snapshot)) = (view, self.snapshot()) {
            view.render(&snapshot);
        }
    }

    /// Track the hovered bin. Hovering is not a selection transition.
    pub fn on_hover(&self, key: Option<BinKey>) -> Result<(), HistogramError> {
        {
            let mut state = self.lock_state()?;
            let key = key.filter(|k| state.bins.iter().any(|b| &b.selection_key() == k));
            if state.hovered == key {
                return Ok(());
            }
            state.hovered = key;
        }
        self.render();
        Ok(())
    }

    pub async fn on_click(
        &self,
        key: BinKey,
        modifiers: ModifiersState,
    ) -> Result<(), HistogramError> {
        let pending = {
            let mut state = self.lock_state()?;
            if !state.bins.iter().any(|b| b.selection_key() == key) {
                log::debug!("Ignoring click on unknown bin {key:?}");
                return Ok(());
            }
            let next = state
                .selection
                .click(key, self.config.selection_mode, modifiers);
            self.begin_transition(&mut state, next)
        };
        self.deliver(pending).await
    }

    /// Brush released over the pixel interval `extent`, or dismissed with `None`.
    /// Only drag mode reacts to brushes.
    pub async fn on_brush_end(&self, extent: Option<(f32, f32)>) -> Result<(), HistogramError> {
        if self.config.selection_mode != SelectionMode::Drag {
            return Ok(());
        }
        let pending = {
            let mut state = self.lock_state()?;
            let Some(scales) = &state.scales else {
                return Ok(());
            };
            let next = Selection::brush(&state.bins, scales, extent, self.config.selection_mode);
            self.begin_transition(&mut state, next)
        };
        self.deliver(pending).await
    }

    pub async fn on_background_click(&self) -> Result<(), HistogramError> {
        self.clear_selection().await
    }

    pub async fn clear_selection(&self) -> Result<(), HistogramError> {
        let pending = {
            let mut state = self.lock_state()?;
            self.begin_transition(&mut state, Selection::Empty)
        };
        self.deliver(pending).await
    }

    /// Install `next` as the selection and number the transition.
    ///
    /// Runs under the state lock so sequence numbers follow the order in which
    /// selections are written.
    fn begin_transition(&self, state: &mut Published, next: Selection) -> PendingFetch {
        state.selection = next;
        PendingFetch {
            seq: self.sequence.next(),
            backend: state.backend.clone(),
            predicate: state.selection.predicate(&state.bins),
        }
    }

    /// Fetch the records of a transition and notify handlers unless a newer
    /// transition started in the meantime
    async fn deliver(&self, pending: PendingFetch) -> Result<(), HistogramError> {
        let PendingFetch {
            seq,
            backend,
            predicate,
        } = pending;
        self.render();

        let records = match (&predicate, backend) {
            (SelectionPredicate::Nothing, _) | (_, None) => vec![],
            (_, Some(backend)) => {
                match backend
                    .records_matching(&self.config.column, &predicate)
                    .await
                {
                    Ok(records) => records,
                    Err(e) if !self.sequence.is_current(seq) => {
                        log::warn!("Ignoring failed fetch of superseded selection {seq}: {e}");
                        return Ok(());
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        if self.sequence.is_current(seq) {
            self.handlers.dispatch_selection(&records);
        } else {
            log::warn!(
                "Discarding {} records of superseded selection {seq}",
                records.len()
            );
        }
        Ok(())
    }
}
