use std::str::FromStr;
use std::sync::{Arc, RwLock};

use crate::error::HistogramError;
use crate::types::Record;

/// Events a histogram publishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
pub enum HistogramEvent {
    /// Fired once per selection transition with the matching records
    #[strum(serialize = "selectionChanged")]
    SelectionChanged,
}

pub type SelectionHandler = Arc<dyn Fn(&[Record]) + Send + Sync>;

/// Registered event handlers
#[derive(Default)]
pub struct EventHandlers {
    selection_changed: RwLock<Vec<SelectionHandler>>,
}

impl std::fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.selection_changed.read().map(|h| h.len()).unwrap_or(0);
        f.debug_struct("EventHandlers")
            .field("selection_changed", &count)
            .finish()
    }
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for the event called `name`
    pub fn register_handler<F>(&self, name: &str, handler: F) -> Result<(), HistogramError>
    where
        F: Fn(&[Record]) + Send + Sync + 'static,
    {
        let event = HistogramEvent::from_str(name)
            .map_err(|_| HistogramError::UnknownEvent(name.to_string()))?;
        match event {
            HistogramEvent::SelectionChanged => self
                .selection_changed
                .write()
                .map_err(|e| HistogramError::InternalError(e.to_string()))?
                .push(Arc::new(handler)),
        }
        Ok(())
    }

    /// Deliver `records` to every selection handler
    pub fn dispatch_selection(&self, records: &[Record]) {
        // Handlers run outside the lock so they may register further handlers
        let handlers: Vec<SelectionHandler> = match self.selection_changed.read() {
            Ok(handlers) => handlers.clone(),
            Err(e) => {
                log::error!("Selection handlers unavailable: {e}");
                return;
            }
        };
        for handler in handlers {
            handler(records);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut handlers) = self.selection_changed.write() {
            handlers.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::record;
    use std::sync::Mutex;

    #[test]
    fn test_dispatch_selection() {
        let handlers = EventHandlers::new();
        let seen = Arc::new(Mutex::new(vec![]));
        let sink = seen.clone();
        handlers
            .register_handler("selectionChanged", move |records| {
                sink.lock().unwrap().push(records.len());
            })
            .unwrap();

        handlers.dispatch_selection(&[record([("a", 1)]), record([("a", 2)])]);
        handlers.dispatch_selection(&[]);
        assert_eq!(*seen.lock().unwrap(), vec![2, 0]);
    }

    #[test]
    fn test_unknown_event() {
        let handlers = EventHandlers::new();
        let result = handlers.register_handler("brushed", |_| {});
        assert!(matches!(result, Err(HistogramError::UnknownEvent(name)) if name == "brushed"));
    }

    #[test]
    fn test_event_names() {
        assert_eq!(HistogramEvent::SelectionChanged.to_string(), "selectionChanged");
    }
}
