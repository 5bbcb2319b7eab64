use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;
use serde::Serialize;

use crate::config::SelectionMode;
use crate::scales::HistogramScales;
use crate::types::{Bin, BinKey, BinValue, Value};

/// Keyboard modifiers held during a gesture
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ModifiersState {
    pub shift: bool,
    pub control: bool,
    pub alt: bool,
    pub meta: bool,
}

impl ModifiersState {
    /// Whether the modifier that extends a multiple selection is held
    pub fn toggles(&self) -> bool {
        self.control || self.meta
    }
}

/// Set of selected bins, identified by structural key
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    Empty,
    Active {
        keys: IndexSet<BinKey>,
        mode: SelectionMode,
    },
}

impl Selection {
    fn from_keys(keys: IndexSet<BinKey>, mode: SelectionMode) -> Self {
        if keys.is_empty() {
            Selection::Empty
        } else {
            Selection::Active { keys, mode }
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Selection::Empty)
    }

    pub fn keys(&self) -> Vec<&BinKey> {
        match self {
            Selection::Empty => vec![],
            Selection::Active { keys, .. } => keys.iter().collect(),
        }
    }

    pub fn contains(&self, key: &BinKey) -> bool {
        match self {
            Selection::Empty => false,
            Selection::Active { keys, .. } => keys.contains(key),
        }
    }

    /// Transition for a click on the bin identified by `key`.
    ///
    /// Single, drag, and unmodified multiple clicks replace the selection, or clear it
    /// when the bin is already the only one selected. With control or meta held in
    /// multiple mode the bin's membership is toggled.
    pub fn click(&self, key: BinKey, mode: SelectionMode, modifiers: ModifiersState) -> Self {
        if mode == SelectionMode::Multiple && modifiers.toggles() {
            let mut keys = match self {
                Selection::Empty => IndexSet::new(),
                Selection::Active { keys, .. } => keys.clone(),
            };
            if !keys.shift_remove(&key) {
                keys.insert(key);
            }
            return Self::from_keys(keys, mode);
        }

        match self {
            Selection::Active { keys, .. } if keys.len() == 1 && keys.contains(&key) => {
                Selection::Empty
            }
            _ => Self::from_keys(IndexSet::from([key]), mode),
        }
    }

    /// Transition for a released brush covering the pixel interval `extent`.
    ///
    /// Every bin whose pixel extent touches the interval is selected; a `None` extent
    /// clears the selection.
    pub fn brush(
        bins: &[Bin],
        scales: &HistogramScales,
        extent: Option<(f32, f32)>,
        mode: SelectionMode,
    ) -> Self {
        let Some((a, b)) = extent else {
            return Selection::Empty;
        };
        let (lo, hi) = if b < a { (b, a) } else { (a, b) };
        let keys = bins
            .iter()
            .filter(|bin| {
                let (left, right) = scales.bin_extent(bin);
                left <= hi && right >= lo
            })
            .map(Bin::selection_key)
            .collect();
        Self::from_keys(keys, mode)
    }

    /// Drop keys that no longer identify a bin
    pub fn revalidate(&self, bins: &[Bin]) -> Self {
        match self {
            Selection::Empty => Selection::Empty,
            Selection::Active { keys, mode } => {
                let current: IndexSet<BinKey> = bins.iter().map(Bin::selection_key).collect();
                let keys = keys
                    .iter()
                    .filter(|k| current.contains(*k))
                    .cloned()
                    .collect();
                Self::from_keys(keys, *mode)
            }
        }
    }

    /// Selected bins in bin order
    pub fn selected_bins<'a>(&self, bins: &'a [Bin]) -> Vec<&'a Bin> {
        bins.iter()
            .filter(|bin| self.contains(&bin.selection_key()))
            .collect()
    }

    /// Predicate matching the records that fall into the selected bins
    pub fn predicate(&self, bins: &[Bin]) -> SelectionPredicate {
        let selected = self.selected_bins(bins);
        if selected.is_empty() {
            return SelectionPredicate::Nothing;
        }

        if selected.iter().any(|bin| bin.key.is_some()) {
            let keys = selected
                .iter()
                .filter(|bin| !bin.other)
                .filter_map(|bin| bin.key.clone())
                .collect();
            let other_excluding = selected.iter().any(|bin| bin.other).then(|| {
                bins.iter()
                    .filter(|bin| !bin.other)
                    .filter_map(|bin| bin.key.clone())
                    .collect()
            });
            return SelectionPredicate::Categories {
                keys,
                other_excluding,
            };
        }

        let last_key = bins.last().map(Bin::selection_key);
        SelectionPredicate::Ranges(
            selected
                .into_iter()
                .map(|bin| RangeTest {
                    lower: bin.x0.clone(),
                    upper: bin.x1.clone(),
                    closed: matches!(bin.x1, BinValue::Number(_))
                        && Some(bin.selection_key()) == last_key,
                })
                .collect(),
        )
    }
}

/// One bin's range membership test. Half-open unless `closed`.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeTest {
    pub lower: BinValue,
    pub upper: BinValue,
    pub closed: bool,
}

impl RangeTest {
    fn matches(&self, value: &Value) -> bool {
        match (&self.lower, &self.upper) {
            (BinValue::Number(lo), BinValue::Number(hi)) => value
                .as_f64()
                .is_some_and(|v| v >= *lo && (v < *hi || (self.closed && v <= *hi))),
            (BinValue::Date(lo), BinValue::Date(hi)) => value
                .as_date()
                .is_some_and(|v| v >= *lo && (v < *hi || (self.closed && v <= *hi))),
            _ => false,
        }
    }
}

/// Record filter derived from a selection
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionPredicate {
    /// Matches no record
    Nothing,
    /// Disjunction of range tests over a continuous or date column
    Ranges(Vec<RangeTest>),
    /// Ordinal membership. `other_excluding` holds the kept keys when the "Other"
    /// bin is selected; any non-null value outside them matches.
    Categories {
        keys: Vec<String>,
        other_excluding: Option<Vec<String>>,
    },
}

impl SelectionPredicate {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            SelectionPredicate::Nothing => false,
            SelectionPredicate::Ranges(tests) => tests.iter().any(|t| t.matches(value)),
            SelectionPredicate::Categories {
                keys,
                other_excluding,
            } => {
                let Some(key) = value.ordinal_key() else {
                    return false;
                };
                keys.contains(&key)
                    || other_excluding
                        .as_ref()
                        .is_some_and(|kept| !kept.contains(&key))
            }
        }
    }
}

/// Monotonic transition counter. Only the latest transition may publish its result.
#[derive(Debug, Default)]
pub struct TransitionSequence(AtomicU64);

impl TransitionSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new transition, superseding every earlier one
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, seq: u64) -> bool {
        self.current() == seq
    }
}
