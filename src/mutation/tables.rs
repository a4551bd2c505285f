use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::{RowKey, TableRegistry};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct TableView {
    selected: BTreeSet<RowKey>,
    redraws: u64,
}

/// Table registry kept in memory: a row selection and a redraw counter per
/// table id.
#[derive(Debug, Default)]
pub struct InMemoryTables {
    views: Mutex<BTreeMap<String, TableView>>,
}

impl InMemoryTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&self, table_id: &str, rows: impl IntoIterator<Item = RowKey>) {
        let mut views = self.lock();
        let view = views.entry(table_id.to_owned()).or_default();
        view.selected = rows.into_iter().collect();
    }

    /// Clears the selection only while it still equals `rows`, so a newer
    /// selection made in the meantime survives.
    pub fn clear_selection_matching(&self, table_id: &str, rows: &BTreeSet<RowKey>) -> bool {
        match self.lock().get_mut(table_id) {
            Some(view) if view.selected == *rows => {
                view.selected.clear();
                true
            }
            _ => false,
        }
    }

    pub fn redraw_count(&self, table_id: &str) -> u64 {
        self.lock().get(table_id).map_or(0, |view| view.redraws)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, TableView>> {
        self.views.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TableRegistry for InMemoryTables {
    fn selected_row_keys(&self, table_id: &str) -> BTreeSet<RowKey> {
        self.lock()
            .get(table_id)
            .map(|view| view.selected.clone())
            .unwrap_or_default()
    }

    fn redraw(&self, table_id: &str) {
        let mut views = self.lock();
        let view = views.entry(table_id.to_owned()).or_default();
        view.redraws = view.redraws.saturating_add(1);
        debug!(table_id, redraws = view.redraws, "table redraw requested");
    }
}
