use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::LobRef;

/// Columns of one result row whose large objects hold uncommitted private copies.
///
/// Cloning shares the same set.
#[derive(Debug, Clone, Default)]
pub struct DirtyColumns {
    inner: Arc<Mutex<BTreeMap<usize, LobRef>>>,
}

impl DirtyColumns {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ownership mark for the 1-based `column`, handed to the large object bound to it.
    #[must_use]
    pub fn mark(&self, column: usize) -> DirtyMark {
        DirtyMark {
            columns: self.clone(),
            column,
        }
    }

    /// Private handle currently pending for `column`.
    #[must_use]
    pub fn get(&self, column: usize) -> Option<LobRef> {
        self.lock().get(&column).copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Forget every pending column.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<usize, LobRef>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Links a large object to the row column that owns it.
#[derive(Debug, Clone)]
pub struct DirtyMark {
    columns: DirtyColumns,
    column: usize,
}

impl DirtyMark {
    #[must_use]
    pub fn column(&self) -> usize {
        self.column
    }

    pub(super) fn set(&self, lob: LobRef) {
        self.columns.lock().insert(self.column, lob);
    }

    pub(super) fn unset(&self) {
        self.columns.lock().remove(&self.column);
    }
}
