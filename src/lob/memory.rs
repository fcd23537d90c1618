use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::error::SqlDriverError;

use super::{LobBackend, LobId, LobKind, LobPayload, LobRef};

/// In-process large-object storage.
///
/// Ids are allocated from 1 upward and never reused. Unknown ids report
/// [`SqlDriverError::LobClosed`].
#[derive(Debug)]
pub struct MemoryLobStore {
    objects: Mutex<HashMap<LobId, LobPayload>>,
    next_id: AtomicU64,
}

impl Default for MemoryLobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLobStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Copy of the stored content, `None` once freed.
    #[must_use]
    pub fn contents(&self, id: LobId) -> Option<LobPayload> {
        self.lock().get(&id).cloned()
    }

    /// Number of objects not yet freed.
    #[must_use]
    pub fn live_objects(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<LobId, LobPayload>> {
        match self.objects.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn allocate(&self, payload: LobPayload) -> LobRef {
        let id = LobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let lob = LobRef {
            id,
            kind: payload.kind(),
            length: payload.units(),
        };
        self.lock().insert(id, payload);
        lob
    }
}

fn to_index(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

fn kind_mismatch(lob: LobRef) -> SqlDriverError {
    let type_name = match lob.kind {
        LobKind::Binary => "BLOB",
        LobKind::Character => "CLOB",
    };
    SqlDriverError::conversion(type_name, "lob of the other kind")
}

/// Overwrite `base` from `position`, growing it as needed.
fn splice<T: Clone + Default>(base: &mut Vec<T>, position: usize, data: &[T]) {
    let end = position.saturating_add(data.len());
    if base.len() < end {
        base.resize(end, T::default());
    }
    base[position..end].clone_from_slice(data);
}

fn window<T>(items: &[T], position: u64, length: u64) -> Option<&[T]> {
    let start = to_index(position);
    let end = start.checked_add(to_index(length))?;
    items.get(start..end)
}

impl LobBackend for MemoryLobStore {
    fn create_lob(&self, payload: LobPayload) -> Result<LobRef, SqlDriverError> {
        Ok(self.allocate(payload))
    }

    fn duplicate_lob(&self, lob: LobRef) -> Result<LobRef, SqlDriverError> {
        let payload = self.contents(lob.id).ok_or(SqlDriverError::LobClosed)?;
        Ok(self.allocate(payload))
    }

    fn read_lob(
        &self,
        lob: LobRef,
        position: u64,
        length: u64,
    ) -> Result<LobPayload, SqlDriverError> {
        let objects = self.lock();
        let stored = objects.get(&lob.id).ok_or(SqlDriverError::LobClosed)?;
        let out_of_range = || SqlDriverError::LobBounds {
            position: i64::try_from(position).unwrap_or(i64::MAX),
            length: i64::try_from(length).unwrap_or(i64::MAX),
            total: stored.units(),
        };
        match stored {
            LobPayload::Binary(bytes) => window(bytes, position, length)
                .map(|slice| LobPayload::Binary(slice.to_vec()))
                .ok_or_else(out_of_range),
            LobPayload::Character(text) => {
                let chars: Vec<char> = text.chars().collect();
                window(&chars, position, length)
                    .map(|slice| LobPayload::Character(slice.iter().collect()))
                    .ok_or_else(out_of_range)
            }
        }
    }

    fn write_lob(
        &self,
        lob: LobRef,
        position: u64,
        payload: LobPayload,
    ) -> Result<u64, SqlDriverError> {
        let mut objects = self.lock();
        let stored = objects.get_mut(&lob.id).ok_or(SqlDriverError::LobClosed)?;
        let position = to_index(position);
        match (stored, payload) {
            (LobPayload::Binary(bytes), LobPayload::Binary(data)) => {
                splice(bytes, position, &data);
                Ok(bytes.len() as u64)
            }
            (LobPayload::Character(text), LobPayload::Character(data)) => {
                let mut chars: Vec<char> = text.chars().collect();
                let data: Vec<char> = data.chars().collect();
                splice(&mut chars, position, &data);
                *text = chars.iter().collect();
                Ok(chars.len() as u64)
            }
            _ => Err(kind_mismatch(lob)),
        }
    }

    fn truncate_lob(&self, lob: LobRef, length: u64) -> Result<(), SqlDriverError> {
        let mut objects = self.lock();
        let stored = objects.get_mut(&lob.id).ok_or(SqlDriverError::LobClosed)?;
        let length = to_index(length);
        match stored {
            LobPayload::Binary(bytes) => bytes.truncate(length),
            LobPayload::Character(text) => {
                if let Some((cut, _)) = text.char_indices().nth(length) {
                    text.truncate(cut);
                }
            }
        }
        Ok(())
    }

    fn free_lob(&self, lob: LobRef) -> Result<(), SqlDriverError> {
        self.lock().remove(&lob.id);
        Ok(())
    }
}
