use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::SqlDriverError;

use super::bounds::check_range;
use super::dirty::DirtyMark;
use super::kind::{Binary, Character, ContentKind};
use super::{LobBackend, LobRef};

/// Whether a large object still aliases the engine value or owns a private duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobState {
    Shared,
    Private,
}

/// Client view of an engine-held large object with duplicate-on-write updates.
pub struct LargeObject<K: ContentKind> {
    backend: Arc<dyn LobBackend>,
    original: LobRef,
    private: Option<LobRef>,
    freed: bool,
    // Set for objects this client allocated; shared result values belong to the engine.
    owns_original: bool,
    owner: Option<DirtyMark>,
    _kind: PhantomData<K>,
}

/// Binary large object.
pub type Blob = LargeObject<Binary>;

/// Character large object.
pub type Clob = LargeObject<Character>;

impl<K: ContentKind> LargeObject<K> {
    /// Wrap an engine-held object, for example one returned in a result row.
    ///
    /// # Errors
    /// Returns [`SqlDriverError::TypeConversion`] if `lob` is of the other content kind.
    pub fn open(backend: Arc<dyn LobBackend>, lob: LobRef) -> Result<Self, SqlDriverError> {
        if lob.kind != K::KIND {
            return Err(SqlDriverError::conversion(K::TYPE_NAME, "lob of the other kind"));
        }
        Ok(Self {
            backend,
            original: lob,
            private: None,
            freed: false,
            owns_original: false,
            owner: None,
            _kind: PhantomData,
        })
    }

    /// Mark the object as allocated by this client so `free` releases it on the engine.
    pub(crate) fn owned(mut self) -> Self {
        self.owns_original = true;
        self
    }

    /// Attach the row column that owns this object; duplicates are reported to it.
    #[must_use]
    pub fn with_owner(mut self, owner: DirtyMark) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Handle that reads and writes currently target.
    #[must_use]
    pub fn handle(&self) -> LobRef {
        self.private.unwrap_or(self.original)
    }

    /// Handle of the engine value this object was opened on.
    #[must_use]
    pub fn original(&self) -> LobRef {
        self.original
    }

    #[must_use]
    pub fn state(&self) -> LobState {
        if self.private.is_some() {
            LobState::Private
        } else {
            LobState::Shared
        }
    }

    #[must_use]
    pub fn is_freed(&self) -> bool {
        self.freed
    }

    /// Current length in units of the kind.
    ///
    /// # Errors
    /// Returns [`SqlDriverError::LobClosed`] after `free`.
    pub fn length(&self) -> Result<u64, SqlDriverError> {
        self.ensure_open()?;
        Ok(self.handle().length)
    }

    /// Read `length` units from the 0-based `position`. Never duplicates.
    ///
    /// # Errors
    /// Returns [`SqlDriverError::LobClosed`] after `free`, [`SqlDriverError::LobBounds`] for a
    /// range outside the object, or any backend error.
    pub fn read(&self, position: i64, length: i64) -> Result<K::Owned, SqlDriverError> {
        self.ensure_open()?;
        let current = self.handle();
        check_range(position, length, current.length)?;
        tracing::trace!(lob = %current.id, position, length, "lob read");
        let payload =
            self.backend
                .read_lob(current, position.unsigned_abs(), length.unsigned_abs())?;
        K::from_payload(payload)
    }

    /// Read the whole object.
    ///
    /// # Errors
    /// Same as [`LargeObject::read`].
    pub fn read_all(&self) -> Result<K::Owned, SqlDriverError> {
        let length = i64::try_from(self.length()?).unwrap_or(i64::MAX);
        self.read(0, length)
    }

    /// Write `data` at the 0-based `position`, which may be at most the current length; the
    /// object grows when the data runs past its end.
    ///
    /// Returns the handle now holding the update: a fresh private duplicate on the first
    /// mutation of a cycle, the same private handle afterwards.
    ///
    /// # Errors
    /// Returns [`SqlDriverError::LobClosed`] after `free`, [`SqlDriverError::LobBounds`] for a
    /// position outside the object, or any backend error.
    pub fn write(&mut self, position: i64, data: &K::Slice) -> Result<LobRef, SqlDriverError> {
        self.ensure_open()?;
        check_range(position, 0, self.handle().length)?;
        let target = self.ensure_private()?;
        tracing::trace!(lob = %target.id, position, units = K::units(data), "lob write");
        let length = self
            .backend
            .write_lob(target, position.unsigned_abs(), K::to_payload(data))?;
        Ok(self.update_private(LobRef { length, ..target }))
    }

    /// Cut the object to `length` units, which may not exceed the current length.
    ///
    /// # Errors
    /// Returns [`SqlDriverError::LobClosed`] after `free`, [`SqlDriverError::LobBounds`] for a
    /// negative or too large length, or any backend error.
    pub fn truncate(&mut self, length: i64) -> Result<LobRef, SqlDriverError> {
        self.ensure_open()?;
        check_range(0, length, self.handle().length)?;
        let target = self.ensure_private()?;
        let length = length.unsigned_abs();
        tracing::trace!(lob = %target.id, length, "lob truncate");
        self.backend.truncate_lob(target, length)?;
        Ok(self.update_private(LobRef { length, ..target }))
    }

    /// Abandon the pending update: release the private duplicate and return the original.
    ///
    /// # Errors
    /// Returns [`SqlDriverError::LobClosed`] after `free`, or the backend error from releasing
    /// the duplicate.
    pub fn clear_updates(&mut self) -> Result<LobRef, SqlDriverError> {
        self.ensure_open()?;
        if let Some(private) = self.private.take() {
            if let Some(owner) = &self.owner {
                owner.unset();
            }
            self.backend.free_lob(private)?;
        }
        Ok(self.original)
    }

    /// Accept the pending update: the private duplicate becomes the shared baseline, and the
    /// next mutation starts a new cycle.
    ///
    /// The duplicate was allocated by this object, so it is released by `free`. A replaced
    /// baseline is released now if this object had allocated it.
    ///
    /// # Errors
    /// Returns [`SqlDriverError::LobClosed`] after `free`, or the backend error from releasing
    /// the replaced baseline.
    pub fn commit_updates(&mut self) -> Result<LobRef, SqlDriverError> {
        self.ensure_open()?;
        if let Some(private) = self.private.take() {
            if let Some(owner) = &self.owner {
                owner.unset();
            }
            let previous = std::mem::replace(&mut self.original, private);
            if std::mem::replace(&mut self.owns_original, true) {
                self.backend.free_lob(previous)?;
            }
        }
        Ok(self.original)
    }

    /// Make the object permanently unusable. A second call does nothing.
    ///
    /// # Errors
    /// Returns the first backend error from releasing a private duplicate or a client-allocated
    /// object. Both releases are attempted and the object is closed regardless.
    pub fn free(&mut self) -> Result<(), SqlDriverError> {
        if self.freed {
            return Ok(());
        }
        self.freed = true;
        if let Some(owner) = &self.owner {
            owner.unset();
        }
        let private = self
            .private
            .take()
            .map_or(Ok(()), |private| self.backend.free_lob(private));
        let original = if self.owns_original {
            self.backend.free_lob(self.original)
        } else {
            Ok(())
        };
        private.and(original)
    }

    fn ensure_open(&self) -> Result<(), SqlDriverError> {
        if self.freed {
            Err(SqlDriverError::LobClosed)
        } else {
            Ok(())
        }
    }

    fn ensure_private(&mut self) -> Result<LobRef, SqlDriverError> {
        if let Some(private) = self.private {
            return Ok(private);
        }
        let duplicate = self.backend.duplicate_lob(self.original)?;
        tracing::trace!(original = %self.original.id, duplicate = %duplicate.id, "lob duplicated");
        Ok(self.update_private(duplicate))
    }

    fn update_private(&mut self, lob: LobRef) -> LobRef {
        self.private = Some(lob);
        if let Some(owner) = &self.owner {
            owner.set(lob);
        }
        lob
    }
}

impl<K: ContentKind> fmt::Debug for LargeObject<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LargeObject")
            .field("kind", &K::KIND)
            .field("original", &self.original)
            .field("private", &self.private)
            .field("freed", &self.freed)
            .finish_non_exhaustive()
    }
}

impl Blob {
    /// Read `length` bytes from the 0-based `position`.
    ///
    /// # Errors
    /// Same as [`LargeObject::read`].
    pub fn bytes(&self, position: i64, length: i64) -> Result<Vec<u8>, SqlDriverError> {
        self.read(position, length)
    }

    /// Overwrite bytes from the 0-based `position`.
    ///
    /// # Errors
    /// Same as [`LargeObject::write`].
    pub fn set_bytes(&mut self, position: i64, data: &[u8]) -> Result<LobRef, SqlDriverError> {
        self.write(position, data)
    }
}

impl Clob {
    /// Read `length` characters from the 0-based `position`.
    ///
    /// # Errors
    /// Same as [`LargeObject::read`].
    pub fn substring(&self, position: i64, length: i64) -> Result<String, SqlDriverError> {
        self.read(position, length)
    }

    /// Overwrite characters from the 0-based `position`.
    ///
    /// # Errors
    /// Same as [`LargeObject::write`].
    pub fn set_string(&mut self, position: i64, text: &str) -> Result<LobRef, SqlDriverError> {
        self.write(position, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lob::{DirtyColumns, LobId, LobPayload, MemoryLobStore};
    use std::sync::Mutex;

    fn shared_blob(len: usize) -> (Arc<MemoryLobStore>, Blob) {
        let store = Arc::new(MemoryLobStore::new());
        let lob = store
            .create_lob(LobPayload::Binary((0..len as u8).collect()))
            .unwrap();
        let blob = Blob::open(store.clone(), lob).unwrap();
        (store, blob)
    }

    #[test]
    fn first_write_duplicates_once() {
        let (_store, mut blob) = shared_blob(10);
        let original = blob.handle();
        let first = blob.set_bytes(2, &[0xAA, 0xBB]).unwrap();
        assert_ne!(first.id, original.id);
        assert_eq!(blob.state(), LobState::Private);
        let second = blob.set_bytes(5, &[0xCC]).unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(blob.bytes(0, 6).unwrap(), vec![0, 1, 0xAA, 0xBB, 4, 0xCC]);
    }

    #[test]
    fn original_untouched_by_writes() {
        let (store, mut blob) = shared_blob(4);
        let original = blob.handle();
        blob.set_bytes(0, &[9, 9]).unwrap();
        assert_eq!(
            store.contents(original.id),
            Some(LobPayload::Binary(vec![0, 1, 2, 3]))
        );
    }

    #[test]
    fn clear_updates_restores_original() {
        let (store, mut blob) = shared_blob(10);
        let original = blob.handle();
        let private = blob.set_bytes(2, &[1]).unwrap();
        assert_eq!(blob.clear_updates().unwrap(), original);
        assert_eq!(blob.state(), LobState::Shared);
        assert!(store.contents(private.id).is_none());
    }

    #[test]
    fn reads_do_not_duplicate() {
        let (store, blob) = shared_blob(10);
        let before = store.live_objects();
        blob.bytes(0, 10).unwrap();
        assert_eq!(store.live_objects(), before);
        assert_eq!(blob.state(), LobState::Shared);
    }

    #[test]
    fn write_may_extend_but_not_leave_gap() {
        let (_store, mut blob) = shared_blob(4);
        let lob = blob.set_bytes(4, &[7, 7]).unwrap();
        assert_eq!(lob.length, 6);
        assert!(matches!(
            blob.set_bytes(7, &[1]),
            Err(SqlDriverError::LobBounds { .. })
        ));
    }

    #[test]
    fn truncate_checks_bounds() {
        let (_store, mut blob) = shared_blob(10);
        assert!(blob.truncate(11).is_err());
        let lob = blob.truncate(3).unwrap();
        assert_eq!(lob.length, 3);
        assert_eq!(blob.read_all().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn free_is_idempotent_and_closes() {
        let (_store, mut blob) = shared_blob(10);
        blob.free().unwrap();
        blob.free().unwrap();
        assert!(matches!(blob.bytes(0, 1), Err(SqlDriverError::LobClosed)));
        assert!(matches!(
            blob.set_bytes(0, &[1]),
            Err(SqlDriverError::LobClosed)
        ));
        assert!(matches!(blob.clear_updates(), Err(SqlDriverError::LobClosed)));
    }

    #[test]
    fn clob_counts_characters() {
        let store = Arc::new(MemoryLobStore::new());
        let lob = store
            .create_lob(LobPayload::Character("héllo wörld".into()))
            .unwrap();
        let mut clob = Clob::open(store, lob).unwrap();
        assert_eq!(clob.length().unwrap(), 11);
        assert_eq!(clob.substring(6, 5).unwrap(), "wörld");
        clob.set_string(1, "e").unwrap();
        assert_eq!(clob.read_all().unwrap(), "hello wörld");
        assert!(clob.substring(6, 6).is_err());
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let store = Arc::new(MemoryLobStore::new());
        let lob = store.create_lob(LobPayload::Character("x".into())).unwrap();
        assert!(matches!(
            Blob::open(store, lob),
            Err(SqlDriverError::TypeConversion { .. })
        ));
    }

    #[test]
    fn owner_tracks_private_handle() {
        let (_store, blob) = shared_blob(10);
        let columns = DirtyColumns::new();
        let mut blob = blob.with_owner(columns.mark(3));
        assert!(columns.is_empty());
        let private = blob.set_bytes(0, &[1]).unwrap();
        assert_eq!(columns.get(3), Some(private));
        blob.clear_updates().unwrap();
        assert!(columns.get(3).is_none());
    }

    #[test]
    fn commit_starts_new_cycle() {
        let (_store, mut blob) = shared_blob(10);
        let first = blob.set_bytes(0, &[1]).unwrap();
        assert_eq!(blob.commit_updates().unwrap(), first);
        assert_eq!(blob.state(), LobState::Shared);
        let second = blob.set_bytes(0, &[2]).unwrap();
        assert_ne!(second.id, first.id);
    }

    /// Store whose release of one object always fails.
    struct StickyStore {
        inner: MemoryLobStore,
        sticky: Mutex<Option<LobId>>,
    }

    impl LobBackend for StickyStore {
        fn create_lob(&self, payload: LobPayload) -> Result<LobRef, SqlDriverError> {
            self.inner.create_lob(payload)
        }

        fn duplicate_lob(&self, lob: LobRef) -> Result<LobRef, SqlDriverError> {
            let duplicate = self.inner.duplicate_lob(lob)?;
            *self.sticky.lock().unwrap() = Some(duplicate.id);
            Ok(duplicate)
        }

        fn read_lob(
            &self,
            lob: LobRef,
            position: u64,
            length: u64,
        ) -> Result<LobPayload, SqlDriverError> {
            self.inner.read_lob(lob, position, length)
        }

        fn write_lob(
            &self,
            lob: LobRef,
            position: u64,
            payload: LobPayload,
        ) -> Result<u64, SqlDriverError> {
            self.inner.write_lob(lob, position, payload)
        }

        fn truncate_lob(&self, lob: LobRef, length: u64) -> Result<(), SqlDriverError> {
            self.inner.truncate_lob(lob, length)
        }

        fn free_lob(&self, lob: LobRef) -> Result<(), SqlDriverError> {
            if *self.sticky.lock().unwrap() == Some(lob.id) {
                return Err(SqlDriverError::Protocol("release refused".into()));
            }
            self.inner.free_lob(lob)
        }
    }

    #[test]
    fn free_releases_original_when_duplicate_release_fails() {
        let store = Arc::new(StickyStore {
            inner: MemoryLobStore::new(),
            sticky: Mutex::new(None),
        });
        let lob = store.create_lob(LobPayload::Binary(vec![1, 2])).unwrap();
        let mut blob = Blob::open(store.clone(), lob).unwrap().owned();
        blob.set_bytes(0, &[9]).unwrap();

        assert!(matches!(blob.free(), Err(SqlDriverError::Protocol(_))));
        assert!(blob.is_freed());
        assert!(store.inner.contents(lob.id).is_none());
        assert!(blob.free().is_ok());
    }

    #[test]
    fn commit_releases_replaced_client_object() {
        let (store, blob) = shared_blob(3);
        let mut blob = blob.owned();
        let original = blob.handle();
        blob.set_bytes(0, &[5]).unwrap();
        blob.commit_updates().unwrap();
        assert!(store.contents(original.id).is_none());
        assert_eq!(store.live_objects(), 1);
        blob.free().unwrap();
        assert_eq!(store.live_objects(), 0);
    }
}
