//! # Shared Sheet
//!
//! Thread-safe handle for hosts that touch one sheet from several threads.
//!
//! The sheet itself is single-threaded. `SharedSheet` puts it behind an
//! `Arc<RwLock<_>>` so that every save, load and mutation happens under the
//! lock and is observed whole by other threads.

use crate::{MetaCharError, Sheet};
use std::sync::{Arc, RwLock};

/// Cloneable handle to a sheet guarded by a read/write lock.
#[derive(Debug, Clone, Default)]
pub struct SharedSheet {
    inner: Arc<RwLock<Sheet>>,
}

impl SharedSheet {
    #[must_use]
    pub fn new(sheet: Sheet) -> Self {
        Self {
            inner: Arc::new(RwLock::new(sheet)),
        }
    }

    /// Run `f` with shared access.
    pub fn read<T>(&self, f: impl FnOnce(&Sheet) -> T) -> Result<T, MetaCharError> {
        let guard = self.inner.read().map_err(|_| MetaCharError::LockPoisoned)?;
        Ok(f(&guard))
    }

    /// Run a fallible mutation with exclusive access.
    pub fn write<T>(
        &self,
        f: impl FnOnce(&mut Sheet) -> Result<T, MetaCharError>,
    ) -> Result<T, MetaCharError> {
        let mut guard = self.inner.write().map_err(|_| MetaCharError::LockPoisoned)?;
        f(&mut guard)
    }

    /// Serialize the current sheet.
    pub fn save(&self) -> Result<String, MetaCharError> {
        self.read(Sheet::save)
    }

    /// Replace the sheet with a parsed document. On error nothing changes.
    pub fn load(&self, text: &str) -> Result<(), MetaCharError> {
        let replacement = Sheet::from_text(text)?;
        self.write(|sheet| {
            *sheet = replacement;
            Ok(())
        })
    }

    /// Copy of the current sheet.
    pub fn snapshot(&self) -> Result<Sheet, MetaCharError> {
        self.read(Sheet::clone)
    }
}
