//! Scope guard
//!
//! A [`Scope`] opens a storage scope on creation and closes it exactly once:
//! through [`Scope::commit`], [`Scope::rollback`], or on drop, which rolls
//! back.
//!
//! # Example
//!
//! ```
//! use quarry::metadata::{AttrType, Catalog, EntityDef};
//! use quarry::storage::{MemoryStore, Scope};
//! use quarry::value::Value;
//!
//! let catalog = Catalog::builder()
//!     .entity(EntityDef::builder("Team").attribute("name", AttrType::String).build())
//!     .build()
//!     .unwrap()
//!     .into_shared();
//! let store = MemoryStore::new(catalog);
//!
//! {
//!     let _scope = Scope::begin(&store).unwrap();
//!     store.insert("Team", [("name", Value::from("teamA"))]).unwrap();
//!     // dropped without commit
//! }
//! assert_eq!(store.len("Team"), 0);
//! ```

use super::{ScopeOutcome, StorageExecutor};
use crate::error::StorageError;

/// Guard over an open storage scope
pub struct Scope<'a, S: StorageExecutor + ?Sized> {
    storage: &'a S,
    closed: bool,
}

impl<'a, S: StorageExecutor + ?Sized> Scope<'a, S> {
    /// Open a scope on `storage`
    pub fn begin(storage: &'a S) -> Result<Self, StorageError> {
        storage.begin_scope()?;
        log::trace!("Scope opened");
        Ok(Self {
            storage,
            closed: false,
        })
    }

    /// The storage this scope runs on
    pub fn storage(&self) -> &'a S {
        self.storage
    }

    pub fn commit(mut self) -> Result<(), StorageError> {
        self.close(ScopeOutcome::Commit)
    }

    pub fn rollback(mut self) -> Result<(), StorageError> {
        self.close(ScopeOutcome::Rollback)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn close(&mut self, outcome: ScopeOutcome) -> Result<(), StorageError> {
        if self.closed {
            return Err(StorageError::new("scope has already been closed"));
        }
        self.closed = true;
        self.storage.end_scope(outcome)
    }
}

impl<S: StorageExecutor + ?Sized> Drop for Scope<'_, S> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        log::warn!("Scope dropped without commit, rolling back");
        if let Err(e) = self.close(ScopeOutcome::Rollback) {
            log::error!("Rollback on drop failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{AttrType, Catalog, EntityDef};
    use crate::storage::MemoryStore;
    use crate::value::Value;

    fn store() -> MemoryStore {
        let catalog = Catalog::builder()
            .entity(EntityDef::builder("Team").attribute("name", AttrType::String).build())
            .build()
            .unwrap()
            .into_shared();
        MemoryStore::new(catalog)
    }

    #[test]
    fn test_commit_keeps_changes() {
        let store = store();
        let scope = Scope::begin(&store).unwrap();
        store.insert("Team", [("name", Value::from("teamA"))]).unwrap();
        scope.commit().unwrap();
        assert_eq!(store.len("Team"), 1);
    }

    #[test]
    fn test_nested_rollback_keeps_outer_changes() {
        let store = store();
        let outer = Scope::begin(&store).unwrap();
        store.insert("Team", [("name", Value::from("teamA"))]).unwrap();
        {
            let inner = Scope::begin(&store).unwrap();
            store.insert("Team", [("name", Value::from("teamB"))]).unwrap();
            inner.rollback().unwrap();
        }
        assert_eq!(store.len("Team"), 1);
        outer.commit().unwrap();
        assert_eq!(store.len("Team"), 1);
    }

    #[test]
    fn test_drop_rolls_back() {
        let store = store();
        {
            let scope = Scope::begin(&store).unwrap();
            assert!(!scope.is_closed());
            store.insert("Team", [("name", Value::from("teamA"))]).unwrap();
        }
        assert_eq!(store.len("Team"), 0);
    }
}
