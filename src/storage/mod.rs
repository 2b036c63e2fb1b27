//! Storage interface
//!
//! The engine never touches records itself. It hands validated
//! specifications to a [`StorageExecutor`] and gets rows or affected-row
//! counts back. Two executors ship with the crate:
//! - [`MemoryStore`]: evaluates specifications over in-memory records
//! - [`SqlStore`]: renders PostgreSQL through sea-query and runs it on a
//!   caller supplied [`SqlConnection`]
//!
//! Scopes (transactions) belong to the caller. [`Scope`] is a guard that
//! rolls back unless committed.

pub mod memory;
pub mod scope;
pub mod sql;

use crate::error::StorageError;
use crate::query::{MutationSpec, QuerySpec};
use crate::value::Row;

#[doc(inline)]
pub use memory::MemoryStore;
#[doc(inline)]
pub use scope::Scope;
#[doc(inline)]
pub use sql::{SqlConnection, SqlStore};

/// How a storage scope ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeOutcome {
    Commit,
    Rollback,
}

/// Executes specifications against a store
///
/// Rows returned by `execute` carry the labels of
/// [`QuerySpec::labels`]. Implementations are shared across threads, so all
/// methods take `&self`.
pub trait StorageExecutor: Send + Sync {
    /// Run a query and return its rows in order
    fn execute(&self, spec: &QuerySpec) -> Result<Vec<Row>, StorageError>;

    /// Run a bulk update or delete and return the number of affected records
    fn execute_mutation(&self, mutation: &MutationSpec) -> Result<u64, StorageError>;

    /// Open a scope; scopes nest
    fn begin_scope(&self) -> Result<(), StorageError>;

    /// Close the innermost scope
    fn end_scope(&self, outcome: ScopeOutcome) -> Result<(), StorageError>;
}

impl<S: StorageExecutor + ?Sized> StorageExecutor for &S {
    fn execute(&self, spec: &QuerySpec) -> Result<Vec<Row>, StorageError> {
        (**self).execute(spec)
    }

    fn execute_mutation(&self, mutation: &MutationSpec) -> Result<u64, StorageError> {
        (**self).execute_mutation(mutation)
    }

    fn begin_scope(&self) -> Result<(), StorageError> {
        (**self).begin_scope()
    }

    fn end_scope(&self, outcome: ScopeOutcome) -> Result<(), StorageError> {
        (**self).end_scope(outcome)
    }
}

impl<S: StorageExecutor + ?Sized> StorageExecutor for std::sync::Arc<S> {
    fn execute(&self, spec: &QuerySpec) -> Result<Vec<Row>, StorageError> {
        (**self).execute(spec)
    }

    fn execute_mutation(&self, mutation: &MutationSpec) -> Result<u64, StorageError> {
        (**self).execute_mutation(mutation)
    }

    fn begin_scope(&self) -> Result<(), StorageError> {
        (**self).begin_scope()
    }

    fn end_scope(&self, outcome: ScopeOutcome) -> Result<(), StorageError> {
        (**self).end_scope(outcome)
    }
}
