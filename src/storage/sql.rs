//! SQL-backed storage
//!
//! [`SqlStore`] renders specifications to PostgreSQL with [`crate::sql`] and
//! runs them on a [`SqlConnection`]. The crate ships no driver; callers
//! implement `SqlConnection` over whatever client they use and convert the
//! driver's rows into [`Row`]s.
//!
//! Scopes map to `BEGIN`/`COMMIT`/`ROLLBACK` at the top level and to
//! savepoints when nested.

use super::{ScopeOutcome, StorageExecutor};
use crate::error::StorageError;
use crate::query::{MutationSpec, QuerySpec};
use crate::sql;
use crate::value::Row;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Minimal blocking SQL client
pub trait SqlConnection: Send + Sync {
    /// Run a statement returning rows
    fn query(&self, sql: &str, params: &[sea_query::Value]) -> Result<Vec<Row>, StorageError>;

    /// Run a statement returning the affected row count
    fn execute(&self, sql: &str, params: &[sea_query::Value]) -> Result<u64, StorageError>;

    /// Run one or more parameterless statements
    fn batch_execute(&self, sql: &str) -> Result<(), StorageError>;
}

/// [`StorageExecutor`] over a SQL connection
pub struct SqlStore<C> {
    conn: C,
    depth: AtomicU32,
}

impl<C: SqlConnection> SqlStore<C> {
    pub fn new(conn: C) -> Self {
        Self {
            conn,
            depth: AtomicU32::new(0),
        }
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn into_connection(self) -> C {
        self.conn
    }

    /// Number of open scopes
    pub fn scope_depth(&self) -> u32 {
        self.depth.load(Ordering::SeqCst)
    }
}

fn savepoint_name(depth: u32) -> String {
    format!("quarry_sp_{depth}")
}

impl<C: SqlConnection> StorageExecutor for SqlStore<C> {
    fn execute(&self, spec: &QuerySpec) -> Result<Vec<Row>, StorageError> {
        let (statement, values) = sql::build_select(spec);
        log::trace!("Executing: {statement}");
        let rows = self.conn.query(&statement, &values.0)?;

        // Drivers may report labels differently; positions are authoritative
        let labels: Arc<[String]> = spec.labels().into();
        rows.into_iter()
            .map(|row| {
                if row.len() != labels.len() {
                    return Err(StorageError::new(format!(
                        "expected {} columns, driver returned {}",
                        labels.len(),
                        row.len()
                    )));
                }
                Ok(Row::new(labels.clone(), row.into_values()))
            })
            .collect()
    }

    fn execute_mutation(&self, mutation: &MutationSpec) -> Result<u64, StorageError> {
        let (statement, values) = sql::build_mutation(mutation);
        log::trace!("Executing: {statement}");
        self.conn.execute(&statement, &values.0)
    }

    fn begin_scope(&self) -> Result<(), StorageError> {
        let depth = self.depth.load(Ordering::SeqCst);
        if depth == 0 {
            self.conn.batch_execute("BEGIN")?;
        } else {
            self.conn
                .batch_execute(&format!("SAVEPOINT {}", savepoint_name(depth)))?;
        }
        self.depth.store(depth + 1, Ordering::SeqCst);
        Ok(())
    }

    fn end_scope(&self, outcome: ScopeOutcome) -> Result<(), StorageError> {
        let depth = self.depth.load(Ordering::SeqCst);
        if depth == 0 {
            return Err(StorageError::new("no open scope"));
        }
        let statement = match (depth, outcome) {
            (1, ScopeOutcome::Commit) => "COMMIT".to_string(),
            (1, ScopeOutcome::Rollback) => "ROLLBACK".to_string(),
            (d, ScopeOutcome::Commit) => format!("RELEASE SAVEPOINT {}", savepoint_name(d - 1)),
            (d, ScopeOutcome::Rollback) => {
                format!("ROLLBACK TO SAVEPOINT {}", savepoint_name(d - 1))
            }
        };
        self.depth.store(depth - 1, Ordering::SeqCst);
        self.conn.batch_execute(&statement)
    }
}
