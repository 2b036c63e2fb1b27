//! Bulk mutations
//!
//! Mutations go straight to storage. Rows fetched earlier are not updated:
//! re-fetch after a bulk update or delete.

use super::QueryContext;
use crate::error::QueryError;
use crate::metrics;
use crate::query::{Delete, MutationSpec, Update};
use crate::storage::StorageExecutor;
use std::time::Instant;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

impl<S: StorageExecutor> QueryContext<S> {
    /// Build and run a bulk update, returning the affected-record count
    pub fn bulk_update(&self, update: Update) -> Result<u64, QueryError> {
        self.execute_mutation(&update.build()?)
    }

    /// Build and run a bulk delete, returning the affected-record count
    pub fn bulk_delete(&self, delete: Delete) -> Result<u64, QueryError> {
        self.execute_mutation(&delete.build()?)
    }

    /// Run a built mutation
    pub fn execute_mutation(&self, mutation: &MutationSpec) -> Result<u64, QueryError> {
        let kind = mutation.kind();
        let entity = mutation.target().entity().name();
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::mutation_span(kind, entity).entered();

        if self.config().log_queries {
            log::debug!("{kind}: {}", crate::sql::mutation_to_string(mutation));
        }

        let started = Instant::now();
        let affected = self.storage().execute_mutation(mutation)?;
        metrics::observe_query(kind, started.elapsed());
        metrics::observe_rows_affected(kind, affected);
        log::info!("Bulk {kind} on {entity} affected {affected} rows");
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use crate::metadata::{AttrType, Catalog, EntityDef};
    use crate::query::{Delete, Select, Update};
    use crate::storage::MemoryStore;
    use crate::value::Value;
    use crate::QueryContext;

    #[test]
    fn test_bulk_update_leaves_fetched_rows_stale() {
        let catalog = Catalog::builder()
            .entity(EntityDef::builder("Member").attribute("age", AttrType::Integer).build())
            .build()
            .unwrap()
            .into_shared();
        let store = MemoryStore::new(catalog.clone());
        store.insert("Member", [("age", Value::from(10))]).unwrap();
        let ctx = QueryContext::new(catalog, &store);
        let m = ctx.path("Member", "m").unwrap();
        let age = m.attr("age").unwrap();
        let spec = Select::from(&m).build().unwrap();

        let before = ctx.fetch_all(&spec).unwrap();
        let affected = ctx
            .bulk_update(Update::table(&m).set(&age, age.add(1)).unwrap())
            .unwrap();
        assert_eq!(affected, 1);
        assert_eq!(before[0].try_get::<i64>("age").unwrap(), 10);
        assert_eq!(ctx.fetch_all(&spec).unwrap()[0].try_get::<i64>("age").unwrap(), 11);

        assert_eq!(ctx.bulk_delete(Delete::from(&m)).unwrap(), 1);
        assert!(ctx.fetch_all(&spec).unwrap().is_empty());
    }
}
