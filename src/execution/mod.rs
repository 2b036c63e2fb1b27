//! Query execution
//!
//! [`QueryContext`] bundles the catalog, a storage executor and the
//! configuration. It is built per request scope and passed by reference;
//! nothing in the engine is global. Every fetch:
//! - logs the rendered SQL at debug level when `log_queries` is set
//! - runs inside a `quarry.fetch` span with the `tracing` feature
//! - records count and duration with the `metrics` feature
//! - warns when slower than `slow_query_threshold_ms`
//!
//! # Example
//!
//! ```
//! use quarry::metadata::{AttrType, Catalog, EntityDef};
//! use quarry::query::Select;
//! use quarry::storage::MemoryStore;
//! use quarry::value::Value;
//! use quarry::QueryContext;
//!
//! let catalog = Catalog::builder()
//!     .entity(
//!         EntityDef::builder("Member")
//!             .attribute("username", AttrType::String)
//!             .attribute("age", AttrType::Integer)
//!             .build(),
//!     )
//!     .build()
//!     .unwrap()
//!     .into_shared();
//! let store = MemoryStore::new(catalog.clone());
//! for (name, age) in [("member1", 10), ("member2", 20)] {
//!     store
//!         .insert("Member", [("username", Value::from(name)), ("age", Value::from(age))])
//!         .unwrap();
//! }
//!
//! let ctx = QueryContext::new(catalog, &store);
//! let m = ctx.path("Member", "m").unwrap();
//! let spec = Select::from(&m).filter(m.attr("age").unwrap().gt(15)).build().unwrap();
//! let row = ctx.fetch_one(&spec).unwrap().unwrap();
//! assert_eq!(row.try_get::<String>("username").unwrap(), "member2");
//! assert_eq!(ctx.fetch_count(&spec).unwrap(), 1);
//! ```

mod bulk;
mod page;

pub use page::Page;

use crate::config::QuarryConfig;
use crate::error::QueryError;
use crate::expr::EntityPath;
use crate::metadata::Catalog;
use crate::metrics;
use crate::projection::Projected;
use crate::query::{FromRow, QuerySpec};
use crate::sql;
use crate::storage::StorageExecutor;
use crate::value::Row;
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Catalog, storage and configuration for running specifications
pub struct QueryContext<S> {
    catalog: Arc<Catalog>,
    storage: S,
    config: QuarryConfig,
}

impl<S: StorageExecutor> QueryContext<S> {
    pub fn new(catalog: Arc<Catalog>, storage: S) -> Self {
        Self {
            catalog,
            storage,
            config: QuarryConfig::default(),
        }
    }

    pub fn with_config(mut self, config: QuarryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn config(&self) -> &QuarryConfig {
        &self.config
    }

    /// Aliased path over a catalog entity
    pub fn path(&self, entity: &str, alias: &str) -> Result<EntityPath, QueryError> {
        self.catalog.path(entity, alias)
    }

    fn run(&self, operation: &'static str, spec: &QuerySpec) -> Result<Vec<Row>, QueryError> {
        if let Some(alias) = spec.outer_aliases().first() {
            return Err(QueryError::InvalidJoin(format!(
                "query is correlated with {alias} and can only run as a subquery"
            )));
        }
        let entity = spec.root().entity().name();
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::fetch_span(operation, entity).entered();

        if self.config.log_queries {
            log::debug!("{operation}: {}", sql::select_to_string(spec));
        }

        let started = Instant::now();
        let result = self.storage.execute(spec);
        let elapsed = started.elapsed();
        metrics::observe_query(operation, elapsed);
        if elapsed > self.config.slow_query_threshold() {
            log::warn!("Slow {operation} on {entity}: {elapsed:?}");
        }

        let rows = result?;
        log::trace!("{operation} on {entity} returned {} rows", rows.len());
        Ok(rows)
    }

    /// Every row, in order
    pub fn fetch_all(&self, spec: &QuerySpec) -> Result<Vec<Row>, QueryError> {
        self.run("fetch_all", spec)
    }

    /// Every row decoded through [`FromRow`]
    pub fn fetch_all_as<M: FromRow>(&self, spec: &QuerySpec) -> Result<Vec<M>, QueryError> {
        self.fetch_all(spec)?.iter().map(M::from_row).collect()
    }

    /// The only row, if any
    ///
    /// Fails with [`QueryError::TooManyResults`] when more than one row
    /// matches.
    pub fn fetch_one(&self, spec: &QuerySpec) -> Result<Option<Row>, QueryError> {
        let mut rows = self.run("fetch_one", spec)?;
        if rows.len() > 1 {
            return Err(QueryError::TooManyResults(rows.len()));
        }
        Ok(rows.pop())
    }

    /// The first row, if any; the query is limited to one row
    pub fn fetch_first(&self, spec: &QuerySpec) -> Result<Option<Row>, QueryError> {
        let rows = self.run("fetch_first", &spec.first_row())?;
        Ok(rows.into_iter().next())
    }

    /// Number of rows the spec would return without its window
    ///
    /// Grouped and distinct specs count their result rows, not the
    /// underlying records.
    pub fn fetch_count(&self, spec: &QuerySpec) -> Result<u64, QueryError> {
        let rows = self.run("fetch_count", &spec.count_shape())?;
        match rows.first() {
            Some(row) => row.try_get_at::<u64>(0),
            None => Ok(0),
        }
    }

    /// The spec's window plus the total of the same query without it
    pub fn fetch_page(&self, spec: &QuerySpec) -> Result<Page<Row>, QueryError> {
        let items = self.fetch_all(spec)?;
        let total = self.fetch_count(spec)?;
        Ok(Page {
            items,
            total,
            offset: spec.offset().unwrap_or(0),
            limit: spec.limit(),
        })
    }

    /// Rows bound through a projection
    pub fn fetch_into<T>(&self, projected: &Projected<T>) -> Result<Vec<T>, QueryError> {
        let rows = self.fetch_all(projected.spec())?;
        self.bind_rows(projected, rows)
    }

    pub fn fetch_one_into<T>(&self, projected: &Projected<T>) -> Result<Option<T>, QueryError> {
        let row = self.fetch_one(projected.spec())?;
        Ok(self.bind_rows(projected, row.into_iter().collect())?.pop())
    }

    pub fn fetch_first_into<T>(&self, projected: &Projected<T>) -> Result<Option<T>, QueryError> {
        let row = self.fetch_first(projected.spec())?;
        Ok(self.bind_rows(projected, row.into_iter().collect())?.pop())
    }

    pub fn fetch_page_into<T>(&self, projected: &Projected<T>) -> Result<Page<T>, QueryError> {
        self.fetch_page(projected.spec())?
            .try_map(|rows| self.bind_rows(projected, rows))
    }

    fn bind_rows<T>(&self, projected: &Projected<T>, rows: Vec<Row>) -> Result<Vec<T>, QueryError> {
        projected.bind_all(rows, self.config.warn_unbound_fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{AttrType, EntityDef};
    use crate::query::Select;
    use crate::storage::MemoryStore;
    use crate::value::Value;

    fn context() -> QueryContext<MemoryStore> {
        let catalog = Catalog::builder()
            .entity(
                EntityDef::builder("Member")
                    .attribute("username", AttrType::String)
                    .attribute("age", AttrType::Integer)
                    .build(),
            )
            .build()
            .unwrap()
            .into_shared();
        let store = MemoryStore::new(catalog.clone());
        for (name, age) in [("member1", 10), ("member2", 20), ("member3", 30)] {
            store
                .insert("Member", [("username", Value::from(name)), ("age", Value::from(age))])
                .unwrap();
        }
        QueryContext::new(catalog, store)
    }

    #[test]
    fn test_fetch_one_rejects_multiple_rows() {
        let ctx = context();
        let m = ctx.path("Member", "m").unwrap();
        let spec = Select::from(&m).build().unwrap();
        assert!(matches!(ctx.fetch_one(&spec), Err(QueryError::TooManyResults(3))));
        assert!(ctx.fetch_first(&spec).unwrap().is_some());
    }

    #[test]
    fn test_fetch_one_empty() {
        let ctx = context();
        let m = ctx.path("Member", "m").unwrap();
        let spec = Select::from(&m)
            .filter(m.attr("age").unwrap().gt(100))
            .build()
            .unwrap();
        assert!(ctx.fetch_one(&spec).unwrap().is_none());
        assert_eq!(ctx.fetch_count(&spec).unwrap(), 0);
    }

    #[test]
    fn test_fetch_all_as_tuples() {
        let ctx = context().with_config(QuarryConfig {
            log_queries: true,
            ..QuarryConfig::default()
        });
        let m = ctx.path("Member", "m").unwrap();
        let age = m.attr("age").unwrap();
        let spec = Select::from(&m)
            .select([m.attr("username").unwrap(), age.clone()])
            .order_by(age.desc())
            .build()
            .unwrap();
        let rows: Vec<(String, i64)> = ctx.fetch_all_as(&spec).unwrap();
        assert_eq!(rows[0], ("member3".to_string(), 30));
    }
}
