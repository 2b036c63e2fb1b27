//! # Quarry
//!
//! Composable, type-checked query specifications over a declared entity
//! catalog, executed by a pluggable storage backend and mapped into caller
//! types.
//!
//! - [`metadata`]: entities, attributes and relationships ([`Catalog`])
//! - [`expr`] and [`predicate`]: typed expressions and absent-aware conditions
//! - [`query`]: `Select`, `Update` and `Delete` builders producing validated specs
//! - [`execution`]: [`QueryContext`] fetch operations, paging and bulk mutations
//! - [`projection`]: field, accessor and constructor binding into DTOs
//! - [`storage`]: the [`StorageExecutor`] interface, an in-memory store and a
//!   SQL store rendering PostgreSQL through [`sql`]

extern crate self as quarry;

pub mod config;
pub mod error;
pub mod execution;
pub mod expr;
pub mod metadata;
pub mod metrics;
pub mod predicate;
pub mod projection;
pub mod query;
pub mod sql;
pub mod storage;
pub mod value;

pub use config::QuarryConfig;
pub use error::{QueryError, StorageError};
pub use execution::{Page, QueryContext};
pub use expr::{EntityPath, Expr};
pub use metadata::Catalog;
pub use predicate::{Condition, ConditionBuilder};
pub use projection::{Projected, Projections};
pub use query::{Delete, QuerySpec, Select, Update};
pub use storage::{MemoryStore, StorageExecutor};
pub use value::{Row, Value};

/// Derives [`projection::FieldTarget`], and optionally
/// [`projection::AccessorTarget`] or [`projection::ConstructorTarget`]
pub use quarry_derive::Projection;
