//! Query composition
//!
//! This module turns entity paths, expressions and conditions into validated
//! specifications:
//! - **Select**: SELECT builder ([`Select`]) producing a [`QuerySpec`]
//! - **Joins**: relationship, theta, ad hoc and fetch joins
//! - **Projection**: entity, column, count and bound projections
//! - **Mutation**: bulk [`Update`] and [`Delete`] producing a [`MutationSpec`]
//! - **Validation**: aggregation and type checks run by every `build()`
//!
//! Specifications are plain data. Executing them is the job of
//! [`QueryContext`](crate::QueryContext), which hands them to a
//! [`StorageExecutor`](crate::storage::StorageExecutor).

pub mod join;
pub mod mutation;
pub mod order;
pub mod projection;
pub mod select;
pub mod traits;
pub(crate) mod validate;

#[doc(inline)]
pub use join::{Join, JoinKind, JoinOn, Source};
#[doc(inline)]
pub use mutation::{Assignment, Delete, MutationSpec, Update};
#[doc(inline)]
pub use order::{Direction, NullPlacement, OrderSpec};
#[doc(inline)]
pub use projection::{BindStrategy, Projection, SelectItem};
#[doc(inline)]
pub use select::{QuerySpec, Select};
#[doc(inline)]
pub use traits::FromRow;
