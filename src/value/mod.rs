//! Values, conversions and result rows.

pub mod convert;
pub mod row;
pub mod types;

#[doc(inline)]
pub use convert::FromValue;
#[doc(inline)]
pub use row::Row;
#[doc(inline)]
pub use types::{AttrType, Value};
