//! Mapping rows into caller types
//!
//! Three strategies, recorded on the query as a [`BindStrategy`]:
//! - **Field-direct** ([`Projections::fields`]): values move into fields by
//!   label through [`FieldTarget`]
//! - **Accessor** ([`Projections::bean`]): the target is default-constructed,
//!   then populated through [`AccessorTarget::set_property`]
//! - **Constructor** ([`Projections::constructor`], [`Projections::typed`]):
//!   columns are passed positionally; arity and types are checked at build
//!
//! Labels come from `as_` aliases or attribute names. A field or property
//! that no label matches is left absent rather than failing. This is easy to
//! trip over when an expression is projected without an alias, so
//! `QuarryConfig::warn_unbound_fields` logs each such field once per fetch.
//!
//! # Example
//!
//! ```
//! use quarry::metadata::{AttrType, Catalog, EntityDef};
//! use quarry::projection::Projections;
//! use quarry::query::Select;
//!
//! let catalog = Catalog::builder()
//!     .entity(
//!         EntityDef::builder("Member")
//!             .attribute("username", AttrType::String)
//!             .attribute("age", AttrType::Integer)
//!             .build(),
//!     )
//!     .build()
//!     .unwrap();
//! let m = catalog.path("Member", "m").unwrap();
//! let projected = Projections::typed(
//!     Select::from(&m),
//!     [m.attr("username").unwrap(), m.attr("age").unwrap()],
//!     |username: String, age: i32| format!("{username}:{age}"),
//! )
//! .unwrap();
//!
//! // a closure expecting three columns is rejected while building
//! let wrong = Projections::typed(
//!     Select::from(&m),
//!     [m.attr("username").unwrap()],
//!     |username: String, age: i32| format!("{username}:{age}"),
//! );
//! assert!(wrong.is_err());
//! # let _ = projected;
//! ```

mod accessor;
mod constructor;
mod fields;

pub use accessor::AccessorTarget;
pub use constructor::{ConstructorTarget, TypedConstructor};
pub use fields::{FieldSource, FieldTarget};

use crate::error::QueryError;
use crate::query::{BindStrategy, Projection, QuerySpec, Select, SelectItem};
use crate::value::{AttrType, Row, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

type ConstructFn<T> = Arc<dyn Fn(Vec<Value>) -> Result<T, QueryError> + Send + Sync>;

/// How rows of a [`Projected`] query become `T`
pub enum Binder<T> {
    Field(fn(&mut FieldSource) -> Result<T, QueryError>),
    Accessor {
        instantiate: fn() -> Option<T>,
        set_property: fn(&mut T, &str, Value) -> Result<bool, QueryError>,
    },
    Constructor(ConstructFn<T>),
}

impl<T> Clone for Binder<T> {
    fn clone(&self) -> Self {
        match self {
            Binder::Field(f) => Binder::Field(*f),
            Binder::Accessor {
                instantiate,
                set_property,
            } => Binder::Accessor {
                instantiate: *instantiate,
                set_property: *set_property,
            },
            Binder::Constructor(f) => Binder::Constructor(f.clone()),
        }
    }
}

impl<T> Binder<T> {
    pub fn strategy(&self) -> BindStrategy {
        match self {
            Binder::Field(_) => BindStrategy::Field,
            Binder::Accessor { .. } => BindStrategy::Accessor,
            Binder::Constructor(_) => BindStrategy::Constructor,
        }
    }
}

/// A validated specification paired with the binder for its rows
pub struct Projected<T> {
    spec: QuerySpec,
    binder: Binder<T>,
    target: &'static str,
}

impl<T> Clone for Projected<T> {
    fn clone(&self) -> Self {
        Self {
            spec: self.spec.clone(),
            binder: self.binder.clone(),
            target: self.target,
        }
    }
}

impl<T> std::fmt::Debug for Projected<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Projected")
            .field("target", &self.target)
            .field("strategy", &self.binder.strategy())
            .field("spec", &self.spec)
            .finish()
    }
}

impl<T> Projected<T> {
    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    pub fn binder(&self) -> &Binder<T> {
        &self.binder
    }

    /// Type name of the projection target
    pub fn target(&self) -> &'static str {
        self.target
    }

    /// Same binding over another window of the same query
    pub fn with_spec(&self, spec: QuerySpec) -> Projected<T> {
        Projected {
            spec,
            binder: self.binder.clone(),
            target: self.target,
        }
    }

    /// Bind one row
    pub fn bind(&self, row: Row) -> Result<T, QueryError> {
        self.bind_reporting(row).map(|(value, _)| value)
    }

    /// Bind rows, logging unbound fields once when `warn_unbound` is set
    pub fn bind_all(&self, rows: Vec<Row>, warn_unbound: bool) -> Result<Vec<T>, QueryError> {
        self.bind_noting(rows, |message| {
            if warn_unbound {
                log::warn!("{message}");
            }
        })
    }

    /// Bind rows, handing each distinct unbound name to `note` once
    fn bind_noting(
        &self,
        rows: Vec<Row>,
        mut note: impl FnMut(String),
    ) -> Result<Vec<T>, QueryError> {
        let mut reported = BTreeSet::new();
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let (value, unbound) = self.bind_reporting(row)?;
            for name in unbound {
                if !reported.contains(&name) {
                    note(self.unbound_message(&name));
                    reported.insert(name);
                }
            }
            out.push(value);
        }
        Ok(out)
    }

    fn unbound_message(&self, name: &str) -> String {
        match self.binder {
            Binder::Accessor { .. } => format!(
                "Projection into {} ignored column `{name}`: no property accepts it",
                self.target
            ),
            _ => format!(
                "Projection into {} left `{name}` unbound: no column carries that label",
                self.target
            ),
        }
    }

    fn bind_reporting(&self, row: Row) -> Result<(T, Vec<String>), QueryError> {
        match &self.binder {
            Binder::Field(from_fields) => {
                let mut source = FieldSource::new(row);
                let value = from_fields(&mut source)?;
                let unbound = source.unbound().iter().map(|f| f.to_string()).collect();
                Ok((value, unbound))
            }
            Binder::Accessor {
                instantiate,
                set_property,
            } => {
                let mut target = instantiate()
                    .ok_or_else(|| QueryError::NoDefaultConstructor(self.target.to_string()))?;
                let mut unmatched = Vec::new();
                let columns = row.columns().to_vec();
                for (label, value) in columns.into_iter().zip(row.into_values()) {
                    if !set_property(&mut target, &label, value)? {
                        unmatched.push(label);
                    }
                }
                Ok((target, unmatched))
            }
            Binder::Constructor(construct) => Ok((construct(row.into_values())?, Vec::new())),
        }
    }
}

/// Entry points for bound projections
pub struct Projections;

impl Projections {
    /// Field-direct projection
    pub fn fields<T, I, S>(select: Select, items: I) -> Result<Projected<T>, QueryError>
    where
        T: FieldTarget,
        I: IntoIterator<Item = S>,
        S: Into<SelectItem>,
    {
        let spec = select
            .select(items)
            .with_strategy(BindStrategy::Field)
            .build()?;
        Ok(Projected {
            spec,
            binder: Binder::Field(T::from_fields),
            target: std::any::type_name::<T>(),
        })
    }

    /// Accessor projection
    ///
    /// Building succeeds for any target; a target without a default
    /// constructor fails with [`QueryError::NoDefaultConstructor`] when rows
    /// are bound.
    pub fn bean<T, I, S>(select: Select, items: I) -> Result<Projected<T>, QueryError>
    where
        T: AccessorTarget,
        I: IntoIterator<Item = S>,
        S: Into<SelectItem>,
    {
        let spec = select
            .select(items)
            .with_strategy(BindStrategy::Accessor)
            .build()?;
        Ok(Projected {
            spec,
            binder: Binder::Accessor {
                instantiate: T::instantiate,
                set_property: T::set_property,
            },
            target: std::any::type_name::<T>(),
        })
    }

    /// Constructor projection through [`ConstructorTarget`]
    pub fn constructor<T, I, S>(select: Select, items: I) -> Result<Projected<T>, QueryError>
    where
        T: ConstructorTarget + 'static,
        I: IntoIterator<Item = S>,
        S: Into<SelectItem>,
    {
        let target = std::any::type_name::<T>();
        let spec = select
            .select(items)
            .with_strategy(BindStrategy::Constructor)
            .build()?;
        constructor::check_parameters(target, &column_types(&spec), T::PARAMETERS)?;
        Ok(Projected {
            spec,
            binder: Binder::Constructor(Arc::new(T::construct)),
            target,
        })
    }

    /// Constructor projection through a closure; its signature supplies the
    /// parameter types
    pub fn typed<Args, T, F, I, S>(
        select: Select,
        items: I,
        f: F,
    ) -> Result<Projected<T>, QueryError>
    where
        F: TypedConstructor<Args, T>,
        Args: 'static,
        T: 'static,
        I: IntoIterator<Item = S>,
        S: Into<SelectItem>,
    {
        let target = std::any::type_name::<T>();
        let spec = select
            .select(items)
            .with_strategy(BindStrategy::Constructor)
            .build()?;
        constructor::check_parameters(target, &column_types(&spec), &F::parameters())?;
        Ok(Projected {
            spec,
            binder: Binder::Constructor(typed_binder(f)),
            target,
        })
    }
}

fn typed_binder<Args, T, F>(f: F) -> ConstructFn<T>
where
    F: TypedConstructor<Args, T>,
    Args: 'static,
    T: 'static,
{
    Arc::new(move |values| f.construct(values))
}

/// Label and static type of every column the query produces
fn column_types(spec: &QuerySpec) -> Vec<(String, Option<AttrType>)> {
    match spec.projection() {
        Projection::Columns { items, .. } => items
            .iter()
            .map(|item| (item.label(), item.expr().static_type()))
            .collect(),
        Projection::Entity => {
            let mut columns: Vec<(String, Option<AttrType>)> = spec
                .root()
                .entity()
                .attributes()
                .iter()
                .map(|a| (a.name.clone(), Some(a.ty)))
                .collect();
            for join in spec.joins().iter().filter(|j| j.is_fetch()) {
                if let Some(rel) = join.relationship_name() {
                    columns.extend(
                        join.target()
                            .entity()
                            .attributes()
                            .iter()
                            .map(|a| (format!("{}.{}", rel, a.name), Some(a.ty))),
                    );
                }
            }
            columns
        }
        Projection::Count | Projection::CountRows(_) => {
            vec![("count".to_string(), Some(AttrType::Integer))]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Catalog, EntityDef};

    #[derive(Debug, PartialEq)]
    struct MemberDto {
        username: String,
        age: Option<i32>,
    }

    impl FieldTarget for MemberDto {
        const FIELDS: &'static [&'static str] = &["username", "age"];

        fn from_fields(source: &mut FieldSource) -> Result<Self, QueryError> {
            Ok(Self {
                username: source.take("username")?,
                age: source.take("age")?,
            })
        }
    }

    impl ConstructorTarget for MemberDto {
        const PARAMETERS: &'static [Option<AttrType>] =
            &[Some(AttrType::String), Some(AttrType::Integer)];

        fn construct(values: Vec<Value>) -> Result<Self, QueryError> {
            use crate::value::FromValue;
            let mut values = values.into_iter();
            let mut next = || values.next().unwrap_or(Value::Null);
            Ok(Self {
                username: FromValue::from_value(next())?,
                age: FromValue::from_value(next())?,
            })
        }
    }

    struct NoDefault;

    impl AccessorTarget for NoDefault {
        fn instantiate() -> Option<Self> {
            None
        }

        fn set_property(&mut self, _name: &str, _value: Value) -> Result<bool, QueryError> {
            Ok(false)
        }
    }

    #[derive(Default)]
    struct NameOnly {
        username: String,
    }

    impl AccessorTarget for NameOnly {
        fn instantiate() -> Option<Self> {
            Some(Self::default())
        }

        fn set_property(&mut self, name: &str, value: Value) -> Result<bool, QueryError> {
            if name != "username" {
                return Ok(false);
            }
            self.username = crate::value::FromValue::from_value(value)?;
            Ok(true)
        }
    }

    fn catalog() -> Catalog {
        Catalog::builder()
            .entity(
                EntityDef::builder("Member")
                    .attribute("username", AttrType::String)
                    .attribute("age", AttrType::Integer)
                    .build(),
            )
            .build()
            .unwrap()
    }

    fn row() -> Row {
        Row::from_pairs([("username", Value::from("member1")), ("age", Value::Int(10))])
    }

    #[test]
    fn test_field_projection_records_strategy() {
        let catalog = catalog();
        let m = catalog.path("Member", "m").unwrap();
        let projected = Projections::fields::<MemberDto, _, _>(
            Select::from(&m),
            [m.attr("username").unwrap(), m.attr("age").unwrap()],
        )
        .unwrap();
        assert_eq!(projected.spec().projection().strategy(), Some(BindStrategy::Field));
        assert_eq!(
            projected.bind(row()).unwrap(),
            MemberDto {
                username: "member1".into(),
                age: Some(10)
            }
        );
    }

    #[test]
    fn test_unaliased_expression_leaves_field_absent() {
        let catalog = catalog();
        let m = catalog.path("Member", "m").unwrap();
        let username = m.attr("username").unwrap();
        let projected = Projections::fields::<MemberDto, _, _>(
            Select::from(&m),
            [username, m.attr("age").unwrap().add(1)],
        )
        .unwrap();
        let rows = vec![Row::from_pairs([
            ("username", Value::from("member1")),
            ("add(age, 1)", Value::Int(11)),
        ])];
        let bound = projected.bind_all(rows, true).unwrap();
        assert_eq!(bound[0].age, None);
    }

    #[test]
    fn test_constructor_arity_checked_at_build() {
        let catalog = catalog();
        let m = catalog.path("Member", "m").unwrap();
        let err = Projections::constructor::<MemberDto, _, _>(
            Select::from(&m),
            [m.attr("username").unwrap()],
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::ConstructorArityMismatch { .. }));

        let err = Projections::constructor::<MemberDto, _, _>(
            Select::from(&m),
            [m.attr("age").unwrap(), m.attr("username").unwrap()],
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::ConstructorArityMismatch { .. }));
    }

    #[test]
    fn test_missing_default_constructor_fails_at_bind() {
        let catalog = catalog();
        let m = catalog.path("Member", "m").unwrap();
        let projected =
            Projections::bean::<NoDefault, _, _>(Select::from(&m), [m.attr("age").unwrap()])
                .unwrap();
        assert!(matches!(
            projected.bind(row()),
            Err(QueryError::NoDefaultConstructor(_))
        ));
    }

    #[test]
    fn test_unbound_names_reported_once_per_strategy() {
        let catalog = catalog();
        let m = catalog.path("Member", "m").unwrap();
        let username = m.attr("username").unwrap();
        let age = m.attr("age").unwrap();

        let bean =
            Projections::bean::<NameOnly, _, _>(Select::from(&m), [&username, &age]).unwrap();
        let mut notes = Vec::new();
        let bound = bean
            .bind_noting(vec![row(), row()], |note| notes.push(note))
            .unwrap();
        assert_eq!(bound[1].username, "member1");
        assert_eq!(notes.len(), 1);
        assert!(notes[0].contains("ignored column `age`: no property accepts it"));

        let fields =
            Projections::fields::<MemberDto, _, _>(Select::from(&m), [&username]).unwrap();
        let mut notes = Vec::new();
        let rows = vec![Row::from_pairs([("username", Value::from("member1"))])];
        fields.bind_noting(rows, |note| notes.push(note)).unwrap();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].contains("left `age` unbound: no column carries that label"));
    }
}
