//! Typed expressions
//!
//! An [`Expr`] is a value-producing node: an attribute of an aliased entity,
//! a constant, a function or aggregate applied to other expressions, a CASE
//! expression or a scalar subquery. Expressions are immutable; every method
//! that combines them returns a new node and leaves the receiver untouched.
//!
//! Comparison methods (`eq`, `goe`, `between`, ...) produce [`Condition`]s
//! that feed `filter`, `having` and join `on` clauses.
//!
//! # Example
//!
//! ```
//! use quarry::metadata::{AttrType, Catalog, EntityDef};
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
//! let age = m.attr("age").unwrap();
//!
//! let adult = age.goe(18).and(age.lt(65));
//! assert!(adult.is_present());
//! assert_eq!(age.add(1).label(), "add(age, 1)");
//! ```

mod case;
mod path;

pub use case::{CaseBuilder, CaseExpr, CaseWhen, SimpleCase, SimpleCaseWhen};
pub use path::{EntityPath, RelationRef};

use crate::predicate::{CompareOp, Condition, Predicate};
use crate::query::{Direction, OrderSpec, QuerySpec, SelectItem};
use crate::value::{AttrType, Value};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// Reference to an attribute of an aliased entity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub alias: String,
    pub entity: String,
    pub attribute: String,
    pub ty: AttrType,
    pub nullable: bool,
}

/// Scalar functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Lower,
    Upper,
    Concat,
    Add,
    StringValue,
    Replace,
}

impl Function {
    pub fn name(self) -> &'static str {
        match self {
            Function::Lower => "lower",
            Function::Upper => "upper",
            Function::Concat => "concat",
            Function::Add => "add",
            Function::StringValue => "string_value",
            Function::Replace => "replace",
        }
    }
}

/// Aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregate {
    Count,
    Sum,
    Avg,
    Max,
    Min,
}

impl Aggregate {
    pub fn name(self) -> &'static str {
        match self {
            Aggregate::Count => "count",
            Aggregate::Sum => "sum",
            Aggregate::Avg => "avg",
            Aggregate::Max => "max",
            Aggregate::Min => "min",
        }
    }
}

/// Expression tree node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(ColumnRef),
    Literal(Value),
    Function(Function, Vec<Expr>),
    /// `None` argument is only produced for `count(*)`
    Aggregate(Aggregate, Option<Box<Expr>>),
    Case(Box<CaseExpr>),
    /// Scalar subquery producing a single column
    Subquery(Box<QuerySpec>),
}

impl From<&Expr> for Expr {
    fn from(expr: &Expr) -> Self {
        expr.clone()
    }
}

/// Anything usable as the right-hand side of a comparison or assignment
///
/// Implemented for expressions, built subqueries, [`Value`] and the plain
/// Rust types that convert into a `Value`.
pub trait Operand {
    fn into_expr(self) -> Expr;
}

impl Operand for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl Operand for &Expr {
    fn into_expr(self) -> Expr {
        self.clone()
    }
}

impl Operand for QuerySpec {
    fn into_expr(self) -> Expr {
        Expr::Subquery(Box::new(self))
    }
}

impl Operand for &QuerySpec {
    fn into_expr(self) -> Expr {
        Expr::Subquery(Box::new(self.clone()))
    }
}

impl Operand for Value {
    fn into_expr(self) -> Expr {
        Expr::Literal(self)
    }
}

macro_rules! literal_operand {
    ($($t:ty),* $(,)?) => {
        $(
            impl Operand for $t {
                fn into_expr(self) -> Expr {
                    Expr::Literal(Value::from(self))
                }
            }
        )*
    };
}

literal_operand!(String, &str, i64, i32, bool, f64, Decimal, NaiveDateTime);

impl Expr {
    /// Constant expression, usable in projections and comparisons
    pub fn constant(value: impl Into<Value>) -> Expr {
        Expr::Literal(value.into())
    }

    /// `count(*)`
    pub fn count_all() -> Expr {
        Expr::Aggregate(Aggregate::Count, None)
    }

    /// Scalar subquery
    pub fn subquery(spec: QuerySpec) -> Expr {
        Expr::Subquery(Box::new(spec))
    }

    /// Start a searched CASE expression
    pub fn case() -> CaseBuilder {
        CaseBuilder::new()
    }

    pub fn column(&self) -> Option<&ColumnRef> {
        match self {
            Expr::Column(c) => Some(c),
            _ => None,
        }
    }

    /// Type this expression produces, when it can be known before execution
    pub fn static_type(&self) -> Option<AttrType> {
        match self {
            Expr::Column(c) => Some(c.ty),
            Expr::Literal(v) => v.attr_type(),
            Expr::Function(Function::Add, args) => {
                let mut ty = None;
                for arg in args {
                    match (ty, arg.static_type()) {
                        (_, None) => {}
                        (None, Some(t)) => ty = Some(t),
                        (Some(AttrType::Integer), Some(AttrType::Integer)) => {}
                        (Some(_), Some(_)) => ty = Some(AttrType::Decimal),
                    }
                }
                ty
            }
            Expr::Function(_, _) => Some(AttrType::String),
            Expr::Aggregate(Aggregate::Count, _) => Some(AttrType::Integer),
            Expr::Aggregate(Aggregate::Avg, _) => Some(AttrType::Decimal),
            Expr::Aggregate(_, arg) => arg.as_ref().and_then(|a| a.static_type()),
            Expr::Case(case) => case
                .branches
                .iter()
                .map(|(_, result)| result)
                .chain(std::iter::once(&case.otherwise))
                .find_map(|e| e.static_type()),
            Expr::Subquery(spec) => spec.single_column_type(),
        }
    }

    /// Label used for this expression in result rows when it is not aliased
    pub fn label(&self) -> String {
        match self {
            Expr::Column(c) => c.attribute.clone(),
            Expr::Literal(v) => v.to_string(),
            Expr::Function(f, args) => {
                let args: Vec<String> = args.iter().map(|a| a.label()).collect();
                format!("{}({})", f.name(), args.join(", "))
            }
            Expr::Aggregate(a, None) => format!("{}(*)", a.name()),
            Expr::Aggregate(a, Some(arg)) => format!("{}({})", a.name(), arg.label()),
            Expr::Case(_) => "case".to_string(),
            Expr::Subquery(_) => "subquery".to_string(),
        }
    }

    /// Whether this node itself is an aggregate
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Expr::Aggregate(..))
    }

    /// Whether an aggregate appears anywhere in this expression
    ///
    /// Subqueries are opaque: their aggregates belong to their own scope.
    pub fn contains_aggregate(&self) -> bool {
        self.any(&mut |e| e.is_aggregate())
    }

    /// True when the expression references no columns of the current scope
    pub fn is_constant(&self) -> bool {
        !self.any(&mut |e| matches!(e, Expr::Column(_) | Expr::Aggregate(..)))
    }

    /// Pre-order search over this expression, not descending into subqueries
    pub(crate) fn any(&self, f: &mut dyn FnMut(&Expr) -> bool) -> bool {
        if f(self) {
            return true;
        }
        match self {
            Expr::Function(_, args) => args.iter().any(|a| a.any(f)),
            Expr::Aggregate(_, Some(arg)) => arg.any(f),
            Expr::Case(case) => {
                case.branches
                    .iter()
                    .any(|(when, then)| when.any_expr(f) || then.any(f))
                    || case.otherwise.any(f)
            }
            _ => false,
        }
    }

    fn function(&self, func: Function, rest: Vec<Expr>) -> Expr {
        let mut args = Vec::with_capacity(rest.len() + 1);
        args.push(self.clone());
        args.extend(rest);
        Expr::Function(func, args)
    }

    fn aggregate(&self, agg: Aggregate) -> Expr {
        Expr::Aggregate(agg, Some(Box::new(self.clone())))
    }

    pub fn lower(&self) -> Expr {
        self.function(Function::Lower, Vec::new())
    }

    pub fn upper(&self) -> Expr {
        self.function(Function::Upper, Vec::new())
    }

    /// String rendering of any scalar, e.g. to concatenate a number
    pub fn string_value(&self) -> Expr {
        self.function(Function::StringValue, Vec::new())
    }

    /// String concatenation; both sides must be strings
    pub fn concat(&self, other: impl Operand) -> Expr {
        self.function(Function::Concat, vec![other.into_expr()])
    }

    /// Numeric addition
    pub fn add(&self, other: impl Operand) -> Expr {
        self.function(Function::Add, vec![other.into_expr()])
    }

    /// Replace every occurrence of `from` with `to`
    pub fn replace(&self, from: impl Operand, to: impl Operand) -> Expr {
        self.function(Function::Replace, vec![from.into_expr(), to.into_expr()])
    }

    pub fn count(&self) -> Expr {
        self.aggregate(Aggregate::Count)
    }

    pub fn sum(&self) -> Expr {
        self.aggregate(Aggregate::Sum)
    }

    pub fn avg(&self) -> Expr {
        self.aggregate(Aggregate::Avg)
    }

    pub fn max(&self) -> Expr {
        self.aggregate(Aggregate::Max)
    }

    pub fn min(&self) -> Expr {
        self.aggregate(Aggregate::Min)
    }

    /// Projection item labelled `alias`
    pub fn as_(&self, alias: &str) -> SelectItem {
        SelectItem::aliased(self.clone(), alias)
    }

    pub fn asc(&self) -> OrderSpec {
        OrderSpec::new(self.clone(), Direction::Asc)
    }

    pub fn desc(&self) -> OrderSpec {
        OrderSpec::new(self.clone(), Direction::Desc)
    }

    /// Start a simple CASE over this expression
    ///
    /// ```
    /// # use quarry::metadata::{AttrType, Catalog, EntityDef};
    /// # let catalog = Catalog::builder()
    /// #     .entity(EntityDef::builder("Member").attribute("age", AttrType::Integer).build())
    /// #     .build()
    /// #     .unwrap();
    /// # let m = catalog.path("Member", "m").unwrap();
    /// let age = m.attr("age").unwrap();
    /// let label = age.when(10).then("ten").when(20).then("twenty").otherwise("other");
    /// assert_eq!(label.label(), "case");
    /// ```
    pub fn when(&self, value: impl Operand) -> SimpleCaseWhen {
        SimpleCase::new(self.clone()).when(value)
    }

    fn compare(&self, op: CompareOp, rhs: impl Operand) -> Condition {
        Condition::from_predicate(Predicate::Compare {
            op,
            lhs: self.clone(),
            rhs: rhs.into_expr(),
        })
    }

    pub fn eq(&self, rhs: impl Operand) -> Condition {
        self.compare(CompareOp::Eq, rhs)
    }

    pub fn ne(&self, rhs: impl Operand) -> Condition {
        self.compare(CompareOp::Ne, rhs)
    }

    pub fn gt(&self, rhs: impl Operand) -> Condition {
        self.compare(CompareOp::Gt, rhs)
    }

    /// Greater than or equal
    pub fn goe(&self, rhs: impl Operand) -> Condition {
        self.compare(CompareOp::Ge, rhs)
    }

    pub fn lt(&self, rhs: impl Operand) -> Condition {
        self.compare(CompareOp::Lt, rhs)
    }

    /// Less than or equal
    pub fn loe(&self, rhs: impl Operand) -> Condition {
        self.compare(CompareOp::Le, rhs)
    }

    /// Inclusive range
    pub fn between(&self, low: impl Operand, high: impl Operand) -> Condition {
        Condition::from_predicate(Predicate::Between {
            expr: self.clone(),
            low: low.into_expr(),
            high: high.into_expr(),
        })
    }

    pub fn is_in<I, V>(&self, values: I) -> Condition
    where
        I: IntoIterator<Item = V>,
        V: Operand,
    {
        Condition::from_predicate(Predicate::InList {
            expr: self.clone(),
            values: values.into_iter().map(Operand::into_expr).collect(),
            negated: false,
        })
    }

    pub fn is_not_in<I, V>(&self, values: I) -> Condition
    where
        I: IntoIterator<Item = V>,
        V: Operand,
    {
        Condition::from_predicate(Predicate::InList {
            expr: self.clone(),
            values: values.into_iter().map(Operand::into_expr).collect(),
            negated: true,
        })
    }

    /// Membership in the single-column result of a subquery
    pub fn in_subquery(&self, subquery: &QuerySpec) -> Condition {
        Condition::from_predicate(Predicate::InSubquery {
            expr: self.clone(),
            subquery: Box::new(subquery.clone()),
            negated: false,
        })
    }

    pub fn not_in_subquery(&self, subquery: &QuerySpec) -> Condition {
        Condition::from_predicate(Predicate::InSubquery {
            expr: self.clone(),
            subquery: Box::new(subquery.clone()),
            negated: true,
        })
    }

    /// SQL `LIKE` with `%` and `_` wildcards
    pub fn like(&self, pattern: &str) -> Condition {
        Condition::from_predicate(Predicate::Like {
            expr: self.clone(),
            pattern: pattern.to_string(),
        })
    }

    pub fn is_null(&self) -> Condition {
        Condition::from_predicate(Predicate::IsNull {
            expr: self.clone(),
            negated: false,
        })
    }

    pub fn is_not_null(&self) -> Condition {
        Condition::from_predicate(Predicate::IsNull {
            expr: self.clone(),
            negated: true,
        })
    }
}
