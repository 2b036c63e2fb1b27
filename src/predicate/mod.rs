//! Predicates and conditions
//!
//! A [`Predicate`] is a boolean expression tree. A [`Condition`] wraps an
//! optional predicate: the absent condition is the identity element for both
//! `and` and `or`, which lets search forms contribute only the criteria the
//! caller actually supplied:
//!
//! ```
//! use quarry::metadata::{AttrType, Catalog, EntityDef};
//! use quarry::predicate::{ops, Condition};
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
//! let username = m.attr("username").unwrap();
//! let age = m.attr("age").unwrap();
//!
//! let name: Option<&str> = Some("member1");
//! let min_age: Option<i32> = None;
//!
//! let cond = ops::equals(&username, name).and(ops::greater_or_equal(&age, min_age));
//! assert_eq!(cond, username.eq("member1"));
//! assert!(Condition::absent().and(Condition::absent()).is_absent());
//! ```
//!
//! Evaluation is three-valued: comparisons against null are unknown, `and`,
//! `or` and `not` follow SQL truth tables, and rows are kept only when the
//! whole predicate is true.

pub mod builder;
pub mod ops;

pub use builder::ConditionBuilder;

use crate::expr::Expr;
use crate::query::QuerySpec;
use std::ops::{BitAnd, BitOr};

/// Binary comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }
}

/// Boolean expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        op: CompareOp,
        lhs: Expr,
        rhs: Expr,
    },
    Between {
        expr: Expr,
        low: Expr,
        high: Expr,
    },
    InList {
        expr: Expr,
        values: Vec<Expr>,
        negated: bool,
    },
    InSubquery {
        expr: Expr,
        subquery: Box<QuerySpec>,
        negated: bool,
    },
    Like {
        expr: Expr,
        pattern: String,
    },
    IsNull {
        expr: Expr,
        negated: bool,
    },
    /// Conjunction; an empty list is true
    And(Vec<Predicate>),
    /// Disjunction; an empty list is false
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// The predicate that holds for every row
    pub fn always() -> Predicate {
        Predicate::And(Vec::new())
    }

    /// Search the expressions of this predicate, not descending into subqueries
    pub(crate) fn any_expr(&self, f: &mut dyn FnMut(&Expr) -> bool) -> bool {
        match self {
            Predicate::Compare { lhs, rhs, .. } => lhs.any(f) || rhs.any(f),
            Predicate::Between { expr, low, high } => expr.any(f) || low.any(f) || high.any(f),
            Predicate::InList { expr, values, .. } => {
                expr.any(f) || values.iter().any(|v| v.any(f))
            }
            Predicate::InSubquery { expr, .. } => expr.any(f),
            Predicate::Like { expr, .. } | Predicate::IsNull { expr, .. } => expr.any(f),
            Predicate::And(list) | Predicate::Or(list) => list.iter().any(|p| p.any_expr(f)),
            Predicate::Not(inner) => inner.any_expr(f),
        }
    }

    pub fn contains_aggregate(&self) -> bool {
        self.any_expr(&mut |e| e.is_aggregate())
    }

    fn into_and_list(self) -> Vec<Predicate> {
        match self {
            Predicate::And(list) => list,
            other => vec![other],
        }
    }

    fn into_or_list(self) -> Vec<Predicate> {
        match self {
            Predicate::Or(list) => list,
            other => vec![other],
        }
    }
}

/// Optional predicate with absent-as-identity combinators
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Condition(Option<Predicate>);

impl Condition {
    pub fn absent() -> Self {
        Condition(None)
    }

    pub fn from_predicate(predicate: Predicate) -> Self {
        Condition(Some(predicate))
    }

    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }

    pub fn is_present(&self) -> bool {
        self.0.is_some()
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        self.0.as_ref()
    }

    pub fn into_predicate(self) -> Option<Predicate> {
        self.0
    }

    /// Conjunction; an absent side is ignored
    pub fn and(self, other: Condition) -> Condition {
        match (self.0, other.0) {
            (None, rhs) => Condition(rhs),
            (lhs, None) => Condition(lhs),
            (Some(lhs), Some(rhs)) => {
                let mut list = lhs.into_and_list();
                list.extend(rhs.into_and_list());
                Condition(Some(Predicate::And(list)))
            }
        }
    }

    /// Disjunction; an absent side is ignored
    pub fn or(self, other: Condition) -> Condition {
        match (self.0, other.0) {
            (None, rhs) => Condition(rhs),
            (lhs, None) => Condition(lhs),
            (Some(lhs), Some(rhs)) => {
                let mut list = lhs.into_or_list();
                list.extend(rhs.into_or_list());
                Condition(Some(Predicate::Or(list)))
            }
        }
    }

    /// Negation; the absent condition stays absent
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Condition {
        Condition(self.0.map(|p| Predicate::Not(Box::new(p))))
    }

    /// Conjunction of any number of conditions, absent ones skipped
    pub fn all<I>(conditions: I) -> Condition
    where
        I: IntoIterator<Item = Condition>,
    {
        conditions
            .into_iter()
            .fold(Condition::absent(), Condition::and)
    }

    /// Disjunction of any number of conditions, absent ones skipped
    pub fn any<I>(conditions: I) -> Condition
    where
        I: IntoIterator<Item = Condition>,
    {
        conditions
            .into_iter()
            .fold(Condition::absent(), Condition::or)
    }

    pub fn contains_aggregate(&self) -> bool {
        self.0.as_ref().is_some_and(Predicate::contains_aggregate)
    }
}

impl From<Predicate> for Condition {
    fn from(predicate: Predicate) -> Self {
        Condition::from_predicate(predicate)
    }
}

impl BitAnd for Condition {
    type Output = Condition;

    fn bitand(self, rhs: Condition) -> Condition {
        self.and(rhs)
    }
}

impl BitOr for Condition {
    type Output = Condition;

    fn bitor(self, rhs: Condition) -> Condition {
        self.or(rhs)
    }
}
