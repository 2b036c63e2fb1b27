//! CASE expressions
//!
//! Simple cases (`age.when(10).then("ten")...`) are stored as searched cases
//! whose conditions compare the subject for equality, so evaluation and SQL
//! rendering only deal with one shape.

use super::{Expr, Operand};
use crate::predicate::{CompareOp, Condition, Predicate};
use crate::value::Value;

/// Searched CASE: ordered `(condition, result)` branches and a fallback
#[derive(Debug, Clone, PartialEq)]
pub struct CaseExpr {
    pub(crate) branches: Vec<(Predicate, Expr)>,
    pub(crate) otherwise: Expr,
}

impl CaseExpr {
    pub fn branches(&self) -> &[(Predicate, Expr)] {
        &self.branches
    }

    pub fn otherwise(&self) -> &Expr {
        &self.otherwise
    }
}

fn finish(branches: Vec<(Predicate, Expr)>, otherwise: Expr) -> Expr {
    Expr::Case(Box::new(CaseExpr {
        branches,
        otherwise,
    }))
}

/// Builder for searched CASE expressions
///
/// ```
/// # use quarry::metadata::{AttrType, Catalog, EntityDef};
/// # use quarry::expr::Expr;
/// # let catalog = Catalog::builder()
/// #     .entity(EntityDef::builder("Member").attribute("age", AttrType::Integer).build())
/// #     .build()
/// #     .unwrap();
/// # let m = catalog.path("Member", "m").unwrap();
/// let age = m.attr("age").unwrap();
/// let bucket = Expr::case()
///     .when(age.between(0, 20))
///     .then("0~20")
///     .when(age.between(21, 30))
///     .then("21~30")
///     .otherwise("other");
/// ```
#[derive(Debug, Clone, Default)]
pub struct CaseBuilder {
    branches: Vec<(Predicate, Expr)>,
}

impl CaseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// An absent condition matches every row
    pub fn when(self, condition: Condition) -> CaseWhen {
        CaseWhen {
            builder: self,
            condition: condition.into_predicate().unwrap_or_else(Predicate::always),
        }
    }

    pub fn otherwise(self, result: impl Operand) -> Expr {
        finish(self.branches, result.into_expr())
    }

    /// Close the CASE with a null fallback
    pub fn end(self) -> Expr {
        finish(self.branches, Expr::Literal(Value::Null))
    }
}

/// A searched branch waiting for its result
#[derive(Debug, Clone)]
pub struct CaseWhen {
    builder: CaseBuilder,
    condition: Predicate,
}

impl CaseWhen {
    pub fn then(mut self, result: impl Operand) -> CaseBuilder {
        self.builder
            .branches
            .push((self.condition, result.into_expr()));
        self.builder
    }
}

/// Simple CASE over a subject expression
#[derive(Debug, Clone)]
pub struct SimpleCase {
    subject: Expr,
    branches: Vec<(Predicate, Expr)>,
}

impl SimpleCase {
    pub(crate) fn new(subject: Expr) -> Self {
        Self {
            subject,
            branches: Vec::new(),
        }
    }

    pub fn when(self, value: impl Operand) -> SimpleCaseWhen {
        let condition = Predicate::Compare {
            op: CompareOp::Eq,
            lhs: self.subject.clone(),
            rhs: value.into_expr(),
        };
        SimpleCaseWhen {
            case: self,
            condition,
        }
    }

    pub fn otherwise(self, result: impl Operand) -> Expr {
        finish(self.branches, result.into_expr())
    }

    pub fn end(self) -> Expr {
        finish(self.branches, Expr::Literal(Value::Null))
    }
}

/// A simple-case branch waiting for its result
#[derive(Debug, Clone)]
pub struct SimpleCaseWhen {
    case: SimpleCase,
    condition: Predicate,
}

impl SimpleCaseWhen {
    pub fn then(mut self, result: impl Operand) -> SimpleCase {
        self.case.branches.push((self.condition, result.into_expr()));
        self.case
    }
}
