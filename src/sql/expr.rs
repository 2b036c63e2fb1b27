//! Expression and predicate rendering

use crate::expr::{Aggregate, Expr, Function};
use crate::predicate::{CompareOp, Condition, Predicate};
use crate::query::QuerySpec;
use crate::value::Value;
use sea_query::{
    CaseStatement, DynIden, Expr as SqlExpr, ExprTrait, SubQueryStatement, Value as SqlValue,
};

pub(crate) fn iden(name: &str) -> DynIden {
    DynIden::from(name.to_string())
}

pub(crate) fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::BigInt(None),
        Value::Bool(b) => SqlValue::from(*b),
        Value::Int(i) => SqlValue::from(*i),
        Value::Double(d) => SqlValue::from(*d),
        Value::Decimal(d) => SqlValue::from(*d),
        Value::String(s) => SqlValue::from(s.clone()),
        Value::Temporal(t) => SqlValue::from(*t),
    }
}

/// Renders engine expressions as sea-query expressions
///
/// Query columns are qualified by their alias. Mutations have no alias in
/// PostgreSQL, so columns of the mutated entity are qualified by its table
/// name instead.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Renderer<'a> {
    target: Option<(&'a str, &'a str)>,
}

impl<'a> Renderer<'a> {
    pub(crate) fn query() -> Self {
        Self { target: None }
    }

    pub(crate) fn mutation(alias: &'a str, table: &'a str) -> Self {
        Self {
            target: Some((alias, table)),
        }
    }

    fn qualifier<'s>(&self, alias: &'s str) -> &'s str
    where
        'a: 's,
    {
        match self.target {
            Some((target_alias, table)) if target_alias == alias => table,
            _ => alias,
        }
    }

    pub(crate) fn expr(&self, expr: &Expr) -> SqlExpr {
        match expr {
            Expr::Column(col) => {
                SqlExpr::col((iden(self.qualifier(&col.alias)), iden(&col.attribute)))
            }
            Expr::Literal(value) => SqlExpr::val(sql_value(value)),
            Expr::Function(func, args) => {
                let args: Vec<SqlExpr> = args.iter().map(|a| self.expr(a)).collect();
                match func {
                    Function::Add => {
                        let mut args = args.into_iter();
                        match (args.next(), args.next()) {
                            (Some(l), Some(r)) => l.add(r),
                            (Some(l), None) => l,
                            _ => SqlExpr::cust("NULL"),
                        }
                    }
                    Function::Lower => SqlExpr::cust_with_exprs("LOWER($1)", args),
                    Function::Upper => SqlExpr::cust_with_exprs("UPPER($1)", args),
                    Function::Concat => SqlExpr::cust_with_exprs("($1 || $2)", args),
                    Function::StringValue => SqlExpr::cust_with_exprs("CAST($1 AS TEXT)", args),
                    Function::Replace => SqlExpr::cust_with_exprs("REPLACE($1, $2, $3)", args),
                }
            }
            Expr::Aggregate(Aggregate::Count, None) => SqlExpr::cust("COUNT(*)"),
            Expr::Aggregate(agg, arg) => {
                let template = match agg {
                    Aggregate::Count => "COUNT($1)",
                    Aggregate::Sum => "SUM($1)",
                    Aggregate::Avg => "AVG($1)",
                    Aggregate::Max => "MAX($1)",
                    Aggregate::Min => "MIN($1)",
                };
                let arg = arg
                    .as_deref()
                    .map(|a| self.expr(a))
                    .unwrap_or_else(|| SqlExpr::cust("*"));
                SqlExpr::cust_with_exprs(template, [arg])
            }
            Expr::Case(case) => {
                let mut statement = CaseStatement::new();
                for (when, then) in case.branches() {
                    statement = statement.case(self.predicate(when), self.expr(then));
                }
                statement.finally(self.expr(case.otherwise())).into()
            }
            Expr::Subquery(spec) => SqlExpr::SubQuery(
                None,
                Box::new(SubQueryStatement::SelectStatement(self.subquery(spec))),
            ),
        }
    }

    fn subquery(&self, spec: &QuerySpec) -> sea_query::SelectStatement {
        super::select_with(spec, *self)
    }

    pub(crate) fn condition(&self, condition: &Condition) -> Option<SqlExpr> {
        condition.predicate().map(|p| self.predicate(p))
    }

    pub(crate) fn predicate(&self, predicate: &Predicate) -> SqlExpr {
        match predicate {
            Predicate::Compare { op, lhs, rhs } => {
                let (l, r) = (self.expr(lhs), self.expr(rhs));
                match op {
                    CompareOp::Eq => ExprTrait::eq(l, r),
                    CompareOp::Ne => ExprTrait::ne(l, r),
                    CompareOp::Gt => l.gt(r),
                    CompareOp::Ge => l.gte(r),
                    CompareOp::Lt => l.lt(r),
                    CompareOp::Le => l.lte(r),
                }
            }
            Predicate::Between { expr, low, high } => {
                self.expr(expr).between(self.expr(low), self.expr(high))
            }
            Predicate::InList {
                expr,
                values,
                negated,
            } => {
                let values: Vec<SqlExpr> = values.iter().map(|v| self.expr(v)).collect();
                if *negated {
                    self.expr(expr).is_not_in(values)
                } else {
                    self.expr(expr).is_in(values)
                }
            }
            Predicate::InSubquery {
                expr,
                subquery,
                negated,
            } => {
                let select = self.subquery(subquery);
                if *negated {
                    self.expr(expr).not_in_subquery(select)
                } else {
                    self.expr(expr).in_subquery(select)
                }
            }
            Predicate::Like { expr, pattern } => self.expr(expr).like(pattern.clone()),
            Predicate::IsNull { expr, negated } => {
                if *negated {
                    self.expr(expr).is_not_null()
                } else {
                    self.expr(expr).is_null()
                }
            }
            Predicate::And(list) => list
                .iter()
                .map(|p| self.predicate(p))
                .reduce(|acc, p| acc.and(p))
                .unwrap_or_else(|| SqlExpr::cust("TRUE")),
            Predicate::Or(list) => list
                .iter()
                .map(|p| self.predicate(p))
                .reduce(|acc, p| acc.or(p))
                .unwrap_or_else(|| SqlExpr::cust("FALSE")),
            Predicate::Not(inner) => self.predicate(inner).not(),
        }
    }
}
