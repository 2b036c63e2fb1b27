//! Null-tolerant predicate constructors
//!
//! Each function takes an optional operand and returns the absent condition
//! when it is `None`. Search forms use these to build a filter from whatever
//! fields the caller filled in.

use super::Condition;
use crate::expr::{Expr, Operand};

pub fn equals<V: Operand>(expr: &Expr, value: Option<V>) -> Condition {
    value.map_or_else(Condition::absent, |v| expr.eq(v))
}

pub fn not_equals<V: Operand>(expr: &Expr, value: Option<V>) -> Condition {
    value.map_or_else(Condition::absent, |v| expr.ne(v))
}

pub fn greater_than<V: Operand>(expr: &Expr, value: Option<V>) -> Condition {
    value.map_or_else(Condition::absent, |v| expr.gt(v))
}

pub fn greater_or_equal<V: Operand>(expr: &Expr, value: Option<V>) -> Condition {
    value.map_or_else(Condition::absent, |v| expr.goe(v))
}

pub fn less_than<V: Operand>(expr: &Expr, value: Option<V>) -> Condition {
    value.map_or_else(Condition::absent, |v| expr.lt(v))
}

pub fn less_or_equal<V: Operand>(expr: &Expr, value: Option<V>) -> Condition {
    value.map_or_else(Condition::absent, |v| expr.loe(v))
}

/// Inclusive range with optional bounds
///
/// A single bound degrades to the matching one-sided comparison; no bounds
/// gives the absent condition.
pub fn range_between<V: Operand>(expr: &Expr, low: Option<V>, high: Option<V>) -> Condition {
    match (low, high) {
        (Some(low), Some(high)) => expr.between(low, high),
        (Some(low), None) => expr.goe(low),
        (None, Some(high)) => expr.loe(high),
        (None, None) => Condition::absent(),
    }
}

pub fn is_in<I, V>(expr: &Expr, values: Option<I>) -> Condition
where
    I: IntoIterator<Item = V>,
    V: Operand,
{
    values.map_or_else(Condition::absent, |v| expr.is_in(v))
}

pub fn like(expr: &Expr, pattern: Option<&str>) -> Condition {
    pattern.map_or_else(Condition::absent, |p| expr.like(p))
}

/// Conjunction of all present conditions
pub fn and<I: IntoIterator<Item = Condition>>(conditions: I) -> Condition {
    Condition::all(conditions)
}

/// Disjunction of all present conditions
pub fn or<I: IntoIterator<Item = Condition>>(conditions: I) -> Condition {
    Condition::any(conditions)
}

pub fn not(condition: Condition) -> Condition {
    condition.not()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ColumnRef;
    use crate::value::AttrType;

    fn age() -> Expr {
        Expr::Column(ColumnRef {
            alias: "m".into(),
            entity: "Member".into(),
            attribute: "age".into(),
            ty: AttrType::Integer,
            nullable: false,
        })
    }

    #[test]
    fn test_none_yields_absent() {
        assert!(equals::<i32>(&age(), None).is_absent());
        assert!(greater_or_equal::<i32>(&age(), None).is_absent());
        assert!(is_in::<Vec<i32>, i32>(&age(), None).is_absent());
        assert!(like(&age(), None).is_absent());
    }

    #[test]
    fn test_range_between_degrades() {
        let age = age();
        assert_eq!(range_between(&age, Some(10), Some(20)), age.between(10, 20));
        assert_eq!(range_between(&age, Some(10), None), age.goe(10));
        assert_eq!(range_between(&age, None, Some(20)), age.loe(20));
        assert!(range_between::<i32>(&age, None, None).is_absent());
    }

    #[test]
    fn test_and_skips_absent() {
        let age = age();
        let cond = and([equals(&age, Some(10)), equals::<i32>(&age, None)]);
        assert_eq!(cond, age.eq(10));
        assert!(or(Vec::new()).is_absent());
    }
}
