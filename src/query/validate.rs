//! Build-time checks for query specifications
//!
//! Everything here runs inside [`Select::build`](super::Select::build), so a
//! spec that reaches a store is known to be well formed: aliases are unique,
//! every column belongs to a source in scope, aggregates only appear where
//! rows have been grouped, and literal operands match the types of the
//! attributes they meet.

use super::projection::Projection;
use super::select::QuerySpec;
use crate::error::QueryError;
use crate::expr::{Aggregate, ColumnRef, Expr, Function};
use crate::predicate::{Condition, Predicate};
use crate::value::AttrType;

pub(crate) fn validate(spec: &QuerySpec) -> Result<(), QueryError> {
    check_aliases(spec)?;
    check_scope(spec)?;

    if spec.predicate.contains_aggregate() {
        return Err(QueryError::InvalidAggregationSpec(
            "aggregate functions are not allowed in filter, use having".to_string(),
        ));
    }
    for join in &spec.joins {
        if join.condition().contains_aggregate() {
            return Err(QueryError::InvalidAggregationSpec(
                "aggregate functions are not allowed in join conditions".to_string(),
            ));
        }
        check_condition(join.condition())?;
    }
    check_condition(&spec.predicate)?;
    check_condition(&spec.having)?;

    for item in spec.projection.items() {
        check_expr(&item.expr)?;
    }
    for expr in &spec.group_by {
        check_expr(expr)?;
        if expr.contains_aggregate() {
            return Err(QueryError::InvalidAggregationSpec(format!(
                "cannot group by aggregate {}",
                expr.label()
            )));
        }
    }
    for order in &spec.order {
        check_expr(&order.expr)?;
    }

    if spec.is_aggregate() {
        check_grouping(spec)?;
    } else {
        for order in &spec.order {
            if order.expr.contains_aggregate() {
                return Err(QueryError::InvalidAggregationSpec(format!(
                    "cannot order by aggregate {} without grouping",
                    order.expr.label()
                )));
            }
        }
    }
    Ok(())
}

fn check_aliases(spec: &QuerySpec) -> Result<(), QueryError> {
    let aliases = spec.aliases();
    for (i, alias) in aliases.iter().enumerate() {
        if aliases[..i].contains(alias) {
            return Err(QueryError::InvalidJoin(format!(
                "alias {alias} is used more than once"
            )));
        }
    }
    Ok(())
}

/// Every column must come from the spec's own sources or a declared outer alias
fn check_scope(spec: &QuerySpec) -> Result<(), QueryError> {
    let own = spec.aliases();
    if let Some(alias) = spec.outer.iter().find(|a| own.contains(&a.as_str())) {
        return Err(QueryError::InvalidJoin(format!(
            "alias {alias} is correlated with an enclosing query and also declared here"
        )));
    }
    let scope: Vec<&str> = own
        .into_iter()
        .chain(spec.outer.iter().map(String::as_str))
        .collect();

    for join in &spec.joins {
        check_condition_scope(join.condition(), &scope)?;
    }
    check_condition_scope(&spec.predicate, &scope)?;
    check_condition_scope(&spec.having, &scope)?;
    spec.projection
        .items()
        .iter()
        .map(|item| &item.expr)
        .chain(&spec.group_by)
        .chain(spec.order.iter().map(|o| &o.expr))
        .try_for_each(|expr| check_expr_scope(expr, &scope))
}

pub(crate) fn check_condition_scope(
    condition: &Condition,
    scope: &[&str],
) -> Result<(), QueryError> {
    match condition.predicate() {
        Some(predicate) => check_predicate_scope(predicate, scope),
        None => Ok(()),
    }
}

pub(crate) fn check_expr_scope(expr: &Expr, scope: &[&str]) -> Result<(), QueryError> {
    match expr {
        Expr::Column(col) if scope.contains(&col.alias.as_str()) => Ok(()),
        Expr::Column(col) => Err(QueryError::InvalidJoin(format!(
            "{}.{} refers to alias {}, which is not part of this query",
            col.alias, col.attribute, col.alias
        ))),
        Expr::Literal(_) => Ok(()),
        Expr::Function(_, args) => args.iter().try_for_each(|a| check_expr_scope(a, scope)),
        Expr::Aggregate(_, arg) => match arg {
            Some(arg) => check_expr_scope(arg, scope),
            None => Ok(()),
        },
        Expr::Case(case) => {
            for (when, then) in &case.branches {
                check_predicate_scope(when, scope)?;
                check_expr_scope(then, scope)?;
            }
            check_expr_scope(&case.otherwise, scope)
        }
        Expr::Subquery(sub) => check_correlation(sub, scope),
    }
}

fn check_predicate_scope(predicate: &Predicate, scope: &[&str]) -> Result<(), QueryError> {
    match predicate {
        Predicate::Compare { lhs, rhs, .. } => {
            check_expr_scope(lhs, scope)?;
            check_expr_scope(rhs, scope)
        }
        Predicate::Between { expr, low, high } => [expr, low, high]
            .into_iter()
            .try_for_each(|e| check_expr_scope(e, scope)),
        Predicate::InList { expr, values, .. } => std::iter::once(expr)
            .chain(values)
            .try_for_each(|e| check_expr_scope(e, scope)),
        Predicate::InSubquery { expr, subquery, .. } => {
            check_expr_scope(expr, scope)?;
            check_correlation(subquery, scope)
        }
        Predicate::Like { expr, .. } | Predicate::IsNull { expr, .. } => {
            check_expr_scope(expr, scope)
        }
        Predicate::And(list) | Predicate::Or(list) => list
            .iter()
            .try_for_each(|p| check_predicate_scope(p, scope)),
        Predicate::Not(inner) => check_predicate_scope(inner, scope),
    }
}

/// A subquery was validated on its own; only its outer aliases meet our scope
fn check_correlation(subquery: &QuerySpec, scope: &[&str]) -> Result<(), QueryError> {
    match subquery.outer.iter().find(|a| !scope.contains(&a.as_str())) {
        Some(alias) => Err(QueryError::InvalidJoin(format!(
            "subquery is correlated with alias {alias}, which is not part of the enclosing query"
        ))),
        None => Ok(()),
    }
}

fn check_grouping(spec: &QuerySpec) -> Result<(), QueryError> {
    let items = match &spec.projection {
        Projection::Entity => {
            return Err(QueryError::InvalidAggregationSpec(
                "entity projections cannot be grouped or aggregated".to_string(),
            ))
        }
        Projection::Count | Projection::CountRows(_) => return Ok(()),
        Projection::Columns { items, .. } => items,
    };

    for expr in &spec.group_by {
        if !items.iter().any(|item| item.expr == *expr) {
            return Err(QueryError::InvalidAggregationSpec(format!(
                "group by expression {} must appear in the select list",
                expr.label()
            )));
        }
    }
    for order in &spec.order {
        if !items.iter().any(|item| item.expr == order.expr) {
            return Err(QueryError::InvalidAggregationSpec(format!(
                "order by expression {} must appear in the select list of a grouped query",
                order.expr.label()
            )));
        }
    }
    for item in items {
        check_nested_aggregates(&item.expr)?;
        if spec.group_by.contains(&item.expr) {
            continue;
        }
        if let Some(col) = ungrouped_column(&item.expr, &spec.group_by) {
            return Err(QueryError::InvalidAggregationSpec(format!(
                "{}.{} must appear in group by or be used in an aggregate",
                col.alias, col.attribute
            )));
        }
    }
    let having = spec
        .having
        .predicate()
        .and_then(|p| ungrouped_in_predicate(p, &spec.group_by));
    if let Some(col) = having {
        return Err(QueryError::InvalidAggregationSpec(format!(
            "having references {}.{} outside an aggregate",
            col.alias, col.attribute
        )));
    }
    Ok(())
}

/// First column of `expr` read outside an aggregate and not grouped on
fn ungrouped_column<'a>(expr: &'a Expr, group_by: &[Expr]) -> Option<&'a ColumnRef> {
    if group_by.contains(expr) {
        return None;
    }
    match expr {
        Expr::Column(col) => Some(col),
        Expr::Aggregate(..) | Expr::Literal(_) | Expr::Subquery(_) => None,
        Expr::Function(_, args) => args.iter().find_map(|a| ungrouped_column(a, group_by)),
        Expr::Case(case) => case
            .branches
            .iter()
            .find_map(|(when, then)| {
                ungrouped_in_predicate(when, group_by).or_else(|| ungrouped_column(then, group_by))
            })
            .or_else(|| ungrouped_column(&case.otherwise, group_by)),
    }
}

fn ungrouped_in_predicate<'a>(
    predicate: &'a Predicate,
    group_by: &[Expr],
) -> Option<&'a ColumnRef> {
    match predicate {
        Predicate::Compare { lhs, rhs, .. } => {
            ungrouped_column(lhs, group_by).or_else(|| ungrouped_column(rhs, group_by))
        }
        Predicate::Between { expr, low, high } => [expr, low, high]
            .into_iter()
            .find_map(|e| ungrouped_column(e, group_by)),
        Predicate::InList { expr, values, .. } => ungrouped_column(expr, group_by)
            .or_else(|| values.iter().find_map(|v| ungrouped_column(v, group_by))),
        Predicate::InSubquery { expr, .. }
        | Predicate::Like { expr, .. }
        | Predicate::IsNull { expr, .. } => ungrouped_column(expr, group_by),
        Predicate::And(list) | Predicate::Or(list) => {
            list.iter().find_map(|p| ungrouped_in_predicate(p, group_by))
        }
        Predicate::Not(inner) => ungrouped_in_predicate(inner, group_by),
    }
}

fn check_nested_aggregates(expr: &Expr) -> Result<(), QueryError> {
    let mut nested = false;
    expr.any(&mut |e| {
        if let Expr::Aggregate(_, Some(arg)) = e {
            nested = arg.contains_aggregate();
        }
        nested
    });
    if nested {
        return Err(QueryError::InvalidAggregationSpec(format!(
            "nested aggregate in {}",
            expr.label()
        )));
    }
    Ok(())
}

fn expect_type(expr: &Expr, expected: AttrType) -> Result<(), QueryError> {
    match expr.static_type() {
        Some(found) if found != expected => Err(QueryError::type_mismatch(
            expected.name(),
            format!("{} ({})", found.name(), expr.label()),
        )),
        _ => Ok(()),
    }
}

fn expect_numeric(expr: &Expr) -> Result<(), QueryError> {
    match expr.static_type() {
        Some(found) if !found.is_numeric() => Err(QueryError::type_mismatch(
            "numeric",
            format!("{} ({})", found.name(), expr.label()),
        )),
        _ => Ok(()),
    }
}

fn expect_comparable(lhs: &Expr, rhs: &Expr) -> Result<(), QueryError> {
    match (lhs.static_type(), rhs.static_type()) {
        (Some(l), Some(r)) if !l.comparable_with(r) => Err(QueryError::type_mismatch(
            format!("{} ({})", l.name(), lhs.label()),
            format!("{} ({})", r.name(), rhs.label()),
        )),
        _ => Ok(()),
    }
}

fn expect_single_column(spec: &QuerySpec) -> Result<(), QueryError> {
    let columns = spec.labels().len();
    if columns != 1 || matches!(spec.projection, Projection::Entity) {
        return Err(QueryError::type_mismatch(
            "single-column subquery",
            format!("{columns} columns"),
        ));
    }
    Ok(())
}

pub(crate) fn check_expr(expr: &Expr) -> Result<(), QueryError> {
    match expr {
        Expr::Column(_) | Expr::Literal(_) => Ok(()),
        Expr::Function(func, args) => {
            for arg in args {
                check_expr(arg)?;
            }
            match func {
                Function::Lower | Function::Upper | Function::Replace | Function::Concat => {
                    args.iter().try_for_each(|a| expect_type(a, AttrType::String))
                }
                Function::Add => args.iter().try_for_each(expect_numeric),
                Function::StringValue => Ok(()),
            }
        }
        Expr::Aggregate(agg, arg) => {
            let Some(arg) = arg else {
                return Ok(());
            };
            check_expr(arg)?;
            match agg {
                Aggregate::Sum | Aggregate::Avg => expect_numeric(arg),
                Aggregate::Count | Aggregate::Max | Aggregate::Min => Ok(()),
            }
        }
        Expr::Case(case) => {
            for (when, then) in &case.branches {
                check_predicate(when)?;
                check_expr(then)?;
            }
            check_expr(&case.otherwise)?;
            let mut results = case
                .branches
                .iter()
                .map(|(_, then)| then)
                .chain(std::iter::once(&case.otherwise));
            if let Some(first) = results.next() {
                for other in results {
                    expect_comparable(first, other)?;
                }
            }
            Ok(())
        }
        Expr::Subquery(spec) => expect_single_column(spec),
    }
}

pub(crate) fn check_condition(condition: &Condition) -> Result<(), QueryError> {
    match condition.predicate() {
        Some(predicate) => check_predicate(predicate),
        None => Ok(()),
    }
}

fn check_predicate(predicate: &Predicate) -> Result<(), QueryError> {
    match predicate {
        Predicate::Compare { lhs, rhs, .. } => {
            check_expr(lhs)?;
            check_expr(rhs)?;
            expect_comparable(lhs, rhs)
        }
        Predicate::Between { expr, low, high } => {
            check_expr(expr)?;
            check_expr(low)?;
            check_expr(high)?;
            expect_comparable(expr, low)?;
            expect_comparable(expr, high)
        }
        Predicate::InList { expr, values, .. } => {
            check_expr(expr)?;
            for value in values {
                check_expr(value)?;
                expect_comparable(expr, value)?;
            }
            Ok(())
        }
        Predicate::InSubquery { expr, subquery, .. } => {
            check_expr(expr)?;
            expect_single_column(subquery)?;
            match (expr.static_type(), subquery.single_column_type()) {
                (Some(l), Some(r)) if !l.comparable_with(r) => Err(QueryError::type_mismatch(
                    l.name(),
                    format!("subquery of {}", r.name()),
                )),
                _ => Ok(()),
            }
        }
        Predicate::Like { expr, .. } => {
            check_expr(expr)?;
            expect_type(expr, AttrType::String)
        }
        Predicate::IsNull { expr, .. } => check_expr(expr),
        Predicate::And(list) | Predicate::Or(list) => list.iter().try_for_each(check_predicate),
        Predicate::Not(inner) => check_predicate(inner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Catalog, EntityDef};
    use crate::query::Select;

    fn catalog() -> Catalog {
        Catalog::builder()
            .entity(
                EntityDef::builder("Team")
                    .attribute("name", AttrType::String)
                    .build(),
            )
            .entity(
                EntityDef::builder("Member")
                    .attribute("username", AttrType::String)
                    .attribute("age", AttrType::Integer)
                    .nullable_attribute("team_id", AttrType::Integer)
                    .many_to_one("team", "Team", "team_id")
                    .build(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_aggregate_in_filter_rejected() {
        let catalog = catalog();
        let m = catalog.path("Member", "m").unwrap();
        let age = m.attr("age").unwrap();
        let err = Select::from(&m).filter(age.avg().gt(10)).build().unwrap_err();
        assert!(matches!(err, QueryError::InvalidAggregationSpec(_)));
    }

    #[test]
    fn test_ungrouped_column_rejected() {
        let catalog = catalog();
        let m = catalog.path("Member", "m").unwrap();
        let age = m.attr("age").unwrap();
        let username = m.attr("username").unwrap();
        let err = Select::from(&m)
            .select([username.clone(), age.avg()])
            .build()
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidAggregationSpec(_)));

        let ok = Select::from(&m)
            .select([username.clone(), age.avg()])
            .group_by([&username])
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn test_group_expression_must_be_projected() {
        let catalog = catalog();
        let m = catalog.path("Member", "m").unwrap();
        let age = m.attr("age").unwrap();
        let username = m.attr("username").unwrap();
        let err = Select::from(&m)
            .select([age.count()])
            .group_by([&username])
            .build()
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidAggregationSpec(_)));
    }

    #[test]
    fn test_entity_projection_cannot_group() {
        let catalog = catalog();
        let m = catalog.path("Member", "m").unwrap();
        let username = m.attr("username").unwrap();
        let err = Select::from(&m).group_by([&username]).build().unwrap_err();
        assert!(matches!(err, QueryError::InvalidAggregationSpec(_)));
    }

    #[test]
    fn test_nested_aggregate_rejected() {
        let catalog = catalog();
        let m = catalog.path("Member", "m").unwrap();
        let age = m.attr("age").unwrap();
        let err = Select::from(&m).select([age.max().sum()]).build().unwrap_err();
        assert!(matches!(err, QueryError::InvalidAggregationSpec(_)));
    }

    #[test]
    fn test_literal_type_mismatch() {
        let catalog = catalog();
        let m = catalog.path("Member", "m").unwrap();
        let age = m.attr("age").unwrap();
        let username = m.attr("username").unwrap();

        let err = Select::from(&m).filter(age.eq("ten")).build().unwrap_err();
        assert!(matches!(err, QueryError::TypeMismatch { .. }));

        let err = Select::from(&m).filter(age.like("1%")).build().unwrap_err();
        assert!(matches!(err, QueryError::TypeMismatch { .. }));

        let err = Select::from(&m).select([username.concat(&age)]).build().unwrap_err();
        assert!(matches!(err, QueryError::TypeMismatch { .. }));

        let ok = Select::from(&m)
            .select([username.concat("_").concat(age.string_value())])
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn test_subquery_must_project_one_column() {
        let catalog = catalog();
        let m = catalog.path("Member", "m").unwrap();
        let sub = catalog.path("Member", "sub").unwrap();
        let age = m.attr("age").unwrap();
        let inner = Select::from(&sub).build().unwrap();
        let err = Select::from(&m).filter(age.in_subquery(&inner)).build().unwrap_err();
        assert!(matches!(err, QueryError::TypeMismatch { .. }));
    }

    #[test]
    fn test_column_of_unjoined_alias_rejected() {
        let catalog = catalog();
        let m = catalog.path("Member", "m").unwrap();
        let t = catalog.path("Team", "t").unwrap();
        let name = t.attr("name").unwrap();

        let err = Select::from(&m).filter(name.eq("teamA")).build().unwrap_err();
        assert!(matches!(err, QueryError::InvalidJoin(_)));
        let err = Select::from(&m).select([&name]).build().unwrap_err();
        assert!(matches!(err, QueryError::InvalidJoin(_)));
        let err = Select::from(&m).order_by(name.asc()).build().unwrap_err();
        assert!(matches!(err, QueryError::InvalidJoin(_)));

        let joined = Select::from(&m)
            .join(m.relation("team").unwrap(), &t)
            .unwrap()
            .filter(name.eq("teamA"))
            .build();
        assert!(joined.is_ok());
        let theta = Select::from(&m).also_from(&t).filter(name.eq("teamA")).build();
        assert!(theta.is_ok());
    }

    #[test]
    fn test_subquery_correlation_checked_against_enclosing_scope() {
        let catalog = catalog();
        let m = catalog.path("Member", "m").unwrap();
        let t = catalog.path("Team", "t").unwrap();
        let sub = catalog.path("Member", "sub").unwrap();
        let sub_age = sub.attr("age").unwrap();
        let age = m.attr("age").unwrap();

        // outer columns need an explicit correlate
        let err = Select::from(&sub)
            .select([sub_age.max()])
            .filter(sub.attr("team_id").unwrap().eq(m.attr("team_id").unwrap()))
            .build()
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidJoin(_)));

        let inner = Select::from(&sub)
            .correlate(&m)
            .select([sub_age.max()])
            .filter(sub.attr("team_id").unwrap().eq(m.attr("team_id").unwrap()))
            .build()
            .unwrap();
        assert_eq!(inner.outer_aliases(), ["m"]);
        assert!(Select::from(&m).filter(age.eq(&inner)).build().is_ok());

        // embedding it where `m` is not in scope fails
        let err = Select::from(&t)
            .select([Expr::subquery(inner.clone())])
            .build()
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidJoin(_)));

        let err = Select::from(&m).correlate(&m).build().unwrap_err();
        assert!(matches!(err, QueryError::InvalidJoin(_)));
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let catalog = catalog();
        let m = catalog.path("Member", "m").unwrap();
        let err = Select::from(&m).also_from(&m).build().unwrap_err();
        assert!(matches!(err, QueryError::InvalidJoin(_)));
    }
}
