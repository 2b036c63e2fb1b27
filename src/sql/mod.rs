//! PostgreSQL rendering
//!
//! Specifications are rendered through sea-query's [`PostgresQueryBuilder`].
//! Every projected column is emitted with an `AS` label equal to the row
//! label the engine expects (see [`QuerySpec::labels`]), so rows coming back
//! from the database line up with rows produced by the memory store.
//!
//! # Example
//!
//! ```
//! use quarry::metadata::{AttrType, Catalog, EntityDef};
//! use quarry::query::Select;
//! use quarry::sql;
//!
//! let catalog = Catalog::builder()
//!     .entity(EntityDef::builder("Member").attribute("age", AttrType::Integer).build())
//!     .build()
//!     .unwrap();
//! let m = catalog.path("Member", "m").unwrap();
//! let age = m.attr("age").unwrap();
//! let spec = Select::from(&m).select([&age]).filter(age.gt(18)).build().unwrap();
//!
//! let (sql, values) = sql::build_select(&spec);
//! assert_eq!(sql, r#"SELECT "m"."age" AS "age" FROM "member" AS "m" WHERE "m"."age" > $1"#);
//! assert_eq!(values.0.len(), 1);
//! ```

mod expr;

pub(crate) use expr::Renderer;

use self::expr::iden;
use crate::query::{Direction, JoinKind, JoinOn, MutationSpec, NullPlacement, Projection, QuerySpec};
use sea_query::{
    DeleteStatement, Expr as SqlExpr, ExprTrait, JoinType, NullOrdering, Order,
    PostgresQueryBuilder, Query, SelectStatement, UpdateStatement, Values,
};

/// sea-query statement for a specification
pub fn select_statement(spec: &QuerySpec) -> SelectStatement {
    select_with(spec, Renderer::query())
}

/// Parameterized SQL and its bound values
pub fn build_select(spec: &QuerySpec) -> (String, Values) {
    select_statement(spec).build(PostgresQueryBuilder)
}

/// SQL with values inlined, for logging and tests
pub fn select_to_string(spec: &QuerySpec) -> String {
    select_statement(spec).to_string(PostgresQueryBuilder)
}

/// Parameterized SQL for a bulk update or delete
pub fn build_mutation(mutation: &MutationSpec) -> (String, Values) {
    match mutation {
        MutationSpec::Update { .. } => update_statement(mutation).build(PostgresQueryBuilder),
        MutationSpec::Delete { .. } => delete_statement(mutation).build(PostgresQueryBuilder),
    }
}

/// Mutation SQL with values inlined
pub fn mutation_to_string(mutation: &MutationSpec) -> String {
    match mutation {
        MutationSpec::Update { .. } => update_statement(mutation).to_string(PostgresQueryBuilder),
        MutationSpec::Delete { .. } => delete_statement(mutation).to_string(PostgresQueryBuilder),
    }
}

fn update_statement(mutation: &MutationSpec) -> UpdateStatement {
    let target = mutation.target();
    let renderer = Renderer::mutation(&target.alias, target.entity.table());
    let mut update = Query::update();
    update.table(iden(target.entity.table()));
    if let MutationSpec::Update { assignments, .. } = mutation {
        for assignment in assignments {
            update.value(iden(&assignment.attribute), renderer.expr(&assignment.value));
        }
    }
    if let Some(cond) = renderer.condition(mutation.predicate()) {
        update.and_where(cond);
    }
    update
}

fn delete_statement(mutation: &MutationSpec) -> DeleteStatement {
    let target = mutation.target();
    let renderer = Renderer::mutation(&target.alias, target.entity.table());
    let mut delete = Query::delete();
    delete.from_table(iden(target.entity.table()));
    if let Some(cond) = renderer.condition(mutation.predicate()) {
        delete.and_where(cond);
    }
    delete
}

pub(crate) fn select_with(spec: &QuerySpec, renderer: Renderer<'_>) -> SelectStatement {
    match &spec.projection {
        Projection::CountRows(inner) => {
            let mut inner_spec = spec.clone();
            inner_spec.projection = (**inner).clone();
            let subquery = shaped(&inner_spec, renderer);
            let mut select = Query::select();
            select
                .expr_as(SqlExpr::cust("COUNT(*)"), iden("count"))
                .from_subquery(subquery, iden("count_subquery"));
            select
        }
        _ => shaped(spec, renderer),
    }
}

fn shaped(spec: &QuerySpec, renderer: Renderer<'_>) -> SelectStatement {
    let mut select = Query::select();
    select.from_as(iden(spec.root.entity.table()), iden(&spec.root.alias));
    for source in &spec.extra_sources {
        select.from_as(iden(source.entity.table()), iden(&source.alias));
    }

    for join in &spec.joins {
        let kind = match join.kind {
            JoinKind::Inner => JoinType::InnerJoin,
            JoinKind::LeftOuter => JoinType::LeftJoin,
        };
        let on = match &join.on {
            JoinOn::Relation {
                from_alias,
                relationship,
                extra,
            } => {
                let (from_col, to_col) = relationship.join_columns();
                let link = SqlExpr::col((iden(from_alias), iden(from_col)))
                    .equals((iden(&join.target.alias), iden(to_col)));
                match renderer.condition(extra) {
                    Some(extra) => link.and(extra),
                    None => link,
                }
            }
            JoinOn::Adhoc(cond) => renderer
                .condition(cond)
                .unwrap_or_else(|| SqlExpr::cust("TRUE")),
        };
        select.join_as(
            kind,
            iden(join.target.entity.table()),
            iden(&join.target.alias),
            on,
        );
    }

    project(&mut select, spec, renderer);
    if spec.distinct {
        select.distinct();
    }
    if let Some(cond) = renderer.condition(&spec.predicate) {
        select.and_where(cond);
    }
    if !spec.group_by.is_empty() {
        select.add_group_by(spec.group_by.iter().map(|e| renderer.expr(e)));
    }
    if let Some(cond) = renderer.condition(&spec.having) {
        select.and_having(cond);
    }
    for order in &spec.order {
        let direction = match order.direction {
            Direction::Asc => Order::Asc,
            Direction::Desc => Order::Desc,
        };
        let expr = renderer.expr(&order.expr);
        match order.nulls {
            NullPlacement::Default => {
                select.order_by_expr(expr, direction);
            }
            NullPlacement::First => {
                select.order_by_expr_with_nulls(expr, direction, NullOrdering::First);
            }
            NullPlacement::Last => {
                select.order_by_expr_with_nulls(expr, direction, NullOrdering::Last);
            }
        }
    }
    if let Some(limit) = spec.limit {
        select.limit(limit);
    }
    if let Some(offset) = spec.offset {
        select.offset(offset);
    }
    select
}

fn project(select: &mut SelectStatement, spec: &QuerySpec, renderer: Renderer<'_>) {
    match &spec.projection {
        Projection::Entity => {
            let root = &spec.root;
            for attr in root.entity.attributes() {
                select.expr_as(
                    SqlExpr::col((iden(&root.alias), iden(&attr.name))),
                    iden(&attr.name),
                );
            }
            for join in spec.joins.iter().filter(|j| j.fetch) {
                let Some(rel) = join.relationship_name() else {
                    continue;
                };
                for attr in join.target.entity.attributes() {
                    select.expr_as(
                        SqlExpr::col((iden(&join.target.alias), iden(&attr.name))),
                        iden(&format!("{}.{}", rel, attr.name)),
                    );
                }
            }
        }
        Projection::Columns { items, .. } => {
            for item in items {
                select.expr_as(renderer.expr(&item.expr), iden(&item.label()));
            }
        }
        Projection::Count | Projection::CountRows(_) => {
            select.expr_as(SqlExpr::cust("COUNT(*)"), iden("count"));
        }
    }
}
