//! SELECT composition
//!
//! [`Select`] is a consuming builder: every method takes `self` and returns
//! the updated builder, and `Select` is `Clone`, so a partially built query
//! can be forked into several variants without the variants affecting each
//! other. [`Select::build`] validates the draft and freezes it into a
//! [`QuerySpec`], which is immutable from then on.

use super::join::{Join, JoinKind, JoinOn, Source};
use super::order::OrderSpec;
use super::projection::{BindStrategy, Projection, SelectItem};
use super::validate;
use crate::config::QuarryConfig;
use crate::error::QueryError;
use crate::expr::{EntityPath, Expr, RelationRef};
use crate::predicate::Condition;
use crate::value::AttrType;

/// Validated, immutable query specification
///
/// Obtained from [`Select::build`]. Execution goes through
/// [`QueryContext`](crate::QueryContext); the same spec may be executed any
/// number of times and used as a subquery in other specs.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub(crate) root: Source,
    pub(crate) extra_sources: Vec<Source>,
    pub(crate) joins: Vec<Join>,
    pub(crate) predicate: Condition,
    pub(crate) group_by: Vec<Expr>,
    pub(crate) having: Condition,
    pub(crate) order: Vec<OrderSpec>,
    pub(crate) offset: Option<u64>,
    pub(crate) limit: Option<u64>,
    pub(crate) distinct: bool,
    pub(crate) projection: Projection,
    /// Enclosing-query aliases this spec reads when used as a subquery
    pub(crate) outer: Vec<String>,
}

impl QuerySpec {
    pub fn root(&self) -> &Source {
        &self.root
    }

    /// Additional theta-join sources listed after the root
    pub fn extra_sources(&self) -> &[Source] {
        &self.extra_sources
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn predicate(&self) -> &Condition {
        &self.predicate
    }

    pub fn group_by(&self) -> &[Expr] {
        &self.group_by
    }

    pub fn having(&self) -> &Condition {
        &self.having
    }

    pub fn order(&self) -> &[OrderSpec] {
        &self.order
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Aliases of an enclosing query this spec is correlated with
    pub fn outer_aliases(&self) -> &[String] {
        &self.outer
    }

    /// Every alias this spec introduces: root, theta sources, then joins
    pub fn aliases(&self) -> Vec<&str> {
        std::iter::once(&self.root)
            .chain(&self.extra_sources)
            .chain(self.joins.iter().map(|j| &j.target))
            .map(|s| s.alias.as_str())
            .collect()
    }

    /// Whether execution groups rows
    pub fn is_aggregate(&self) -> bool {
        !self.group_by.is_empty()
            || self.having.is_present()
            || self
                .projection
                .items()
                .iter()
                .any(|item| item.expr.contains_aggregate())
    }

    /// Column labels of the rows this spec produces
    pub fn labels(&self) -> Vec<String> {
        match &self.projection {
            Projection::Entity => {
                let mut labels: Vec<String> = self
                    .root
                    .entity
                    .attributes()
                    .iter()
                    .map(|a| a.name.clone())
                    .collect();
                for join in self.joins.iter().filter(|j| j.fetch) {
                    if let Some(rel) = join.relationship_name() {
                        labels.extend(
                            join.target
                                .entity
                                .attributes()
                                .iter()
                                .map(|a| format!("{}.{}", rel, a.name)),
                        );
                    }
                }
                labels
            }
            Projection::Columns { items, .. } => items.iter().map(SelectItem::label).collect(),
            Projection::Count | Projection::CountRows(_) => vec!["count".to_string()],
        }
    }

    /// Type of the only projected column, used when this spec is a subquery
    pub fn single_column_type(&self) -> Option<AttrType> {
        match &self.projection {
            Projection::Columns { items, .. } if items.len() == 1 => items[0].expr.static_type(),
            Projection::Count | Projection::CountRows(_) => Some(AttrType::Integer),
            _ => None,
        }
    }

    /// Copy of this spec with a different window
    pub fn with_window(&self, offset: Option<u64>, limit: Option<u64>) -> QuerySpec {
        let mut spec = self.clone();
        spec.offset = offset;
        spec.limit = limit;
        spec
    }

    /// Copy of this spec fetching at most one row
    pub fn first_row(&self) -> QuerySpec {
        self.with_window(self.offset, Some(1))
    }

    /// Copy of this spec that counts its rows instead of returning them
    ///
    /// Ordering and window are dropped. Grouped and distinct queries are
    /// counted by their result rows, so the original projection is kept
    /// inside the count.
    pub fn count_shape(&self) -> QuerySpec {
        let mut spec = self.with_window(None, None);
        spec.order.clear();
        for join in &mut spec.joins {
            join.fetch = false;
        }
        spec.projection = if self.is_aggregate() || self.distinct {
            Projection::CountRows(Box::new(self.projection.clone()))
        } else {
            Projection::Count
        };
        spec
    }

    /// Reopen this spec as a builder; the spec itself is unaffected
    pub fn to_builder(&self) -> Select {
        Select {
            draft: self.clone(),
        }
    }
}

/// SELECT builder
///
/// # Example
///
/// ```
/// use quarry::metadata::{AttrType, Catalog, EntityDef};
/// use quarry::query::Select;
///
/// let catalog = Catalog::builder()
///     .entity(EntityDef::builder("Team").attribute("name", AttrType::String).build())
///     .entity(
///         EntityDef::builder("Member")
///             .attribute("username", AttrType::String)
///             .attribute("age", AttrType::Integer)
///             .nullable_attribute("team_id", AttrType::Integer)
///             .many_to_one("team", "Team", "team_id")
///             .build(),
///     )
///     .build()
///     .unwrap();
/// let m = catalog.path("Member", "m").unwrap();
/// let t = catalog.path("Team", "t").unwrap();
///
/// let spec = Select::from(&m)
///     .join(m.relation("team").unwrap(), &t)
///     .unwrap()
///     .filter(t.attr("name").unwrap().eq("teamA"))
///     .order_by(m.attr("age").unwrap().desc())
///     .build()
///     .unwrap();
/// assert_eq!(spec.joins().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Select {
    draft: QuerySpec,
}

impl Select {
    /// Start a query over an aliased entity, projecting the entity itself
    pub fn from(path: &EntityPath) -> Self {
        Self {
            draft: QuerySpec {
                root: source_of(path),
                extra_sources: Vec::new(),
                joins: Vec::new(),
                predicate: Condition::absent(),
                group_by: Vec::new(),
                having: Condition::absent(),
                order: Vec::new(),
                offset: None,
                limit: None,
                distinct: false,
                projection: Projection::Entity,
                outer: Vec::new(),
            },
        }
    }

    /// Replace the projection with explicit items
    ///
    /// An empty item list restores the entity projection.
    pub fn select<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SelectItem>,
    {
        let items: Vec<SelectItem> = items.into_iter().map(Into::into).collect();
        let strategy = self.draft.projection.strategy();
        self.draft.projection = if items.is_empty() {
            Projection::Entity
        } else {
            Projection::Columns { items, strategy }
        };
        self
    }

    /// Let this query read columns of an enclosing query's alias
    ///
    /// Required for correlated subqueries. The enclosing query rejects the
    /// subquery when `outer` is not one of its own aliases, and a spec with
    /// outer aliases cannot be executed on its own.
    pub fn correlate(mut self, outer: &EntityPath) -> Self {
        if !self.draft.outer.iter().any(|a| a == outer.alias()) {
            self.draft.outer.push(outer.alias().to_string());
        }
        self
    }

    /// Add a source without a join condition (theta join)
    ///
    /// Rows are paired as a cross product and narrowed by `filter`.
    pub fn also_from(mut self, path: &EntityPath) -> Self {
        self.draft.extra_sources.push(source_of(path));
        self
    }

    /// Inner join along a relationship
    pub fn join(self, relation: RelationRef, target: &EntityPath) -> Result<Self, QueryError> {
        self.relation_join(JoinKind::Inner, relation, target)
    }

    /// Left outer join along a relationship
    pub fn left_join(self, relation: RelationRef, target: &EntityPath) -> Result<Self, QueryError> {
        self.relation_join(JoinKind::LeftOuter, relation, target)
    }

    fn relation_join(
        mut self,
        kind: JoinKind,
        relation: RelationRef,
        target: &EntityPath,
    ) -> Result<Self, QueryError> {
        let RelationRef {
            from_alias,
            relationship,
        } = relation;
        if relationship.target != target.entity_name() {
            return Err(QueryError::InvalidJoin(format!(
                "{}.{} targets {}, not {}",
                relationship.source,
                relationship.name,
                relationship.target,
                target.entity_name()
            )));
        }
        if !self.draft.aliases().contains(&from_alias.as_str()) {
            return Err(QueryError::InvalidJoin(format!(
                "alias {from_alias} is not part of this query"
            )));
        }
        self.check_new_alias(target.alias())?;
        self.draft.joins.push(Join {
            kind,
            target: source_of(target),
            on: JoinOn::Relation {
                from_alias,
                relationship,
                extra: Condition::absent(),
            },
            fetch: false,
        });
        Ok(self)
    }

    /// Join an unrelated entity on an explicit condition
    ///
    /// The condition must be present; use `also_from` for a cross product.
    pub fn join_entity(
        mut self,
        kind: JoinKind,
        target: &EntityPath,
        on: Condition,
    ) -> Result<Self, QueryError> {
        if on.is_absent() {
            return Err(QueryError::InvalidJoin(format!(
                "join to {} needs an on condition",
                target.alias()
            )));
        }
        self.check_new_alias(target.alias())?;
        self.draft.joins.push(Join {
            kind,
            target: source_of(target),
            on: JoinOn::Adhoc(on),
            fetch: false,
        });
        Ok(self)
    }

    /// Narrow the most recent join
    ///
    /// For outer joins the condition limits which target rows attach; it does
    /// not remove source rows.
    pub fn on(mut self, condition: Condition) -> Result<Self, QueryError> {
        let join = self
            .draft
            .joins
            .last_mut()
            .ok_or_else(|| QueryError::InvalidJoin("on() requires a preceding join".to_string()))?;
        match &mut join.on {
            JoinOn::Relation { extra, .. } => *extra = std::mem::take(extra).and(condition),
            JoinOn::Adhoc(cond) => *cond = std::mem::take(cond).and(condition),
        }
        Ok(self)
    }

    /// Mark the most recent join as a fetch join
    ///
    /// The target's attributes are loaded into each entity row under
    /// `relationship.attribute` labels.
    pub fn fetch_join(mut self) -> Result<Self, QueryError> {
        let root_alias = self.draft.root.alias.clone();
        let join = self.draft.joins.last_mut().ok_or_else(|| {
            QueryError::InvalidJoin("fetch_join() requires a preceding join".to_string())
        })?;
        let verdict = match &join.on {
            JoinOn::Relation { from_alias, .. } if *from_alias == root_alias => Ok(()),
            JoinOn::Relation { .. } => Err(QueryError::InvalidJoin(
                "fetch joins must start from the root entity".to_string(),
            )),
            JoinOn::Adhoc(_) => Err(QueryError::InvalidJoin(
                "fetch joins require a relationship".to_string(),
            )),
        };
        verdict?;
        join.fetch = true;
        Ok(self)
    }

    /// Add a filter; repeated calls are combined with `and`
    pub fn filter(mut self, condition: Condition) -> Self {
        self.draft.predicate = std::mem::take(&mut self.draft.predicate).and(condition);
        self
    }

    /// Add several filters at once; absent conditions are skipped
    pub fn filter_all<I>(self, conditions: I) -> Self
    where
        I: IntoIterator<Item = Condition>,
    {
        self.filter(Condition::all(conditions))
    }

    /// Append a sort key; earlier keys take precedence
    pub fn order_by(mut self, order: OrderSpec) -> Self {
        self.draft.order.push(order);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.draft.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.draft.limit = Some(limit);
        self
    }

    /// Offset and limit together
    pub fn page(self, offset: u64, limit: u64) -> Self {
        self.offset(offset).limit(limit)
    }

    /// Page starting at `offset` sized by the configured default page size
    pub fn page_default(self, offset: u64, config: &QuarryConfig) -> Self {
        self.page(offset, config.default_page_size)
    }

    pub fn group_by<I, E>(mut self, exprs: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        self.draft.group_by.extend(exprs.into_iter().map(Into::into));
        self
    }

    /// Filter on groups; repeated calls are combined with `and`
    pub fn having(mut self, condition: Condition) -> Self {
        self.draft.having = std::mem::take(&mut self.draft.having).and(condition);
        self
    }

    /// Drop duplicate result rows
    pub fn distinct(mut self) -> Self {
        self.draft.distinct = true;
        self
    }

    pub(crate) fn with_strategy(mut self, strategy: BindStrategy) -> Self {
        if let Projection::Columns { strategy: s, .. } = &mut self.draft.projection {
            *s = Some(strategy);
        }
        self
    }

    /// Validate and freeze
    pub fn build(self) -> Result<QuerySpec, QueryError> {
        validate::validate(&self.draft)?;
        Ok(self.draft)
    }

    fn check_new_alias(&self, alias: &str) -> Result<(), QueryError> {
        if self.draft.aliases().contains(&alias) {
            return Err(QueryError::InvalidJoin(format!(
                "alias {alias} is already used in this query"
            )));
        }
        Ok(())
    }
}

fn source_of(path: &EntityPath) -> Source {
    Source {
        entity: path.entity().clone(),
        alias: path.alias().to_string(),
    }
}
