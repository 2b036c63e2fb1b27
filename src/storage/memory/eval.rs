//! In-memory evaluation of query specifications
//!
//! Rows flow through the same stages a SQL engine would use: source cross
//! product, joins, filter, grouping with having, projection, ordering,
//! distinct and finally the offset/limit window. Predicates evaluate to
//! `Option<bool>` where `None` is SQL unknown.

use super::Table;
use crate::error::StorageError;
use crate::expr::{Aggregate, ColumnRef, Expr, Function};
use crate::predicate::{CompareOp, Condition, Predicate};
use crate::query::{Join, JoinKind, JoinOn, OrderSpec, Projection, QuerySpec};
use crate::value::{Row, Value};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub(crate) type Record = BTreeMap<String, Value>;

/// Alias bindings for one candidate row; `None` is a null-extended outer join
#[derive(Debug, Clone, Default)]
pub(crate) struct Frame {
    bindings: Vec<(String, Option<Arc<Record>>)>,
}

impl Frame {
    pub(crate) fn single(alias: &str, record: Arc<Record>) -> Self {
        Self {
            bindings: vec![(alias.to_string(), Some(record))],
        }
    }

    fn nulls<'a>(aliases: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            bindings: aliases.into_iter().map(|a| (a.to_string(), None)).collect(),
        }
    }

    fn bind(&self, alias: &str, record: Option<Arc<Record>>) -> Frame {
        let mut bindings = self.bindings.clone();
        bindings.push((alias.to_string(), record));
        Frame { bindings }
    }

    fn lookup(&self, alias: &str) -> Option<&Option<Arc<Record>>> {
        self.bindings
            .iter()
            .rev()
            .find(|(a, _)| a == alias)
            .map(|(_, r)| r)
    }

    fn value(&self, alias: &str, attribute: &str) -> Value {
        match self.lookup(alias) {
            Some(Some(record)) => record.get(attribute).cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }
}

/// Evaluation scope: the current frame, its group when aggregating, and the
/// enclosing query's scope for correlated subqueries
#[derive(Clone, Copy)]
pub(crate) struct Env<'a> {
    frame: &'a Frame,
    group: Option<&'a [Frame]>,
    parent: Option<&'a Env<'a>>,
}

impl<'a> Env<'a> {
    pub(crate) fn new(frame: &'a Frame) -> Self {
        Self {
            frame,
            group: None,
            parent: None,
        }
    }

    fn column(&self, col: &ColumnRef) -> Result<Value, StorageError> {
        let mut env = Some(self);
        while let Some(e) = env {
            if let Some(binding) = e.frame.lookup(&col.alias) {
                return Ok(match binding {
                    Some(record) => record.get(&col.attribute).cloned().unwrap_or(Value::Null),
                    None => Value::Null,
                });
            }
            env = e.parent;
        }
        Err(StorageError::new(format!(
            "alias {} is not bound in this query",
            col.alias
        )))
    }
}

pub(crate) struct Evaluator<'t> {
    tables: &'t HashMap<String, Table>,
}

impl<'t> Evaluator<'t> {
    pub(crate) fn new(tables: &'t HashMap<String, Table>) -> Self {
        Self { tables }
    }

    fn records(&self, entity: &str) -> &'t [Arc<Record>] {
        self.tables
            .get(entity)
            .map(|t| t.records.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn run(
        &self,
        spec: &QuerySpec,
        outer: Option<&Env<'_>>,
    ) -> Result<Vec<Row>, StorageError> {
        let frames = self.source_frames(spec, outer)?;
        let frames = self.filter_frames(frames, &spec.predicate, outer)?;
        match &spec.projection {
            Projection::Count => Ok(vec![count_row(frames.len())]),
            Projection::CountRows(inner) => {
                let rows = self.shape(spec, inner, frames, outer)?;
                Ok(vec![count_row(rows.len())])
            }
            projection => {
                let rows = self.shape(spec, projection, frames, outer)?;
                let offset = spec.offset.map_or(0, to_usize);
                let limit = spec.limit.map_or(usize::MAX, to_usize);
                let labels: Arc<[String]> = spec.labels().into();
                Ok(rows
                    .into_iter()
                    .skip(offset)
                    .take(limit)
                    .map(|values| Row::new(labels.clone(), values))
                    .collect())
            }
        }
    }

    fn source_frames(
        &self,
        spec: &QuerySpec,
        outer: Option<&Env<'_>>,
    ) -> Result<Vec<Frame>, StorageError> {
        let mut frames = vec![Frame::default()];
        for source in std::iter::once(&spec.root).chain(&spec.extra_sources) {
            let records = self.records(source.entity.name());
            frames = frames
                .iter()
                .flat_map(|f| {
                    records
                        .iter()
                        .map(move |r| f.bind(&source.alias, Some(r.clone())))
                })
                .collect();
        }
        for join in &spec.joins {
            let records = self.records(join.target.entity.name());
            let mut next = Vec::with_capacity(frames.len());
            for frame in &frames {
                let mut matched = false;
                for record in records {
                    let candidate = frame.bind(&join.target.alias, Some(record.clone()));
                    if self.join_matches(join, &candidate, outer)? {
                        next.push(candidate);
                        matched = true;
                    }
                }
                if !matched && join.kind == JoinKind::LeftOuter {
                    next.push(frame.bind(&join.target.alias, None));
                }
            }
            frames = next;
        }
        Ok(frames)
    }

    fn join_matches(
        &self,
        join: &Join,
        candidate: &Frame,
        outer: Option<&Env<'_>>,
    ) -> Result<bool, StorageError> {
        let extra = match &join.on {
            JoinOn::Relation {
                from_alias,
                relationship,
                extra,
            } => {
                let (from_column, to_column) = relationship.join_columns();
                let left = candidate.value(from_alias, from_column);
                let right = candidate.value(&join.target.alias, to_column);
                if left.sql_eq(&right) != Some(true) {
                    return Ok(false);
                }
                extra
            }
            JoinOn::Adhoc(cond) => cond,
        };
        let env = Env {
            frame: candidate,
            group: None,
            parent: outer,
        };
        Ok(self.test(extra, &env)? == Some(true))
    }

    fn filter_frames(
        &self,
        frames: Vec<Frame>,
        predicate: &Condition,
        outer: Option<&Env<'_>>,
    ) -> Result<Vec<Frame>, StorageError> {
        if predicate.is_absent() {
            return Ok(frames);
        }
        let mut kept = Vec::with_capacity(frames.len());
        for frame in frames {
            let env = Env {
                frame: &frame,
                group: None,
                parent: outer,
            };
            if self.test(predicate, &env)? == Some(true) {
                kept.push(frame);
            }
        }
        Ok(kept)
    }

    /// Grouping, projection, ordering and distinct; no window
    fn shape(
        &self,
        spec: &QuerySpec,
        projection: &Projection,
        frames: Vec<Frame>,
        outer: Option<&Env<'_>>,
    ) -> Result<Vec<Vec<Value>>, StorageError> {
        let aggregate = !spec.group_by.is_empty()
            || spec.having.is_present()
            || projection
                .items()
                .iter()
                .any(|item| item.expr.contains_aggregate());

        let mut keyed: Vec<(Vec<Value>, Vec<Value>)> = Vec::new();
        if aggregate {
            let groups = self.group(spec, frames, outer)?;
            let nulls = Frame::nulls(spec.aliases());
            for group in &groups {
                let env = Env {
                    frame: group.first().unwrap_or(&nulls),
                    group: Some(group.as_slice()),
                    parent: outer,
                };
                if self.test(&spec.having, &env)? != Some(true) {
                    continue;
                }
                keyed.push(self.project_keyed(spec, projection, &env)?);
            }
        } else {
            for frame in &frames {
                let env = Env {
                    frame,
                    group: None,
                    parent: outer,
                };
                keyed.push(self.project_keyed(spec, projection, &env)?);
            }
        }

        sort_keyed(&mut keyed, &spec.order);
        let mut rows: Vec<Vec<Value>> = Vec::with_capacity(keyed.len());
        for (_, values) in keyed {
            if spec.distinct && rows.contains(&values) {
                continue;
            }
            rows.push(values);
        }
        Ok(rows)
    }

    fn group(
        &self,
        spec: &QuerySpec,
        frames: Vec<Frame>,
        outer: Option<&Env<'_>>,
    ) -> Result<Vec<Vec<Frame>>, StorageError> {
        if spec.group_by.is_empty() {
            return Ok(vec![frames]);
        }
        let mut groups: Vec<(Vec<Value>, Vec<Frame>)> = Vec::new();
        for frame in frames {
            let env = Env {
                frame: &frame,
                group: None,
                parent: outer,
            };
            let key = spec
                .group_by
                .iter()
                .map(|e| self.eval(e, &env))
                .collect::<Result<Vec<_>, _>>()?;
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(frame),
                None => groups.push((key, vec![frame])),
            }
        }
        Ok(groups.into_iter().map(|(_, members)| members).collect())
    }

    fn project_keyed(
        &self,
        spec: &QuerySpec,
        projection: &Projection,
        env: &Env<'_>,
    ) -> Result<(Vec<Value>, Vec<Value>), StorageError> {
        let keys = spec
            .order
            .iter()
            .map(|o| self.eval(&o.expr, env))
            .collect::<Result<Vec<_>, _>>()?;
        let values = match projection {
            Projection::Entity => entity_values(spec, env.frame),
            Projection::Columns { items, .. } => items
                .iter()
                .map(|item| self.eval(&item.expr, env))
                .collect::<Result<Vec<_>, _>>()?,
            Projection::Count | Projection::CountRows(_) => {
                return Err(StorageError::new("count projection cannot be nested"))
            }
        };
        Ok((keys, values))
    }

    /// Evaluate a condition; the absent condition is true
    pub(crate) fn test(
        &self,
        condition: &Condition,
        env: &Env<'_>,
    ) -> Result<Option<bool>, StorageError> {
        match condition.predicate() {
            Some(p) => self.test_predicate(p, env),
            None => Ok(Some(true)),
        }
    }

    fn test_predicate(
        &self,
        predicate: &Predicate,
        env: &Env<'_>,
    ) -> Result<Option<bool>, StorageError> {
        Ok(match predicate {
            Predicate::Compare { op, lhs, rhs } => {
                let l = self.eval(lhs, env)?;
                let r = self.eval(rhs, env)?;
                compare(*op, &l, &r)
            }
            Predicate::Between { expr, low, high } => {
                let v = self.eval(expr, env)?;
                let lo = self.eval(low, env)?;
                let hi = self.eval(high, env)?;
                and3(compare(CompareOp::Ge, &v, &lo), compare(CompareOp::Le, &v, &hi))
            }
            Predicate::InList {
                expr,
                values,
                negated,
            } => {
                let v = self.eval(expr, env)?;
                let candidates = values
                    .iter()
                    .map(|e| self.eval(e, env))
                    .collect::<Result<Vec<_>, _>>()?;
                negate_if(member_of(&v, &candidates), *negated)
            }
            Predicate::InSubquery {
                expr,
                subquery,
                negated,
            } => {
                let v = self.eval(expr, env)?;
                let candidates: Vec<Value> = self
                    .run(subquery, Some(env))?
                    .into_iter()
                    .map(|row| row.into_values().into_iter().next().unwrap_or(Value::Null))
                    .collect();
                negate_if(member_of(&v, &candidates), *negated)
            }
            Predicate::Like { expr, pattern } => match self.eval(expr, env)? {
                Value::Null => None,
                Value::String(s) => Some(like_matches(&s, pattern)),
                other => Some(like_matches(&other.to_string(), pattern)),
            },
            Predicate::IsNull { expr, negated } => {
                Some(self.eval(expr, env)?.is_null() != *negated)
            }
            Predicate::And(list) => {
                let mut acc = Some(true);
                for p in list {
                    acc = and3(acc, self.test_predicate(p, env)?);
                    if acc == Some(false) {
                        break;
                    }
                }
                acc
            }
            Predicate::Or(list) => {
                let mut acc = Some(false);
                for p in list {
                    acc = or3(acc, self.test_predicate(p, env)?);
                    if acc == Some(true) {
                        break;
                    }
                }
                acc
            }
            Predicate::Not(inner) => self.test_predicate(inner, env)?.map(|b| !b),
        })
    }

    pub(crate) fn eval(&self, expr: &Expr, env: &Env<'_>) -> Result<Value, StorageError> {
        match expr {
            Expr::Column(col) => env.column(col),
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Function(func, args) => {
                let values = args
                    .iter()
                    .map(|a| self.eval(a, env))
                    .collect::<Result<Vec<_>, _>>()?;
                apply_function(*func, values)
            }
            Expr::Aggregate(agg, arg) => {
                let group = env.group.ok_or_else(|| {
                    StorageError::new(format!("{} evaluated outside a group", agg.name()))
                })?;
                let Some(arg) = arg else {
                    return Ok(Value::Int(group.len() as i64));
                };
                let values = group
                    .iter()
                    .map(|frame| {
                        let member = Env {
                            frame,
                            group: None,
                            parent: env.parent,
                        };
                        self.eval(arg, &member)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                apply_aggregate(*agg, values)
            }
            Expr::Case(case) => {
                for (when, then) in &case.branches {
                    if self.test_predicate(when, env)? == Some(true) {
                        return self.eval(then, env);
                    }
                }
                self.eval(&case.otherwise, env)
            }
            Expr::Subquery(spec) => {
                let mut rows = self.run(spec, Some(env))?;
                match rows.len() {
                    0 => Ok(Value::Null),
                    1 => Ok(rows
                        .pop()
                        .and_then(|row| row.into_values().into_iter().next())
                        .unwrap_or(Value::Null)),
                    n => Err(StorageError::new(format!(
                        "scalar subquery returned {n} rows"
                    ))),
                }
            }
        }
    }
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

fn count_row(n: usize) -> Row {
    Row::new(Arc::from(vec!["count".to_string()]), vec![Value::Int(n as i64)])
}

fn entity_values(spec: &QuerySpec, frame: &Frame) -> Vec<Value> {
    let mut values: Vec<Value> = spec
        .root
        .entity
        .attributes()
        .iter()
        .map(|a| frame.value(&spec.root.alias, &a.name))
        .collect();
    for join in spec.joins.iter().filter(|j| j.fetch) {
        values.extend(
            join.target
                .entity
                .attributes()
                .iter()
                .map(|a| frame.value(&join.target.alias, &a.name)),
        );
    }
    values
}

fn sort_keyed(rows: &mut [(Vec<Value>, Vec<Value>)], order: &[OrderSpec]) {
    if order.is_empty() {
        return;
    }
    rows.sort_by(|(a, _), (b, _)| {
        for (i, spec) in order.iter().enumerate() {
            let ord = compare_sort_keys(&a[i], &b[i], spec);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn compare_sort_keys(a: &Value, b: &Value, spec: &OrderSpec) -> Ordering {
    let nulls_last = spec.nulls_sort_last();
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) if nulls_last => Ordering::Greater,
        (true, false) => Ordering::Less,
        (false, true) if nulls_last => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => {
            let ord = a.compare(b).unwrap_or(Ordering::Equal);
            match spec.direction {
                crate::query::Direction::Asc => ord,
                crate::query::Direction::Desc => ord.reverse(),
            }
        }
    }
}

fn compare(op: CompareOp, l: &Value, r: &Value) -> Option<bool> {
    if l.is_null() || r.is_null() {
        return None;
    }
    match l.compare(r) {
        Some(ord) => Some(match op {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Ne => ord != Ordering::Equal,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Ge => ord != Ordering::Less,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Le => ord != Ordering::Greater,
        }),
        None => Some(op == CompareOp::Ne),
    }
}

fn and3(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

fn or3(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

fn negate_if(v: Option<bool>, negated: bool) -> Option<bool> {
    if negated {
        v.map(|b| !b)
    } else {
        v
    }
}

/// SQL `IN`: unknown when the probe is null, or when nothing matched and the
/// candidates include a null
fn member_of(v: &Value, candidates: &[Value]) -> Option<bool> {
    if v.is_null() {
        return if candidates.is_empty() { Some(false) } else { None };
    }
    let mut saw_null = false;
    for c in candidates {
        match v.sql_eq(c) {
            Some(true) => return Some(true),
            None => saw_null = true,
            Some(false) => {}
        }
    }
    if saw_null {
        None
    } else {
        Some(false)
    }
}

/// `LIKE` with `%` (any run) and `_` (any single character)
pub(crate) fn like_matches(text: &str, pattern: &str) -> bool {
    let t: Vec<char> = text.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    let mut dp = vec![vec![false; t.len() + 1]; p.len() + 1];
    dp[0][0] = true;
    for i in 1..=p.len() {
        if p[i - 1] == '%' {
            dp[i][0] = dp[i - 1][0];
        }
        for j in 1..=t.len() {
            dp[i][j] = match p[i - 1] {
                '%' => dp[i - 1][j] || dp[i][j - 1],
                '_' => dp[i - 1][j - 1],
                c => dp[i - 1][j - 1] && t[j - 1] == c,
            };
        }
    }
    dp[p.len()][t.len()]
}

fn text_arg(v: &Value) -> String {
    v.to_text().unwrap_or_default()
}

fn apply_function(func: Function, values: Vec<Value>) -> Result<Value, StorageError> {
    if values.iter().any(Value::is_null) {
        return Ok(Value::Null);
    }
    Ok(match func {
        Function::Lower => Value::String(text_arg(&values[0]).to_lowercase()),
        Function::Upper => Value::String(text_arg(&values[0]).to_uppercase()),
        Function::StringValue => Value::String(text_arg(&values[0])),
        Function::Concat => Value::String(values.iter().map(text_arg).collect()),
        Function::Replace => {
            let [s, from, to] = values.as_slice() else {
                return Err(StorageError::new("replace takes three arguments"));
            };
            Value::String(text_arg(s).replace(&text_arg(from), &text_arg(to)))
        }
        Function::Add => {
            let mut iter = values.into_iter();
            let first = iter.next().unwrap_or(Value::Int(0));
            iter.try_fold(first, |acc, v| add(&acc, &v))?
        }
    })
}

fn to_decimal(v: &Value) -> Option<Decimal> {
    match v {
        Value::Int(i) => Some(Decimal::from(*i)),
        Value::Decimal(d) => Some(*d),
        _ => None,
    }
}

fn add(a: &Value, b: &Value) -> Result<Value, StorageError> {
    let not_numeric = || {
        StorageError::new(format!("cannot add {} and {}", a.type_name(), b.type_name()))
    };
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x
            .checked_add(*y)
            .map(Value::Int)
            .ok_or_else(|| StorageError::new("integer overflow in addition")),
        (Value::Double(_), _) | (_, Value::Double(_)) => {
            let x = a.as_f64().ok_or_else(not_numeric)?;
            let y = b.as_f64().ok_or_else(not_numeric)?;
            Ok(Value::Double(x + y))
        }
        _ => {
            let x = to_decimal(a).ok_or_else(not_numeric)?;
            let y = to_decimal(b).ok_or_else(not_numeric)?;
            Ok(Value::Decimal(x + y))
        }
    }
}

fn apply_aggregate(agg: Aggregate, values: Vec<Value>) -> Result<Value, StorageError> {
    let present: Vec<Value> = values.into_iter().filter(|v| !v.is_null()).collect();
    match agg {
        Aggregate::Count => Ok(Value::Int(present.len() as i64)),
        _ if present.is_empty() => Ok(Value::Null),
        Aggregate::Sum => {
            let mut iter = present.into_iter();
            let first = iter.next().unwrap_or(Value::Int(0));
            iter.try_fold(first, |acc, v| add(&acc, &v))
        }
        Aggregate::Avg => {
            let mut total = 0.0;
            for v in &present {
                total += v.as_f64().ok_or_else(|| {
                    StorageError::new(format!("cannot average {} values", v.type_name()))
                })?;
            }
            Ok(Value::Double(total / present.len() as f64))
        }
        Aggregate::Max | Aggregate::Min => {
            let want = if agg == Aggregate::Max {
                Ordering::Greater
            } else {
                Ordering::Less
            };
            let mut iter = present.into_iter();
            let mut best = iter.next().unwrap_or(Value::Null);
            for v in iter {
                if v.compare(&best) == Some(want) {
                    best = v;
                }
            }
            Ok(best)
        }
    }
}
