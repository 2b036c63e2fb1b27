//! In-memory reference store
//!
//! [`MemoryStore`] keeps records per entity behind a `RwLock` and evaluates
//! specifications directly, with the same semantics the SQL store gets from
//! the database: three-valued logic, inner and left outer joins, grouping,
//! correlated subqueries and nulls sorting last for ascending keys.
//!
//! Scopes are implemented with snapshots: `begin_scope` saves the current
//! tables and a rollback restores them. Records are shared through `Arc`, so
//! a snapshot only copies pointers.
//!
//! # Example
//!
//! ```
//! use quarry::metadata::{AttrType, Catalog, EntityDef};
//! use quarry::storage::MemoryStore;
//! use quarry::value::Value;
//!
//! let catalog = Catalog::builder()
//!     .entity(EntityDef::builder("Member").attribute("username", AttrType::String).build())
//!     .build()
//!     .unwrap()
//!     .into_shared();
//! let store = MemoryStore::new(catalog);
//! let id = store.insert("Member", [("username", Value::from("member1"))]).unwrap();
//! assert_eq!(id, 1);
//! assert_eq!(store.len("Member"), 1);
//! ```

pub(crate) mod eval;

use self::eval::{Env, Evaluator, Frame, Record};
use super::{ScopeOutcome, StorageExecutor};
use crate::error::{QueryError, StorageError};
use crate::metadata::{Catalog, EntityDef};
use crate::query::{MutationSpec, QuerySpec};
use crate::value::{Row, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone, Default)]
pub(crate) struct Table {
    next_id: i64,
    pub(crate) records: Vec<Arc<Record>>,
}

#[derive(Debug, Default)]
struct StoreState {
    tables: HashMap<String, Table>,
    snapshots: Vec<HashMap<String, Table>>,
}

/// Reference [`StorageExecutor`] holding records in memory
#[derive(Debug)]
pub struct MemoryStore {
    catalog: Arc<Catalog>,
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            state: RwLock::new(StoreState::default()),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState>, StorageError> {
        self.state
            .read()
            .map_err(|_| StorageError::new("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState>, StorageError> {
        self.state
            .write()
            .map_err(|_| StorageError::new("memory store lock poisoned"))
    }

    /// Insert a record and return its primary key
    ///
    /// Attributes are checked against the catalog. The primary key may be
    /// supplied; otherwise the next free key is assigned. Missing nullable
    /// attributes are stored as null.
    pub fn insert<I, S>(&self, entity: &str, values: I) -> Result<i64, QueryError>
    where
        I: IntoIterator<Item = (S, Value)>,
        S: AsRef<str>,
    {
        let def = self.catalog.entity(entity)?;
        let mut record = Record::new();
        for (name, value) in values {
            let name = name.as_ref();
            let attr = def
                .attribute(name)
                .ok_or_else(|| QueryError::unknown_attribute(def.name(), name))?;
            if !value.is_null() && !attr.ty.accepts(&value) {
                return Err(QueryError::type_mismatch(
                    format!("{} for {}.{}", attr.ty, def.name(), name),
                    value.type_name(),
                ));
            }
            record.insert(attr.name.clone(), value);
        }

        let mut state = self.write()?;
        let table = state.tables.entry(def.name().to_string()).or_default();
        let id = match record.get(def.id()) {
            Some(Value::Int(id)) => *id,
            Some(Value::Null) | None => table.next_id + 1,
            Some(other) => {
                return Err(QueryError::type_mismatch("integer primary key", other.type_name()))
            }
        };
        if table
            .records
            .iter()
            .any(|r| r.get(def.id()) == Some(&Value::Int(id)))
        {
            return Err(StorageError::new(format!(
                "duplicate primary key {id} for {}",
                def.name()
            ))
            .into());
        }
        record.insert(def.id().to_string(), Value::Int(id));
        fill_missing(def, &mut record)?;
        table.next_id = table.next_id.max(id);
        table.records.push(Arc::new(record));
        log::trace!("Inserted {}#{}", def.name(), id);
        Ok(id)
    }

    /// Number of stored records for an entity
    pub fn len(&self, entity: &str) -> usize {
        self.read()
            .map(|s| s.tables.get(entity).map_or(0, |t| t.records.len()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.read()
            .map(|s| s.tables.values().all(|t| t.records.is_empty()))
            .unwrap_or(true)
    }

    /// Current state of one record, labelled by attribute name
    pub fn find_by_id(&self, entity: &str, id: i64) -> Result<Option<Row>, QueryError> {
        let def = self.catalog.entity(entity)?;
        let state = self.read()?;
        let found = state.tables.get(def.name()).and_then(|t| {
            t.records
                .iter()
                .find(|r| r.get(def.id()) == Some(&Value::Int(id)))
        });
        Ok(found.map(|record| {
            Row::from_pairs(def.attributes().iter().map(|a| {
                (
                    a.name.clone(),
                    record.get(&a.name).cloned().unwrap_or(Value::Null),
                )
            }))
        }))
    }

    /// Remove every record
    pub fn clear(&self) -> Result<(), StorageError> {
        let mut state = self.write()?;
        state.tables.clear();
        Ok(())
    }
}

fn fill_missing(def: &EntityDef, record: &mut Record) -> Result<(), QueryError> {
    for attr in def.attributes() {
        match record.get(&attr.name) {
            Some(v) if !v.is_null() => {}
            _ if attr.nullable => {
                record.insert(attr.name.clone(), Value::Null);
            }
            _ => {
                return Err(QueryError::type_mismatch(
                    format!("non-null {} for {}.{}", attr.ty, def.name(), attr.name),
                    "null",
                ))
            }
        }
    }
    Ok(())
}

impl StorageExecutor for MemoryStore {
    fn execute(&self, spec: &QuerySpec) -> Result<Vec<Row>, StorageError> {
        let state = self.read()?;
        Evaluator::new(&state.tables).run(spec, None)
    }

    fn execute_mutation(&self, mutation: &MutationSpec) -> Result<u64, StorageError> {
        let mut state = self.write()?;
        let target = mutation.target();
        let entity = target.entity.clone();

        let plan: Vec<(usize, Option<Record>)> = {
            let evaluator = Evaluator::new(&state.tables);
            let records = state
                .tables
                .get(entity.name())
                .map(|t| t.records.as_slice())
                .unwrap_or(&[]);
            let mut plan = Vec::new();
            for (index, record) in records.iter().enumerate() {
                let frame = Frame::single(&target.alias, record.clone());
                let env = Env::new(&frame);
                if evaluator.test(mutation.predicate(), &env)? != Some(true) {
                    continue;
                }
                match mutation {
                    MutationSpec::Update { assignments, .. } => {
                        let mut updated = (**record).clone();
                        for assignment in assignments {
                            let value = evaluator.eval(&assignment.value, &env)?;
                            check_assignment(&entity, &assignment.attribute, &value)?;
                            updated.insert(assignment.attribute.clone(), value);
                        }
                        plan.push((index, Some(updated)));
                    }
                    MutationSpec::Delete { .. } => plan.push((index, None)),
                }
            }
            plan
        };

        let affected = plan.len() as u64;
        if let Some(table) = state.tables.get_mut(entity.name()) {
            let mut deleted = Vec::new();
            for (index, change) in plan {
                match change {
                    Some(record) => table.records[index] = Arc::new(record),
                    None => deleted.push(index),
                }
            }
            let mut position = 0;
            table.records.retain(|_| {
                let keep = !deleted.contains(&position);
                position += 1;
                keep
            });
        }
        log::debug!(
            "Bulk {} on {} affected {} records",
            mutation.kind(),
            entity.name(),
            affected
        );
        Ok(affected)
    }

    fn begin_scope(&self) -> Result<(), StorageError> {
        let mut state = self.write()?;
        let snapshot = state.tables.clone();
        state.snapshots.push(snapshot);
        Ok(())
    }

    fn end_scope(&self, outcome: ScopeOutcome) -> Result<(), StorageError> {
        let mut state = self.write()?;
        let snapshot = state
            .snapshots
            .pop()
            .ok_or_else(|| StorageError::new("no open scope"))?;
        if outcome == ScopeOutcome::Rollback {
            state.tables = snapshot;
        }
        Ok(())
    }
}

fn check_assignment(
    entity: &EntityDef,
    attribute: &str,
    value: &Value,
) -> Result<(), StorageError> {
    let attr = entity.attribute(attribute).ok_or_else(|| {
        StorageError::new(format!("unknown attribute {}.{}", entity.name(), attribute))
    })?;
    if value.is_null() {
        if attr.nullable {
            return Ok(());
        }
        return Err(StorageError::new(format!(
            "null value for non-null attribute {}.{}",
            entity.name(),
            attribute
        )));
    }
    if !attr.ty.accepts(value) {
        return Err(StorageError::new(format!(
            "{} value for {} attribute {}.{}",
            value.type_name(),
            attr.ty,
            entity.name(),
            attribute
        )));
    }
    Ok(())
}
