use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::eager;
use crate::engine::StorageEngine;
use crate::error::StorageError;
use crate::query::{
    Direction, EagerLoad, FindQuery, FoundRows, JoinSpec, OrderBy, UpdateOutcome,
};
use crate::row::{Record, Row};
use crate::where_clause::{WhereClause, compare_eq, sort_order};

#[derive(Debug, Default)]
struct MemoryTable {
    rows: Vec<Record>,
    next_id: i64,
}

/// Shared set of named in-memory tables.
///
/// Cloning is cheap and yields a handle to the same tables. The lock is only
/// held for synchronous sections, never across an `.await`.
#[derive(Clone, Debug, Default)]
pub struct MemoryDb {
    tables: Arc<RwLock<HashMap<String, MemoryTable>>>,
}

impl MemoryDb {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table if it does not exist yet.
    pub fn create_table(&self, name: &str) {
        self.tables.write().entry(name.to_owned()).or_default();
    }

    /// Engine bound to `table` with identifier column `id`. Creates the
    /// table if needed.
    #[must_use]
    pub fn store(&self, table: &str) -> MemoryStore {
        self.create_table(table);
        MemoryStore {
            db: self.clone(),
            table: table.to_owned(),
            id_field: "id".to_owned(),
        }
    }

    /// Snapshot of a table's rows in insertion order.
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.tables
            .read()
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    fn select(&self, table: &str, predicate: Option<&WhereClause>) -> Result<Vec<Row>, StorageError> {
        let tables = self.tables.read();
        let t = tables
            .get(table)
            .ok_or_else(|| StorageError::missing_table(table))?;
        Ok(t.rows
            .iter()
            .filter(|r| predicate.is_none_or(|p| p.matches(r)))
            .cloned()
            .map(Row::new)
            .collect())
    }
}

/// [`StorageEngine`] over one [`MemoryDb`] table.
///
/// Rows without an identifier get the next integer id on insert. Updates
/// return the updated rows.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    db: MemoryDb,
    table: String,
    id_field: String,
}

impl MemoryStore {
    #[must_use]
    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    fn load_related(&self, rows: &mut [Row], eager: &[EagerLoad<JoinSpec>]) -> Result<(), StorageError> {
        for load in eager {
            let related = match eager::related_predicate(rows, &load.join) {
                Some(pred) => self.db.select(&load.join.table, Some(&pred))?,
                None => Vec::new(),
            };
            eager::attach(rows, &load.name, &load.join, &related);
        }
        Ok(())
    }
}

fn order_rows(a: &Record, b: &Record, order: &[OrderBy]) -> Ordering {
    for o in order {
        let av = a.get(&o.field).unwrap_or(&Value::Null);
        let bv = b.get(&o.field).unwrap_or(&Value::Null);
        let ord = match o.direction {
            Direction::Asc => sort_order(av, bv),
            Direction::Desc => sort_order(bv, av),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn project(rows: &mut [Row], projection: Option<&[String]>) {
    if let Some(fields) = projection {
        for row in rows {
            row.project(fields);
        }
    }
}

#[async_trait]
impl StorageEngine for MemoryStore {
    type Join = JoinSpec;

    async fn find_matching(&self, query: &FindQuery<JoinSpec>) -> Result<FoundRows, StorageError> {
        let (mut rows, total) = {
            let tables = self.db.tables.read();
            let table = tables
                .get(&self.table)
                .ok_or_else(|| StorageError::missing_table(&self.table))?;

            let mut matched: Vec<&Record> = table
                .rows
                .iter()
                .filter(|r| query.predicate.as_ref().is_none_or(|p| p.matches(r)))
                .collect();
            // Stable: rows equal on every sort key keep insertion order.
            matched.sort_by(|a, b| order_rows(a, b, &query.order));

            let total = u64::try_from(matched.len()).unwrap_or(u64::MAX);
            let skip = usize::try_from(query.offset).unwrap_or(usize::MAX);
            let take = query
                .limit
                .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
            let rows: Vec<Row> = matched
                .into_iter()
                .skip(skip)
                .take(take)
                .map(|r| Row::new(r.clone()))
                .collect();
            (rows, total)
        };

        self.load_related(&mut rows, &query.eager)?;
        project(&mut rows, query.projection.as_deref());
        tracing::debug!(table = %self.table, returned = rows.len(), total, "memory find");
        Ok(FoundRows { rows, total })
    }

    async fn find_one(
        &self,
        predicate: Option<&WhereClause>,
        projection: Option<&[String]>,
        eager: &[EagerLoad<JoinSpec>],
    ) -> Result<Option<Row>, StorageError> {
        let mut rows = self.db.select(&self.table, predicate)?;
        rows.truncate(1);
        self.load_related(&mut rows, eager)?;
        project(&mut rows, projection);
        Ok(rows.pop())
    }

    async fn insert(&self, attributes: &Record) -> Result<Row, StorageError> {
        let mut tables = self.db.tables.write();
        let table = tables
            .get_mut(&self.table)
            .ok_or_else(|| StorageError::missing_table(&self.table))?;

        let mut record = attributes.clone();
        match record.get(&self.id_field) {
            None | Some(Value::Null) => {
                table.next_id += 1;
                record.insert(self.id_field.clone(), Value::from(table.next_id));
            }
            Some(id) => {
                if table
                    .rows
                    .iter()
                    .any(|r| r.get(&self.id_field).and_then(|v| compare_eq(v, id)) == Some(true))
                {
                    return Err(StorageError::DuplicateKey {
                        table: self.table.clone(),
                        key: id.to_string(),
                    });
                }
                if let Some(n) = id.as_i64() {
                    table.next_id = table.next_id.max(n);
                }
            }
        }

        table.rows.push(record.clone());
        tracing::debug!(table = %self.table, "memory insert");
        Ok(Row::new(record))
    }

    async fn update_matching(
        &self,
        predicate: &WhereClause,
        attributes: &Record,
    ) -> Result<UpdateOutcome, StorageError> {
        let mut tables = self.db.tables.write();
        let table = tables
            .get_mut(&self.table)
            .ok_or_else(|| StorageError::missing_table(&self.table))?;

        let mut updated = Vec::new();
        for record in table.rows.iter_mut().filter(|r| predicate.matches(r)) {
            for (k, v) in attributes {
                record.insert(k.clone(), v.clone());
            }
            updated.push(Row::new(record.clone()));
        }

        let affected = u64::try_from(updated.len()).unwrap_or(u64::MAX);
        tracing::debug!(table = %self.table, affected, "memory update");
        Ok(UpdateOutcome {
            affected,
            rows: Some(updated),
        })
    }

    async fn delete_matching(&self, predicate: &WhereClause) -> Result<u64, StorageError> {
        let mut tables = self.db.tables.write();
        let table = tables
            .get_mut(&self.table)
            .ok_or_else(|| StorageError::missing_table(&self.table))?;

        let before = table.rows.len();
        table.rows.retain(|r| !predicate.matches(r));
        let removed = u64::try_from(before - table.rows.len()).unwrap_or(u64::MAX);
        tracing::debug!(table = %self.table, removed, "memory delete");
        Ok(removed)
    }
}
