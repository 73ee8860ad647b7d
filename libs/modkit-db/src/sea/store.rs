use async_trait::async_trait;
use sea_orm::sea_query::{Alias, Asterisk, Expr, Order, Query, SelectStatement, SimpleExpr};
use sea_orm::{ConnectionTrait, DatabaseConnection, FromQueryResult, QueryResult};
use serde_json::Value;
use tracing::instrument;

use super::cond::json_to_sea_value;
use crate::eager;
use crate::engine::StorageEngine;
use crate::error::StorageError;
use crate::query::{Direction, EagerLoad, FindQuery, FoundRows, JoinSpec, UpdateOutcome};
use crate::row::{Record, Row};
use crate::where_clause::WhereClause;

/// [`StorageEngine`] over one table of a `SeaORM` connection.
///
/// Statements are built with `sea_query` against table and column names
/// given at runtime; no entity definitions are needed. The table must
/// already exist. Inserts use `RETURNING *` (`SQLite` ≥ 3.35, `Postgres`).
/// Updates report only the affected count.
#[derive(Clone, Debug)]
pub struct SeaOrmStore {
    conn: DatabaseConnection,
    table: String,
}

impl SeaOrmStore {
    #[must_use]
    pub fn new(conn: DatabaseConnection, table: impl Into<String>) -> Self {
        Self {
            conn,
            table: table.into(),
        }
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    fn build<S: sea_orm::StatementBuilder>(&self, stmt: &S) -> sea_orm::Statement {
        let stmt = self.conn.get_database_backend().build(stmt);
        tracing::debug!(table = %self.table, sql = %stmt.sql, "sea statement");
        stmt
    }

    async fn select(&self, table: &str, select: &SelectStatement) -> Result<Vec<Row>, StorageError> {
        let results = self.conn.query_all(self.build(select)).await?;
        let rows = results.iter().map(decode_row).collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(table, returned = rows.len(), "sea select");
        Ok(rows)
    }

    async fn count(&self, predicate: Option<&WhereClause>) -> Result<u64, StorageError> {
        let mut stmt = Query::select();
        stmt.expr_as(Expr::cust("COUNT(*)"), Alias::new("total"))
            .from(Alias::new(&self.table));
        if let Some(p) = predicate {
            stmt.cond_where(p.to_condition());
        }
        let row = self
            .conn
            .query_one(self.build(&stmt))
            .await?
            .ok_or(StorageError::NoRowReturned)?;
        let total: i64 = row.try_get("", "total")?;
        Ok(u64::try_from(total).unwrap_or_default())
    }

    /// Load each association with one `IN` query over the page of parents.
    async fn load_related(
        &self,
        rows: &mut [Row],
        eager: &[EagerLoad<JoinSpec>],
    ) -> Result<(), StorageError> {
        for load in eager {
            let related = match eager::related_predicate(rows, &load.join) {
                Some(pred) => {
                    let mut stmt = Query::select();
                    stmt.column(Asterisk)
                        .from(Alias::new(&load.join.table))
                        .cond_where(pred.to_condition());
                    self.select(&load.join.table, &stmt).await?
                }
                None => Vec::new(),
            };
            eager::attach(rows, &load.name, &load.join, &related);
        }
        Ok(())
    }

    /// Select statement for the table; projection is widened with the join
    /// keys the eager loads need; [`Self::finish_rows`] strips them again.
    fn base_select(
        &self,
        predicate: Option<&WhereClause>,
        projection: Option<&[String]>,
        eager: &[EagerLoad<JoinSpec>],
    ) -> SelectStatement {
        let mut stmt = Query::select();
        stmt.from(Alias::new(&self.table));
        match projection {
            Some(fields) => {
                let mut columns: Vec<String> = fields.to_vec();
                for key in eager::required_parent_columns(eager.iter().map(|e| &e.join)) {
                    if !columns.contains(&key) {
                        columns.push(key);
                    }
                }
                stmt.columns(columns.iter().map(Alias::new));
            }
            None => {
                stmt.column(Asterisk);
            }
        }
        if let Some(p) = predicate {
            stmt.cond_where(p.to_condition());
        }
        stmt
    }

    async fn finish_rows(
        &self,
        rows: &mut [Row],
        projection: Option<&[String]>,
        eager: &[EagerLoad<JoinSpec>],
    ) -> Result<(), StorageError> {
        self.load_related(rows, eager).await?;
        if let Some(fields) = projection {
            for row in rows.iter_mut() {
                row.project(fields);
            }
        }
        Ok(())
    }
}

fn decode_row(result: &QueryResult) -> Result<Row, StorageError> {
    match Value::from_query_result(result, "")? {
        Value::Object(values) => Ok(Row::new(values)),
        other => Err(StorageError::Decode(format!(
            "expected an object, got {other}"
        ))),
    }
}

fn assignments(attributes: &Record) -> Vec<(Alias, SimpleExpr)> {
    attributes
        .iter()
        .map(|(k, v)| (Alias::new(k), SimpleExpr::from(json_to_sea_value(v))))
        .collect()
}

#[async_trait]
impl StorageEngine for SeaOrmStore {
    type Join = JoinSpec;

    #[instrument(skip_all, fields(table = %self.table))]
    async fn find_matching(&self, query: &FindQuery<JoinSpec>) -> Result<FoundRows, StorageError> {
        let total = self.count(query.predicate.as_ref()).await?;

        let mut stmt = self.base_select(
            query.predicate.as_ref(),
            query.projection.as_deref(),
            &query.eager,
        );
        for o in &query.order {
            let order = match o.direction {
                Direction::Asc => Order::Asc,
                Direction::Desc => Order::Desc,
            };
            stmt.order_by(Alias::new(&o.field), order);
        }
        if let Some(limit) = query.limit {
            stmt.limit(limit);
            if query.offset > 0 {
                stmt.offset(query.offset);
            }
        }

        let mut rows = self.select(&self.table, &stmt).await?;
        self.finish_rows(&mut rows, query.projection.as_deref(), &query.eager)
            .await?;
        Ok(FoundRows { rows, total })
    }

    #[instrument(skip_all, fields(table = %self.table))]
    async fn find_one(
        &self,
        predicate: Option<&WhereClause>,
        projection: Option<&[String]>,
        eager: &[EagerLoad<JoinSpec>],
    ) -> Result<Option<Row>, StorageError> {
        let mut stmt = self.base_select(predicate, projection, eager);
        stmt.limit(1);
        let mut rows = self.select(&self.table, &stmt).await?;
        self.finish_rows(&mut rows, projection, eager).await?;
        Ok(rows.pop())
    }

    #[instrument(skip_all, fields(table = %self.table))]
    async fn insert(&self, attributes: &Record) -> Result<Row, StorageError> {
        let mut stmt = Query::insert();
        stmt.into_table(Alias::new(&self.table));
        if attributes.is_empty() {
            stmt.or_default_values();
        } else {
            let (columns, values): (Vec<Alias>, Vec<SimpleExpr>) =
                assignments(attributes).into_iter().unzip();
            stmt.columns(columns);
            stmt.values(values)
                .map_err(|e| StorageError::Query(e.to_string()))?;
        }
        stmt.returning_all();

        let result = self
            .conn
            .query_one(self.build(&stmt))
            .await?
            .ok_or(StorageError::NoRowReturned)?;
        decode_row(&result)
    }

    #[instrument(skip_all, fields(table = %self.table))]
    async fn update_matching(
        &self,
        predicate: &WhereClause,
        attributes: &Record,
    ) -> Result<UpdateOutcome, StorageError> {
        if attributes.is_empty() {
            // Nothing to set; report what would have been touched.
            let affected = self.count(Some(predicate)).await?;
            return Ok(UpdateOutcome {
                affected,
                rows: None,
            });
        }

        let mut stmt = Query::update();
        stmt.table(Alias::new(&self.table))
            .values(assignments(attributes))
            .cond_where(predicate.to_condition());
        let result = self.conn.execute(self.build(&stmt)).await?;
        tracing::debug!(affected = result.rows_affected(), "sea update");
        Ok(UpdateOutcome {
            affected: result.rows_affected(),
            rows: None,
        })
    }

    #[instrument(skip_all, fields(table = %self.table))]
    async fn delete_matching(&self, predicate: &WhereClause) -> Result<u64, StorageError> {
        let mut stmt = Query::delete();
        stmt.from_table(Alias::new(&self.table))
            .cond_where(predicate.to_condition());
        let result = self.conn.execute(self.build(&stmt)).await?;
        tracing::debug!(removed = result.rows_affected(), "sea delete");
        Ok(result.rows_affected())
    }
}
