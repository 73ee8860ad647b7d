use async_trait::async_trait;

use crate::error::StorageError;
use crate::query::{EagerLoad, FindQuery, FoundRows, UpdateOutcome};
use crate::row::{Record, Row};
use crate::where_clause::WhereClause;

/// Storage contract consumed by resource collections.
///
/// One engine instance is bound to one table. Engines own query execution;
/// callers only describe what to select. Failures are reported as
/// [`StorageError`] and are never retried here.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Engine-specific description of how to reach a related table.
    type Join: Clone + Send + Sync + std::fmt::Debug + 'static;

    /// Rows matching the query plus the unpaged match count.
    async fn find_matching(&self, query: &FindQuery<Self::Join>)
    -> Result<FoundRows, StorageError>;

    async fn find_one(
        &self,
        predicate: Option<&WhereClause>,
        projection: Option<&[String]>,
        eager: &[EagerLoad<Self::Join>],
    ) -> Result<Option<Row>, StorageError>;

    /// Insert one row and return it as stored (with generated keys).
    async fn insert(&self, attributes: &Record) -> Result<Row, StorageError>;

    /// Apply `attributes` to every matching row.
    async fn update_matching(
        &self,
        predicate: &WhereClause,
        attributes: &Record,
    ) -> Result<UpdateOutcome, StorageError>;

    /// Delete every matching row and return how many were removed.
    async fn delete_matching(&self, predicate: &WhereClause) -> Result<u64, StorageError>;
}
