#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Storage contract for `ModKit` resource collections.
//!
//! The contract is engine-agnostic: predicates are a small
//! [`WhereClause`] tree over JSON values, rows are owned [`Row`] snapshots and
//! associations are described by an engine-chosen join type. Two engines ship
//! with the crate:
//!
//! - [`MemoryDb`] / [`MemoryStore`]: named in-memory tables, evaluated with
//!   [`WhereClause::matches`];
//! - [`SeaOrmStore`]: dynamic tables over a `sea_orm::DatabaseConnection`,
//!   compiled through [`WhereClause::to_condition`].

pub mod engine;
pub mod error;
pub mod memory;
pub mod query;
pub mod row;
pub mod sea;
pub mod where_clause;

mod eager;

pub use engine::StorageEngine;
pub use error::StorageError;
pub use memory::{MemoryDb, MemoryStore};
pub use query::{
    Association, Direction, EagerLoad, FindQuery, FoundRows, JoinKind, JoinSpec, OrderBy,
    UpdateOutcome,
};
pub use row::{Record, Related, Row};
pub use sea::SeaOrmStore;
pub use where_clause::{CompareOp, FieldExpr, Predicate, WhereClause};
