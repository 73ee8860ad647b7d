#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Resource query model for `ModKit` REST collections.
//!
//! The types here describe an already-parsed request: pagination, sort order,
//! sparse fieldsets, filter predicates and requested relationships. How a raw
//! querystring becomes a [`QueryOptions`] value is up to the caller; this crate
//! only fixes the shape and the serialization used for pagination links.

pub mod filter;
pub mod options;
pub mod resource_query;

pub use filter::{Comparison, FilterOp, FilterPredicate, InvalidFilterError};
pub use options::{Page, QueryOptions, Sort, SortDir};
pub use resource_query::ResourceQuery;
