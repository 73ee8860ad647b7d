#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! REST resource collections over a [`StorageEngine`](modkit_db::StorageEngine).
//!
//! A [`Collection`] turns parsed [`QueryOptions`](modkit_query::QueryOptions)
//! plus an optional caller [`ConstraintMap`](modkit_security::ConstraintMap)
//! into a storage query, runs it, and assembles a [`Resource`] with
//! self links, pagination links and flattened relationship includes.
//!
//! ```text
//! options ──► filter::translate ──► WhereClause ─┐
//!         └─► Relationships::resolve ─► eager ───┼─► engine ─► rows
//!                                    └─► templates ──────────► Resource::flatten
//! ```

pub mod collection;
pub mod config;
pub mod error;
pub mod filter;
pub mod pagination;
pub mod relationships;
pub mod resource;
pub mod template;

pub use collection::Collection;
pub use config::CollectionConfig;
pub use error::{CollectionError, ConstraintViolationError, TemplateError};
pub use filter::{check_payload, translate};
pub use relationships::{LinkTemplates, Relationship, Relationships, Resolved};
pub use resource::{Attribute, CollectionMeta, Link, PageMeta, Resource};
pub use template::UrlTemplate;
