#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
pub mod constraint;

pub use constraint::{ConstraintMap, tenant_fields};
