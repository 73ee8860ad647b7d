use std::collections::BTreeMap;
use std::fmt;

use modkit_query::{Comparison, FilterOp, InvalidFilterError};
use serde_json::Value;
use uuid::Uuid;

/// Well-known constrained field names.
///
/// Shared between the services that build constraints and the storage
/// schemas that carry the columns, so both sides agree on the spelling.
pub mod tenant_fields {
    /// Tenant-ownership field.
    pub const TENANT_ID: &str = "tenant_id";

    /// Owner (user) identity field.
    pub const OWNER_ID: &str = "owner_id";
}

/// A caller-imposed restriction on the rows an operation may touch.
///
/// Each entry is a field name mapped to a single comparison; entries are
/// AND-ed. The map is trusted input (it comes from the service, not from the
/// request), and the collection layer always AND-s it with user filters
/// instead of merging the two, so no user filter can widen it.
///
/// An empty map places no restriction.
///
/// # Examples
///
/// ```
/// use modkit_query::FilterOp;
/// use modkit_security::ConstraintMap;
///
/// let c = ConstraintMap::new()
///     .eq("groupId", 2)
///     .with("status", FilterOp::Ne, "archived");
/// assert_eq!(c.len(), 2);
/// assert!(c.contains_field("groupId"));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConstraintMap {
    entries: BTreeMap<String, Comparison>,
}

impl ConstraintMap {
    // ── Constructors ────────────────────────────────────────────────

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict rows to a single tenant.
    #[must_use]
    pub fn for_tenant(tenant_id: Uuid) -> Self {
        Self::new().eq(tenant_fields::TENANT_ID, tenant_id.to_string())
    }

    /// Restrict rows to a set of tenants.
    #[must_use]
    pub fn for_tenants(tenant_ids: &[Uuid]) -> Self {
        let ids: Vec<Value> = tenant_ids
            .iter()
            .map(|id| Value::String(id.to_string()))
            .collect();
        Self::new().with(tenant_fields::TENANT_ID, FilterOp::In, ids)
    }

    /// Parse the JSON form `{field: value | {$op: value}}`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidFilterError`] when the input is not an object or a
    /// field uses an unknown or compound operator.
    pub fn from_json(value: &Value) -> Result<Self, InvalidFilterError> {
        let Value::Object(map) = value else {
            return Err(InvalidFilterError::NotAnObject {
                found: "a non-object value",
            });
        };
        let mut out = Self::new();
        for (field, v) in map {
            let cmp = Comparison::from_json(field, v)?;
            cmp.validate()?;
            out.entries.insert(field.clone(), cmp);
        }
        Ok(out)
    }

    // ── Builders ────────────────────────────────────────────────────

    /// Require `field = value`. Replaces an earlier entry for the field.
    #[must_use]
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, FilterOp::Eq, value)
    }

    /// Require `field <op> value`. Replaces an earlier entry for the field.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        let field = field.into();
        self.entries
            .insert(field.clone(), Comparison::new(field, op, value));
        self
    }

    // ── Accessors ───────────────────────────────────────────────────

    /// The comparisons, ordered by field name.
    pub fn comparisons(&self) -> impl Iterator<Item = &Comparison> {
        self.entries.values()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Comparison> {
        self.entries.get(field)
    }

    #[inline]
    #[must_use]
    pub fn contains_field(&self, field: &str) -> bool {
        self.entries.contains_key(field)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the map places no restriction.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ConstraintMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for cmp in self.entries.values() {
            if !first {
                f.write_str(" AND ")?;
            }
            first = false;
            write!(f, "{} {} {}", cmp.field(), cmp.op(), cmp.value())?;
        }
        Ok(())
    }
}
