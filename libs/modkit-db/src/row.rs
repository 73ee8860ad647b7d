use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

/// Field name → JSON value map; the payload and snapshot shape of a row.
pub type Record = Map<String, Value>;

/// Eager-loaded association attached to a [`Row`] under its relationship name.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Related {
    /// The association was loaded and nothing matched.
    Missing,
    One(Box<Row>),
    Many(Vec<Row>),
}

/// Owned snapshot of a stored row with any eager-loaded associations.
///
/// Serializes as a single flat object: column values first, then each
/// association under its name (`null`, an object or an array).
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Row {
    #[serde(flatten)]
    pub values: Record,
    #[serde(flatten)]
    pub related: BTreeMap<String, Related>,
}

impl Row {
    #[must_use]
    pub fn new(values: Record) -> Self {
        Self {
            values,
            related: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    #[must_use]
    pub fn with_related(mut self, name: impl Into<String>, related: Related) -> Self {
        self.related.insert(name.into(), related);
        self
    }

    /// Keep only the listed columns. Associations are left in place.
    pub fn project(&mut self, fields: &[String]) {
        self.values.retain(|k, _| fields.iter().any(|f| f == k));
    }
}

impl From<Record> for Row {
    fn from(values: Record) -> Self {
        Self::new(values)
    }
}
