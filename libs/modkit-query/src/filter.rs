//! Filter predicate tree.
//!
//! A [`FilterPredicate`] is the typed form of the JSON filter accepted by
//! collection endpoints:
//!
//! ```json
//! { "name": { "$like": "wil%" }, "$or": [ { "age": { "$gt": 30 } }, { "vip": true } ] }
//! ```
//!
//! Leaves carry exactly one operator. An object such as
//! `{"age": {"$gt": 1, "$lt": 5}}` is ambiguous and is rejected with
//! [`InvalidFilterError::CompoundOperator`]; callers must spell it as an
//! explicit `$and`.

use std::fmt;

use serde_json::{Map, Value};

/// Comparison operator of a filter leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Like,
    NotLike,
    ILike,
    NotILike,
}

impl FilterOp {
    /// Resolve a `$operator` key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        let op = match key {
            "$eq" => Self::Eq,
            "$ne" => Self::Ne,
            "$gt" => Self::Gt,
            "$gte" => Self::Gte,
            "$lt" => Self::Lt,
            "$lte" => Self::Lte,
            "$in" => Self::In,
            "$notIn" => Self::NotIn,
            "$like" => Self::Like,
            "$notLike" => Self::NotLike,
            "$iLike" => Self::ILike,
            "$notILike" => Self::NotILike,
            _ => return None,
        };
        Some(op)
    }

    /// The `$operator` key of this operator.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::In => "$in",
            Self::NotIn => "$notIn",
            Self::Like => "$like",
            Self::NotLike => "$notLike",
            Self::ILike => "$iLike",
            Self::NotILike => "$notILike",
        }
    }

    /// Pattern-matching operators (`$like` and friends).
    #[must_use]
    pub fn is_like(self) -> bool {
        matches!(
            self,
            Self::Like | Self::NotLike | Self::ILike | Self::NotILike
        )
    }

    /// Negated pattern-matching operators.
    #[must_use]
    pub fn is_negated_like(self) -> bool {
        matches!(self, Self::NotLike | Self::NotILike)
    }

    /// Set-membership operators.
    #[must_use]
    pub fn is_set(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }

    /// Ordering operators.
    #[must_use]
    pub fn is_ordering(self) -> bool {
        matches!(self, Self::Gt | Self::Gte | Self::Lt | Self::Lte)
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Invalid filter input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidFilterError {
    #[error("filter must be a JSON object, got {found}")]
    NotAnObject { found: &'static str },

    #[error("field '{field}' combines several operators ({operators}); use one operator per leaf")]
    CompoundOperator { field: String, operators: String },

    #[error("field '{field}': unknown operator '{operator}'")]
    UnknownOperator { field: String, operator: String },

    #[error("field '{field}': operator object is empty")]
    EmptyOperator { field: String },

    #[error("unknown combinator '{key}'")]
    UnknownCombinator { key: String },

    #[error("'{combinator}' expects an array of predicates")]
    InvalidCombinator { combinator: &'static str },

    #[error("field '{field}': operator '{operator}' {reason}")]
    InvalidOperand {
        field: String,
        operator: FilterOp,
        reason: &'static str,
    },
}

/// A single `field <op> value` test.
#[derive(Clone, Debug, PartialEq)]
pub struct Comparison {
    field: String,
    op: FilterOp,
    value: Value,
}

impl Comparison {
    #[must_use]
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Equality comparison.
    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    #[inline]
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[inline]
    #[must_use]
    pub fn op(&self) -> FilterOp {
        self.op
    }

    #[inline]
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Build a comparison from the JSON value attached to `field`.
    ///
    /// A scalar or `null` means `$eq`, an array means `$in`, and an object must
    /// hold exactly one `$operator` key.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidFilterError`] for compound, empty or unknown operators.
    pub fn from_json(field: &str, value: &Value) -> Result<Self, InvalidFilterError> {
        match value {
            Value::Object(ops) => {
                let mut entries = ops.iter();
                let (key, operand) = match (entries.next(), entries.next()) {
                    (None, _) => {
                        return Err(InvalidFilterError::EmptyOperator {
                            field: field.to_owned(),
                        });
                    }
                    (Some(entry), None) => entry,
                    (Some(_), Some(_)) => {
                        return Err(InvalidFilterError::CompoundOperator {
                            field: field.to_owned(),
                            operators: ops.keys().map(String::as_str).collect::<Vec<_>>().join(", "),
                        });
                    }
                };
                let op = FilterOp::from_key(key).ok_or_else(|| {
                    InvalidFilterError::UnknownOperator {
                        field: field.to_owned(),
                        operator: key.clone(),
                    }
                })?;
                Ok(Self::new(field, op, operand.clone()))
            }
            Value::Array(_) => Ok(Self::new(field, FilterOp::In, value.clone())),
            _ => Ok(Self::new(field, FilterOp::Eq, value.clone())),
        }
    }

    /// Check that the operand fits the operator.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidFilterError::InvalidOperand`] when a set operator is not
    /// given an array, a pattern operator is not given a string, or an ordering
    /// operator is given `null`, an array or an object.
    pub fn validate(&self) -> Result<(), InvalidFilterError> {
        let reason = if self.op.is_set() {
            (!self.value.is_array()).then_some("expects an array")
        } else if self.op.is_like() {
            (!self.value.is_string()).then_some("expects a string pattern")
        } else if self.op.is_ordering() {
            matches!(
                self.value,
                Value::Null | Value::Array(_) | Value::Object(_)
            )
            .then_some("expects a scalar value")
        } else {
            matches!(self.value, Value::Array(_) | Value::Object(_))
                .then_some("expects a scalar value")
        };

        match reason {
            Some(reason) => Err(InvalidFilterError::InvalidOperand {
                field: self.field.clone(),
                operator: self.op,
                reason,
            }),
            None => Ok(()),
        }
    }

    /// JSON form: `{"field": {"$op": value}}`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut inner = Map::new();
        inner.insert(self.op.key().to_owned(), self.value.clone());
        let mut outer = Map::new();
        outer.insert(self.field.clone(), Value::Object(inner));
        Value::Object(outer)
    }
}

/// Filter predicate tree.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterPredicate {
    Leaf(Comparison),
    And(Vec<FilterPredicate>),
    Or(Vec<FilterPredicate>),
    Not(Box<FilterPredicate>),
}

impl FilterPredicate {
    #[must_use]
    pub fn leaf(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self::Leaf(Comparison::new(field, op, value))
    }

    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Leaf(Comparison::eq(field, value))
    }

    #[must_use]
    pub fn and(children: Vec<FilterPredicate>) -> Self {
        Self::And(children)
    }

    #[must_use]
    pub fn or(children: Vec<FilterPredicate>) -> Self {
        Self::Or(children)
    }

    #[must_use]
    pub fn not(inner: FilterPredicate) -> Self {
        Self::Not(Box::new(inner))
    }

    /// Parse the JSON filter form.
    ///
    /// An object with several keys is an implicit `$and` of its entries.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidFilterError`] when the input is not an object, uses an
    /// unknown combinator or operator, or combines operators in one leaf.
    pub fn from_json(value: &Value) -> Result<Self, InvalidFilterError> {
        let Value::Object(map) = value else {
            return Err(InvalidFilterError::NotAnObject {
                found: json_kind(value),
            });
        };

        let mut parts = map
            .iter()
            .map(|(key, value)| Self::from_entry(key, value))
            .collect::<Result<Vec<_>, _>>()?;

        if parts.len() == 1 {
            Ok(parts.remove(0))
        } else {
            Ok(Self::And(parts))
        }
    }

    fn from_entry(key: &str, value: &Value) -> Result<Self, InvalidFilterError> {
        match key {
            "$and" => Ok(Self::And(Self::children("$and", value)?)),
            "$or" => Ok(Self::Or(Self::children("$or", value)?)),
            "$not" => Ok(Self::not(Self::from_json(value)?)),
            k if k.starts_with('$') => Err(InvalidFilterError::UnknownCombinator {
                key: k.to_owned(),
            }),
            field => Comparison::from_json(field, value).map(Self::Leaf),
        }
    }

    fn children(combinator: &'static str, value: &Value) -> Result<Vec<Self>, InvalidFilterError> {
        match value {
            Value::Array(items) => items.iter().map(Self::from_json).collect(),
            _ => Err(InvalidFilterError::InvalidCombinator { combinator }),
        }
    }

    /// JSON form, the inverse of [`FilterPredicate::from_json`].
    #[must_use]
    pub fn to_json(&self) -> Value {
        let (key, value) = match self {
            Self::Leaf(cmp) => return cmp.to_json(),
            Self::And(children) => ("$and", Value::Array(children.iter().map(Self::to_json).collect())),
            Self::Or(children) => ("$or", Value::Array(children.iter().map(Self::to_json).collect())),
            Self::Not(inner) => ("$not", inner.to_json()),
        };
        let mut map = Map::new();
        map.insert(key.to_owned(), value);
        Value::Object(map)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
