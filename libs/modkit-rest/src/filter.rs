//! Filter translation: user predicate tree ∧ caller constraint → storage
//! [`WhereClause`].
//!
//! The constraint is applied exactly once, at the top, as a separate
//! conjunct. User predicates are translated without it, so nothing in the
//! user's tree can replace, negate or widen a constrained field.

use modkit_db::{CompareOp, Record, WhereClause};
use modkit_query::{Comparison, FilterOp, FilterPredicate, InvalidFilterError};
use modkit_security::ConstraintMap;
use serde_json::Value;

use crate::error::{CollectionError, ConstraintViolationError};

/// Build the storage predicate for `filter` restricted by `constraint`.
///
/// | filter | constraint | result |
/// |--------|------------|--------|
/// | none | none / empty | `None` |
/// | none | `C` | `C` |
/// | `F` | none / empty | `F` |
/// | `F` | `C` | `All[F, C]` |
///
/// # Errors
///
/// Returns [`InvalidFilterError`] when a comparison's operand does not fit its
/// operator (e.g. `$in` without an array, `$like` without a string).
pub fn translate(
    filter: Option<&FilterPredicate>,
    constraint: Option<&ConstraintMap>,
) -> Result<Option<WhereClause>, InvalidFilterError> {
    let user = filter.map(translate_predicate).transpose()?;
    let scope = match constraint {
        Some(c) if !c.is_empty() => Some(constraint_clause(c)?),
        _ => None,
    };

    Ok(match (user, scope) {
        (None, None) => None,
        (Some(only), None) | (None, Some(only)) => Some(only),
        (Some(user), Some(scope)) => Some(WhereClause::All(vec![user, scope])),
    })
}

/// `{id} ∧ constraint`, the row selector of point operations.
///
/// # Errors
///
/// Returns [`InvalidFilterError`] when the constraint holds an ill-typed
/// comparison.
pub fn by_id(
    id_field: &str,
    id: Value,
    constraint: Option<&ConstraintMap>,
) -> Result<WhereClause, InvalidFilterError> {
    let filter = FilterPredicate::eq(id_field, id);
    // A filter is present, so translation always yields a predicate.
    Ok(translate(Some(&filter), constraint)?.unwrap_or(WhereClause::All(Vec::new())))
}

fn constraint_clause(constraint: &ConstraintMap) -> Result<WhereClause, InvalidFilterError> {
    let parts = constraint
        .comparisons()
        .map(translate_leaf)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(WhereClause::All(parts))
}

fn translate_predicate(predicate: &FilterPredicate) -> Result<WhereClause, InvalidFilterError> {
    match predicate {
        FilterPredicate::Leaf(cmp) => translate_leaf(cmp),
        FilterPredicate::And(children) => Ok(WhereClause::All(
            children
                .iter()
                .map(translate_predicate)
                .collect::<Result<_, _>>()?,
        )),
        FilterPredicate::Or(children) => Ok(WhereClause::Any(
            children
                .iter()
                .map(translate_predicate)
                .collect::<Result<_, _>>()?,
        )),
        FilterPredicate::Not(inner) => Ok(WhereClause::negate(translate_predicate(inner)?)),
    }
}

/// Pattern operators become a comparison on `LOWER(field)` with a lower-cased
/// pattern, so matching ignores case whatever the column collation.
fn translate_leaf(cmp: &Comparison) -> Result<WhereClause, InvalidFilterError> {
    cmp.validate()?;
    let field = cmp.field();
    let op = cmp.op();

    if op.is_like() {
        let pattern = cmp.value().as_str().unwrap_or_default().to_lowercase();
        let storage_op = if op.is_negated_like() {
            CompareOp::NotLike
        } else {
            CompareOp::Like
        };
        return Ok(WhereClause::lower(field, storage_op, pattern));
    }

    let storage_op = match op {
        FilterOp::Eq => CompareOp::Eq,
        FilterOp::Ne => CompareOp::Ne,
        FilterOp::Gt => CompareOp::Gt,
        FilterOp::Gte => CompareOp::Gte,
        FilterOp::Lt => CompareOp::Lt,
        FilterOp::Lte => CompareOp::Lte,
        FilterOp::In => CompareOp::In,
        FilterOp::NotIn => CompareOp::NotIn,
        FilterOp::Like | FilterOp::ILike => CompareOp::Like,
        FilterOp::NotLike | FilterOp::NotILike => CompareOp::NotLike,
    };
    Ok(WhereClause::compare(field, storage_op, cmp.value().clone()))
}

/// Check a create/update payload against the caller constraint.
///
/// Each comparison is evaluated on the payload alone with the same semantics
/// storage engines use for row selection, so every constrained field must be
/// present and satisfied.
///
/// # Errors
///
/// - [`CollectionError::InvalidFilter`] when a constraint comparison is
///   ill-typed (same as for row selection);
/// - [`CollectionError::ConstraintViolation`] for the first violated field,
///   in field-name order.
pub fn check_payload(payload: &Record, constraint: &ConstraintMap) -> Result<(), CollectionError> {
    for cmp in constraint.comparisons() {
        let clause = translate_leaf(cmp)?;
        if !clause.matches(payload) {
            let field = cmp.field();
            return Err(ConstraintViolationError {
                field: field.to_owned(),
                constraint: format!("{} {}", cmp.op(), cmp.value()),
                actual: payload.get(field).cloned().unwrap_or(Value::Null),
            }
            .into());
        }
    }
    Ok(())
}
