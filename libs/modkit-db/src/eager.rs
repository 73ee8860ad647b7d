//! Engine-agnostic batch loading of associations: one lookup per
//! relationship for the whole page of parent rows.

use serde_json::Value;

use crate::query::{JoinKind, JoinSpec};
use crate::row::{Related, Row};
use crate::where_clause::{WhereClause, compare_eq};

/// Predicate selecting the related rows of `parents`; `None` when no parent
/// carries a join key.
pub(crate) fn related_predicate(parents: &[Row], join: &JoinSpec) -> Option<WhereClause> {
    let mut keys: Vec<Value> = Vec::new();
    for row in parents {
        if let Some(v) = row.get(join.parent_column())
            && !v.is_null()
            && !keys.contains(v)
        {
            keys.push(v.clone());
        }
    }
    (!keys.is_empty()).then(|| WhereClause::is_in(join.related_column(), keys))
}

/// Attach `related` rows to each parent under `name`.
///
/// Keys match with the same equality the `IN` predicate used to select the
/// related rows: numbers by value, everything else by exact JSON value.
/// Every parent gets an entry, so "loaded and empty" is distinguishable from
/// "not requested".
pub(crate) fn attach(parents: &mut [Row], name: &str, join: &JoinSpec, related: &[Row]) {
    for parent in parents.iter_mut() {
        let key = parent.get(join.parent_column());
        let mut matched: Vec<Row> = related
            .iter()
            .filter(|r| {
                key.is_some_and(|k| {
                    r.get(join.related_column())
                        .and_then(|v| compare_eq(v, k))
                        == Some(true)
                })
            })
            .cloned()
            .collect();
        let value = match &join.kind {
            JoinKind::HasMany { .. } => Related::Many(matched),
            JoinKind::BelongsTo { .. } | JoinKind::HasOne { .. } => {
                if matched.is_empty() {
                    Related::Missing
                } else {
                    Related::One(Box::new(matched.swap_remove(0)))
                }
            }
        };
        parent.related.insert(name.to_owned(), value);
    }
}

/// Columns the join needs from the parent rows.
pub(crate) fn required_parent_columns<'a>(
    joins: impl IntoIterator<Item = &'a JoinSpec>,
) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for join in joins {
        let col = join.parent_column();
        if !out.iter().any(|c| c == col) {
            out.push(col.to_owned());
        }
    }
    out
}
