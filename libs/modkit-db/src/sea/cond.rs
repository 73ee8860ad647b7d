use sea_orm::Condition;
use sea_orm::sea_query::{Alias, Expr, Func, SimpleExpr};
use serde_json::Value;

use crate::where_clause::{CompareOp, FieldExpr, Predicate, WhereClause};

/// Convert a JSON scalar to a `sea_orm::Value` for SQL binding.
///
/// Arrays and objects are bound as their JSON text.
#[must_use]
pub fn json_to_sea_value(v: &Value) -> sea_orm::Value {
    match v {
        Value::Null => sea_orm::Value::String(None),
        Value::Bool(b) => sea_orm::Value::from(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                sea_orm::Value::from(i)
            } else if let Some(f) = n.as_f64() {
                sea_orm::Value::from(f)
            } else {
                sea_orm::Value::from(n.to_string())
            }
        }
        Value::String(s) => sea_orm::Value::from(s.clone()),
        Value::Array(_) | Value::Object(_) => sea_orm::Value::from(v.to_string()),
    }
}

/// Build a deny-all condition (`WHERE false`).
fn deny_all() -> Condition {
    Condition::all().add(Expr::value(false))
}

fn target_expr(target: &FieldExpr) -> SimpleExpr {
    match target {
        FieldExpr::Column(c) => Expr::col(Alias::new(c)).into(),
        FieldExpr::Lower(c) => Func::lower(Expr::col(Alias::new(c))).into(),
    }
}

fn list_values(v: &Value) -> Vec<sea_orm::Value> {
    match v {
        Value::Array(items) => items.iter().map(json_to_sea_value).collect(),
        other => vec![json_to_sea_value(other)],
    }
}

fn like_pattern(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn compile_predicate(p: &Predicate) -> SimpleExpr {
    let lhs = Expr::expr(target_expr(&p.target));
    match p.op {
        CompareOp::Eq if p.value.is_null() => lhs.is_null(),
        CompareOp::Ne if p.value.is_null() => lhs.is_not_null(),
        CompareOp::Eq => lhs.eq(json_to_sea_value(&p.value)),
        CompareOp::Ne => lhs.ne(json_to_sea_value(&p.value)),
        CompareOp::Gt => lhs.gt(json_to_sea_value(&p.value)),
        CompareOp::Gte => lhs.gte(json_to_sea_value(&p.value)),
        CompareOp::Lt => lhs.lt(json_to_sea_value(&p.value)),
        CompareOp::Lte => lhs.lte(json_to_sea_value(&p.value)),
        CompareOp::In => lhs.is_in(list_values(&p.value)),
        CompareOp::NotIn => lhs.is_not_in(list_values(&p.value)),
        CompareOp::Like => lhs.like(like_pattern(&p.value)),
        CompareOp::NotLike => lhs.not_like(like_pattern(&p.value)),
    }
}

/// Plain comparisons join the parent directly instead of a one-item group.
fn add_child(parent: Condition, child: &WhereClause) -> Condition {
    match child {
        WhereClause::Compare(p) if !is_empty_membership(p) => parent.add(compile_predicate(p)),
        other => parent.add(other.to_condition()),
    }
}

fn is_empty_membership(p: &Predicate) -> bool {
    p.op == CompareOp::In && matches!(&p.value, Value::Array(v) if v.is_empty())
}

impl WhereClause {
    /// Compile to a `SeaORM` [`Condition`].
    ///
    /// | Clause | SQL |
    /// |--------|-----|
    /// | `All([])` | no filtering |
    /// | `Any([])` | `WHERE false` |
    /// | `Compare` with `= null` | `IS NULL` |
    /// | `Compare` on `Lower(c)` | `LOWER(c) <op> ?` |
    /// | `In` with an empty list | `WHERE false` |
    #[must_use]
    pub fn to_condition(&self) -> Condition {
        match self {
            Self::All(children) => children.iter().fold(Condition::all(), add_child),
            Self::Any(children) if children.is_empty() => deny_all(),
            Self::Any(children) => children.iter().fold(Condition::any(), add_child),
            Self::Not(inner) => inner.to_condition().not(),
            Self::Compare(p) => {
                if is_empty_membership(p) {
                    return deny_all();
                }
                Condition::all().add(compile_predicate(p))
            }
        }
    }
}
