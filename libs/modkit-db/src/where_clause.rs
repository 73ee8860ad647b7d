use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

use crate::row::Record;

/// Storage-level comparison operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
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
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
        })
    }
}

/// Left-hand side of a comparison.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FieldExpr {
    Column(String),
    /// `LOWER(column)`, used for case-normalized pattern matching.
    Lower(String),
}

impl FieldExpr {
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::Column(c) | Self::Lower(c) => c,
        }
    }
}

impl fmt::Display for FieldExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(c) => f.write_str(c),
            Self::Lower(c) => write!(f, "LOWER({c})"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    pub target: FieldExpr,
    pub op: CompareOp,
    pub value: Value,
}

/// Row-selection predicate understood by every storage engine.
///
/// Evaluation follows SQL three-valued logic: comparisons against `NULL` are
/// unknown, except `= NULL` / `<> NULL` which mean `IS NULL` / `IS NOT NULL`.
/// A row is selected only when the predicate is definitely true.
///
/// An empty [`WhereClause::All`] is true; an empty [`WhereClause::Any`] is
/// false.
#[derive(Clone, Debug, PartialEq)]
pub enum WhereClause {
    All(Vec<WhereClause>),
    Any(Vec<WhereClause>),
    Not(Box<WhereClause>),
    Compare(Predicate),
}

impl WhereClause {
    // ── Constructors ────────────────────────────────────────────────

    #[must_use]
    pub fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare(Predicate {
            target: FieldExpr::Column(field.into()),
            op,
            value: value.into(),
        })
    }

    /// Comparison against `LOWER(field)`.
    #[must_use]
    pub fn lower(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare(Predicate {
            target: FieldExpr::Lower(field.into()),
            op,
            value: value.into(),
        })
    }

    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    #[must_use]
    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::compare(field, CompareOp::In, Value::Array(values))
    }

    #[must_use]
    pub fn negate(inner: WhereClause) -> Self {
        Self::Not(Box::new(inner))
    }

    /// `self AND other`, flattening when `self` is already a conjunction.
    #[must_use]
    pub fn and(self, other: WhereClause) -> Self {
        match self {
            Self::All(mut children) => {
                children.push(other);
                Self::All(children)
            }
            first => Self::All(vec![first, other]),
        }
    }

    // ── Evaluation ──────────────────────────────────────────────────

    /// Returns `true` if the record is selected by this predicate.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        self.eval(record) == Some(true)
    }

    /// Three-valued evaluation; `None` is SQL `UNKNOWN`.
    fn eval(&self, record: &Record) -> Option<bool> {
        match self {
            Self::All(children) => {
                let mut unknown = false;
                for child in children {
                    match child.eval(record) {
                        Some(false) => return Some(false),
                        None => unknown = true,
                        Some(true) => {}
                    }
                }
                (!unknown).then_some(true)
            }
            Self::Any(children) => {
                let mut unknown = false;
                for child in children {
                    match child.eval(record) {
                        Some(true) => return Some(true),
                        None => unknown = true,
                        Some(false) => {}
                    }
                }
                (!unknown).then_some(false)
            }
            Self::Not(inner) => inner.eval(record).map(|v| !v),
            Self::Compare(p) => eval_compare(record, p),
        }
    }
}

impl fmt::Display for WhereClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, children: &[WhereClause], sep: &str) -> fmt::Result {
            f.write_str("(")?;
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    f.write_str(sep)?;
                }
                write!(f, "{child}")?;
            }
            f.write_str(")")
        }

        match self {
            Self::All(children) if children.is_empty() => f.write_str("TRUE"),
            Self::Any(children) if children.is_empty() => f.write_str("FALSE"),
            Self::All(children) => join(f, children, " AND "),
            Self::Any(children) => join(f, children, " OR "),
            Self::Not(inner) => write!(f, "NOT {inner}"),
            Self::Compare(p) => write!(f, "{} {} {}", p.target, p.op, p.value),
        }
    }
}

fn resolve(record: &Record, target: &FieldExpr) -> Value {
    match target {
        FieldExpr::Column(c) => record.get(c).cloned().unwrap_or(Value::Null),
        FieldExpr::Lower(c) => match record.get(c) {
            Some(Value::String(s)) => Value::String(s.to_lowercase()),
            Some(other) => other.clone(),
            None => Value::Null,
        },
    }
}

fn eval_compare(record: &Record, p: &Predicate) -> Option<bool> {
    let actual = resolve(record, &p.target);

    match p.op {
        CompareOp::Eq if p.value.is_null() => Some(actual.is_null()),
        CompareOp::Ne if p.value.is_null() => Some(!actual.is_null()),
        CompareOp::Eq => compare_eq(&actual, &p.value),
        CompareOp::Ne => compare_eq(&actual, &p.value).map(|v| !v),
        CompareOp::Gt => compare_order(&actual, &p.value).map(Ordering::is_gt),
        CompareOp::Gte => compare_order(&actual, &p.value).map(Ordering::is_ge),
        CompareOp::Lt => compare_order(&actual, &p.value).map(Ordering::is_lt),
        CompareOp::Lte => compare_order(&actual, &p.value).map(Ordering::is_le),
        CompareOp::In => in_list(&actual, &p.value),
        CompareOp::NotIn => in_list(&actual, &p.value).map(|v| !v),
        CompareOp::Like => like(&actual, &p.value),
        CompareOp::NotLike => like(&actual, &p.value).map(|v| !v),
    }
}

/// Loose equality: numbers compare numerically, mismatched types are unequal,
/// `NULL` on either side is unknown.
pub(crate) fn compare_eq(a: &Value, b: &Value) -> Option<bool> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Number(_), Value::Number(_)) => {
            compare_order(a, b).map(|o| o == Ordering::Equal)
        }
        _ => Some(a == b),
    }
}

/// Ordering between two comparable scalars of the same kind.
pub(crate) fn compare_order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn in_list(actual: &Value, list: &Value) -> Option<bool> {
    let Value::Array(items) = list else {
        return Some(false);
    };
    if actual.is_null() {
        return None;
    }
    let mut unknown = false;
    for item in items {
        match compare_eq(actual, item) {
            Some(true) => return Some(true),
            None => unknown = true,
            Some(false) => {}
        }
    }
    (!unknown).then_some(false)
}

fn like(actual: &Value, pattern: &Value) -> Option<bool> {
    match (actual, pattern) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::String(text), Value::String(pattern)) => Some(like_match(text, pattern)),
        _ => Some(false),
    }
}

/// SQL `LIKE`: `%` matches any run of characters, `_` exactly one.
fn like_match(text: &str, pattern: &str) -> bool {
    let t: Vec<char> = text.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    let (mut ti, mut pi) = (0, 0);
    // Last `%` seen and the text position it is currently absorbing up to.
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == '%' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && (p[pi] == '_' || p[pi] == t[ti]) {
            ti += 1;
            pi += 1;
        } else if let Some((star, absorbed)) = backtrack {
            pi = star + 1;
            ti = absorbed + 1;
            backtrack = Some((star, ti));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '%')
}

/// Total order used for sorting rows: `NULL` first, then booleans, numbers
/// and strings; composite values compare equal.
pub(crate) fn sort_order(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) | Value::Object(_) => 4,
        }
    }
    compare_order(a, b).unwrap_or_else(|| rank(a).cmp(&rank(b)))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: Value) -> Record {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn like_wildcards() {
        assert!(like_match("wilma", "wil%"));
        assert!(like_match("wilma", "%lm%"));
        assert!(like_match("wilma", "w_lma"));
        assert!(like_match("wilma", "%"));
        assert!(like_match("", "%"));
        assert!(!like_match("wilma", "fred%"));
        assert!(!like_match("wilma", "w_ma"));
        assert!(like_match("aXbXc", "a%b%c"));
        assert!(like_match("abcbc", "a%bc"));
    }

    #[test]
    fn lower_target_is_case_insensitive() {
        let r = rec(json!({ "name": "Wilma Flintstone" }));
        assert!(WhereClause::lower("name", CompareOp::Like, "wilma%").matches(&r));
        assert!(!WhereClause::compare("name", CompareOp::Like, "wilma%").matches(&r));
    }

    #[test]
    fn numbers_compare_numerically() {
        let r = rec(json!({ "age": 40, "score": 1.5 }));
        assert!(WhereClause::eq("age", 40.0).matches(&r));
        assert!(WhereClause::compare("age", CompareOp::Gte, 18).matches(&r));
        assert!(WhereClause::compare("score", CompareOp::Lt, 2).matches(&r));
        assert!(!WhereClause::compare("age", CompareOp::Gt, "10").matches(&r));
    }

    #[test]
    fn null_semantics_follow_sql() {
        let r = rec(json!({ "a": null }));
        assert!(WhereClause::eq("a", Value::Null).matches(&r));
        assert!(WhereClause::eq("missing", Value::Null).matches(&r));
        assert!(!WhereClause::eq("a", 1).matches(&r));
        assert!(!WhereClause::compare("a", CompareOp::Ne, 1).matches(&r));
        // NOT(UNKNOWN) is still UNKNOWN.
        assert!(!WhereClause::negate(WhereClause::eq("a", 1)).matches(&r));
        assert!(!WhereClause::compare("a", CompareOp::NotIn, json!([1, 2])).matches(&r));
    }

    #[test]
    fn membership() {
        let r = rec(json!({ "groupId": 2 }));
        assert!(WhereClause::is_in("groupId", vec![json!(1), json!(2)]).matches(&r));
        assert!(WhereClause::compare("groupId", CompareOp::NotIn, json!([1, 3])).matches(&r));
        assert!(!WhereClause::is_in("groupId", vec![]).matches(&r));
    }

    #[test]
    fn combinators() {
        let r = rec(json!({ "a": 1, "b": 2 }));
        let t = WhereClause::eq("a", 1);
        let f = WhereClause::eq("b", 3);

        assert!(WhereClause::All(vec![]).matches(&r));
        assert!(!WhereClause::Any(vec![]).matches(&r));
        assert!(!t.clone().and(f.clone()).matches(&r));
        assert!(WhereClause::Any(vec![f.clone(), t.clone()]).matches(&r));
        assert!(WhereClause::negate(f).matches(&r));
        assert!(WhereClause::Any(vec![WhereClause::eq("x", 1), t]).matches(&r));
    }

    #[test]
    fn and_flattens_conjunctions() {
        let c = WhereClause::eq("a", 1)
            .and(WhereClause::eq("b", 2))
            .and(WhereClause::eq("c", 3));
        assert!(matches!(c, WhereClause::All(ref v) if v.len() == 3));
    }

    #[test]
    fn display_is_readable() {
        let c = WhereClause::eq("id", 1).and(WhereClause::lower("name", CompareOp::Like, "w%"));
        assert_eq!(c.to_string(), r#"(id = 1 AND LOWER(name) LIKE "w%")"#);
    }

    #[test]
    fn sort_order_puts_null_first() {
        let mut v = vec![json!("b"), json!(2), Value::Null, json!(1), json!("a")];
        v.sort_by(sort_order);
        assert_eq!(v, vec![Value::Null, json!(1), json!(2), json!("a"), json!("b")]);
    }
}
