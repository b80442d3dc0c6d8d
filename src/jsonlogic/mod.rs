//! JsonLogic expression evaluator
//!
//! A stateless, synchronous evaluator over `serde_json::Value` trees. Rule
//! conditions are a sum type of `(operator, args)` nodes; evaluation is a
//! recursive match, per the storage format `{"op": [arg, ...]}`.
//!
//! History-dependent operators (`nth_event_in_period`, `distinct_visit_days`)
//! never touch the database here: the orchestrator scans the expression with
//! [`facts::scan`], resolves the needed counts up front, and hands them in
//! through [`EvalContext::facts`]. `within_days` only needs the context clock.
//!
//! A malformed node (unknown operator, arity or type mismatch) aborts the
//! evaluation of that one rule with an [`EvalError`]; the caller logs it and
//! moves on to the remaining rules.

pub mod facts;

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use thiserror::Error;

use facts::{FactKey, Facts};

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Operator {op} expects {expected} arguments, got {got}")]
    Arity {
        op: String,
        expected: &'static str,
        got: usize,
    },

    #[error("Operator {op}: {detail}")]
    Type { op: String, detail: String },

    #[error("Missing prefetched fact: {0}")]
    MissingFact(String),

    #[error("Malformed expression: {0}")]
    Malformed(String),
}

/// Everything one evaluation may consult.
///
/// `data` is the event's data root: `event_type`, `tenant_id`, `customer_id`,
/// `occurred_at`, the `properties` object under `properties`, and each
/// property key lifted to the root.
pub struct EvalContext<'a> {
    pub data: &'a Value,
    pub now: DateTime<Utc>,
    pub facts: &'a Facts,
}

/// Evaluate an expression to a truth value. The entry point for rule matching.
pub fn matches(expr: &Value, ctx: &EvalContext<'_>) -> Result<bool, EvalError> {
    Ok(truthy(&eval(expr, ctx)?))
}

/// Evaluate an expression to a JSON value.
pub fn eval(expr: &Value, ctx: &EvalContext<'_>) -> Result<Value, EvalError> {
    match expr {
        // Empty expression is an always-match
        Value::Null => Ok(Value::Bool(true)),
        Value::Object(map) if map.is_empty() => Ok(Value::Bool(true)),

        Value::Object(map) => {
            if map.len() != 1 {
                return Err(EvalError::Malformed(format!(
                    "operator node must have exactly one key, got {}",
                    map.len()
                )));
            }
            let (op, args) = map.iter().next().unwrap();
            apply(op, args, ctx)
        }

        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(eval(item, ctx)?);
            }
            Ok(Value::Array(out))
        }

        // Scalar literals evaluate to themselves
        other => Ok(other.clone()),
    }
}

fn apply(op: &str, args: &Value, ctx: &EvalContext<'_>) -> Result<Value, EvalError> {
    // Single non-array argument is shorthand for a one-element list
    let list: Vec<&Value> = match args {
        Value::Array(items) => items.iter().collect(),
        single => vec![single],
    };

    match op {
        "==" => binary_cmp(op, &list, ctx, |o| o == Ordering::Equal),
        "!=" => binary_cmp(op, &list, ctx, |o| o != Ordering::Equal),
        "<" => binary_cmp(op, &list, ctx, |o| o == Ordering::Less),
        "<=" => binary_cmp(op, &list, ctx, |o| o != Ordering::Greater),
        ">" => binary_cmp(op, &list, ctx, |o| o == Ordering::Greater),
        ">=" => binary_cmp(op, &list, ctx, |o| o != Ordering::Less),

        "all" | "and" => {
            for item in &list {
                if !truthy(&eval(item, ctx)?) {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        "any" | "or" => {
            for item in &list {
                if truthy(&eval(item, ctx)?) {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        "none" => {
            for item in &list {
                if truthy(&eval(item, ctx)?) {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        "!" => {
            if list.len() != 1 {
                return Err(arity(op, "1", list.len()));
            }
            Ok(Value::Bool(!truthy(&eval(list[0], ctx)?)))
        }

        "in" => {
            if list.len() != 2 {
                return Err(arity(op, "2", list.len()));
            }
            let needle = eval(list[0], ctx)?;
            let haystack = eval(list[1], ctx)?;
            match haystack {
                Value::Array(items) => Ok(Value::Bool(
                    items.iter().any(|v| compare(&needle, v) == Ordering::Equal),
                )),
                // Not an array: membership is false, not an error
                _ => Ok(Value::Bool(false)),
            }
        }

        "var" => {
            if list.is_empty() || list.len() > 2 {
                return Err(arity(op, "1 or 2", list.len()));
            }
            let key = eval(list[0], ctx)?;
            let key = key.as_str().ok_or_else(|| EvalError::Type {
                op: op.to_string(),
                detail: "var key must be a string".to_string(),
            })?;
            match resolve_var(key, ctx.data) {
                Some(v) => Ok(v.clone()),
                None => match list.get(1) {
                    Some(default) => eval(default, ctx),
                    None => Ok(Value::Null),
                },
            }
        }

        "within_days" => {
            if list.len() != 2 {
                return Err(arity(op, "2", list.len()));
            }
            let ts = eval(list[0], ctx)?;
            let ts = parse_timestamp(&ts).ok_or_else(|| EvalError::Type {
                op: op.to_string(),
                detail: format!("not a timestamp: {ts}"),
            })?;
            let days = int_arg(op, &eval(list[1], ctx)?)?;
            Ok(Value::Bool(ts >= ctx.now - Duration::days(days)))
        }

        "nth_event_in_period" => {
            if list.len() != 3 {
                return Err(arity(op, "3", list.len()));
            }
            let event_type = eval(list[0], ctx)?;
            let event_type = event_type.as_str().ok_or_else(|| EvalError::Type {
                op: op.to_string(),
                detail: "event type must be a string".to_string(),
            })?;
            let n = int_arg(op, &eval(list[1], ctx)?)?;
            let period_days = int_arg(op, &eval(list[2], ctx)?)?;
            let key = FactKey::EventCount {
                event_type: event_type.to_string(),
                period_days,
            };
            let count = ctx
                .facts
                .get(&key)
                .ok_or_else(|| EvalError::MissingFact(format!("{key:?}")))?;
            Ok(Value::Bool(*count == n))
        }

        "distinct_visit_days" => {
            if list.len() != 1 {
                return Err(arity(op, "1", list.len()));
            }
            let period_days = int_arg(op, &eval(list[0], ctx)?)?;
            let key = FactKey::VisitDays { period_days };
            let count = ctx
                .facts
                .get(&key)
                .ok_or_else(|| EvalError::MissingFact(format!("{key:?}")))?;
            Ok(Value::Number((*count).into()))
        }

        other => Err(EvalError::UnknownOperator(other.to_string())),
    }
}

fn binary_cmp(
    op: &str,
    list: &[&Value],
    ctx: &EvalContext<'_>,
    accept: impl Fn(Ordering) -> bool,
) -> Result<Value, EvalError> {
    if list.len() != 2 {
        return Err(arity(op, "2", list.len()));
    }
    let a = eval(list[0], ctx)?;
    let b = eval(list[1], ctx)?;
    Ok(Value::Bool(accept(compare(&a, &b))))
}

fn arity(op: &str, expected: &'static str, got: usize) -> EvalError {
    EvalError::Arity {
        op: op.to_string(),
        expected,
        got,
    }
}

/// Ordering with coercion: numeric when both sides coerce to number,
/// otherwise lexicographic on string form. Null sorts before non-null.
pub fn compare(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        (false, false) => {}
    }
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    as_string(a).cmp(&as_string(b))
}

/// Boolean coercion: null is false, numbers by nonzero, strings and
/// containers by non-emptiness.
pub fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn as_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Variable resolution: dotted path from the data root first, then the same
/// path under the `properties` sub-map.
fn resolve_var<'a>(key: &str, data: &'a Value) -> Option<&'a Value> {
    if key.is_empty() {
        return Some(data);
    }
    if let Some(v) = walk_path(key, data) {
        return Some(v);
    }
    data.get("properties").and_then(|props| walk_path(key, props))
}

fn walk_path<'a>(path: &str, root: &'a Value) -> Option<&'a Value> {
    let mut current = root;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

/// Accept RFC 3339 strings or unix-epoch seconds.
fn parse_timestamp(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    }
}

fn int_arg(op: &str, v: &Value) -> Result<i64, EvalError> {
    as_number(v)
        .map(|f| f as i64)
        .ok_or_else(|| EvalError::Type {
            op: op.to_string(),
            detail: format!("expected integer, got {v}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx_with<'a>(data: &'a Value, facts: &'a Facts) -> EvalContext<'a> {
        EvalContext {
            data,
            now: Utc::now(),
            facts,
        }
    }

    fn eval_bool(expr: Value, data: Value) -> bool {
        let facts = Facts::new();
        let ctx = ctx_with(&data, &facts);
        matches(&expr, &ctx).unwrap()
    }

    #[test]
    fn test_empty_expression_always_matches() {
        assert!(eval_bool(json!({}), json!({})));
        assert!(eval_bool(json!(null), json!({})));
    }

    #[test]
    fn test_numeric_comparison() {
        let data = json!({"amount": 25});
        assert!(eval_bool(json!({">=": [{"var": "amount"}, 20]}), data.clone()));
        assert!(!eval_bool(json!({"<": [{"var": "amount"}, 20]}), data.clone()));
        // Numeric strings compare numerically
        assert!(eval_bool(json!({"==": ["25", 25]}), data));
    }

    #[test]
    fn test_lexicographic_fallback() {
        assert!(eval_bool(json!({"<": ["apple", "banana"]}), json!({})));
        assert!(eval_bool(json!({"==": ["gold", "gold"]}), json!({})));
    }

    #[test]
    fn test_null_sorts_before_non_null() {
        assert!(eval_bool(json!({"<": [null, 0]}), json!({})));
        assert!(eval_bool(json!({"<": [{"var": "missing"}, "x"]}), json!({})));
        assert!(eval_bool(json!({"==": [null, null]}), json!({})));
    }

    #[test]
    fn test_logical_operators() {
        let data = json!({"a": 1, "b": 0});
        assert!(eval_bool(
            json!({"and": [{"==": [{"var": "a"}, 1]}, {"==": [{"var": "b"}, 0]}]}),
            data.clone()
        ));
        assert!(eval_bool(
            json!({"or": [{"==": [{"var": "a"}, 2]}, {"==": [{"var": "b"}, 0]}]}),
            data.clone()
        ));
        assert!(eval_bool(
            json!({"none": [{"==": [{"var": "a"}, 2]}, {"==": [{"var": "b"}, 3]}]}),
            data.clone()
        ));
        assert!(eval_bool(json!({"!": [{"var": "b"}]}), data));
    }

    #[test]
    fn test_in_operator() {
        let data = json!({"tier": "gold"});
        assert!(eval_bool(
            json!({"in": [{"var": "tier"}, ["silver", "gold"]]}),
            data.clone()
        ));
        assert!(!eval_bool(
            json!({"in": [{"var": "tier"}, ["silver", "bronze"]]}),
            data.clone()
        ));
        // Haystack that is not an array is false, not an error
        assert!(!eval_bool(json!({"in": [{"var": "tier"}, "gold"]}), data));
    }

    #[test]
    fn test_var_resolution_root_then_properties() {
        let data = json!({
            "event_type": "purchase",
            "properties": {"amount": 42, "store": {"city": "Harare"}}
        });
        // Lifted key path via properties sub-map
        assert!(eval_bool(json!({"==": [{"var": "amount"}, 42]}), data.clone()));
        // Root key
        assert!(eval_bool(
            json!({"==": [{"var": "event_type"}, "purchase"]}),
            data.clone()
        ));
        // Dotted path inside properties
        assert!(eval_bool(
            json!({"==": [{"var": "store.city"}, "Harare"]}),
            data.clone()
        ));
        // Default value
        assert!(eval_bool(
            json!({"==": [{"var": ["missing", "fallback"]}, "fallback"]}),
            data
        ));
    }

    #[test]
    fn test_truthiness_coercion() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!(0)));
        assert!(truthy(&json!(-1)));
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!("x")));
        assert!(!truthy(&json!([])));
        assert!(truthy(&json!([0])));
        assert!(!truthy(&json!({})));
    }

    #[test]
    fn test_unknown_operator_errors() {
        let data = json!({});
        let facts = Facts::new();
        let ctx = ctx_with(&data, &facts);
        assert!(matches!(
            matches(&json!({"frobnicate": [1]}), &ctx),
            Err(EvalError::UnknownOperator(_))
        ));
    }

    #[test]
    fn test_arity_mismatch_errors() {
        let data = json!({});
        let facts = Facts::new();
        let ctx = ctx_with(&data, &facts);
        assert!(matches!(
            matches(&json!({"<": [1]}), &ctx),
            Err(EvalError::Arity { .. })
        ));
        assert!(matches!(
            matches(&json!({"in": [1, 2, 3]}), &ctx),
            Err(EvalError::Arity { .. })
        ));
    }

    #[test]
    fn test_within_days() {
        let data = json!({"signed_up_at": "2026-07-20T12:00:00Z"});
        let facts = Facts::new();
        let now = DateTime::parse_from_rfc3339("2026-08-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let ctx = EvalContext {
            data: &data,
            now,
            facts: &facts,
        };
        let recent = json!({"within_days": [{"var": "signed_up_at"}, 30]});
        let tight = json!({"within_days": [{"var": "signed_up_at"}, 7]});
        assert!(matches(&recent, &ctx).unwrap());
        assert!(!matches(&tight, &ctx).unwrap());
    }

    #[test]
    fn test_within_days_epoch_seconds() {
        let data = json!({"ts": 1754006400i64}); // 2025-08-01T00:00:00Z
        let facts = Facts::new();
        let now = DateTime::from_timestamp(1754006400 + 86400, 0).unwrap();
        let ctx = EvalContext {
            data: &data,
            now,
            facts: &facts,
        };
        assert!(matches(&json!({"within_days": [{"var": "ts"}, 2]}), &ctx).unwrap());
    }

    #[test]
    fn test_nth_event_in_period_uses_facts() {
        let data = json!({});
        let mut facts = Facts::new();
        facts.insert(
            FactKey::EventCount {
                event_type: "purchase".to_string(),
                period_days: 30,
            },
            3,
        );
        let ctx = ctx_with(&data, &facts);
        assert!(matches(&json!({"nth_event_in_period": ["purchase", 3, 30]}), &ctx).unwrap());
        assert!(!matches(&json!({"nth_event_in_period": ["purchase", 4, 30]}), &ctx).unwrap());
        // No prefetched fact for this window: rule-level failure
        assert!(matches!(
            matches(&json!({"nth_event_in_period": ["purchase", 3, 7]}), &ctx),
            Err(EvalError::MissingFact(_))
        ));
    }

    #[test]
    fn test_distinct_visit_days_is_numeric() {
        let data = json!({});
        let mut facts = Facts::new();
        facts.insert(FactKey::VisitDays { period_days: 30 }, 12);
        let ctx = ctx_with(&data, &facts);
        assert!(matches(&json!({">=": [{"distinct_visit_days": [30]}, 10]}), &ctx).unwrap());
        assert!(!matches(&json!({">": [{"distinct_visit_days": [30]}, 12]}), &ctx).unwrap());
    }
}
