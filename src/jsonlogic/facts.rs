//! History-fact prefetch for custom operators
//!
//! `nth_event_in_period` and `distinct_visit_days` depend on the customer's
//! event history. Expressions are scanned for those operator nodes before
//! evaluation and each distinct requirement is resolved with one query; the
//! evaluator then consumes the resulting [`Facts`] table synchronously.
//!
//! History-operator arguments must be literals (the scanner cannot predict a
//! computed event type or window). A non-literal argument simply produces no
//! fact, which surfaces at evaluation time as `EvalError::MissingFact`.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use sqlx::PgPool;

use crate::core_types::{CustomerId, TenantId};

/// One resolvable history requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FactKey {
    /// Count of the customer's events of `event_type` within the window
    EventCount { event_type: String, period_days: i64 },
    /// Count of distinct UTC dates with `visit` events within the window
    VisitDays { period_days: i64 },
}

/// Resolved facts, keyed by requirement.
pub type Facts = HashMap<FactKey, i64>;

/// Collect every history requirement mentioned in an expression.
pub fn scan(expr: &Value, out: &mut HashSet<FactKey>) {
    match expr {
        Value::Object(map) => {
            for (op, args) in map {
                match (op.as_str(), args) {
                    ("nth_event_in_period", Value::Array(items)) if items.len() == 3 => {
                        if let (Some(event_type), Some(period_days)) =
                            (items[0].as_str(), items[2].as_i64())
                        {
                            out.insert(FactKey::EventCount {
                                event_type: event_type.to_string(),
                                period_days,
                            });
                        }
                    }
                    ("distinct_visit_days", Value::Array(items)) if items.len() == 1 => {
                        if let Some(period_days) = items[0].as_i64() {
                            out.insert(FactKey::VisitDays { period_days });
                        }
                    }
                    ("distinct_visit_days", single) => {
                        if let Some(period_days) = single.as_i64() {
                            out.insert(FactKey::VisitDays { period_days });
                        }
                    }
                    _ => scan(args, out),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                scan(item, out);
            }
        }
        _ => {}
    }
}

/// Resolve every requirement in `expr` for one `(tenant, customer)` pair.
pub async fn prefetch(
    pool: &PgPool,
    tenant_id: TenantId,
    customer_id: CustomerId,
    expr: &Value,
) -> Result<Facts, sqlx::Error> {
    let mut keys = HashSet::new();
    scan(expr, &mut keys);

    let mut facts = Facts::with_capacity(keys.len());
    for key in keys {
        let count = match &key {
            FactKey::EventCount {
                event_type,
                period_days,
            } => {
                sqlx::query_scalar::<_, i64>(
                    r#"
                    SELECT COUNT(*) FROM events
                    WHERE tenant_id = $1 AND customer_id = $2 AND event_type = $3
                      AND occurred_at >= NOW() - make_interval(days => $4::int)
                    "#,
                )
                .bind(tenant_id)
                .bind(customer_id)
                .bind(event_type)
                .bind(*period_days as i32)
                .fetch_one(pool)
                .await?
            }
            FactKey::VisitDays { period_days } => {
                sqlx::query_scalar::<_, i64>(
                    r#"
                    SELECT COUNT(DISTINCT (occurred_at AT TIME ZONE 'UTC')::date) FROM events
                    WHERE tenant_id = $1 AND customer_id = $2 AND event_type = 'visit'
                      AND occurred_at >= NOW() - make_interval(days => $3::int)
                    "#,
                )
                .bind(tenant_id)
                .bind(customer_id)
                .bind(*period_days as i32)
                .fetch_one(pool)
                .await?
            }
        };
        facts.insert(key, count);
    }

    Ok(facts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scan_finds_nested_requirements() {
        let expr = json!({
            "and": [
                {">=": [{"var": "amount"}, 20]},
                {"nth_event_in_period": ["purchase", 3, 30]},
                {"or": [
                    {">=": [{"distinct_visit_days": [14]}, 5]},
                    {"nth_event_in_period": ["visit", 1, 7]}
                ]}
            ]
        });
        let mut keys = HashSet::new();
        scan(&expr, &mut keys);
        assert_eq!(keys.len(), 3);
        assert!(keys.contains(&FactKey::EventCount {
            event_type: "purchase".to_string(),
            period_days: 30
        }));
        assert!(keys.contains(&FactKey::EventCount {
            event_type: "visit".to_string(),
            period_days: 7
        }));
        assert!(keys.contains(&FactKey::VisitDays { period_days: 14 }));
    }

    #[test]
    fn test_scan_deduplicates() {
        let expr = json!({
            "or": [
                {"nth_event_in_period": ["visit", 1, 7]},
                {"nth_event_in_period": ["visit", 2, 7]}
            ]
        });
        let mut keys = HashSet::new();
        scan(&expr, &mut keys);
        // Same (type, window): one query serves both nodes
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn test_scan_ignores_plain_expressions() {
        let mut keys = HashSet::new();
        scan(&json!({"==": [{"var": "tier"}, "gold"]}), &mut keys);
        assert!(keys.is_empty());
    }
}
