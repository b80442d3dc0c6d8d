//! Event-processing orchestration
//!
//! For each active rule (stable id order): build the data context, prefetch
//! history facts, evaluate the condition, pre-check caps outside the
//! transaction, then run the issuance transaction. A bad rule (evaluation
//! failure, dangling reward) is logged and skipped - it can never block the
//! other rules. Only infrastructure failures abort the whole event.

use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::PgPool;

use crate::caps::{self, CapVerdict};
use crate::core_types::RuleId;
use crate::issuance::{self, IssueError, IssueOutcome, Issuance, SkipReason};
use crate::jsonlogic::{self, facts, EvalContext};
use crate::rules::RuleSelector;

use super::models::Event;

/// One rule's contribution to an ingest response.
#[derive(Debug)]
pub struct IssuanceAttempt {
    pub rule_id: RuleId,
    pub outcome: AttemptOutcome,
}

/// Outcome of a matched rule.
#[derive(Debug)]
pub enum AttemptOutcome {
    Issued {
        issuance: Issuance,
        soft_cap_exceeded: bool,
    },
    Skipped(SkipReason),
}

/// Run the full pipeline for one freshly ingested event.
pub async fn process_event(
    pool: &PgPool,
    selector: &RuleSelector,
    event: &Event,
) -> Result<Vec<IssuanceAttempt>, IssueError> {
    let rules = selector
        .active_rules(pool, event.tenant_id, &event.event_type)
        .await?;
    if rules.is_empty() {
        return Ok(Vec::new());
    }

    let data = build_data_context(event);
    let mut attempts = Vec::new();

    for rule in rules.iter() {
        // Resolve history facts, then evaluate synchronously. A database
        // failure here is infrastructure trouble, not a bad rule - bubble it.
        let rule_facts =
            facts::prefetch(pool, event.tenant_id, event.customer_id, &rule.conditions)
                .await
                .map_err(IssueError::Database)?;
        let ctx = EvalContext {
            data: &data,
            now: Utc::now(),
            facts: &rule_facts,
        };
        match jsonlogic::matches(&rule.conditions, &ctx) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                tracing::warn!(rule_id = %rule.id, error = %e, "rule evaluation failed, skipping rule");
                continue;
            }
        }

        // Cheap pre-check before paying for the advisory lock. The gate
        // re-runs inside the transaction either way.
        let mut conn = pool.acquire().await.map_err(IssueError::Database)?;
        let verdict = caps::check(&mut conn, rule, event.customer_id)
            .await
            .map_err(IssueError::Database)?;
        drop(conn);
        if !verdict.passed() {
            let reason = match verdict {
                CapVerdict::CooldownActive => SkipReason::Cooldown,
                _ => SkipReason::CapsExceeded,
            };
            attempts.push(IssuanceAttempt {
                rule_id: rule.id,
                outcome: AttemptOutcome::Skipped(reason),
            });
            continue;
        }

        match issuance::issue(pool, rule, event).await {
            Ok(IssueOutcome::Issued {
                issuance,
                soft_cap_exceeded,
            }) => {
                // Best-effort alert, after commit, never inside the transaction
                if soft_cap_exceeded {
                    tracing::warn!(
                        rule_id = %rule.id,
                        issuance_id = %issuance.id,
                        "budget soft cap exceeded"
                    );
                }
                attempts.push(IssuanceAttempt {
                    rule_id: rule.id,
                    outcome: AttemptOutcome::Issued {
                        issuance,
                        soft_cap_exceeded,
                    },
                });
            }
            Ok(IssueOutcome::Skipped(reason)) => {
                attempts.push(IssuanceAttempt {
                    rule_id: rule.id,
                    outcome: AttemptOutcome::Skipped(reason),
                });
            }
            Err(IssueError::Database(e)) => return Err(IssueError::Database(e)),
            Err(IssueError::Ledger(crate::ledger::LedgerError::Database(e))) => {
                return Err(IssueError::Database(e));
            }
            Err(e) => {
                // Configuration trouble (dangling reward/campaign): this rule
                // cannot fire, the others still can
                tracing::error!(rule_id = %rule.id, error = %e, "issuance failed for rule");
            }
        }
    }

    Ok(attempts)
}

/// Data context for one event: root keys plus the `properties` sub-map, with
/// every property key also lifted to the root for terser expressions. Root
/// keys win on collision.
pub fn build_data_context(event: &Event) -> Value {
    let mut root = Map::new();

    if let Value::Object(props) = &event.properties {
        for (k, v) in props {
            root.insert(k.clone(), v.clone());
        }
    }

    root.insert(
        "event_type".to_string(),
        Value::String(event.event_type.clone()),
    );
    root.insert(
        "tenant_id".to_string(),
        Value::String(event.tenant_id.to_string()),
    );
    root.insert(
        "customer_id".to_string(),
        Value::String(event.customer_id.to_string()),
    );
    root.insert(
        "occurred_at".to_string(),
        Value::String(event.occurred_at.to_rfc3339()),
    );
    root.insert("properties".to_string(), event.properties.clone());

    Value::Object(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn sample_event(properties: Value) -> Event {
        Event {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            event_type: "purchase".to_string(),
            properties,
            occurred_at: Utc::now(),
            source: "api".to_string(),
            idempotency_key: "k1".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_data_context_lifts_properties() {
        let event = sample_event(json!({"amount": 25, "currency": "USD"}));
        let data = build_data_context(&event);

        assert_eq!(data["amount"], json!(25));
        assert_eq!(data["currency"], json!("USD"));
        assert_eq!(data["properties"]["amount"], json!(25));
        assert_eq!(data["event_type"], json!("purchase"));
        assert_eq!(data["tenant_id"], json!(event.tenant_id.to_string()));
    }

    #[test]
    fn test_data_context_root_keys_win_over_lifted() {
        // A property named event_type must not shadow the real one
        let event = sample_event(json!({"event_type": "spoofed"}));
        let data = build_data_context(&event);

        assert_eq!(data["event_type"], json!("purchase"));
        assert_eq!(data["properties"]["event_type"], json!("spoofed"));
    }

    #[test]
    fn test_data_context_non_object_properties() {
        let event = sample_event(json!([1, 2, 3]));
        let data = build_data_context(&event);
        assert_eq!(data["properties"], json!([1, 2, 3]));
    }
}
