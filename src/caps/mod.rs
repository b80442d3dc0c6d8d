//! Cap gate: per-user cap, global cap, cooldown
//!
//! Counts are scoped by the rule's campaign; a rule without a campaign is
//! its own scope. Only reserved/issued/redeemed issuances count - failed and
//! cancelled do not; the queries share that rule through
//! [`CAP_COUNTED_SQL`]. The gate runs twice per issuance attempt: once
//! before the transaction as a cheap pre-check, and once inside the
//! transaction after the advisory lock, where its answer is authoritative.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Row};

use crate::core_types::CustomerId;
use crate::issuance::models::CAP_COUNTED_SQL;
use crate::rules::Rule;

/// Why the gate blocked, if it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapVerdict {
    Pass,
    PerUserCapExceeded,
    GlobalCapExceeded,
    CooldownActive,
}

impl CapVerdict {
    pub fn passed(&self) -> bool {
        matches!(self, CapVerdict::Pass)
    }
}

/// Evaluate all three predicates against current history.
pub async fn check(
    conn: &mut PgConnection,
    rule: &Rule,
    customer_id: CustomerId,
) -> Result<CapVerdict, sqlx::Error> {
    if rule.per_user_cap > 0 {
        let count = customer_issuance_count(conn, rule, customer_id).await?;
        if !under_cap(rule.per_user_cap, count) {
            return Ok(CapVerdict::PerUserCapExceeded);
        }
    }

    if let Some(global_cap) = rule.global_cap {
        let count = global_issuance_count(conn, rule).await?;
        if !under_cap(global_cap, count) {
            return Ok(CapVerdict::GlobalCapExceeded);
        }
    }

    if rule.cool_down_sec > 0 {
        let last = last_issuance_at(conn, rule, customer_id).await?;
        if !cooldown_elapsed(rule.cool_down_sec, last, Utc::now()) {
            return Ok(CapVerdict::CooldownActive);
        }
    }

    Ok(CapVerdict::Pass)
}

/// Count this customer's cap-relevant issuances in the rule's scope.
pub async fn customer_issuance_count(
    conn: &mut PgConnection,
    rule: &Rule,
    customer_id: CustomerId,
) -> Result<i64, sqlx::Error> {
    let count = match rule.campaign_id {
        Some(campaign_id) => {
            sqlx::query_scalar::<_, i64>(&format!(
                "SELECT COUNT(*) FROM issuances \
                 WHERE tenant_id = $1 AND campaign_id = $2 AND customer_id = $3 AND {CAP_COUNTED_SQL}"
            ))
            .bind(rule.tenant_id)
            .bind(campaign_id)
            .bind(customer_id)
            .fetch_one(conn)
            .await?
        }
        None => {
            sqlx::query_scalar::<_, i64>(&format!(
                "SELECT COUNT(*) FROM issuances \
                 WHERE tenant_id = $1 AND rule_id = $2 AND customer_id = $3 AND {CAP_COUNTED_SQL}"
            ))
            .bind(rule.tenant_id)
            .bind(rule.id)
            .bind(customer_id)
            .fetch_one(conn)
            .await?
        }
    };
    Ok(count)
}

/// Count cap-relevant issuances across all customers in the rule's scope.
pub async fn global_issuance_count(
    conn: &mut PgConnection,
    rule: &Rule,
) -> Result<i64, sqlx::Error> {
    let count = match rule.campaign_id {
        Some(campaign_id) => {
            sqlx::query_scalar::<_, i64>(&format!(
                "SELECT COUNT(*) FROM issuances \
                 WHERE tenant_id = $1 AND campaign_id = $2 AND {CAP_COUNTED_SQL}"
            ))
            .bind(rule.tenant_id)
            .bind(campaign_id)
            .fetch_one(conn)
            .await?
        }
        None => {
            sqlx::query_scalar::<_, i64>(&format!(
                "SELECT COUNT(*) FROM issuances \
                 WHERE tenant_id = $1 AND rule_id = $2 AND {CAP_COUNTED_SQL}"
            ))
            .bind(rule.tenant_id)
            .bind(rule.id)
            .fetch_one(conn)
            .await?
        }
    };
    Ok(count)
}

/// Most recent cap-relevant issuance for this customer in the rule's scope.
async fn last_issuance_at(
    conn: &mut PgConnection,
    rule: &Rule,
    customer_id: CustomerId,
) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    let row = match rule.campaign_id {
        Some(campaign_id) => {
            sqlx::query(&format!(
                "SELECT MAX(created_at) AS last FROM issuances \
                 WHERE tenant_id = $1 AND campaign_id = $2 AND customer_id = $3 AND {CAP_COUNTED_SQL}"
            ))
            .bind(rule.tenant_id)
            .bind(campaign_id)
            .bind(customer_id)
            .fetch_one(conn)
            .await?
        }
        None => {
            sqlx::query(&format!(
                "SELECT MAX(created_at) AS last FROM issuances \
                 WHERE tenant_id = $1 AND rule_id = $2 AND customer_id = $3 AND {CAP_COUNTED_SQL}"
            ))
            .bind(rule.tenant_id)
            .bind(rule.id)
            .bind(customer_id)
            .fetch_one(conn)
            .await?
        }
    };
    Ok(row.get("last"))
}

#[inline]
fn under_cap(cap: i32, count: i64) -> bool {
    count < cap as i64
}

/// True once at least `cool_down_sec` has elapsed since the last issuance
/// (or when there is none).
fn cooldown_elapsed(
    cool_down_sec: i32,
    last: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    match last {
        None => true,
        Some(last) => (now - last).num_seconds() >= cool_down_sec as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_under_cap() {
        assert!(under_cap(2, 0));
        assert!(under_cap(2, 1));
        assert!(!under_cap(2, 2));
        assert!(!under_cap(2, 3));
    }

    #[test]
    fn test_cooldown_elapsed() {
        let now = Utc::now();
        assert!(cooldown_elapsed(60, None, now));
        // Strictly less than T elapsed: blocked
        assert!(!cooldown_elapsed(60, Some(now - Duration::seconds(59)), now));
        // Exactly T elapsed: allowed
        assert!(cooldown_elapsed(60, Some(now - Duration::seconds(60)), now));
        assert!(cooldown_elapsed(60, Some(now - Duration::seconds(120)), now));
    }
}
