//! The issuance transaction
//!
//! One atomic database transaction per `(rule, event)` attempt:
//!
//! 1. take the transaction-scoped advisory lock for
//!    `(tenant, rule, customer)` - concurrent attempts for the same triple
//!    serialize here, unrelated work is untouched;
//! 2. re-run the cap gate on fresh in-transaction counts;
//! 3. reserve budget (hard cap enforced, soft cap flagged);
//! 4. pop a voucher code when the reward is pool-backed;
//! 5. insert the `reserved` issuance row.
//!
//! Any gate failure rolls the whole transaction back and surfaces as a
//! structured skip; only infrastructure errors propagate.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::caps::{self, CapVerdict};
use crate::catalog::{CampaignRepository, Inventory, Reward, RewardRepository};
use crate::db::{acquire_issuance_lock, begin_tenant_tx, issuance_lock_key};
use crate::events::Event;
use crate::ledger;
use crate::rules::Rule;
use crate::vouchers::VoucherPool;

use super::error::{IssueError, SkipReason};
use super::models::{Issuance, IssuanceStatus};
use super::repository::issuance_from_row;

/// What one issuance attempt produced.
#[derive(Debug)]
pub enum IssueOutcome {
    Issued {
        issuance: Issuance,
        /// Informational: the reservation pushed the budget past its soft cap
        soft_cap_exceeded: bool,
    },
    Skipped(SkipReason),
}

/// Run the issuance transaction for one matched rule.
pub async fn issue(pool: &PgPool, rule: &Rule, event: &Event) -> Result<IssueOutcome, IssueError> {
    let mut tx = begin_tenant_tx(pool, rule.tenant_id).await?;

    let key = issuance_lock_key(rule.tenant_id, rule.id, event.customer_id);
    acquire_issuance_lock(&mut tx, key).await?;

    // Authoritative cap check, after the lock
    let verdict = caps::check(&mut tx, rule, event.customer_id).await?;
    match verdict {
        CapVerdict::Pass => {}
        CapVerdict::PerUserCapExceeded | CapVerdict::GlobalCapExceeded => {
            return Ok(IssueOutcome::Skipped(SkipReason::CapsExceeded));
        }
        CapVerdict::CooldownActive => {
            return Ok(IssueOutcome::Skipped(SkipReason::Cooldown));
        }
    }

    let reward = RewardRepository::get_by_id_tx(&mut tx, rule.tenant_id, rule.reward_id)
        .await?
        .ok_or(IssueError::RewardNotFound(rule.reward_id))?;

    // The issuance id is minted up front so the ledger entry and the claimed
    // voucher row can reference it before the row itself exists.
    let issuance_id = Uuid::new_v4();

    let mut soft_cap_exceeded = false;
    let mut expires_at: Option<DateTime<Utc>> = None;

    if let Some(campaign_id) = rule.campaign_id {
        let campaign = CampaignRepository::get_by_id_tx(&mut tx, rule.tenant_id, campaign_id)
            .await?
            .ok_or(IssueError::CampaignNotFound(campaign_id))?;
        expires_at = Some(campaign.ends_at);

        if let Some(budget_id) = campaign.budget_id {
            let budget = ledger::ops::lock_budget(&mut tx, rule.tenant_id, budget_id).await?;

            if budget.currency != reward.currency {
                tracing::error!(
                    rule_id = %rule.id,
                    budget_currency = %budget.currency,
                    reward_currency = %reward.currency,
                    "issuance currency mismatch"
                );
                return Ok(IssueOutcome::Skipped(SkipReason::CurrencyMismatch));
            }

            let outcome =
                ledger::ops::reserve(&mut tx, &budget, reward.face_value, issuance_id).await?;
            if !outcome.reserved {
                return Ok(IssueOutcome::Skipped(SkipReason::InsufficientFunds));
            }
            soft_cap_exceeded = outcome.soft_cap_exceeded;
        }
    }

    // Pool-backed rewards consume a code; the code is copied onto the
    // issuance so redemption never re-reads the pool.
    let code = if reward.inventory == Inventory::Pool {
        match VoucherPool::claim_code(&mut tx, rule.tenant_id, reward.id, issuance_id).await? {
            Some(code) => Some(code),
            None => {
                return Ok(IssueOutcome::Skipped(SkipReason::OutOfStock));
            }
        }
    } else {
        None
    };

    let issuance =
        insert_issuance(&mut tx, issuance_id, rule, event, &reward, code, expires_at).await?;

    tx.commit().await?;

    tracing::info!(
        issuance_id = %issuance.id,
        rule_id = %rule.id,
        customer_id = %event.customer_id,
        amount = %issuance.cost_amount,
        soft_cap_exceeded,
        "issuance reserved"
    );

    Ok(IssueOutcome::Issued {
        issuance,
        soft_cap_exceeded,
    })
}

async fn insert_issuance(
    conn: &mut PgConnection,
    issuance_id: Uuid,
    rule: &Rule,
    event: &Event,
    reward: &Reward,
    code: Option<String>,
    expires_at: Option<DateTime<Utc>>,
) -> Result<Issuance, IssueError> {
    let row = sqlx::query(
        r#"
        INSERT INTO issuances
            (id, tenant_id, customer_id, event_id, rule_id, campaign_id, reward_id,
             status, cost_amount, face_amount, currency, code, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING id, tenant_id, customer_id, event_id, rule_id, campaign_id, reward_id,
                  status, cost_amount, face_amount, currency, code, expires_at, redeemed_at,
                  created_at, updated_at
        "#,
    )
    .bind(issuance_id)
    .bind(rule.tenant_id)
    .bind(event.customer_id)
    .bind(event.id)
    .bind(rule.id)
    .bind(rule.campaign_id)
    .bind(reward.id)
    .bind(IssuanceStatus::Reserved.id())
    .bind(reward.face_value)
    .bind(reward.face_value)
    .bind(reward.currency.as_str())
    .bind(code)
    .bind(expires_at)
    .fetch_one(conn)
    .await?;

    Ok(issuance_from_row(&row)?)
}
