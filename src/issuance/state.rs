//! Issuance state transitions
//!
//! Each transition runs in its own transaction: lock the issuance row,
//! validate the move against the transition table, apply the ledger effect,
//! update the row. Transitions are idempotent - re-applying the transition
//! that produced the current terminal state returns the row unchanged and
//! writes nothing.
//!
//! Ledger effects:
//!
//! | transition                      | effect            |
//! |---------------------------------|-------------------|
//! | reserved -> issued              | none              |
//! | reserved -> failed              | release           |
//! | reserved/issued -> redeemed     | charge            |
//! | reserved/issued -> expired      | release (expire)  |
//! | reserved/issued -> cancelled    | release           |

use chrono::Utc;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::core_types::{BudgetId, IssuanceId, TenantId};
use crate::db::begin_tenant_tx;
use crate::ledger::{self, EntryType};
use crate::vouchers::VoucherPool;

use super::error::TransitionError;
use super::models::{can_transition, Issuance, IssuanceStatus};
use super::repository::IssuanceRepository;

/// Redemption credentials: a customer OTP/code or an operator staff PIN.
/// At least one must be present.
#[derive(Debug, Clone, Default)]
pub struct RedeemCredentials {
    pub otp: Option<String>,
    pub staff_pin: Option<String>,
}

impl RedeemCredentials {
    pub fn is_empty(&self) -> bool {
        self.otp.is_none() && self.staff_pin.is_none()
    }
}

/// State transition service
pub struct StateTransitions;

impl StateTransitions {
    /// `reserved -> issued`: external fulfillment confirmed. No ledger effect.
    pub async fn mark_issued(
        pool: &PgPool,
        tenant_id: TenantId,
        issuance_id: IssuanceId,
    ) -> Result<Issuance, TransitionError> {
        let mut tx = begin_tenant_tx(pool, tenant_id).await?;
        let issuance = lock_issuance(&mut tx, tenant_id, issuance_id).await?;

        // Idempotent replay
        if issuance.status == IssuanceStatus::Issued {
            tx.commit().await.map_err(TransitionError::Database)?;
            return Ok(issuance);
        }
        guard(&issuance, IssuanceStatus::Issued)?;

        VoucherPool::mark_issued(&mut tx, issuance.id).await?;
        let updated = set_status(&mut tx, &issuance, IssuanceStatus::Issued).await?;
        tx.commit().await.map_err(TransitionError::Database)?;
        Ok(updated)
    }

    /// `reserved/issued -> redeemed`: customer presented the reward.
    /// Charges the budget; double redeems return the terminal row unchanged.
    pub async fn redeem(
        pool: &PgPool,
        tenant_id: TenantId,
        issuance_id: IssuanceId,
        credentials: &RedeemCredentials,
    ) -> Result<Issuance, TransitionError> {
        if credentials.is_empty() {
            return Err(TransitionError::CredentialsRequired);
        }

        let mut tx = begin_tenant_tx(pool, tenant_id).await?;
        let issuance = lock_issuance(&mut tx, tenant_id, issuance_id).await?;

        if issuance.status == IssuanceStatus::Redeemed {
            tx.commit().await.map_err(TransitionError::Database)?;
            return Ok(issuance);
        }
        guard(&issuance, IssuanceStatus::Redeemed)?;

        if let Some(expires_at) = issuance.expires_at {
            if Utc::now() >= expires_at {
                return Err(TransitionError::PastExpiry);
            }
        }

        // A supplied OTP must match the stored code exactly; a staff PIN
        // asserts operator presence and skips the comparison.
        if let Some(otp) = &credentials.otp {
            if issuance.code.as_deref() != Some(otp.as_str()) {
                return Err(TransitionError::CodeMismatch);
            }
        }

        if let Some(budget_id) = budget_for(&mut tx, &issuance).await? {
            ledger::ops::charge(
                &mut tx,
                tenant_id,
                budget_id,
                issuance.cost_amount,
                issuance.id,
            )
            .await?;
        }

        VoucherPool::mark_issued(&mut tx, issuance.id).await?;

        let updated = sqlx::query(
            r#"
            UPDATE issuances SET status = $3, redeemed_at = NOW(), updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING id, tenant_id, customer_id, event_id, rule_id, campaign_id, reward_id,
                      status, cost_amount, face_amount, currency, code, expires_at, redeemed_at,
                      created_at, updated_at
            "#,
        )
        .bind(tenant_id)
        .bind(issuance_id)
        .bind(IssuanceStatus::Redeemed.id())
        .fetch_one(&mut *tx)
        .await
        .map_err(TransitionError::Database)?;
        let updated = super::repository::issuance_from_row(&updated)?;

        tx.commit().await.map_err(TransitionError::Database)?;

        tracing::info!(
            issuance_id = %issuance_id,
            %tenant_id,
            amount = %updated.cost_amount,
            "issuance redeemed"
        );
        Ok(updated)
    }

    /// `reserved/issued -> cancelled`: operator cancel. Releases the budget
    /// and returns a still-reserved voucher code to the pool.
    pub async fn cancel(
        pool: &PgPool,
        tenant_id: TenantId,
        issuance_id: IssuanceId,
    ) -> Result<Issuance, TransitionError> {
        Self::release_transition(pool, tenant_id, issuance_id, IssuanceStatus::Cancelled).await
    }

    /// `reserved -> failed`: fulfillment permanently failed. Releases budget.
    pub async fn fail(
        pool: &PgPool,
        tenant_id: TenantId,
        issuance_id: IssuanceId,
    ) -> Result<Issuance, TransitionError> {
        Self::release_transition(pool, tenant_id, issuance_id, IssuanceStatus::Failed).await
    }

    /// `reserved/issued -> expired`: past expires_at.
    pub async fn expire(
        pool: &PgPool,
        tenant_id: TenantId,
        issuance_id: IssuanceId,
    ) -> Result<Issuance, TransitionError> {
        Self::release_transition(pool, tenant_id, issuance_id, IssuanceStatus::Expired).await
    }

    async fn release_transition(
        pool: &PgPool,
        tenant_id: TenantId,
        issuance_id: IssuanceId,
        to: IssuanceStatus,
    ) -> Result<Issuance, TransitionError> {
        let mut tx = begin_tenant_tx(pool, tenant_id).await?;
        let issuance = lock_issuance(&mut tx, tenant_id, issuance_id).await?;

        if issuance.status == to {
            tx.commit().await.map_err(TransitionError::Database)?;
            return Ok(issuance);
        }
        guard(&issuance, to)?;

        apply_release(&mut tx, &issuance, to).await?;
        let updated = set_status(&mut tx, &issuance, to).await?;
        tx.commit().await.map_err(TransitionError::Database)?;

        tracing::info!(issuance_id = %issuance_id, %tenant_id, status = %to, "issuance released");
        Ok(updated)
    }
}

/// Release the ledger reservation and return an undelivered code to the pool.
/// Shared by cancel/fail/expire and the bulk reaper.
pub(crate) async fn apply_release(
    conn: &mut PgConnection,
    issuance: &Issuance,
    to: IssuanceStatus,
) -> Result<(), TransitionError> {
    let entry_type = if to == IssuanceStatus::Expired {
        EntryType::Expire
    } else {
        EntryType::Release
    };

    if let Some(budget_id) = budget_for(conn, issuance).await? {
        ledger::ops::release(
            conn,
            issuance.tenant_id,
            budget_id,
            issuance.cost_amount,
            issuance.id,
            entry_type,
        )
        .await?;
    }

    VoucherPool::return_to_pool(conn, issuance.id).await?;
    Ok(())
}

async fn lock_issuance(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: TenantId,
    issuance_id: IssuanceId,
) -> Result<Issuance, TransitionError> {
    IssuanceRepository::lock_by_id(tx, tenant_id, issuance_id)
        .await?
        .ok_or(TransitionError::NotFound)
}

fn guard(issuance: &Issuance, to: IssuanceStatus) -> Result<(), TransitionError> {
    if !can_transition(issuance.status, to) {
        return Err(TransitionError::InvalidTransition {
            from: issuance.status,
            to,
        });
    }
    Ok(())
}

async fn set_status(
    conn: &mut PgConnection,
    issuance: &Issuance,
    to: IssuanceStatus,
) -> Result<Issuance, TransitionError> {
    let row = sqlx::query(
        r#"
        UPDATE issuances SET status = $3, updated_at = NOW()
        WHERE tenant_id = $1 AND id = $2
        RETURNING id, tenant_id, customer_id, event_id, rule_id, campaign_id, reward_id,
                  status, cost_amount, face_amount, currency, code, expires_at, redeemed_at,
                  created_at, updated_at
        "#,
    )
    .bind(issuance.tenant_id)
    .bind(issuance.id)
    .bind(to.id())
    .fetch_one(conn)
    .await
    .map_err(TransitionError::Database)?;

    Ok(super::repository::issuance_from_row(&row)?)
}

/// Budget backing this issuance, via its campaign. Soft reference - resolved
/// on demand, never held.
async fn budget_for(
    conn: &mut PgConnection,
    issuance: &Issuance,
) -> Result<Option<BudgetId>, TransitionError> {
    let Some(campaign_id) = issuance.campaign_id else {
        return Ok(None);
    };

    let budget_id = sqlx::query_scalar::<_, Option<BudgetId>>(
        "SELECT budget_id FROM campaigns WHERE tenant_id = $1 AND id = $2",
    )
    .bind(issuance.tenant_id)
    .bind(campaign_id)
    .fetch_optional(conn)
    .await
    .map_err(TransitionError::Database)?;

    Ok(budget_id.flatten())
}
