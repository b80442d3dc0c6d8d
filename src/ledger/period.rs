//! Period reset for monthly / quarterly / yearly budgets
//!
//! At a period boundary (1st of month/quarter/year, UTC midnight) a periodic
//! budget's remaining balance is released in one `release` entry tagged
//! `ref_type='period_reset'`, bringing the balance to zero. Rolling budgets
//! never reset. The core exposes this as an on-demand API - an external
//! scheduler decides when to call it.

use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::core_types::{BudgetId, TenantId};
use crate::db::begin_tenant_tx;

use super::models::BudgetPeriod;
use super::ops::{self, LedgerError};

/// Reset every periodic budget whose last reset predates the current period
/// boundary. Returns the budgets that were reset. Each budget resets in its
/// own transaction so one failure cannot wedge the rest.
pub async fn run_period_reset(pool: &PgPool) -> Result<Vec<BudgetId>, LedgerError> {
    // date_trunc over the period keyword gives the current boundary; quarter
    // and year reset on their own first days.
    let due = sqlx::query(
        r#"
        SELECT id, tenant_id FROM budgets
        WHERE period <> $1
          AND date_trunc(
                CASE period
                    WHEN $2 THEN 'month'
                    WHEN $3 THEN 'quarter'
                    ELSE 'year'
                END,
                NOW() AT TIME ZONE 'UTC'
              ) > date_trunc(
                CASE period
                    WHEN $2 THEN 'month'
                    WHEN $3 THEN 'quarter'
                    ELSE 'year'
                END,
                last_reset_at AT TIME ZONE 'UTC'
              )
        ORDER BY id
        "#,
    )
    .bind(BudgetPeriod::Rolling.id())
    .bind(BudgetPeriod::Monthly.id())
    .bind(BudgetPeriod::Quarterly.id())
    .fetch_all(pool)
    .await?;

    let mut reset = Vec::with_capacity(due.len());
    for row in due {
        let budget_id: Uuid = row.get("id");
        let tenant_id: Uuid = row.get("tenant_id");
        match reset_one(pool, tenant_id, budget_id).await {
            Ok(()) => reset.push(budget_id),
            Err(e) => {
                tracing::error!(%tenant_id, %budget_id, error = %e, "period reset failed");
            }
        }
    }

    if !reset.is_empty() {
        tracing::info!(count = reset.len(), "period reset complete");
    }
    Ok(reset)
}

async fn reset_one(
    pool: &PgPool,
    tenant_id: TenantId,
    budget_id: BudgetId,
) -> Result<(), LedgerError> {
    let mut tx = begin_tenant_tx(pool, tenant_id).await?;
    let budget = ops::lock_budget(&mut tx, tenant_id, budget_id).await?;

    ops::release_full_balance(&mut tx, &budget).await?;
    sqlx::query("UPDATE budgets SET last_reset_at = NOW(), updated_at = NOW() WHERE id = $1")
        .bind(budget_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await.map_err(LedgerError::Database)?;
    Ok(())
}
