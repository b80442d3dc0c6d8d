//! Budget reconciliation
//!
//! Recomputes a budget's balance from its entries (every type except
//! `charge` contributes its stored signed amount) and compares against the
//! stored balance. A nonzero discrepancy means the entry log lost a movement;
//! the fix appends one corrective `reverse` entry, guarded by an operator
//! note, that brings the sum back to the stored balance.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use crate::core_types::{BudgetId, TenantId};
use crate::db::begin_tenant_tx;

use super::models::EntryType;
use super::ops::{self, LedgerError};

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ReconcileReport {
    pub budget_id: BudgetId,
    pub stored_balance: Decimal,
    pub computed_balance: Decimal,
    /// `computed_balance - stored_balance`; zero means the ledger is whole
    pub discrepancy: Decimal,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.discrepancy == Decimal::ZERO
    }
}

/// Report-only reconciliation. Locks the budget so the comparison is not
/// racing in-flight mutations.
pub async fn reconcile(
    pool: &PgPool,
    tenant_id: TenantId,
    budget_id: BudgetId,
) -> Result<ReconcileReport, LedgerError> {
    let mut tx = begin_tenant_tx(pool, tenant_id).await?;
    let report = reconcile_locked(&mut tx, tenant_id, budget_id).await?;
    tx.commit().await.map_err(LedgerError::Database)?;

    if !report.is_clean() {
        tracing::error!(
            %tenant_id,
            %budget_id,
            discrepancy = %report.discrepancy,
            "budget reconciliation mismatch"
        );
    }
    Ok(report)
}

/// Fix a discrepancy by appending a corrective `reverse` entry. The stored
/// balance is operationally authoritative; the entry re-records whatever
/// movement the log lost, so the post-fix report is clean.
pub async fn fix_discrepancy(
    pool: &PgPool,
    tenant_id: TenantId,
    budget_id: BudgetId,
    note: &str,
) -> Result<ReconcileReport, LedgerError> {
    let mut tx = begin_tenant_tx(pool, tenant_id).await?;

    let report = reconcile_locked(&mut tx, tenant_id, budget_id).await?;
    if report.is_clean() {
        tx.commit().await.map_err(LedgerError::Database)?;
        return Ok(report);
    }

    let budget = ops::lock_budget(&mut tx, tenant_id, budget_id).await?;
    let correction = report.stored_balance - report.computed_balance;
    ops::append_reverse_entry(&mut tx, &budget, correction, note).await?;

    let fixed = reconcile_locked(&mut tx, tenant_id, budget_id).await?;
    tx.commit().await.map_err(LedgerError::Database)?;

    tracing::warn!(
        %tenant_id,
        %budget_id,
        %correction,
        note,
        "ledger discrepancy corrected with reverse entry"
    );
    Ok(fixed)
}

async fn reconcile_locked(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    budget_id: BudgetId,
) -> Result<ReconcileReport, LedgerError> {
    let budget = ops::lock_budget(conn, tenant_id, budget_id).await?;

    let computed: Decimal = sqlx::query_scalar::<_, Decimal>(
        r#"
        SELECT COALESCE(SUM(CASE WHEN entry_type = $2 THEN 0 ELSE amount END), 0)
        FROM ledger_entries
        WHERE budget_id = $1
        "#,
    )
    .bind(budget_id)
    .bind(EntryType::Charge.id())
    .fetch_one(conn)
    .await?;

    Ok(ReconcileReport {
        budget_id,
        stored_balance: budget.balance,
        computed_balance: computed,
        discrepancy: computed - budget.balance,
    })
}
