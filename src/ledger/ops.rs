//! Atomic ledger operations
//!
//! Every operation serializes on the budget row (`SELECT ... FOR UPDATE`)
//! and appends exactly one entry. All of them take `&mut PgConnection` so
//! callers (the issuer, the state machine, the top-up endpoint) compose them
//! inside their own transactions; nothing here commits.

use rust_decimal::Decimal;
use sqlx::{PgConnection, Row};
use uuid::Uuid;

use thiserror::Error;

use crate::core_types::{BudgetId, TenantId};

use super::models::{Budget, EntryType};
use super::repository::budget_from_row;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Budget not found")]
    BudgetNotFound,

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Top-up would push balance over the hard cap")]
    HardCapExceeded,

    #[error("No prior reserve entry for ref {0}")]
    MissingReserve(Uuid),

    #[error("Release forbidden after charge for ref {0}")]
    ReleaseAfterCharge(Uuid),
}

/// Result of a reserve attempt.
#[derive(Debug, Clone, Copy)]
pub struct ReserveOutcome {
    /// False when the hard cap rejected the reservation
    pub reserved: bool,
    /// Informational: balance crossed the soft cap (never a failure)
    pub soft_cap_exceeded: bool,
    pub balance_after: Decimal,
}

/// Lock the budget row for the remainder of the caller's transaction.
pub async fn lock_budget(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    budget_id: BudgetId,
) -> Result<Budget, LedgerError> {
    let row = sqlx::query(
        r#"
        SELECT id, tenant_id, currency, soft_cap, hard_cap, balance, period,
               last_reset_at, created_at, updated_at
        FROM budgets WHERE tenant_id = $1 AND id = $2
        FOR UPDATE
        "#,
    )
    .bind(tenant_id)
    .bind(budget_id)
    .fetch_optional(conn)
    .await?;

    match row {
        Some(row) => Ok(budget_from_row(&row)?),
        None => Err(LedgerError::BudgetNotFound),
    }
}

/// `fund`: top up the budget. Balance and entry both move by `+amount`.
pub async fn fund(
    conn: &mut PgConnection,
    budget: &Budget,
    amount: Decimal,
    ref_id: Option<Uuid>,
) -> Result<Decimal, LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount);
    }
    if budget.balance + amount > budget.hard_cap {
        return Err(LedgerError::HardCapExceeded);
    }

    insert_entry(conn, budget, EntryType::Fund, amount, Some("topup"), ref_id, None).await?;
    let balance = apply_balance(conn, budget.id, amount).await?;
    Ok(balance)
}

/// `reserve`: commit funds for one issuance. Fails softly when the hard cap
/// would be exceeded; flags (but allows) crossing the soft cap.
pub async fn reserve(
    conn: &mut PgConnection,
    budget: &Budget,
    amount: Decimal,
    issuance_id: Uuid,
) -> Result<ReserveOutcome, LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount);
    }

    if budget.balance + amount > budget.hard_cap {
        return Ok(ReserveOutcome {
            reserved: false,
            soft_cap_exceeded: false,
            balance_after: budget.balance,
        });
    }

    insert_entry(
        conn,
        budget,
        EntryType::Reserve,
        amount,
        Some("issuance"),
        Some(issuance_id),
        None,
    )
    .await?;
    let balance = apply_balance(conn, budget.id, amount).await?;

    Ok(ReserveOutcome {
        reserved: true,
        soft_cap_exceeded: balance > budget.soft_cap,
        balance_after: balance,
    })
}

/// `charge`: record realization of a prior reserve. No balance change - the
/// balance already moved at reserve time.
pub async fn charge(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    budget_id: BudgetId,
    amount: Decimal,
    ref_id: Uuid,
) -> Result<(), LedgerError> {
    let budget = lock_budget(conn, tenant_id, budget_id).await?;

    let has_reserve = entry_exists(conn, budget_id, ref_id, EntryType::Reserve).await?;
    if !has_reserve {
        return Err(LedgerError::MissingReserve(ref_id));
    }

    insert_entry(
        conn,
        &budget,
        EntryType::Charge,
        amount,
        Some("issuance"),
        Some(ref_id),
        None,
    )
    .await?;
    Ok(())
}

/// `release` / `expire`: restore committed funds. Entry is stored negative;
/// balance drops by `amount`. Forbidden once the same ref has been charged.
pub async fn release(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    budget_id: BudgetId,
    amount: Decimal,
    ref_id: Uuid,
    entry_type: EntryType,
) -> Result<(), LedgerError> {
    debug_assert!(matches!(entry_type, EntryType::Release | EntryType::Expire));

    let budget = lock_budget(conn, tenant_id, budget_id).await?;

    if entry_exists(conn, budget_id, ref_id, EntryType::Charge).await? {
        return Err(LedgerError::ReleaseAfterCharge(ref_id));
    }

    insert_entry(
        conn,
        &budget,
        entry_type,
        -amount,
        Some("issuance"),
        Some(ref_id),
        None,
    )
    .await?;
    apply_balance(conn, budget_id, -amount).await?;
    Ok(())
}

/// `reverse`: reconciliation adjustment of the balance by a signed delta,
/// guarded by an operator note.
pub async fn reverse(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    budget_id: BudgetId,
    delta: Decimal,
    note: &str,
) -> Result<Decimal, LedgerError> {
    let budget = lock_budget(conn, tenant_id, budget_id).await?;

    insert_entry(
        conn,
        &budget,
        EntryType::Reverse,
        delta,
        Some("reconcile"),
        None,
        Some(note),
    )
    .await?;
    let balance = apply_balance(conn, budget_id, delta).await?;
    Ok(balance)
}

/// Append one corrective `reverse` entry without moving the balance. Used by
/// discrepancy fixes, where the stored balance is operationally right and the
/// entry log is missing a movement.
pub(crate) async fn append_reverse_entry(
    conn: &mut PgConnection,
    budget: &Budget,
    amount: Decimal,
    note: &str,
) -> Result<(), LedgerError> {
    insert_entry(
        conn,
        budget,
        EntryType::Reverse,
        amount,
        Some("reconcile"),
        None,
        Some(note),
    )
    .await?;
    Ok(())
}

/// Period reset: release the full current balance, tagged `period_reset`.
pub(crate) async fn release_full_balance(
    conn: &mut PgConnection,
    budget: &Budget,
) -> Result<(), LedgerError> {
    if budget.balance == Decimal::ZERO {
        return Ok(());
    }
    insert_entry(
        conn,
        budget,
        EntryType::Release,
        -budget.balance,
        Some("period_reset"),
        None,
        None,
    )
    .await?;
    apply_balance(conn, budget.id, -budget.balance).await?;
    Ok(())
}

async fn insert_entry(
    conn: &mut PgConnection,
    budget: &Budget,
    entry_type: EntryType,
    amount: Decimal,
    ref_type: Option<&str>,
    ref_id: Option<Uuid>,
    note: Option<&str>,
) -> Result<i64, LedgerError> {
    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO ledger_entries (tenant_id, budget_id, entry_type, amount, ref_type, ref_id, note)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(budget.tenant_id)
    .bind(budget.id)
    .bind(entry_type.id())
    .bind(amount)
    .bind(ref_type)
    .bind(ref_id)
    .bind(note)
    .fetch_one(conn)
    .await?;

    Ok(id)
}

async fn apply_balance(
    conn: &mut PgConnection,
    budget_id: BudgetId,
    delta: Decimal,
) -> Result<Decimal, LedgerError> {
    let row = sqlx::query(
        "UPDATE budgets SET balance = balance + $2, updated_at = NOW() WHERE id = $1 RETURNING balance",
    )
    .bind(budget_id)
    .bind(delta)
    .fetch_one(conn)
    .await?;

    Ok(row.get("balance"))
}

async fn entry_exists(
    conn: &mut PgConnection,
    budget_id: BudgetId,
    ref_id: Uuid,
    entry_type: EntryType,
) -> Result<bool, LedgerError> {
    let found = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM ledger_entries WHERE budget_id = $1 AND ref_id = $2 AND entry_type = $3",
    )
    .bind(budget_id)
    .bind(ref_id)
    .bind(entry_type.id())
    .fetch_one(conn)
    .await?;

    Ok(found > 0)
}
