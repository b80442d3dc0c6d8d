//! Repository layer for budgets and ledger reads

use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::core_types::{BudgetId, Currency, TenantId};
use crate::db::begin_tenant_tx;

use super::models::{Budget, BudgetPeriod, EntryType, LedgerEntry};
use super::ops::{self, LedgerError};

fn decode_err(detail: String) -> sqlx::Error {
    sqlx::Error::Decode(detail.into())
}

/// Budget repository
pub struct BudgetRepository;

impl BudgetRepository {
    pub async fn create(
        pool: &PgPool,
        tenant_id: TenantId,
        currency: Currency,
        soft_cap: Decimal,
        hard_cap: Decimal,
        period: BudgetPeriod,
    ) -> Result<Budget, sqlx::Error> {
        let row = sqlx::query(
            r#"
            INSERT INTO budgets (id, tenant_id, currency, soft_cap, hard_cap, period)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, tenant_id, currency, soft_cap, hard_cap, balance, period,
                      last_reset_at, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(currency.as_str())
        .bind(soft_cap)
        .bind(hard_cap)
        .bind(period.id())
        .fetch_one(pool)
        .await?;

        budget_from_row(&row)
    }

    pub async fn get_by_id(
        pool: &PgPool,
        tenant_id: TenantId,
        budget_id: BudgetId,
    ) -> Result<Option<Budget>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, currency, soft_cap, hard_cap, balance, period,
                   last_reset_at, created_at, updated_at
            FROM budgets WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(budget_id)
        .fetch_optional(pool)
        .await?;

        row.map(|r| budget_from_row(&r)).transpose()
    }

    /// Top up a budget in its own transaction.
    pub async fn topup(
        pool: &PgPool,
        tenant_id: TenantId,
        budget_id: BudgetId,
        amount: Decimal,
    ) -> Result<Decimal, LedgerError> {
        let mut tx = begin_tenant_tx(pool, tenant_id).await?;
        let budget = ops::lock_budget(&mut tx, tenant_id, budget_id).await?;
        let balance = ops::fund(&mut tx, &budget, amount, None).await?;
        tx.commit().await.map_err(LedgerError::Database)?;

        tracing::info!(%tenant_id, %budget_id, %amount, %balance, "budget topped up");
        Ok(balance)
    }

    /// Ledger entries for one budget, in commit order.
    pub async fn entries(
        pool: &PgPool,
        tenant_id: TenantId,
        budget_id: BudgetId,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, budget_id, entry_type, amount, ref_type, ref_id, note, created_at
            FROM ledger_entries
            WHERE tenant_id = $1 AND budget_id = $2
            ORDER BY id
            LIMIT $3
            "#,
        )
        .bind(tenant_id)
        .bind(budget_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        rows.iter().map(entry_from_row).collect()
    }
}

pub(crate) fn budget_from_row(row: &PgRow) -> Result<Budget, sqlx::Error> {
    let currency_str: String = row.get("currency");
    let currency = currency_str
        .parse::<Currency>()
        .map_err(|_| decode_err(format!("invalid currency: {currency_str}")))?;

    let period_id: i16 = row.get("period");
    let period = BudgetPeriod::from_id(period_id)
        .ok_or_else(|| decode_err(format!("invalid budget period: {period_id}")))?;

    Ok(Budget {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        currency,
        soft_cap: row.get("soft_cap"),
        hard_cap: row.get("hard_cap"),
        balance: row.get("balance"),
        period,
        last_reset_at: row.get("last_reset_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

pub(crate) fn entry_from_row(row: &PgRow) -> Result<LedgerEntry, sqlx::Error> {
    let type_id: i16 = row.get("entry_type");
    let entry_type = EntryType::from_id(type_id)
        .ok_or_else(|| decode_err(format!("invalid ledger entry type: {type_id}")))?;

    Ok(LedgerEntry {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        budget_id: row.get("budget_id"),
        entry_type,
        amount: row.get("amount"),
        ref_type: row.get("ref_type"),
        ref_id: row.get("ref_id"),
        note: row.get("note"),
        created_at: row.get("created_at"),
    })
}
