//! Repository layer for issuance rows

use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};

use crate::core_types::{Currency, CustomerId, EventId, IssuanceId, TenantId};

use super::models::{Issuance, IssuanceStatus};

const ISSUANCE_COLUMNS: &str = "id, tenant_id, customer_id, event_id, rule_id, campaign_id, \
     reward_id, status, cost_amount, face_amount, currency, code, expires_at, redeemed_at, \
     created_at, updated_at";

fn decode_err(detail: String) -> sqlx::Error {
    sqlx::Error::Decode(detail.into())
}

/// Issuance repository
pub struct IssuanceRepository;

impl IssuanceRepository {
    pub async fn get_by_id(
        pool: &PgPool,
        tenant_id: TenantId,
        issuance_id: IssuanceId,
    ) -> Result<Option<Issuance>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {ISSUANCE_COLUMNS} FROM issuances WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(issuance_id)
        .fetch_optional(pool)
        .await?;

        row.map(|r| issuance_from_row(&r)).transpose()
    }

    /// Lock one issuance row for a state transition.
    pub async fn lock_by_id(
        conn: &mut PgConnection,
        tenant_id: TenantId,
        issuance_id: IssuanceId,
    ) -> Result<Option<Issuance>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {ISSUANCE_COLUMNS} FROM issuances WHERE tenant_id = $1 AND id = $2 FOR UPDATE"
        ))
        .bind(tenant_id)
        .bind(issuance_id)
        .fetch_optional(conn)
        .await?;

        row.map(|r| issuance_from_row(&r)).transpose()
    }

    /// Every issuance produced by one event, in creation order.
    pub async fn list_for_event(
        pool: &PgPool,
        tenant_id: TenantId,
        event_id: EventId,
    ) -> Result<Vec<Issuance>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {ISSUANCE_COLUMNS} FROM issuances \
             WHERE tenant_id = $1 AND event_id = $2 ORDER BY created_at, id"
        ))
        .bind(tenant_id)
        .bind(event_id)
        .fetch_all(pool)
        .await?;

        rows.iter().map(issuance_from_row).collect()
    }

    pub async fn list_for_customer(
        pool: &PgPool,
        tenant_id: TenantId,
        customer_id: CustomerId,
        limit: i64,
    ) -> Result<Vec<Issuance>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {ISSUANCE_COLUMNS} FROM issuances \
             WHERE tenant_id = $1 AND customer_id = $2 ORDER BY created_at DESC LIMIT $3"
        ))
        .bind(tenant_id)
        .bind(customer_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        rows.iter().map(issuance_from_row).collect()
    }
}

pub(crate) fn issuance_from_row(row: &PgRow) -> Result<Issuance, sqlx::Error> {
    let status_id: i16 = row.get("status");
    let status = IssuanceStatus::from_id(status_id)
        .ok_or_else(|| decode_err(format!("invalid issuance status: {status_id}")))?;

    let currency_str: String = row.get("currency");
    let currency = currency_str
        .parse::<Currency>()
        .map_err(|_| decode_err(format!("invalid currency: {currency_str}")))?;

    Ok(Issuance {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        customer_id: row.get("customer_id"),
        event_id: row.get("event_id"),
        rule_id: row.get("rule_id"),
        campaign_id: row.get("campaign_id"),
        reward_id: row.get("reward_id"),
        status,
        cost_amount: row.get("cost_amount"),
        face_amount: row.get("face_amount"),
        currency,
        code: row.get("code"),
        expires_at: row.get("expires_at"),
        redeemed_at: row.get("redeemed_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
