//! Repository layer for rewards and campaigns

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::core_types::{BudgetId, CampaignId, Currency, RewardId, TenantId};

use super::models::{Campaign, Inventory, Reward, RewardType};

fn decode_err(detail: String) -> sqlx::Error {
    sqlx::Error::Decode(detail.into())
}

/// Reward repository
pub struct RewardRepository;

impl RewardRepository {
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        pool: &PgPool,
        tenant_id: TenantId,
        name: &str,
        reward_type: RewardType,
        inventory: Inventory,
        face_value: Decimal,
        currency: Currency,
        metadata: serde_json::Value,
    ) -> Result<Reward, sqlx::Error> {
        let row = sqlx::query(
            r#"
            INSERT INTO rewards (id, tenant_id, name, reward_type, inventory, face_value, currency, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, tenant_id, name, reward_type, inventory, face_value, currency, metadata, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(name)
        .bind(reward_type.id())
        .bind(inventory.id())
        .bind(face_value)
        .bind(currency.as_str())
        .bind(metadata)
        .fetch_one(pool)
        .await?;

        reward_from_row(&row)
    }

    pub async fn get_by_id(
        pool: &PgPool,
        tenant_id: TenantId,
        reward_id: RewardId,
    ) -> Result<Option<Reward>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, name, reward_type, inventory, face_value, currency, metadata, created_at
            FROM rewards WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(reward_id)
        .fetch_optional(pool)
        .await?;

        row.map(|r| reward_from_row(&r)).transpose()
    }

    /// In-transaction fetch, used by the issuer after the advisory lock.
    pub async fn get_by_id_tx(
        conn: &mut PgConnection,
        tenant_id: TenantId,
        reward_id: RewardId,
    ) -> Result<Option<Reward>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, name, reward_type, inventory, face_value, currency, metadata, created_at
            FROM rewards WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(reward_id)
        .fetch_optional(conn)
        .await?;

        row.map(|r| reward_from_row(&r)).transpose()
    }
}

pub(crate) fn reward_from_row(row: &PgRow) -> Result<Reward, sqlx::Error> {
    let type_id: i16 = row.get("reward_type");
    let reward_type = RewardType::from_id(type_id)
        .ok_or_else(|| decode_err(format!("invalid reward type: {type_id}")))?;

    let inventory_id: i16 = row.get("inventory");
    let inventory = Inventory::from_id(inventory_id)
        .ok_or_else(|| decode_err(format!("invalid inventory kind: {inventory_id}")))?;

    let currency_str: String = row.get("currency");
    let currency = currency_str
        .parse::<Currency>()
        .map_err(|_| decode_err(format!("invalid currency: {currency_str}")))?;

    Ok(Reward {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        name: row.get("name"),
        reward_type,
        inventory,
        face_value: row.get("face_value"),
        currency,
        metadata: row.get("metadata"),
        created_at: row.get("created_at"),
    })
}

/// Campaign repository
pub struct CampaignRepository;

impl CampaignRepository {
    pub async fn create(
        pool: &PgPool,
        tenant_id: TenantId,
        name: &str,
        budget_id: Option<BudgetId>,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Result<Campaign, sqlx::Error> {
        let row = sqlx::query(
            r#"
            INSERT INTO campaigns (id, tenant_id, name, budget_id, starts_at, ends_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, tenant_id, name, budget_id, starts_at, ends_at, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(name)
        .bind(budget_id)
        .bind(starts_at)
        .bind(ends_at)
        .fetch_one(pool)
        .await?;

        Ok(campaign_from_row(&row))
    }

    pub async fn get_by_id(
        pool: &PgPool,
        tenant_id: TenantId,
        campaign_id: CampaignId,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, name, budget_id, starts_at, ends_at, created_at
            FROM campaigns WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(campaign_id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|r| campaign_from_row(&r)))
    }

    /// In-transaction fetch for the issuer.
    pub async fn get_by_id_tx(
        conn: &mut PgConnection,
        tenant_id: TenantId,
        campaign_id: CampaignId,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, name, budget_id, starts_at, ends_at, created_at
            FROM campaigns WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(campaign_id)
        .fetch_optional(conn)
        .await?;

        Ok(row.map(|r| campaign_from_row(&r)))
    }
}

fn campaign_from_row(row: &PgRow) -> Campaign {
    Campaign {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        name: row.get("name"),
        budget_id: row.get("budget_id"),
        starts_at: row.get("starts_at"),
        ends_at: row.get("ends_at"),
        created_at: row.get("created_at"),
    }
}
