//! Repository layer for rules

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::core_types::{CampaignId, RewardId, RuleId, TenantId};

use super::models::Rule;

/// Fields accepted on rule creation and update.
#[derive(Debug, Clone)]
pub struct RuleSpec {
    pub event_type: String,
    pub conditions: serde_json::Value,
    pub campaign_id: Option<CampaignId>,
    pub reward_id: RewardId,
    pub per_user_cap: i32,
    pub global_cap: Option<i32>,
    pub cool_down_sec: i32,
    pub active: bool,
}

/// Rule repository
pub struct RuleRepository;

impl RuleRepository {
    pub async fn create(
        pool: &PgPool,
        tenant_id: TenantId,
        spec: &RuleSpec,
    ) -> Result<Rule, sqlx::Error> {
        let row = sqlx::query(
            r#"
            INSERT INTO rules
                (id, tenant_id, event_type, conditions, campaign_id, reward_id,
                 per_user_cap, global_cap, cool_down_sec, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, tenant_id, event_type, conditions, campaign_id, reward_id,
                      per_user_cap, global_cap, cool_down_sec, active, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(&spec.event_type)
        .bind(&spec.conditions)
        .bind(spec.campaign_id)
        .bind(spec.reward_id)
        .bind(spec.per_user_cap)
        .bind(spec.global_cap)
        .bind(spec.cool_down_sec)
        .bind(spec.active)
        .fetch_one(pool)
        .await?;

        Ok(rule_from_row(&row))
    }

    pub async fn update(
        pool: &PgPool,
        tenant_id: TenantId,
        rule_id: RuleId,
        spec: &RuleSpec,
    ) -> Result<Option<Rule>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            UPDATE rules SET
                event_type = $3, conditions = $4, campaign_id = $5, reward_id = $6,
                per_user_cap = $7, global_cap = $8, cool_down_sec = $9, active = $10,
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING id, tenant_id, event_type, conditions, campaign_id, reward_id,
                      per_user_cap, global_cap, cool_down_sec, active, created_at, updated_at
            "#,
        )
        .bind(tenant_id)
        .bind(rule_id)
        .bind(&spec.event_type)
        .bind(&spec.conditions)
        .bind(spec.campaign_id)
        .bind(spec.reward_id)
        .bind(spec.per_user_cap)
        .bind(spec.global_cap)
        .bind(spec.cool_down_sec)
        .bind(spec.active)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|r| rule_from_row(&r)))
    }

    pub async fn deactivate(
        pool: &PgPool,
        tenant_id: TenantId,
        rule_id: RuleId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE rules SET active = FALSE, updated_at = NOW() WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(rule_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_by_id(
        pool: &PgPool,
        tenant_id: TenantId,
        rule_id: RuleId,
    ) -> Result<Option<Rule>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, event_type, conditions, campaign_id, reward_id,
                   per_user_cap, global_cap, cool_down_sec, active, created_at, updated_at
            FROM rules WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(rule_id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|r| rule_from_row(&r)))
    }

    pub async fn list(pool: &PgPool, tenant_id: TenantId) -> Result<Vec<Rule>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, event_type, conditions, campaign_id, reward_id,
                   per_user_cap, global_cap, cool_down_sec, active, created_at, updated_at
            FROM rules WHERE tenant_id = $1
            ORDER BY id
            "#,
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await?;

        Ok(rows.iter().map(rule_from_row).collect())
    }

    /// Active rules for one `(tenant, event_type)` pair, in stable id order.
    /// Evaluation order across the pipeline follows this ordering.
    pub async fn list_active(
        pool: &PgPool,
        tenant_id: TenantId,
        event_type: &str,
    ) -> Result<Vec<Rule>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, event_type, conditions, campaign_id, reward_id,
                   per_user_cap, global_cap, cool_down_sec, active, created_at, updated_at
            FROM rules
            WHERE tenant_id = $1 AND event_type = $2 AND active
            ORDER BY id
            "#,
        )
        .bind(tenant_id)
        .bind(event_type)
        .fetch_all(pool)
        .await?;

        Ok(rows.iter().map(rule_from_row).collect())
    }
}

fn rule_from_row(row: &PgRow) -> Rule {
    Rule {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        event_type: row.get("event_type"),
        conditions: row.get("conditions"),
        campaign_id: row.get("campaign_id"),
        reward_id: row.get("reward_id"),
        per_user_cap: row.get("per_user_cap"),
        global_cap: row.get("global_cap"),
        cool_down_sec: row.get("cool_down_sec"),
        active: row.get("active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
