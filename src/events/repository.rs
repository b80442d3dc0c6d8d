//! Repository layer for event rows

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::core_types::{EventId, TenantId};

use super::models::Event;

const EVENT_COLUMNS: &str =
    "id, tenant_id, customer_id, event_type, properties, occurred_at, source, idempotency_key, created_at";

/// Event repository
pub struct EventRepository;

impl EventRepository {
    pub async fn get_by_id(
        pool: &PgPool,
        tenant_id: TenantId,
        event_id: EventId,
    ) -> Result<Option<Event>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(event_id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|r| event_from_row(&r)))
    }

    pub async fn get_by_idempotency_key(
        pool: &PgPool,
        tenant_id: TenantId,
        idempotency_key: &str,
    ) -> Result<Option<Event>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE tenant_id = $1 AND idempotency_key = $2"
        ))
        .bind(tenant_id)
        .bind(idempotency_key)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|r| event_from_row(&r)))
    }
}

pub(crate) fn event_from_row(row: &PgRow) -> Event {
    Event {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        customer_id: row.get("customer_id"),
        event_type: row.get("event_type"),
        properties: row.get("properties"),
        occurred_at: row.get("occurred_at"),
        source: row.get("source"),
        idempotency_key: row.get("idempotency_key"),
        created_at: row.get("created_at"),
    }
}
