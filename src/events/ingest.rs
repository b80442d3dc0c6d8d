//! Idempotent event ingestion
//!
//! The `(tenant, idempotency_key)` pair is unique. The insert runs in its
//! own transaction with `ON CONFLICT DO NOTHING`; losing a race (or
//! replaying a key) returns the winner's row with `was_new = false`, and
//! the rules pipeline only runs for the winner.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::core_types::{CustomerId, TenantId};

use super::models::Event;
use super::repository::{event_from_row, EventRepository};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Customer not found")]
    CustomerNotFound,
}

impl From<sqlx::Error> for IngestError {
    fn from(e: sqlx::Error) -> Self {
        // Surface a missing customer as its own kind; callers map it to 404
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.code().as_deref() == Some("23503") {
                return IngestError::CustomerNotFound;
            }
        }
        IngestError::Database(e)
    }
}

/// Caller-supplied fields of one event.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub customer_id: CustomerId,
    pub event_type: String,
    pub properties: serde_json::Value,
    /// Defaults to wall-clock now
    pub occurred_at: Option<DateTime<Utc>>,
    /// Defaults to "api"
    pub source: Option<String>,
}

/// Persist one event, deduplicated per tenant by `idempotency_key`.
/// Returns the event row and whether this call created it.
pub async fn ingest_event(
    pool: &PgPool,
    tenant_id: TenantId,
    idempotency_key: &str,
    new_event: NewEvent,
) -> Result<(Event, bool), IngestError> {
    let occurred_at = new_event.occurred_at.unwrap_or_else(Utc::now);
    let source = new_event.source.as_deref().unwrap_or("api");

    let row = sqlx::query(
        r#"
        INSERT INTO events
            (id, tenant_id, customer_id, event_type, properties, occurred_at, source, idempotency_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (tenant_id, idempotency_key) DO NOTHING
        RETURNING id, tenant_id, customer_id, event_type, properties, occurred_at, source,
                  idempotency_key, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant_id)
    .bind(new_event.customer_id)
    .bind(&new_event.event_type)
    .bind(&new_event.properties)
    .bind(occurred_at)
    .bind(source)
    .bind(idempotency_key)
    .fetch_optional(pool)
    .await?;

    if let Some(row) = row {
        let event = event_from_row(&row);
        tracing::debug!(event_id = %event.id, %tenant_id, event_type = %event.event_type, "event ingested");
        return Ok((event, true));
    }

    // Conflict: someone already owns this key within the tenant
    let existing = EventRepository::get_by_idempotency_key(pool, tenant_id, idempotency_key)
        .await?
        .ok_or_else(|| {
            // Insert conflicted yet the row is invisible - only plausible on a
            // torn-down tenant; report as infrastructure trouble.
            IngestError::Database(sqlx::Error::RowNotFound)
        })?;

    tracing::debug!(
        event_id = %existing.id,
        %tenant_id,
        idempotency_key,
        "duplicate idempotency key, returning prior event"
    );
    Ok((existing, false))
}
