//! Event data model

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core_types::{CustomerId, EventId, TenantId};

/// An observed customer action. Immutable once written.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct Event {
    #[schema(value_type = Uuid)]
    pub id: EventId,
    #[schema(value_type = Uuid)]
    pub tenant_id: TenantId,
    #[schema(value_type = Uuid)]
    pub customer_id: CustomerId,
    pub event_type: String,
    /// Arbitrary caller-supplied JSON
    pub properties: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
    /// Origin channel: api, pos, whatsapp, ussd, ...
    pub source: String,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}
